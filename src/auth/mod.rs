pub mod jwt;
pub mod middleware;

use crate::models::User;
use anyhow::Result;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Deserialize;
use sha2::{Digest, Sha256};

pub const ROLE_DISPATCH: &str = "Dispatch";
pub const ROLE_LEAD: &str = "Lead";
pub const ROLE_MGMT: &str = "Mgmt";

pub const APP_DISPATCH: &str = "dispatch";
pub const APP_LEAD: &str = "lead";
pub const APP_MGMT: &str = "mgmt";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub pin: String,
}

/// Apps a role may open. Mgmt sees everything.
pub fn access_for_role(role: &str) -> Vec<&'static str> {
    match role {
        ROLE_DISPATCH => vec![APP_DISPATCH],
        ROLE_LEAD => vec![APP_LEAD],
        ROLE_MGMT => vec![APP_DISPATCH, APP_LEAD, APP_MGMT],
        _ => vec![],
    }
}

pub fn role_has_app(role: &str, app: &str) -> bool {
    access_for_role(role).contains(&app)
}

/// Compares PINs in constant time. Both sides are hashed first so neither
/// length nor early-mismatch position leaks through timing.
pub fn pins_match(candidate: &str, stored: &str) -> bool {
    let a = Sha256::digest(candidate.as_bytes());
    let b = Sha256::digest(stored.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn authenticate_user(conn: &mut SqliteConnection, username: &str, pin: &str) -> Result<User> {
    use crate::schema::users::dsl;

    let user = dsl::users
        .filter(dsl::username.eq(username))
        .select(User::as_select())
        .first::<User>(conn)
        .optional()?;

    match user {
        Some(user) if pins_match(pin, &user.pin) => Ok(user),
        _ => Err(anyhow::anyhow!("Invalid username or pin.")),
    }
}
