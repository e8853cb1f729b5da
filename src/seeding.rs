use crate::config::Config;
use crate::models::NewUser;
use crate::opsday;
use anyhow::Result;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

// US airports the classifier needs to recognize for the region lookup.
const US_AIRPORT_CODES: &[&str] = &[
    "ATL", "LAX", "ORD", "DFW", "DEN", "JFK", "SFO", "SEA", "LAS", "MCO", "EWR", "CLT", "PHX",
    "IAH", "MIA", "BOS", "MSP", "FLL", "DTW", "PHL", "LGA", "BWI", "SLC", "SAN", "IAD", "DCA",
    "MDW", "TPA", "HNL", "PDX", "STL", "DAL", "HOU", "AUS", "BNA", "MSY", "RDU", "MCI", "SJC",
    "SNA", "OAK", "SMF", "SAT", "RSW", "CLE", "IND", "PIT", "CVG", "CMH", "JAX", "ANC", "BUF",
    "ABQ", "ONT", "BUR", "OGG", "MEM", "OKC", "RIC", "SDF", "TUS", "ELP", "BOI", "ROC", "SYR",
    "ALB", "BDL", "PVD", "MHT", "PWM", "BTV", "GRR", "MKE", "OMA", "DSM", "TUL", "LIT", "XNA",
    "CHS", "SAV", "GSP", "ORF", "PBI", "SRQ", "DAB", "TLH", "PNS", "HSV", "BHM", "JAN", "SHV",
    "BTR", "LEX", "CRW", "DAY", "TOL", "FWA", "MSN", "GSO", "MYR", "ILM", "AVL", "TYS", "CHA",
    "FAT", "PSP", "RNO", "GEG", "EUG", "MFR", "BIL", "BZN", "MSO", "FAR", "FSD", "ICT", "AMA",
    "LBB", "MAF", "CRP", "HRL", "BRO", "EYW", "ISP", "SWF", "ACY", "ATW", "GRB", "LAN",
];

pub fn seed(conn: &mut SqliteConnection, config: &Config) -> Result<()> {
    seed_us_airport_codes(conn)?;
    seed_bootstrap_user(conn, config)?;
    Ok(())
}

fn seed_us_airport_codes(conn: &mut SqliteConnection) -> Result<()> {
    use crate::schema::us_airport_codes::dsl::*;

    let existing: i64 = us_airport_codes.count().get_result(conn)?;
    if existing > 0 {
        return Ok(());
    }

    for chunk in US_AIRPORT_CODES.chunks(100) {
        let rows: Vec<_> = chunk.iter().map(|c| code.eq(*c)).collect();
        diesel::insert_into(us_airport_codes)
            .values(rows)
            .execute(conn)?;
    }

    tracing::info!("Seeded {} US airport codes", US_AIRPORT_CODES.len());
    Ok(())
}

/// Creates the configured bootstrap user when the users table is empty, so a
/// fresh deployment is reachable before anyone has provisioned accounts.
fn seed_bootstrap_user(conn: &mut SqliteConnection, config: &Config) -> Result<()> {
    use crate::schema::users::dsl::*;

    let existing: i64 = users.count().get_result(conn)?;
    if existing > 0 {
        return Ok(());
    }

    let (Some(name), Some(bootstrap_pin)) = (
        config.auth.bootstrap_username.as_ref(),
        config.auth.bootstrap_pin.as_ref(),
    ) else {
        tracing::warn!("Users table is empty and no bootstrap user is configured");
        return Ok(());
    };

    diesel::insert_into(users)
        .values(&NewUser {
            username: name.clone(),
            pin: bootstrap_pin.clone(),
            role: crate::auth::ROLE_DISPATCH.to_string(),
            created_at: opsday::utc_iso(Utc::now()),
        })
        .execute(conn)?;

    tracing::info!("Seeded bootstrap user '{}'", name);
    Ok(())
}
