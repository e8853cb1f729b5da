//! Short-lived write-through patch overlay.
//!
//! The store can lag a mutation by a moment; a client that PATCHes a row and
//! immediately re-polls would see its edit vanish. Mutation endpoints install
//! the projected field values here, and list reads merge them over whatever
//! the store returned. Entries expire after 12 seconds; the store stays the
//! source of truth.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const PATCH_TTL: Duration = Duration::from_secs(12);

#[derive(Clone)]
pub struct PatchOverlay {
    entries: Arc<RwLock<HashMap<String, PatchEntry>>>,
    ttl: Duration,
}

struct PatchEntry {
    patch: Map<String, Value>,
    expires_at: Instant,
}

impl Default for PatchOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchOverlay {
    pub fn new() -> Self {
        Self::with_ttl(PATCH_TTL)
    }

    fn with_ttl(ttl: Duration) -> Self {
        PatchOverlay {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Merges the patch object into the key's entry and refreshes its TTL.
    /// Expired entries are pruned on the way in.
    pub async fn install(&self, key: &str, patch: Value) {
        let Value::Object(fields) = patch else {
            return;
        };
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.expires_at > now);
        let entry = entries.entry(key.to_string()).or_insert_with(|| PatchEntry {
            patch: Map::new(),
            expires_at: now + self.ttl,
        });
        entry.patch.extend(fields);
        entry.expires_at = now + self.ttl;
    }

    /// Overlays any live patch for `key` onto a projected row object.
    pub async fn apply(&self, key: &str, row: &mut Value) {
        let entries = self.entries.read().await;
        let Some(entry) = entries.get(key) else {
            return;
        };
        if entry.expires_at <= Instant::now() {
            return;
        }
        if let Value::Object(obj) = row {
            for (field, value) in &entry.patch {
                obj.insert(field.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn patch_overlays_projected_row() {
        let overlay = PatchOverlay::new();
        overlay
            .install("2025-02-25|ARR|WS 816|06:30", json!({"wchr": 3}))
            .await;

        let mut row = json!({"key": "2025-02-25|ARR|WS 816|06:30", "wchr": 1, "wchc": 0});
        overlay.apply("2025-02-25|ARR|WS 816|06:30", &mut row).await;
        assert_eq!(row["wchr"], 3);
        assert_eq!(row["wchc"], 0);
    }

    #[tokio::test]
    async fn consecutive_patches_merge() {
        let overlay = PatchOverlay::new();
        overlay.install("k", json!({"wchr": 3})).await;
        overlay.install("k", json!({"comment": "late"})).await;

        let mut row = json!({"wchr": 0, "comment": ""});
        overlay.apply("k", &mut row).await;
        assert_eq!(row["wchr"], 3);
        assert_eq!(row["comment"], "late");
    }

    #[tokio::test]
    async fn expired_entries_are_ignored_and_pruned() {
        let overlay = PatchOverlay::with_ttl(Duration::ZERO);
        overlay.install("k", json!({"wchr": 3})).await;

        let mut row = json!({"wchr": 0});
        overlay.apply("k", &mut row).await;
        assert_eq!(row["wchr"], 0);

        // The next install sweeps the dead entry.
        overlay.install("other", json!({"x": 1})).await;
        assert!(!overlay.entries.read().await.contains_key("k"));
    }

    #[tokio::test]
    async fn non_object_patches_are_dropped() {
        let overlay = PatchOverlay::new();
        overlay.install("k", json!("not-an-object")).await;
        assert!(overlay.entries.read().await.is_empty());
    }
}
