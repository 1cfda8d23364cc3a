use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use {reelbot_pipeline::asset::release_path, tracing::debug};

use crate::{record::SessionRecord, store::SessionStore};

/// `HashMap`-backed store. Records live for the lifetime of the process.
#[derive(Default)]
pub struct InMemorySessionStore {
    // std::sync::Mutex: every access is a short map operation, never across an await.
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, SessionRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, user_id: &str) -> Option<SessionRecord> {
        self.records().get(user_id).cloned()
    }

    fn put(&self, user_id: &str, record: SessionRecord) {
        let replaced = self.records().insert(user_id.to_string(), record);
        if let Some(old) = replaced {
            debug!(user_id, stage = %old.stage(), "session overwritten");
        }
    }

    fn remove(&self, user_id: &str) -> Option<SessionRecord> {
        self.records().remove(user_id)
    }

    fn update(&self, user_id: &str, apply: &mut dyn FnMut(&mut SessionRecord)) -> bool {
        match self.records().get_mut(user_id) {
            Some(record) => {
                apply(record);
                true
            },
            None => false,
        }
    }

    fn sweep(&self, now_ms: u64, ttl: Duration) -> usize {
        let expired: Vec<(String, SessionRecord)> = {
            let mut records = self.records();
            let keys: Vec<String> = records
                .iter()
                .filter(|(_, rec)| rec.is_expired(now_ms, ttl))
                .map(|(k, _)| k.clone())
                .collect();
            keys.into_iter()
                .filter_map(|k| records.remove(&k).map(|rec| (k, rec)))
                .collect()
        };

        // File removal happens outside the lock.
        for (user_id, record) in &expired {
            debug!(user_id, stage = %record.stage(), "sweeping stale session");
            if let Some(path) = &record.asset {
                release_path(path);
            }
        }
        expired.len()
    }

    fn len(&self) -> usize {
        self.records().len()
    }
}

#[cfg(test)]
mod tests {
    use reelbot_pipeline::Candidate;

    use super::*;

    const TTL: Duration = Duration::from_secs(600);

    fn record(now_ms: u64) -> SessionRecord {
        SessionRecord::awaiting_selection(
            vec![Candidate {
                title: "Movie".into(),
                locator: "movie/1".into(),
                thumbnail: None,
                hints: Default::default(),
            }],
            now_ms,
        )
    }

    #[test]
    fn put_get_remove() {
        let store = InMemorySessionStore::new();
        assert!(store.get("u1").is_none());

        store.put("u1", record(0));
        assert_eq!(store.get("u1").unwrap().created_at_ms, 0);
        assert_eq!(store.len(), 1);

        assert!(store.remove("u1").is_some());
        assert!(store.remove("u1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn put_overwrites_last_write_wins() {
        let store = InMemorySessionStore::new();
        store.put("u1", record(1));
        store.put("u1", record(2));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("u1").unwrap().created_at_ms, 2);
    }

    #[test]
    fn update_in_place_keeps_record_fresh() {
        let store = InMemorySessionStore::new();
        assert!(!store.update("u1", &mut |r| r.touch(1)));

        store.put("u1", record(0));
        assert!(store.update("u1", &mut |r| r.touch(650_000)));
        assert_eq!(store.get("u1").unwrap().last_touched_at_ms, 650_000);
        assert_eq!(store.sweep(700_000, TTL), 0);
    }

    #[test]
    fn sweep_drops_only_stale_records() {
        let store = InMemorySessionStore::new();
        store.put("stale", record(0));
        store.put("fresh", record(500_000));

        let now = 700_000;
        assert_eq!(store.sweep(now, TTL), 1);
        assert!(store.get("stale").is_none());
        assert!(store.get("fresh").is_some());
        assert_eq!(store.sweep(now, TTL), 0);
    }

    #[test]
    fn sweep_releases_referenced_asset() {
        let dir = tempfile::tempdir().unwrap();
        let orphan = dir.path().join("reelbot-orphan.part");
        std::fs::write(&orphan, b"partial").unwrap();

        let store = InMemorySessionStore::new();
        let mut rec = record(0);
        rec.asset = Some(orphan.clone());
        store.put("u1", rec);

        assert_eq!(store.sweep(TTL.as_millis() as u64 + 1, TTL), 1);
        assert!(!orphan.exists());
    }

    #[test]
    fn remove_does_not_touch_asset() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("reelbot-live.part");
        std::fs::write(&file, b"data").unwrap();

        let store = InMemorySessionStore::new();
        let mut rec = record(0);
        rec.asset = Some(file.clone());
        store.put("u1", rec);
        store.remove("u1");
        assert!(file.exists());
    }
}
