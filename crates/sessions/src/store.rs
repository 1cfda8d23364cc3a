//! Storage seam for pending workflows.

use std::time::Duration;

use crate::record::SessionRecord;

/// Per-user pending-workflow storage.
///
/// All operations are synchronous and never held across an `.await`. There is
/// no compare-and-swap: `put` overwrites unconditionally.
pub trait SessionStore: Send + Sync {
    fn get(&self, user_id: &str) -> Option<SessionRecord>;

    /// Insert or replace the record for `user_id`.
    fn put(&self, user_id: &str, record: SessionRecord);

    fn remove(&self, user_id: &str) -> Option<SessionRecord>;

    /// Modify the record for `user_id` in place, if there is one. Returns
    /// whether `apply` ran.
    fn update(&self, user_id: &str, apply: &mut dyn FnMut(&mut SessionRecord)) -> bool;

    /// Drop every record idle longer than `ttl` as of `now_ms`, releasing any
    /// temp file it still references. Returns how many records were dropped.
    fn sweep(&self, now_ms: u64, ttl: Duration) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
