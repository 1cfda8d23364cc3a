//! Pending-workflow state, one record per user.
//!
//! A [`SessionRecord`] exists only while a user is between two numbered
//! replies. Writes are plain overwrites: two handlers racing on the same user
//! each replace the record, and the last write wins.

pub mod memory;
pub mod record;
pub mod store;
pub mod sweeper;

pub use {
    memory::InMemorySessionStore,
    record::{SessionRecord, SessionStage},
    store::SessionStore,
    sweeper::{SessionSweeper, SweeperHandle},
};
