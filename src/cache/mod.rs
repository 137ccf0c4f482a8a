//! Cache module for storing profile snapshots to disk
//!
//! This module provides the username key type and a passive snapshot store
//! that persists one JSON document per user. Entries never expire; freshness
//! is maintained by the background refresher instead.

mod store;
mod username;

pub use store::{SnapshotStore, StoreError};
pub use username::{Username, UsernameError, MAX_USERNAME_LEN};
