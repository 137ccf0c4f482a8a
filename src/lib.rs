//! Statkeeper library
//!
//! A fetch-through cache for player profile statistics: snapshots are read
//! from disk when present, fetched from the upstream profile API otherwise,
//! and refreshed in the background on a fixed interval.

pub mod api;
pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod refresh;
pub mod resolver;
pub mod snapshot;
pub mod upstream;

#[cfg(test)]
mod test_support;

pub use app::App;
pub use cache::{SnapshotStore, StoreError, Username};
pub use resolver::{ResolveError, Resolver};
pub use snapshot::Snapshot;
pub use upstream::{ProfileClient, ProfileSource, UpstreamError};
