//! Upstream profile source
//!
//! The resolver and refresher talk to the profile API only through the
//! `ProfileSource` trait. `ProfileClient` is the production implementation
//! backed by reqwest.

pub mod profile;

pub use profile::{ProfileClient, DEFAULT_PROFILE_URL, PROFILE_FLAGS};

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::Username;
use crate::snapshot::Snapshot;

/// Errors that can occur when fetching a profile from upstream
///
/// Cloneable so that every waiter on a shared in-flight fetch receives it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Upstream answered with a non-success status
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response (connect, TLS, timeout)
    #[error("upstream request failed: {0}")]
    Transport(String),

    /// The response body was not a JSON document
    #[error("upstream response was not valid JSON: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// HTTP status reported by upstream, if it answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Anything that can produce a fresh snapshot for a username
///
/// Implementations issue one request per call and never retry.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn fetch_profile(&self, username: &Username) -> Result<Snapshot, UpstreamError>;
}
