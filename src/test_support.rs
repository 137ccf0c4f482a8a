//! In-memory profile source shared by unit tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::Username;
use crate::snapshot::Snapshot;
use crate::upstream::{ProfileSource, UpstreamError};

/// Scripted upstream that counts every call per username
///
/// Usernames without a scripted response answer with a 404 status error.
#[derive(Default)]
pub struct FakeSource {
    responses: Mutex<HashMap<String, Result<Snapshot, UpstreamError>>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Duration,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `delay` inside every fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn respond(&self, username: &str, value: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(username.to_string(), Ok(Snapshot::new(value)));
    }

    pub fn fail(&self, username: &str, err: UpstreamError) {
        self.responses
            .lock()
            .unwrap()
            .insert(username.to_string(), Err(err));
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn calls_for(&self, username: &str) -> usize {
        self.calls.lock().unwrap().get(username).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ProfileSource for FakeSource {
    async fn fetch_profile(&self, username: &Username) -> Result<Snapshot, UpstreamError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(username.to_string())
            .or_default() += 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.responses
            .lock()
            .unwrap()
            .get(username.as_str())
            .cloned()
            .unwrap_or_else(|| {
                Err(UpstreamError::Status {
                    status: 404,
                    message: "Not Found".to_string(),
                })
            })
    }
}
