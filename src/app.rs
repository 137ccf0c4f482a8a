//! Service assembly
//!
//! `App` wires the store, upstream client, resolver and refresher together
//! and runs the HTTP server alongside the background refresh task.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{build_router, AppState};
use crate::cache::SnapshotStore;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::refresh::{RefreshHandle, RefreshReporter, Refresher, TracingReporter};
use crate::resolver::Resolver;
use crate::upstream::{ProfileClient, ProfileSource};

/// The assembled service
pub struct App {
    config: AppConfig,
    resolver: Arc<Resolver>,
    reporter: Arc<dyn RefreshReporter>,
}

impl App {
    /// Creates the service with the real upstream client
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let source = Arc::new(ProfileClient::from_config(&config.upstream)?);
        Ok(Self::with_source(config, source))
    }

    /// Creates the service with a custom profile source
    pub fn with_source(config: AppConfig, source: Arc<dyn ProfileSource>) -> Self {
        let store = Arc::new(SnapshotStore::with_dir(config.store.dir.clone()));
        let resolver = Arc::new(Resolver::new(store, source));
        Self {
            config,
            resolver,
            reporter: Arc::new(TracingReporter::new()),
        }
    }

    pub fn router(&self) -> Router {
        build_router(
            AppState {
                resolver: Arc::clone(&self.resolver),
            },
            &self.config.server,
        )
    }

    /// Binds the configured address and serves until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.server.addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves
    ///
    /// The refresh task starts before the first request is accepted and is
    /// stopped after the server has drained.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), AppError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let refresher = Arc::new(Refresher::new(
            Arc::clone(&self.resolver),
            Arc::clone(&self.reporter),
            self.config.refresh.concurrency,
        ));
        let refresh = RefreshHandle::spawn(self.config.refresh.clone(), refresher);

        let addr = listener.local_addr()?;
        info!(
            %addr,
            stats_dir = %self.config.store.dir.display(),
            "server running"
        );

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;

        refresh.shutdown().await;
        info!("server stopped");
        result.map_err(AppError::from)
    }
}
