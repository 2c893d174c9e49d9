//! inkfeed-server library interface
//!
//! Classroom feedback service: teachers upload a posture photo and a work
//! photo, the service composes an annotated image, posts it to the parents'
//! group chat and records the submission.

pub mod api;
pub mod config;
pub mod error;
pub mod reports;
pub mod services;

pub use crate::config::ServiceConfig;
pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use inkfeed_common::RecordStore;
use tower_http::trace::TraceLayer;

use crate::services::{
    CommentGenerator, CompositeBuilder, Notifier, QwenVlClient, SubmissionPipeline,
    WebhookNotifier,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub store: Arc<RecordStore>,
    pub pipeline: Arc<SubmissionPipeline>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Assemble state from already-built collaborators
    pub fn new(
        config: ServiceConfig,
        generator: Arc<dyn CommentGenerator>,
        notifier: Arc<dyn Notifier>,
        composer: Arc<CompositeBuilder>,
    ) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(RecordStore::new(config.records_path()));
        let pipeline = Arc::new(SubmissionPipeline::new(
            Arc::clone(&config),
            Arc::clone(&store),
            generator,
            notifier,
            composer,
        ));

        Self {
            config,
            store,
            pipeline,
            startup_time: Utc::now(),
        }
    }

    /// Build the real remote clients and composite builder from configuration
    pub fn from_config(config: ServiceConfig) -> Result<Self, reqwest::Error> {
        let generator = Arc::new(QwenVlClient::new(config.ai.clone())?);
        let notifier = Arc::new(WebhookNotifier::new(config.webhook.clone())?);
        let composer = Arc::new(CompositeBuilder::new(config.composite.clone()));

        if !generator.is_configured() {
            tracing::warn!("Blank comments will use the fallback text");
        }
        if config.webhook.url.trim().is_empty() {
            tracing::warn!("Webhook URL not configured; every submission will fail at the notify step");
        }
        if composer.font().is_builtin() {
            tracing::warn!("Composite captions use the built-in font");
        }

        Ok(Self::new(config, generator, notifier, composer))
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .merge(api::ui_routes())
        .merge(api::submit_routes())
        .merge(api::archive_routes())
        .merge(api::stats_routes())
        .merge(api::export_routes())
        .merge(api::health_routes())
        .merge(api::file_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
