//! stylelens library interface
//!
//! Visual product search: an uploaded photo is run through object detection,
//! each detected region is scored against the catalog's facet vocabulary,
//! one facet value is selected per facet type, and the catalog is queried
//! with progressive facet relaxation until enough products come back.

pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod pipeline;
pub mod relaxation;
pub mod selection;
pub mod services;
pub mod types;

pub use crate::error::{ApiError, ApiResult, Error, Result};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::gate::SearchGate;
use crate::pipeline::SearchPipeline;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Resolved configuration
    pub config: Arc<AppConfig>,
    /// The detect → score → select → relax pipeline
    pub pipeline: Arc<SearchPipeline>,
    /// Single-flight admission gate
    pub gate: Arc<SearchGate>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, pipeline: Arc<SearchPipeline>) -> Self {
        Self {
            config,
            pipeline,
            gate: Arc::new(SearchGate::new()),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::search_routes())
        .merge(api::health_routes())
        .with_state(state)
}
