//! HTTP JSON boundary
//!
//! Handlers share one [`AppContext`] through axum state. Each request resolves
//! its session from the `x-session-id` header, so clients never see each
//! other's words.

mod error;
mod handlers;
mod pipeline;
mod types;

pub use error::ApiError;
pub use handlers::SESSION_HEADER;
pub use pipeline::{PredictOutcome, run_predict_cycle};
pub use types::{
    ClearResponse, HealthResponse, PredictRequest, PredictResponse, ResetResponse,
    SessionEndResponse, StatusResponse, WordResponse,
};

use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::routing::{delete, get, post};
use tracing::{info, warn};

use crate::session::SessionRegistry;
use crate::state::SharedState;
use crate::stats::SharedStats;
use crate::vision::{SharedVision, Vision};

pub struct AppContext {
    state: SharedState,
    vision: OnceLock<SharedVision>,
    sessions: SessionRegistry,
    stats: SharedStats,
}

impl AppContext {
    pub fn new(state: SharedState, sessions: SessionRegistry, stats: SharedStats) -> Arc<Self> {
        Arc::new(Self {
            state,
            vision: OnceLock::new(),
            sessions,
            stats,
        })
    }

    /// Publish the vision collaborators and flip readiness. Only the first
    /// call has any effect.
    pub fn install_vision(&self, vision: Vision) -> bool {
        let vision = Arc::new(vision.with_stats(Arc::clone(&self.stats)));
        if self.vision.set(vision).is_err() {
            warn!("vision already installed; ignoring");
            return false;
        }
        let ready = self.state.mark_ready();
        if ready {
            info!("vision installed, service ready");
        }
        ready
    }

    /// Vision handle, or `NotReady` before install and during shutdown
    pub fn vision(&self) -> Result<&SharedVision, ApiError> {
        let readiness = self.state.readiness();
        if !self.state.is_ready() {
            return Err(ApiError::NotReady(readiness));
        }
        self.vision.get().ok_or(ApiError::NotReady(readiness))
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn stats(&self) -> &SharedStats {
        &self.stats
    }
}

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/predict", post(handlers::predict))
        .route("/api/word/space", post(handlers::add_space))
        .route("/api/word/delete", post(handlers::delete_last))
        .route("/api/word/clear", post(handlers::clear_word))
        .route("/api/word/reset", post(handlers::reset))
        .route("/api/word/get", get(handlers::get_word))
        .route("/api/session", delete(handlers::end_session))
        .with_state(ctx)
}
