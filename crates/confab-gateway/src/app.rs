use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use confab_core::config::ConfabConfig;
use confab_slack::MentionBridge;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: ConfabConfig,
    pub bridge: MentionBridge,
}

impl AppState {
    pub fn new(config: ConfabConfig, bridge: MentionBridge) -> Self {
        Self { config, bridge }
    }
}

/// Assemble the Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/slack/events", post(crate::http::events::events_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
