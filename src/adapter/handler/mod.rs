pub mod error;
pub mod health;
pub mod quota_handler;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::usecase::{
    CheckQuotaUseCase, CreateQuotaAssignmentUseCase, CreateQuotaOverrideUseCase, CreateQuotaTierUseCase,
    DisableQuotaAssignmentUseCase, DisableQuotaOverrideUseCase, ListQuotaEventsUseCase, ListQuotaTiersUseCase, ResetUserQuotaUseCase,
    ResolveQuotaUseCase, UpdateQuotaTierUseCase,
};

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub check_uc: Arc<CheckQuotaUseCase>,
    pub resolve_uc: Arc<ResolveQuotaUseCase>,
    pub create_tier_uc: Arc<CreateQuotaTierUseCase>,
    pub update_tier_uc: Arc<UpdateQuotaTierUseCase>,
    pub list_tiers_uc: Arc<ListQuotaTiersUseCase>,
    pub create_assignment_uc: Arc<CreateQuotaAssignmentUseCase>,
    pub disable_assignment_uc: Arc<DisableQuotaAssignmentUseCase>,
    pub create_override_uc: Arc<CreateQuotaOverrideUseCase>,
    pub disable_override_uc: Arc<DisableQuotaOverrideUseCase>,
    pub reset_uc: Arc<ResetUserQuotaUseCase>,
    pub list_events_uc: Arc<ListQuotaEventsUseCase>,
}

/// Build the REST API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/api/v1/quota/check", post(quota_handler::check_quota))
        .route("/api/v1/quota/resolve", post(quota_handler::resolve_quota))
        .route(
            "/api/v1/quota/cache/invalidate",
            post(quota_handler::invalidate_cache),
        )
        .route("/api/v1/quota/events", get(quota_handler::list_events))
        .route(
            "/api/v1/quota/tiers",
            get(quota_handler::list_tiers).post(quota_handler::create_tier),
        )
        .route("/api/v1/quota/tiers/:id", put(quota_handler::update_tier))
        .route(
            "/api/v1/quota/assignments",
            post(quota_handler::create_assignment),
        )
        .route(
            "/api/v1/quota/assignments/:id/disable",
            post(quota_handler::disable_assignment),
        )
        .route("/api/v1/quota/overrides", post(quota_handler::create_override))
        .route(
            "/api/v1/quota/overrides/:id/disable",
            post(quota_handler::disable_override),
        )
        .route(
            "/api/v1/quota/users/:user_id/reset",
            post(quota_handler::reset_user_quota),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
