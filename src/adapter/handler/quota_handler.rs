use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::error::ApiError;
use super::AppState;
use crate::domain::entity::principal::Principal;
use crate::usecase::create_quota_assignment::CreateQuotaAssignmentInput;
use crate::usecase::create_quota_override::CreateQuotaOverrideInput;
use crate::usecase::create_quota_tier::CreateQuotaTierInput;
use crate::usecase::list_quota_events::ListQuotaEventsInput;
use crate::usecase::reset_user_quota::ResetUserQuotaInput;
use crate::usecase::update_quota_tier::UpdateQuotaTierInput;

/// POST /api/v1/quota/check
pub async fn check_quota(State(state): State<AppState>, Json(principal): Json<Principal>) -> Response {
    match state.check_uc.execute(&principal).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => e.into_error_response(),
    }
}

/// POST /api/v1/quota/resolve
pub async fn resolve_quota(State(state): State<AppState>, Json(principal): Json<Principal>) -> Response {
    match state.resolve_uc.execute(&principal).await {
        Ok(resolved) => (StatusCode::OK, Json(serde_json::json!({ "resolved": resolved }))).into_response(),
        Err(e) => e.into_error_response(),
    }
}

/// POST /api/v1/quota/cache/invalidate
///
/// user_id を省略するとキャッシュ全体を破棄する。
pub async fn invalidate_cache(
    State(state): State<AppState>,
    Json(req): Json<InvalidateCacheRequest>,
) -> impl IntoResponse {
    match req.user_id.as_deref().filter(|id| !id.is_empty()) {
        Some(user_id) => state.resolve_uc.invalidate(user_id).await,
        None => state.resolve_uc.invalidate_all().await,
    }
    StatusCode::NO_CONTENT
}

/// GET /api/v1/quota/events
pub async fn list_events(State(state): State<AppState>, Query(params): Query<ListEventsParams>) -> Response {
    let input = ListQuotaEventsInput {
        user_id: params.user_id,
        tier_id: params.tier_id,
        limit: params.limit,
    };
    match state.list_events_uc.execute(&input).await {
        Ok(events) => (StatusCode::OK, Json(serde_json::json!({ "events": events }))).into_response(),
        Err(e) => e.into_error_response(),
    }
}

/// GET /api/v1/quota/tiers
pub async fn list_tiers(State(state): State<AppState>, Query(params): Query<ListTiersParams>) -> Response {
    match state.list_tiers_uc.execute(params.enabled_only.unwrap_or(false)).await {
        Ok(tiers) => (StatusCode::OK, Json(serde_json::json!({ "tiers": tiers }))).into_response(),
        Err(e) => e.into_error_response(),
    }
}

/// POST /api/v1/quota/tiers
pub async fn create_tier(State(state): State<AppState>, Json(req): Json<CreateTierRequest>) -> Response {
    let input = CreateQuotaTierInput {
        id: req.id,
        name: req.name,
        description: req.description,
        monthly_limit: req.monthly_limit,
        daily_limit: req.daily_limit,
        period_type: req.period_type.unwrap_or_else(|| "monthly".to_string()),
        soft_limit_percent: req.soft_limit_percent,
        action_on_limit: req.action_on_limit.unwrap_or_else(|| "block".to_string()),
        unlimited: req.unlimited,
    };
    match state.create_tier_uc.execute(&input).await {
        Ok(tier) => (StatusCode::CREATED, Json(tier)).into_response(),
        Err(e) => e.into_error_response(),
    }
}

/// PUT /api/v1/quota/tiers/:id
pub async fn update_tier(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTierRequest>,
) -> Response {
    let input = UpdateQuotaTierInput {
        id,
        name: req.name,
        monthly_limit: req.monthly_limit,
        daily_limit: req.daily_limit,
        soft_limit_percent: req.soft_limit_percent,
        action_on_limit: req.action_on_limit,
        enabled: req.enabled,
    };
    match state.update_tier_uc.execute(&input).await {
        Ok(tier) => (StatusCode::OK, Json(tier)).into_response(),
        Err(e) => e.into_error_response(),
    }
}

/// POST /api/v1/quota/assignments
pub async fn create_assignment(
    State(state): State<AppState>,
    Json(req): Json<CreateAssignmentRequest>,
) -> Response {
    let input = CreateQuotaAssignmentInput {
        tier_id: req.tier_id,
        assignment_type: req.assignment_type,
        user_id: req.user_id,
        role: req.role,
        email_domain_pattern: req.email_domain_pattern,
        priority: req.priority,
    };
    match state.create_assignment_uc.execute(&input).await {
        Ok(assignment) => (StatusCode::CREATED, Json(assignment)).into_response(),
        Err(e) => e.into_error_response(),
    }
}

/// POST /api/v1/quota/overrides
pub async fn create_override(
    State(state): State<AppState>,
    Json(req): Json<CreateOverrideRequest>,
) -> Response {
    let input = CreateQuotaOverrideInput {
        user_id: req.user_id,
        override_type: req.override_type,
        monthly_limit: req.monthly_limit,
        daily_limit: req.daily_limit,
        valid_from: req.valid_from.unwrap_or_else(Utc::now),
        valid_until: req.valid_until,
        reason: req.reason,
        created_by: req.created_by,
    };
    match state.create_override_uc.execute(&input).await {
        Ok(ovr) => (StatusCode::CREATED, Json(ovr)).into_response(),
        Err(e) => e.into_error_response(),
    }
}

/// POST /api/v1/quota/assignments/:id/disable
pub async fn disable_assignment(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.disable_assignment_uc.execute(&id).await {
        Ok(assignment) => (StatusCode::OK, Json(assignment)).into_response(),
        Err(e) => e.into_error_response(),
    }
}

/// POST /api/v1/quota/overrides/:id/disable
pub async fn disable_override(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.disable_override_uc.execute(&id).await {
        Ok(ovr) => (StatusCode::OK, Json(ovr)).into_response(),
        Err(e) => e.into_error_response(),
    }
}

/// POST /api/v1/quota/users/:user_id/reset
pub async fn reset_user_quota(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<ResetUserQuotaRequest>,
) -> Response {
    let mut principal = Principal::new(user_id).with_roles(req.roles);
    principal.email = req.email;
    let input = ResetUserQuotaInput {
        principal,
        reason: req.reason,
        reset_by: req.reset_by,
    };
    match state.reset_uc.execute(&input).await {
        Ok(event) => (StatusCode::OK, Json(event)).into_response(),
        Err(e) => e.into_error_response(),
    }
}

// --- Request types ---

#[derive(Debug, Deserialize)]
pub struct InvalidateCacheRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListEventsParams {
    pub user_id: Option<String>,
    pub tier_id: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ListTiersParams {
    pub enabled_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTierRequest {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub monthly_limit: f64,
    pub daily_limit: Option<f64>,
    pub period_type: Option<String>,
    pub soft_limit_percent: Option<u8>,
    pub action_on_limit: Option<String>,
    #[serde(default)]
    pub unlimited: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTierRequest {
    pub name: Option<String>,
    pub monthly_limit: Option<f64>,
    pub daily_limit: Option<f64>,
    pub soft_limit_percent: Option<u8>,
    pub action_on_limit: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAssignmentRequest {
    pub tier_id: String,
    pub assignment_type: String,
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub email_domain_pattern: Option<String>,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateOverrideRequest {
    pub user_id: String,
    pub override_type: String,
    pub monthly_limit: Option<f64>,
    pub daily_limit: Option<f64>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: DateTime<Utc>,
    pub reason: String,
    pub created_by: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetUserQuotaRequest {
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub reason: String,
    pub reset_by: String,
}
