use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::usecase::check_quota::CheckQuotaError;
use crate::usecase::create_quota_assignment::CreateQuotaAssignmentError;
use crate::usecase::create_quota_override::CreateQuotaOverrideError;
use crate::usecase::create_quota_tier::CreateQuotaTierError;
use crate::usecase::disable_quota_assignment::DisableQuotaAssignmentError;
use crate::usecase::disable_quota_override::DisableQuotaOverrideError;
use crate::usecase::list_quota_events::ListQuotaEventsError;
use crate::usecase::list_quota_tiers::ListQuotaTiersError;
use crate::usecase::reset_user_quota::ResetUserQuotaError;
use crate::usecase::resolve_quota::ResolveQuotaError;
use crate::usecase::update_quota_tier::UpdateQuotaTierError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}

const VALIDATION: (StatusCode, &str) = (StatusCode::BAD_REQUEST, "SYS_QUOTA_VALIDATION");
const NOT_FOUND: (StatusCode, &str) = (StatusCode::NOT_FOUND, "SYS_QUOTA_NOT_FOUND");
const ALREADY_EXISTS: (StatusCode, &str) = (StatusCode::CONFLICT, "SYS_QUOTA_ALREADY_EXISTS");
const STORAGE_UNAVAILABLE: (StatusCode, &str) = (StatusCode::SERVICE_UNAVAILABLE, "SYS_QUOTA_STORAGE_UNAVAILABLE");
const USAGE_UNAVAILABLE: (StatusCode, &str) = (StatusCode::SERVICE_UNAVAILABLE, "SYS_QUOTA_USAGE_UNAVAILABLE");

/// ApiError はユースケースのエラーを HTTP ステータスとエラーコードに対応付ける。
pub trait ApiError: std::fmt::Display {
    fn status_and_code(&self) -> (StatusCode, &'static str);

    fn into_error_response(self) -> Response
    where
        Self: Sized,
    {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "quota request failed");
        }
        (status, Json(ErrorResponse::new(code, &self.to_string()))).into_response()
    }
}

impl ApiError for ResolveQuotaError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ResolveQuotaError::StorageUnavailable(_) => STORAGE_UNAVAILABLE,
        }
    }
}

impl ApiError for CheckQuotaError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            CheckQuotaError::StorageUnavailable(_) => STORAGE_UNAVAILABLE,
            CheckQuotaError::UsageUnavailable(_) => USAGE_UNAVAILABLE,
        }
    }
}

impl ApiError for CreateQuotaTierError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            CreateQuotaTierError::Validation(_) => VALIDATION,
            CreateQuotaTierError::AlreadyExists(_) => ALREADY_EXISTS,
            CreateQuotaTierError::StorageUnavailable(_) => STORAGE_UNAVAILABLE,
        }
    }
}

impl ApiError for UpdateQuotaTierError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            UpdateQuotaTierError::NotFound(_) => NOT_FOUND,
            UpdateQuotaTierError::Validation(_) => VALIDATION,
            UpdateQuotaTierError::StorageUnavailable(_) => STORAGE_UNAVAILABLE,
        }
    }
}

impl ApiError for ListQuotaTiersError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ListQuotaTiersError::StorageUnavailable(_) => STORAGE_UNAVAILABLE,
        }
    }
}

impl ApiError for CreateQuotaAssignmentError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            CreateQuotaAssignmentError::Validation(_) => VALIDATION,
            CreateQuotaAssignmentError::StorageUnavailable(_) => STORAGE_UNAVAILABLE,
        }
    }
}

impl ApiError for CreateQuotaOverrideError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            CreateQuotaOverrideError::Validation(_) => VALIDATION,
            CreateQuotaOverrideError::StorageUnavailable(_) => STORAGE_UNAVAILABLE,
        }
    }
}

impl ApiError for DisableQuotaAssignmentError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            DisableQuotaAssignmentError::NotFound(_) => NOT_FOUND,
            DisableQuotaAssignmentError::StorageUnavailable(_) => STORAGE_UNAVAILABLE,
        }
    }
}

impl ApiError for DisableQuotaOverrideError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            DisableQuotaOverrideError::NotFound(_) => NOT_FOUND,
            DisableQuotaOverrideError::StorageUnavailable(_) => STORAGE_UNAVAILABLE,
        }
    }
}

impl ApiError for ResetUserQuotaError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ResetUserQuotaError::NotFound(_) => NOT_FOUND,
            ResetUserQuotaError::Validation(_) => VALIDATION,
            ResetUserQuotaError::StorageUnavailable(_) => STORAGE_UNAVAILABLE,
        }
    }
}

impl ApiError for ListQuotaEventsError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ListQuotaEventsError::Validation(_) => VALIDATION,
            ListQuotaEventsError::StorageUnavailable(_) => STORAGE_UNAVAILABLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::validation::ValidationError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            CheckQuotaError::UsageUnavailable("timeout".to_string()).status_and_code(),
            (StatusCode::SERVICE_UNAVAILABLE, "SYS_QUOTA_USAGE_UNAVAILABLE")
        );
        assert_eq!(
            CreateQuotaTierError::Validation(ValidationError::MissingDailyLimit).status_and_code(),
            (StatusCode::BAD_REQUEST, "SYS_QUOTA_VALIDATION")
        );
        assert_eq!(
            DisableQuotaOverrideError::NotFound("ovr_x".to_string()).status_and_code(),
            (StatusCode::NOT_FOUND, "SYS_QUOTA_NOT_FOUND")
        );
        assert_eq!(
            DisableQuotaAssignmentError::NotFound("qa_x".to_string()).status_and_code(),
            (StatusCode::NOT_FOUND, "SYS_QUOTA_NOT_FOUND")
        );
    }

    #[test]
    fn test_error_response_shape() {
        let json = serde_json::to_value(ErrorResponse::new("SYS_QUOTA_NOT_FOUND", "missing")).unwrap();
        assert_eq!(json["error"]["code"], "SYS_QUOTA_NOT_FOUND");
        assert_eq!(json["error"]["message"], "missing");
    }
}
