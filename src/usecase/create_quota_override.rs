use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::entity::quota_override::{OverrideKind, QuotaOverride};
use crate::domain::entity::validation::ValidationError;
use crate::domain::repository::QuotaOverrideRepository;
use crate::infrastructure::cache::QuotaCache;
use crate::usecase::record_quota_event::QuotaEventRecorder;

#[derive(Debug, Clone)]
pub struct CreateQuotaOverrideInput {
    pub user_id: String,
    pub override_type: String,
    pub monthly_limit: Option<f64>,
    pub daily_limit: Option<f64>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub reason: String,
    pub created_by: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateQuotaOverrideError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub struct CreateQuotaOverrideUseCase {
    repo: Arc<dyn QuotaOverrideRepository>,
    recorder: Arc<QuotaEventRecorder>,
    cache: Arc<QuotaCache>,
}

impl CreateQuotaOverrideUseCase {
    pub fn new(
        repo: Arc<dyn QuotaOverrideRepository>,
        recorder: Arc<QuotaEventRecorder>,
        cache: Arc<QuotaCache>,
    ) -> Self {
        Self { repo, recorder, cache }
    }

    pub async fn execute(
        &self,
        input: &CreateQuotaOverrideInput,
    ) -> Result<QuotaOverride, CreateQuotaOverrideError> {
        if input.reason.trim().is_empty() {
            return Err(ValidationError::EmptyField("reason").into());
        }
        if input.created_by.trim().is_empty() {
            return Err(ValidationError::EmptyField("created_by").into());
        }
        let kind = OverrideKind::from_parts(&input.override_type, input.monthly_limit, input.daily_limit)?;
        let ovr = QuotaOverride::new(
            input.user_id.clone(),
            kind,
            input.valid_from,
            input.valid_until,
            input.reason.clone(),
            input.created_by.clone(),
        );
        ovr.validate()?;

        self.repo
            .create(&ovr)
            .await
            .map_err(|e| CreateQuotaOverrideError::StorageUnavailable(e.to_string()))?;
        self.cache.invalidate(&ovr.user_id).await;

        // イベント記録の失敗は警告のみ。作成済みのオーバーライドを返す
        if let Err(e) = self.recorder.record_override_applied(&ovr, Utc::now()).await {
            tracing::warn!(
                override_id = %ovr.id,
                user_id = %ovr.user_id,
                error = %e,
                "failed to record override_applied event"
            );
        }
        Ok(ovr)
    }
}
