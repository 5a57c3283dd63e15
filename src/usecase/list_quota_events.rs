use std::sync::Arc;

use crate::domain::entity::quota_event::QuotaEvent;
use crate::domain::entity::validation::ValidationError;
use crate::domain::repository::QuotaEventRepository;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 500;

/// user_id と tier_id のどちらか一方を指定する。
#[derive(Debug, Clone, Default)]
pub struct ListQuotaEventsInput {
    pub user_id: Option<String>,
    pub tier_id: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListQuotaEventsError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<ValidationError> for ListQuotaEventsError {
    fn from(e: ValidationError) -> Self {
        ListQuotaEventsError::Validation(e.to_string())
    }
}

pub struct ListQuotaEventsUseCase {
    repo: Arc<dyn QuotaEventRepository>,
}

impl ListQuotaEventsUseCase {
    pub fn new(repo: Arc<dyn QuotaEventRepository>) -> Self {
        Self { repo }
    }

    /// 新しい順に返す。
    pub async fn execute(&self, input: &ListQuotaEventsInput) -> Result<Vec<QuotaEvent>, ListQuotaEventsError> {
        let limit = input.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let non_empty = |v: &Option<String>| v.as_deref().filter(|s| !s.trim().is_empty()).map(str::to_string);

        let result = match (non_empty(&input.user_id), non_empty(&input.tier_id)) {
            (Some(user_id), None) => self.repo.find_by_user(&user_id, limit).await,
            (None, Some(tier_id)) => self.repo.find_by_tier(&tier_id, limit).await,
            (None, None) => return Err(ValidationError::EmptyField("user_id or tier_id").into()),
            (Some(_), Some(_)) => {
                return Err(ListQuotaEventsError::Validation(
                    "specify either user_id or tier_id, not both".to_string(),
                ))
            }
        };
        result.map_err(|e| ListQuotaEventsError::StorageUnavailable(e.to_string()))
    }
}
