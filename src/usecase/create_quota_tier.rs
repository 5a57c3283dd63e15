use std::sync::Arc;

use crate::domain::entity::quota_tier::{ActionOnLimit, PeriodType, QuotaTier, DEFAULT_SOFT_LIMIT_PERCENT};
use crate::domain::entity::validation::ValidationError;
use crate::domain::repository::QuotaTierRepository;
use crate::infrastructure::cache::QuotaCache;

#[derive(Debug, Clone)]
pub struct CreateQuotaTierInput {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub monthly_limit: f64,
    pub daily_limit: Option<f64>,
    pub period_type: String,
    pub soft_limit_percent: Option<u8>,
    pub action_on_limit: String,
    pub unlimited: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateQuotaTierError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("quota tier already exists: {0}")]
    AlreadyExists(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub struct CreateQuotaTierUseCase {
    repo: Arc<dyn QuotaTierRepository>,
    cache: Arc<QuotaCache>,
}

impl CreateQuotaTierUseCase {
    pub fn new(repo: Arc<dyn QuotaTierRepository>, cache: Arc<QuotaCache>) -> Self {
        Self { repo, cache }
    }

    pub async fn execute(&self, input: &CreateQuotaTierInput) -> Result<QuotaTier, CreateQuotaTierError> {
        let period_type = parse_period_type(&input.period_type)?;
        let action_on_limit = parse_action_on_limit(&input.action_on_limit)?;

        let mut tier = QuotaTier::new(
            input.id.clone(),
            input.name.clone(),
            input.monthly_limit,
            input.daily_limit,
            period_type,
            input.soft_limit_percent.unwrap_or(DEFAULT_SOFT_LIMIT_PERCENT),
            action_on_limit,
        );
        tier.description = input.description.clone();
        tier.unlimited = input.unlimited;
        tier.validate()?;

        let existing = self
            .repo
            .find_by_id(&tier.id)
            .await
            .map_err(|e| CreateQuotaTierError::StorageUnavailable(e.to_string()))?;
        if existing.is_some() {
            return Err(CreateQuotaTierError::AlreadyExists(tier.id));
        }

        self.repo
            .create(&tier)
            .await
            .map_err(|e| CreateQuotaTierError::StorageUnavailable(e.to_string()))?;

        self.cache.invalidate_all().await;
        tracing::info!(tier_id = %tier.id, "quota tier created");
        Ok(tier)
    }
}

pub(crate) fn parse_period_type(s: &str) -> Result<PeriodType, ValidationError> {
    PeriodType::from_str(s).ok_or_else(|| ValidationError::UnknownVariant {
        field: "period_type",
        allowed: "daily, monthly",
        value: s.to_string(),
    })
}

pub(crate) fn parse_action_on_limit(s: &str) -> Result<ActionOnLimit, ValidationError> {
    ActionOnLimit::from_str(s).ok_or_else(|| ValidationError::UnknownVariant {
        field: "action_on_limit",
        allowed: "block, warn",
        value: s.to_string(),
    })
}
