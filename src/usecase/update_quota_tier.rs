use std::sync::Arc;

use chrono::Utc;

use crate::domain::entity::quota_tier::QuotaTier;
use crate::domain::entity::validation::ValidationError;
use crate::domain::repository::QuotaTierRepository;
use crate::infrastructure::cache::QuotaCache;
use crate::usecase::create_quota_tier::parse_action_on_limit;

/// None のフィールドは変更しない。
#[derive(Debug, Clone, Default)]
pub struct UpdateQuotaTierInput {
    pub id: String,
    pub name: Option<String>,
    pub monthly_limit: Option<f64>,
    pub daily_limit: Option<f64>,
    pub soft_limit_percent: Option<u8>,
    pub action_on_limit: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateQuotaTierError {
    #[error("quota tier not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub struct UpdateQuotaTierUseCase {
    repo: Arc<dyn QuotaTierRepository>,
    cache: Arc<QuotaCache>,
}

impl UpdateQuotaTierUseCase {
    pub fn new(repo: Arc<dyn QuotaTierRepository>, cache: Arc<QuotaCache>) -> Self {
        Self { repo, cache }
    }

    pub async fn execute(&self, input: &UpdateQuotaTierInput) -> Result<QuotaTier, UpdateQuotaTierError> {
        let mut tier = self
            .repo
            .find_by_id(&input.id)
            .await
            .map_err(|e| UpdateQuotaTierError::StorageUnavailable(e.to_string()))?
            .ok_or_else(|| UpdateQuotaTierError::NotFound(input.id.clone()))?;

        if let Some(ref name) = input.name {
            tier.name = name.clone();
        }
        if let Some(limit) = input.monthly_limit {
            tier.monthly_limit = limit;
        }
        if let Some(limit) = input.daily_limit {
            tier.daily_limit = Some(limit);
        }
        if let Some(percent) = input.soft_limit_percent {
            tier.soft_limit_percent = percent;
        }
        if let Some(ref action) = input.action_on_limit {
            tier.action_on_limit = parse_action_on_limit(action)?;
        }
        if let Some(enabled) = input.enabled {
            tier.enabled = enabled;
        }
        tier.updated_at = Utc::now();
        tier.validate()?;

        self.repo
            .update(&tier)
            .await
            .map_err(|e| UpdateQuotaTierError::StorageUnavailable(e.to_string()))?;

        // ティアは任意のユーザーに解決され得るため全件破棄する
        self.cache.invalidate_all().await;
        tracing::info!(tier_id = %tier.id, enabled = tier.enabled, "quota tier updated");
        Ok(tier)
    }
}
