use std::sync::Arc;

use crate::domain::entity::quota_override::QuotaOverride;
use crate::domain::repository::QuotaOverrideRepository;
use crate::infrastructure::cache::QuotaCache;

#[derive(Debug, thiserror::Error)]
pub enum DisableQuotaOverrideError {
    #[error("quota override not found: {0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// オーバーライドは削除せず無効化する（監査のため行は残す）。
pub struct DisableQuotaOverrideUseCase {
    repo: Arc<dyn QuotaOverrideRepository>,
    cache: Arc<QuotaCache>,
}

impl DisableQuotaOverrideUseCase {
    pub fn new(repo: Arc<dyn QuotaOverrideRepository>, cache: Arc<QuotaCache>) -> Self {
        Self { repo, cache }
    }

    pub async fn execute(&self, id: &str) -> Result<QuotaOverride, DisableQuotaOverrideError> {
        let mut ovr = self
            .repo
            .find_by_id(id)
            .await
            .map_err(|e| DisableQuotaOverrideError::StorageUnavailable(e.to_string()))?
            .ok_or_else(|| DisableQuotaOverrideError::NotFound(id.to_string()))?;

        let disabled = self
            .repo
            .disable(id)
            .await
            .map_err(|e| DisableQuotaOverrideError::StorageUnavailable(e.to_string()))?;
        if !disabled {
            return Err(DisableQuotaOverrideError::NotFound(id.to_string()));
        }

        self.cache.invalidate(&ovr.user_id).await;
        tracing::info!(override_id = %id, user_id = %ovr.user_id, "quota override disabled");

        ovr.enabled = false;
        Ok(ovr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::principal::Principal;
    use crate::domain::entity::quota_override::OverrideKind;
    use crate::domain::repository::quota_override_repository::MockQuotaOverrideRepository;
    use chrono::{Duration, Utc};
    use std::time::Duration as StdDuration;

    fn sample() -> QuotaOverride {
        let now = Utc::now();
        QuotaOverride::new(
            "user-1".to_string(),
            OverrideKind::Unlimited,
            now,
            now + Duration::days(1),
            "demo".to_string(),
            "admin".to_string(),
        )
    }

    #[tokio::test]
    async fn test_disable_invalidates_owner() {
        let ovr = sample();
        let id = ovr.id.clone();
        let mut repo = MockQuotaOverrideRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(ovr.clone())));
        repo.expect_disable().times(1).returning(|_| Ok(true));

        let cache = Arc::new(QuotaCache::new(100, StdDuration::from_secs(60)));
        let principal = Principal::new("user-1");
        cache.insert(&principal, None).await;

        let uc = DisableQuotaOverrideUseCase::new(Arc::new(repo), cache.clone());
        let disabled = uc.execute(&id).await.unwrap();

        assert!(!disabled.enabled);
        assert!(cache.get(&principal).await.is_none());
    }

    #[tokio::test]
    async fn test_not_found() {
        let mut repo = MockQuotaOverrideRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));
        repo.expect_disable().never();

        let cache = Arc::new(QuotaCache::new(100, StdDuration::from_secs(60)));
        let uc = DisableQuotaOverrideUseCase::new(Arc::new(repo), cache);
        let result = uc.execute("ovr_missing").await;
        assert!(matches!(result, Err(DisableQuotaOverrideError::NotFound(_))));
    }
}
