use std::sync::Arc;

use chrono::Utc;

use crate::domain::entity::principal::Principal;
use crate::domain::entity::quota_event::QuotaEvent;
use crate::domain::entity::validation::ValidationError;
use crate::usecase::record_quota_event::{QuotaEventRecorder, RecordQuotaEventError};
use crate::usecase::resolve_quota::{ResolveQuotaError, ResolveQuotaUseCase};

#[derive(Debug, Clone)]
pub struct ResetUserQuotaInput {
    pub principal: Principal,
    pub reason: String,
    pub reset_by: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ResetUserQuotaError {
    #[error("no quota configured for user: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<ResolveQuotaError> for ResetUserQuotaError {
    fn from(e: ResolveQuotaError) -> Self {
        match e {
            ResolveQuotaError::StorageUnavailable(msg) => ResetUserQuotaError::StorageUnavailable(msg),
        }
    }
}

impl From<RecordQuotaEventError> for ResetUserQuotaError {
    fn from(e: RecordQuotaEventError) -> Self {
        match e {
            RecordQuotaEventError::StorageUnavailable(msg) => ResetUserQuotaError::StorageUnavailable(msg),
        }
    }
}

/// ResetUserQuotaUseCase は現在のティアに対する reset イベントを記録する。
/// 使用量自体は外部の集計側が保持するため、ここでは監査記録とキャッシュ破棄のみ行う。
pub struct ResetUserQuotaUseCase {
    resolver: Arc<ResolveQuotaUseCase>,
    recorder: Arc<QuotaEventRecorder>,
}

impl ResetUserQuotaUseCase {
    pub fn new(resolver: Arc<ResolveQuotaUseCase>, recorder: Arc<QuotaEventRecorder>) -> Self {
        Self { resolver, recorder }
    }

    pub async fn execute(&self, input: &ResetUserQuotaInput) -> Result<QuotaEvent, ResetUserQuotaError> {
        if input.reason.trim().is_empty() {
            return Err(ValidationError::EmptyField("reason").into());
        }
        if input.reset_by.trim().is_empty() {
            return Err(ValidationError::EmptyField("reset_by").into());
        }

        let user_id = input.principal.user_id.as_str();
        let resolved = self
            .resolver
            .execute(&input.principal)
            .await?
            .ok_or_else(|| ResetUserQuotaError::NotFound(user_id.to_string()))?;

        let event = self
            .recorder
            .record_reset(user_id, &resolved.tier.id, &input.reason, &input.reset_by, Utc::now())
            .await?;
        self.resolver.invalidate(user_id).await;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::quota_assignment::{AssignmentSelector, QuotaAssignment};
    use crate::domain::entity::quota_event::{QuotaEventMetadata, QuotaEventType};
    use crate::domain::entity::quota_tier::{ActionOnLimit, PeriodType, QuotaTier};
    use crate::domain::repository::quota_assignment_repository::MockQuotaAssignmentRepository;
    use crate::domain::repository::quota_event_repository::MockQuotaEventRepository;
    use crate::domain::repository::quota_override_repository::MockQuotaOverrideRepository;
    use crate::domain::repository::quota_tier_repository::MockQuotaTierRepository;
    use crate::infrastructure::cache::QuotaCache;
    use std::time::Duration;

    fn resolver(with_default: bool) -> Arc<ResolveQuotaUseCase> {
        let mut overrides = MockQuotaOverrideRepository::new();
        overrides.expect_find_active().returning(|_, _| Ok(None));
        let mut assignments = MockQuotaAssignmentRepository::new();
        assignments.expect_find_for_user().returning(|_| Ok(None));
        assignments.expect_find_by_type().returning(move |_, _| {
            Ok(if with_default {
                vec![QuotaAssignment::new(
                    "basic".to_string(),
                    AssignmentSelector::DefaultTier,
                    100,
                )]
            } else {
                vec![]
            })
        });
        let mut tiers = MockQuotaTierRepository::new();
        tiers.expect_find_by_id().returning(|_| {
            Ok(Some(QuotaTier::new(
                "basic".to_string(),
                "Basic".to_string(),
                50.0,
                None,
                PeriodType::Monthly,
                80,
                ActionOnLimit::Block,
            )))
        });
        Arc::new(ResolveQuotaUseCase::new(
            Arc::new(tiers),
            Arc::new(assignments),
            Arc::new(overrides),
            Arc::new(QuotaCache::new(100, Duration::from_secs(60))),
        ))
    }

    fn input() -> ResetUserQuotaInput {
        ResetUserQuotaInput {
            principal: Principal::new("user-1"),
            reason: "billing correction".to_string(),
            reset_by: "admin".to_string(),
        }
    }

    #[tokio::test]
    async fn test_reset_records_event_for_current_tier() {
        let mut events = MockQuotaEventRepository::new();
        events
            .expect_record()
            .withf(|e| e.event_type == QuotaEventType::Reset && e.tier_id == "basic")
            .times(1)
            .returning(|_| Ok(()));
        let recorder = Arc::new(QuotaEventRecorder::new_without_publisher(Arc::new(events)));

        let uc = ResetUserQuotaUseCase::new(resolver(true), recorder);
        let event = uc.execute(&input()).await.unwrap();
        assert!(matches!(
            event.metadata,
            QuotaEventMetadata::Reset { ref reset_by, .. } if reset_by == "admin"
        ));
    }

    #[tokio::test]
    async fn test_reset_without_tier_is_not_found() {
        let mut events = MockQuotaEventRepository::new();
        events.expect_record().never();
        let recorder = Arc::new(QuotaEventRecorder::new_without_publisher(Arc::new(events)));

        let uc = ResetUserQuotaUseCase::new(resolver(false), recorder);
        let result = uc.execute(&input()).await;
        assert!(matches!(result, Err(ResetUserQuotaError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reason_required() {
        let recorder = Arc::new(QuotaEventRecorder::new_without_publisher(Arc::new(
            MockQuotaEventRepository::new(),
        )));
        let uc = ResetUserQuotaUseCase::new(resolver(true), recorder);
        let mut bad = input();
        bad.reason = String::new();
        assert!(matches!(
            uc.execute(&bad).await,
            Err(ResetUserQuotaError::Validation(ValidationError::EmptyField("reason")))
        ));
    }
}
