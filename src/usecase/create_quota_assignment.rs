use std::sync::Arc;

use crate::domain::entity::quota_assignment::{AssignmentSelector, QuotaAssignment};
use crate::domain::entity::validation::ValidationError;
use crate::domain::repository::{QuotaAssignmentRepository, QuotaTierRepository};
use crate::infrastructure::cache::QuotaCache;

/// セレクタは種別ごとに 1 つだけ指定する（default_tier は指定なし）。
#[derive(Debug, Clone)]
pub struct CreateQuotaAssignmentInput {
    pub tier_id: String,
    pub assignment_type: String,
    pub user_id: Option<String>,
    pub role: Option<String>,
    pub email_domain_pattern: Option<String>,
    pub priority: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateQuotaAssignmentError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub struct CreateQuotaAssignmentUseCase {
    tier_repo: Arc<dyn QuotaTierRepository>,
    assignment_repo: Arc<dyn QuotaAssignmentRepository>,
    cache: Arc<QuotaCache>,
}

impl CreateQuotaAssignmentUseCase {
    pub fn new(
        tier_repo: Arc<dyn QuotaTierRepository>,
        assignment_repo: Arc<dyn QuotaAssignmentRepository>,
        cache: Arc<QuotaCache>,
    ) -> Self {
        Self {
            tier_repo,
            assignment_repo,
            cache,
        }
    }

    pub async fn execute(
        &self,
        input: &CreateQuotaAssignmentInput,
    ) -> Result<QuotaAssignment, CreateQuotaAssignmentError> {
        let selector = AssignmentSelector::from_parts(
            &input.assignment_type,
            input.user_id.clone(),
            input.role.clone(),
            input.email_domain_pattern.clone(),
        )?;
        let assignment = QuotaAssignment::new(input.tier_id.clone(), selector, input.priority);
        assignment.validate()?;

        let tier = self
            .tier_repo
            .find_by_id(&assignment.tier_id)
            .await
            .map_err(|e| CreateQuotaAssignmentError::StorageUnavailable(e.to_string()))?;
        if tier.is_none() {
            return Err(ValidationError::UnknownTier(assignment.tier_id.clone()).into());
        }

        self.assignment_repo
            .create(&assignment)
            .await
            .map_err(|e| CreateQuotaAssignmentError::StorageUnavailable(e.to_string()))?;

        // direct_user はそのユーザーのみ、それ以外は誰に効くか特定できないため全件破棄する
        match assignment.selector.user_id() {
            Some(user_id) => self.cache.invalidate(user_id).await,
            None => self.cache.invalidate_all().await,
        }

        tracing::info!(
            assignment_id = %assignment.id,
            tier_id = %assignment.tier_id,
            matched_by = %assignment.describe(),
            priority = assignment.priority,
            "quota assignment created"
        );
        Ok(assignment)
    }
}
