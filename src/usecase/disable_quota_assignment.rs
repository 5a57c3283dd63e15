use std::sync::Arc;

use crate::domain::entity::quota_assignment::QuotaAssignment;
use crate::domain::repository::QuotaAssignmentRepository;
use crate::infrastructure::cache::QuotaCache;

#[derive(Debug, thiserror::Error)]
pub enum DisableQuotaAssignmentError {
    #[error("quota assignment not found: {0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// アサインメントを無効化し、以降の解決から外す。行は残す。
pub struct DisableQuotaAssignmentUseCase {
    repo: Arc<dyn QuotaAssignmentRepository>,
    cache: Arc<QuotaCache>,
}

impl DisableQuotaAssignmentUseCase {
    pub fn new(repo: Arc<dyn QuotaAssignmentRepository>, cache: Arc<QuotaCache>) -> Self {
        Self { repo, cache }
    }

    pub async fn execute(&self, id: &str) -> Result<QuotaAssignment, DisableQuotaAssignmentError> {
        let assignment = self
            .repo
            .disable(id)
            .await
            .map_err(|e| DisableQuotaAssignmentError::StorageUnavailable(e.to_string()))?
            .ok_or_else(|| DisableQuotaAssignmentError::NotFound(id.to_string()))?;

        match assignment.selector.user_id() {
            Some(user_id) => self.cache.invalidate(user_id).await,
            None => self.cache.invalidate_all().await,
        }

        tracing::info!(
            assignment_id = %assignment.id,
            matched_by = %assignment.describe(),
            "quota assignment disabled"
        );
        Ok(assignment)
    }
}
