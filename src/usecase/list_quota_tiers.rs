use std::sync::Arc;

use crate::domain::entity::quota_tier::QuotaTier;
use crate::domain::repository::QuotaTierRepository;

#[derive(Debug, thiserror::Error)]
pub enum ListQuotaTiersError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub struct ListQuotaTiersUseCase {
    repo: Arc<dyn QuotaTierRepository>,
}

impl ListQuotaTiersUseCase {
    pub fn new(repo: Arc<dyn QuotaTierRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(&self, enabled_only: bool) -> Result<Vec<QuotaTier>, ListQuotaTiersError> {
        self.repo
            .list(enabled_only)
            .await
            .map_err(|e| ListQuotaTiersError::StorageUnavailable(e.to_string()))
    }
}
