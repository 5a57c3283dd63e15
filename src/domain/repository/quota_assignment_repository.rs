use async_trait::async_trait;

use crate::domain::entity::quota_assignment::{AssignmentType, QuotaAssignment};

/// QuotaAssignmentRepository はセカンダリインデックス経由の検索のみを提供する。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuotaAssignmentRepository: Send + Sync {
    /// user_id インデックスによる単一検索。複数ある場合は優先度最大のもの。
    async fn find_for_user(&self, user_id: &str) -> anyhow::Result<Option<QuotaAssignment>>;
    /// role インデックスによる検索。優先度の降順。
    async fn find_for_role(&self, role: &str) -> anyhow::Result<Vec<QuotaAssignment>>;
    /// assignment_type インデックスによる検索。優先度の降順。
    async fn find_by_type(
        &self,
        assignment_type: AssignmentType,
        enabled_only: bool,
    ) -> anyhow::Result<Vec<QuotaAssignment>>;
    async fn create(&self, assignment: &QuotaAssignment) -> anyhow::Result<()>;
    /// 主キーで無効化し、無効化後の行を返す。存在しないか既に無効なら None。
    async fn disable(&self, id: &str) -> anyhow::Result<Option<QuotaAssignment>>;
}
