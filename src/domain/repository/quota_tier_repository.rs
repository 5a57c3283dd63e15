use async_trait::async_trait;

use crate::domain::entity::quota_tier::QuotaTier;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuotaTierRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<QuotaTier>>;
    /// (monthly_limit, id) の順序付きインデックスを昇順に走査して返す。
    /// enabled_only のときは有効ティアのみのインデックスを使う。
    async fn list(&self, enabled_only: bool) -> anyhow::Result<Vec<QuotaTier>>;
    async fn create(&self, tier: &QuotaTier) -> anyhow::Result<()>;
    async fn update(&self, tier: &QuotaTier) -> anyhow::Result<()>;
}
