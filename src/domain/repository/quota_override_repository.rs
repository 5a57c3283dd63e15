use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entity::quota_override::QuotaOverride;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuotaOverrideRepository: Send + Sync {
    /// user_id インデックスを valid_until の降順で引き、`now` を期間に含む有効な先頭 1 件を返す。
    /// 開始前のオーバーライドは対象外。
    async fn find_active(&self, user_id: &str, now: DateTime<Utc>) -> anyhow::Result<Option<QuotaOverride>>;
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<QuotaOverride>>;
    async fn create(&self, quota_override: &QuotaOverride) -> anyhow::Result<()>;
    /// 無効化できた場合 true を返す。
    async fn disable(&self, id: &str) -> anyhow::Result<bool>;
}
