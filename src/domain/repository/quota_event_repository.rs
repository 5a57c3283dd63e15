use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::entity::quota_event::{QuotaEvent, QuotaEventType};

/// QuotaEventRepository は追記専用。更新・削除は提供しない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuotaEventRepository: Send + Sync {
    async fn record(&self, event: &QuotaEvent) -> anyhow::Result<()>;
    /// (user_id, timestamp) の範囲検索で `since` 以降の最新イベントを返す。
    async fn find_recent(
        &self,
        user_id: &str,
        event_type: QuotaEventType,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Option<QuotaEvent>>;
    /// 新しい順。
    async fn find_by_user(&self, user_id: &str, limit: u32) -> anyhow::Result<Vec<QuotaEvent>>;
    /// 新しい順。
    async fn find_by_tier(&self, tier_id: &str, limit: u32) -> anyhow::Result<Vec<QuotaEvent>>;
}
