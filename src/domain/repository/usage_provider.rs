use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// UsageSummary はコスト集計サービスが返す期間内の利用額。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_cost: f64,
}

/// UsageProvider は外部のコスト集計への入口。エンジン自身は集計しない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageProvider: Send + Sync {
    async fn get_usage(&self, user_id: &str, period_key: &str) -> anyhow::Result<UsageSummary>;
}
