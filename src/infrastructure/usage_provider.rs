use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::RwLock;

use crate::domain::repository::{UsageProvider, UsageSummary};

/// HttpUsageProvider はコスト集計サービスの REST API から利用額を取得する。
pub struct HttpUsageProvider {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpUsageProvider {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build usage http client: {}", e))?;
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("invalid usage base url {}: {}", base_url, e))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("invalid usage base url: {}", base_url);
        }
        Ok(Self { client, base_url })
    }

    /// user_id と period_key はそれぞれ 1 つのパスセグメントとしてパーセントエンコードする。
    fn usage_url(&self, user_id: &str, period_key: &str) -> anyhow::Result<reqwest::Url> {
        for segment in [user_id, period_key] {
            // "." と ".." は Url のセグメント追加で捨てられるため受け付けない
            if segment.is_empty() || segment == "." || segment == ".." {
                anyhow::bail!("invalid usage path segment: {:?}", segment);
            }
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("invalid usage base url: {}", self.base_url))?
            .pop_if_empty()
            .extend(["api", "v1", "usage", user_id, period_key]);
        Ok(url)
    }
}

#[async_trait]
impl UsageProvider for HttpUsageProvider {
    async fn get_usage(&self, user_id: &str, period_key: &str) -> anyhow::Result<UsageSummary> {
        let url = self.usage_url(user_id, period_key)?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("usage request failed: {}", e))?;

        // 404 は「その期間の利用記録なし」を意味する
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(UsageSummary { total_cost: 0.0 });
        }
        if !resp.status().is_success() {
            anyhow::bail!("usage service returned {}", resp.status());
        }
        let summary = resp
            .json::<UsageSummary>()
            .await
            .map_err(|e| anyhow::anyhow!("invalid usage response: {}", e))?;
        Ok(summary)
    }
}

/// RedisUsageProvider は集計側が書き込んだ期間ごとの利用額を Redis から読む。
/// キーは `{prefix}{user_id}:{period_key}`、値は 10 進の浮動小数点文字列。
pub struct RedisUsageProvider {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisUsageProvider {
    pub fn new(conn: ConnectionManager, key_prefix: String) -> Self {
        Self { conn, key_prefix }
    }
}

#[async_trait]
impl UsageProvider for RedisUsageProvider {
    async fn get_usage(&self, user_id: &str, period_key: &str) -> anyhow::Result<UsageSummary> {
        let key = build_key(&self.key_prefix, user_id, period_key);
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;
        parse_cost(&key, raw)
    }
}

fn build_key(prefix: &str, user_id: &str, period_key: &str) -> String {
    format!("{}{}:{}", prefix, user_id, period_key)
}

/// キーが存在しなければ利用額 0、数値として読めない値はエラー。
fn parse_cost(key: &str, raw: Option<String>) -> anyhow::Result<UsageSummary> {
    match raw {
        None => Ok(UsageSummary { total_cost: 0.0 }),
        Some(s) => {
            let total_cost: f64 = s
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid usage value at {}: {:?} ({})", key, s, e))?;
            if !total_cost.is_finite() || total_cost < 0.0 {
                anyhow::bail!("invalid usage value at {}: {}", key, total_cost);
            }
            Ok(UsageSummary { total_cost })
        }
    }
}

/// StaticUsageProvider はインメモリの利用額テーブル。ローカル実行とテスト用。
#[derive(Default)]
pub struct StaticUsageProvider {
    costs: RwLock<HashMap<(String, String), f64>>,
}

impl StaticUsageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_usage(&self, user_id: &str, period_key: &str, total_cost: f64) {
        let mut costs = self.costs.write().await;
        costs.insert((user_id.to_string(), period_key.to_string()), total_cost);
    }
}

#[async_trait]
impl UsageProvider for StaticUsageProvider {
    async fn get_usage(&self, user_id: &str, period_key: &str) -> anyhow::Result<UsageSummary> {
        let costs = self.costs.read().await;
        let total_cost = costs
            .get(&(user_id.to_string(), period_key.to_string()))
            .copied()
            .unwrap_or(0.0);
        Ok(UsageSummary { total_cost })
    }
}
