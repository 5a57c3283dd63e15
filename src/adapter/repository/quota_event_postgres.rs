use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::entity::quota_event::{QuotaEvent, QuotaEventMetadata, QuotaEventType};
use crate::domain::repository::QuotaEventRepository;

pub struct QuotaEventPostgresRepository {
    pool: Arc<PgPool>,
}

impl QuotaEventPostgresRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct QuotaEventRow {
    id: String,
    user_id: String,
    tier_id: String,
    event_type: String,
    current_usage: f64,
    quota_limit: Option<f64>,
    percentage: f64,
    occurred_at: DateTime<Utc>,
    metadata: serde_json::Value,
}

impl TryFrom<QuotaEventRow> for QuotaEvent {
    type Error = anyhow::Error;

    fn try_from(r: QuotaEventRow) -> Result<Self, Self::Error> {
        let event_type = QuotaEventType::from_str(&r.event_type)
            .ok_or_else(|| anyhow::anyhow!("unknown event_type in quota_events: {}", r.event_type))?;
        let metadata: QuotaEventMetadata = serde_json::from_value(r.metadata)?;
        Ok(QuotaEvent {
            id: r.id,
            user_id: r.user_id,
            tier_id: r.tier_id,
            event_type,
            current_usage: r.current_usage,
            limit: r.quota_limit,
            percentage: r.percentage,
            timestamp: r.occurred_at,
            metadata,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, user_id, tier_id, event_type, current_usage, quota_limit, \
            percentage, occurred_at, metadata \
     FROM quota_engine.quota_events";

#[async_trait]
impl QuotaEventRepository for QuotaEventPostgresRepository {
    async fn record(&self, event: &QuotaEvent) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO quota_engine.quota_events \
             (id, user_id, tier_id, event_type, current_usage, quota_limit, percentage, \
              occurred_at, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&event.id)
        .bind(&event.user_id)
        .bind(&event.tier_id)
        .bind(event.event_type.as_str())
        .bind(event.current_usage)
        .bind(event.limit)
        .bind(event.percentage)
        .bind(event.timestamp)
        .bind(sqlx::types::Json(&event.metadata))
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn find_recent(
        &self,
        user_id: &str,
        event_type: QuotaEventType,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Option<QuotaEvent>> {
        // idx_quota_events_user_type_time
        let row: Option<QuotaEventRow> = sqlx::query_as(&format!(
            "{} WHERE user_id = $1 AND event_type = $2 AND occurred_at >= $3 \
             ORDER BY occurred_at DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(event_type.as_str())
        .bind(since)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_user(&self, user_id: &str, limit: u32) -> anyhow::Result<Vec<QuotaEvent>> {
        let rows: Vec<QuotaEventRow> = sqlx::query_as(&format!(
            "{} WHERE user_id = $1 ORDER BY occurred_at DESC LIMIT $2",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_by_tier(&self, tier_id: &str, limit: u32) -> anyhow::Result<Vec<QuotaEvent>> {
        let rows: Vec<QuotaEventRow> = sqlx::query_as(&format!(
            "{} WHERE tier_id = $1 ORDER BY occurred_at DESC LIMIT $2",
            SELECT_COLUMNS
        ))
        .bind(tier_id)
        .bind(limit as i64)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
