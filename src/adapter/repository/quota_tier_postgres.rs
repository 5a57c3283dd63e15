use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::entity::quota_tier::{ActionOnLimit, PeriodType, QuotaTier};
use crate::domain::repository::QuotaTierRepository;

pub struct QuotaTierPostgresRepository {
    pool: Arc<PgPool>,
}

impl QuotaTierPostgresRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct QuotaTierRow {
    id: String,
    name: String,
    description: Option<String>,
    monthly_limit: f64,
    daily_limit: Option<f64>,
    period_type: String,
    soft_limit_percent: i16,
    action_on_limit: String,
    enabled: bool,
    unlimited: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// 不明な列挙値は既定値に丸めずエラーにする。
impl TryFrom<QuotaTierRow> for QuotaTier {
    type Error = anyhow::Error;

    fn try_from(r: QuotaTierRow) -> Result<Self, Self::Error> {
        let period_type = PeriodType::from_str(&r.period_type)
            .ok_or_else(|| anyhow::anyhow!("unknown period_type in quota_tiers: {}", r.period_type))?;
        let action_on_limit = ActionOnLimit::from_str(&r.action_on_limit).ok_or_else(|| {
            anyhow::anyhow!("unknown action_on_limit in quota_tiers: {}", r.action_on_limit)
        })?;
        Ok(QuotaTier {
            id: r.id,
            name: r.name,
            description: r.description,
            monthly_limit: r.monthly_limit,
            daily_limit: r.daily_limit,
            period_type,
            soft_limit_percent: u8::try_from(r.soft_limit_percent)?,
            action_on_limit,
            enabled: r.enabled,
            unlimited: r.unlimited,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, name, description, monthly_limit, daily_limit, period_type, \
            soft_limit_percent, action_on_limit, enabled, unlimited, created_at, updated_at \
     FROM quota_engine.quota_tiers";

#[async_trait]
impl QuotaTierRepository for QuotaTierPostgresRepository {
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<QuotaTier>> {
        let row: Option<QuotaTierRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self, enabled_only: bool) -> anyhow::Result<Vec<QuotaTier>> {
        // idx_quota_tiers_enabled_limit（部分インデックス） / idx_quota_tiers_limit
        let query = if enabled_only {
            format!(
                "{} WHERE enabled = TRUE ORDER BY monthly_limit ASC, id ASC",
                SELECT_COLUMNS
            )
        } else {
            format!("{} ORDER BY monthly_limit ASC, id ASC", SELECT_COLUMNS)
        };
        let rows: Vec<QuotaTierRow> = sqlx::query_as(&query)
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create(&self, tier: &QuotaTier) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO quota_engine.quota_tiers \
             (id, name, description, monthly_limit, daily_limit, period_type, \
              soft_limit_percent, action_on_limit, enabled, unlimited, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(&tier.id)
        .bind(&tier.name)
        .bind(&tier.description)
        .bind(tier.monthly_limit)
        .bind(tier.daily_limit)
        .bind(tier.period_type.as_str())
        .bind(tier.soft_limit_percent as i16)
        .bind(tier.action_on_limit.as_str())
        .bind(tier.enabled)
        .bind(tier.unlimited)
        .bind(tier.created_at)
        .bind(tier.updated_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn update(&self, tier: &QuotaTier) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE quota_engine.quota_tiers \
             SET name = $2, description = $3, monthly_limit = $4, daily_limit = $5, \
                 period_type = $6, soft_limit_percent = $7, action_on_limit = $8, \
                 enabled = $9, unlimited = $10, updated_at = $11 \
             WHERE id = $1",
        )
        .bind(&tier.id)
        .bind(&tier.name)
        .bind(&tier.description)
        .bind(tier.monthly_limit)
        .bind(tier.daily_limit)
        .bind(tier.period_type.as_str())
        .bind(tier.soft_limit_percent as i16)
        .bind(tier.action_on_limit.as_str())
        .bind(tier.enabled)
        .bind(tier.unlimited)
        .bind(tier.updated_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}
