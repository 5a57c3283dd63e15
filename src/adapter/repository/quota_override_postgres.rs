use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::entity::quota_override::{OverrideKind, QuotaOverride};
use crate::domain::repository::QuotaOverrideRepository;

pub struct QuotaOverridePostgresRepository {
    pool: Arc<PgPool>,
}

impl QuotaOverridePostgresRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct QuotaOverrideRow {
    id: String,
    user_id: String,
    override_type: String,
    monthly_limit: Option<f64>,
    daily_limit: Option<f64>,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    reason: String,
    created_by: String,
    enabled: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<QuotaOverrideRow> for QuotaOverride {
    type Error = anyhow::Error;

    fn try_from(r: QuotaOverrideRow) -> Result<Self, Self::Error> {
        let kind = OverrideKind::from_parts(&r.override_type, r.monthly_limit, r.daily_limit)
            .map_err(|e| anyhow::anyhow!("corrupt quota_overrides row {}: {}", r.id, e))?;
        Ok(QuotaOverride {
            id: r.id,
            user_id: r.user_id,
            kind,
            valid_from: r.valid_from,
            valid_until: r.valid_until,
            reason: r.reason,
            created_by: r.created_by,
            enabled: r.enabled,
            created_at: r.created_at,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, user_id, override_type, monthly_limit, daily_limit, \
            valid_from, valid_until, reason, created_by, enabled, created_at \
     FROM quota_engine.quota_overrides";

#[async_trait]
impl QuotaOverrideRepository for QuotaOverridePostgresRepository {
    async fn find_active(&self, user_id: &str, now: DateTime<Utc>) -> anyhow::Result<Option<QuotaOverride>> {
        // idx_quota_overrides_user_valid_until
        let row: Option<QuotaOverrideRow> = sqlx::query_as(&format!(
            "{} WHERE user_id = $1 AND enabled = TRUE AND valid_until >= $2 AND valid_from <= $2 \
             ORDER BY valid_until DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(now)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<QuotaOverride>> {
        let row: Option<QuotaOverrideRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn create(&self, quota_override: &QuotaOverride) -> anyhow::Result<()> {
        let (monthly_limit, daily_limit) = match &quota_override.kind {
            OverrideKind::CustomLimit {
                monthly_limit,
                daily_limit,
            } => (Some(*monthly_limit), *daily_limit),
            OverrideKind::Unlimited => (None, None),
        };

        sqlx::query(
            "INSERT INTO quota_engine.quota_overrides \
             (id, user_id, override_type, monthly_limit, daily_limit, valid_from, valid_until, \
              reason, created_by, enabled, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&quota_override.id)
        .bind(&quota_override.user_id)
        .bind(quota_override.kind.as_str())
        .bind(monthly_limit)
        .bind(daily_limit)
        .bind(quota_override.valid_from)
        .bind(quota_override.valid_until)
        .bind(&quota_override.reason)
        .bind(&quota_override.created_by)
        .bind(quota_override.enabled)
        .bind(quota_override.created_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn disable(&self, id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE quota_engine.quota_overrides SET enabled = FALSE WHERE id = $1 AND enabled = TRUE",
        )
        .bind(id)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
