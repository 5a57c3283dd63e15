use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::entity::quota_assignment::{AssignmentSelector, AssignmentType, QuotaAssignment};
use crate::domain::repository::QuotaAssignmentRepository;

pub struct QuotaAssignmentPostgresRepository {
    pool: Arc<PgPool>,
}

impl QuotaAssignmentPostgresRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct QuotaAssignmentRow {
    id: String,
    tier_id: String,
    assignment_type: String,
    user_id: Option<String>,
    role: Option<String>,
    email_domain_pattern: Option<String>,
    priority: i32,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuotaAssignmentRow> for QuotaAssignment {
    type Error = anyhow::Error;

    fn try_from(r: QuotaAssignmentRow) -> Result<Self, Self::Error> {
        let selector = AssignmentSelector::from_parts(&r.assignment_type, r.user_id, r.role, r.email_domain_pattern)
            .map_err(|e| anyhow::anyhow!("corrupt quota_assignments row {}: {}", r.id, e))?;
        Ok(QuotaAssignment {
            id: r.id,
            tier_id: r.tier_id,
            selector,
            priority: r.priority,
            enabled: r.enabled,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, tier_id, assignment_type, user_id, role, email_domain_pattern, \
            priority, enabled, created_at, updated_at \
     FROM quota_engine.quota_assignments";

#[async_trait]
impl QuotaAssignmentRepository for QuotaAssignmentPostgresRepository {
    async fn find_for_user(&self, user_id: &str) -> anyhow::Result<Option<QuotaAssignment>> {
        // idx_quota_assignments_user
        let row: Option<QuotaAssignmentRow> = sqlx::query_as(&format!(
            "{} WHERE assignment_type = 'direct_user' AND user_id = $1 AND enabled = TRUE \
             ORDER BY priority DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_for_role(&self, role: &str) -> anyhow::Result<Vec<QuotaAssignment>> {
        // idx_quota_assignments_role
        let rows: Vec<QuotaAssignmentRow> = sqlx::query_as(&format!(
            "{} WHERE assignment_type = 'jwt_role' AND role = $1 AND enabled = TRUE \
             ORDER BY priority DESC",
            SELECT_COLUMNS
        ))
        .bind(role)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_by_type(
        &self,
        assignment_type: AssignmentType,
        enabled_only: bool,
    ) -> anyhow::Result<Vec<QuotaAssignment>> {
        // idx_quota_assignments_type
        let rows: Vec<QuotaAssignmentRow> = sqlx::query_as(&format!(
            "{} WHERE assignment_type = $1 AND ($2 = FALSE OR enabled = TRUE) \
             ORDER BY priority DESC, created_at ASC",
            SELECT_COLUMNS
        ))
        .bind(assignment_type.as_str())
        .bind(enabled_only)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn create(&self, assignment: &QuotaAssignment) -> anyhow::Result<()> {
        let selector = &assignment.selector;
        sqlx::query(
            "INSERT INTO quota_engine.quota_assignments \
             (id, tier_id, assignment_type, user_id, role, email_domain_pattern, \
              priority, enabled, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&assignment.id)
        .bind(&assignment.tier_id)
        .bind(assignment.assignment_type().as_str())
        .bind(selector.user_id())
        .bind(selector.role())
        .bind(selector.email_domain_pattern())
        .bind(assignment.priority)
        .bind(assignment.enabled)
        .bind(assignment.created_at)
        .bind(assignment.updated_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn disable(&self, id: &str) -> anyhow::Result<Option<QuotaAssignment>> {
        let row: Option<QuotaAssignmentRow> = sqlx::query_as(
            "UPDATE quota_engine.quota_assignments \
             SET enabled = FALSE, updated_at = NOW() \
             WHERE id = $1 AND enabled = TRUE \
             RETURNING id, tier_id, assignment_type, user_id, role, email_domain_pattern, \
                       priority, enabled, created_at, updated_at",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}
