use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::entity::check_result::{CheckResult, WarningLevel};
use crate::domain::entity::principal::Principal;
use crate::domain::entity::quota_tier::{ActionOnLimit, QuotaTier};
use crate::domain::repository::UsageProvider;
use crate::usecase::record_quota_event::QuotaEventRecorder;
use crate::usecase::resolve_quota::{ResolveQuotaError, ResolveQuotaUseCase};

#[derive(Debug, thiserror::Error)]
pub enum CheckQuotaError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// 使用量が取得できない場合に 0 とみなして許可することはしない。
    #[error("usage unavailable: {0}")]
    UsageUnavailable(String),
}

impl From<ResolveQuotaError> for CheckQuotaError {
    fn from(e: ResolveQuotaError) -> Self {
        match e {
            ResolveQuotaError::StorageUnavailable(msg) => CheckQuotaError::StorageUnavailable(msg),
        }
    }
}

/// CheckQuotaUseCase はプリンシパルが現在の期間のクォータ内かを判定する。
/// 判定はリクエストごとに計算し、キャッシュするのはティア解決のみ。
pub struct CheckQuotaUseCase {
    resolver: Arc<ResolveQuotaUseCase>,
    usage_provider: Arc<dyn UsageProvider>,
    recorder: Arc<QuotaEventRecorder>,
}

impl CheckQuotaUseCase {
    pub fn new(
        resolver: Arc<ResolveQuotaUseCase>,
        usage_provider: Arc<dyn UsageProvider>,
        recorder: Arc<QuotaEventRecorder>,
    ) -> Self {
        Self {
            resolver,
            usage_provider,
            recorder,
        }
    }

    pub async fn execute(&self, principal: &Principal) -> Result<CheckResult, CheckQuotaError> {
        self.execute_at(principal, Utc::now()).await
    }

    pub async fn execute_at(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<CheckResult, CheckQuotaError> {
        let Some(resolved) = self.resolver.execute_at(principal, now).await? else {
            debug!(user_id = %principal.user_id, "no quota configured");
            return Ok(CheckResult::unrestricted());
        };

        let tier = resolved.tier;
        let matched_by = resolved.matched_by;

        let Some(limit) = tier.period_limit() else {
            return Ok(CheckResult {
                allowed: true,
                message: format!("unlimited quota ({})", tier.name),
                tier: Some(tier),
                matched_by: Some(matched_by),
                current_usage: 0.0,
                limit: None,
                percentage: 0.0,
                remaining: None,
                warning_level: WarningLevel::None,
            });
        };

        let period_key = tier.period_type.period_key(now);
        let usage = self
            .usage_provider
            .get_usage(&principal.user_id, &period_key)
            .await
            .map_err(|e| CheckQuotaError::UsageUnavailable(e.to_string()))?
            .total_cost;

        // limit は作成時に正であることを検証済み
        let percentage = if limit > 0.0 {
            usage / limit * 100.0
        } else {
            100.0
        };
        let warning_level = WarningLevel::for_percentage(percentage, tier.soft_limit_percent);
        let exceeded = usage >= limit;

        if !warning_level.is_none() {
            if let Err(e) = self
                .recorder
                .record_warning_if_needed(
                    principal,
                    &tier,
                    usage,
                    limit,
                    percentage,
                    warning_level,
                    now,
                )
                .await
            {
                warn!(user_id = %principal.user_id, error = %e, "failed to record quota warning");
            }
        }

        let allowed = !(exceeded && tier.action_on_limit == ActionOnLimit::Block);
        let message = build_message(&tier, usage, limit, percentage, exceeded, warning_level);

        if !allowed {
            if let Err(e) = self
                .recorder
                .record_block(principal, &tier, usage, limit, percentage, &message, now)
                .await
            {
                warn!(user_id = %principal.user_id, error = %e, "failed to record quota block");
            }
        }

        let remaining = if allowed {
            (limit - usage).max(0.0)
        } else {
            0.0
        };

        debug!(
            user_id = %principal.user_id,
            tier_id = %tier.id,
            period_key = %period_key,
            usage,
            limit,
            percentage,
            allowed,
            "quota checked"
        );

        Ok(CheckResult {
            allowed,
            message,
            tier: Some(tier),
            matched_by: Some(matched_by),
            current_usage: usage,
            limit: Some(limit),
            percentage,
            remaining: Some(remaining),
            warning_level,
        })
    }
}

fn build_message(
    tier: &QuotaTier,
    usage: f64,
    limit: f64,
    percentage: f64,
    exceeded: bool,
    warning_level: WarningLevel,
) -> String {
    if exceeded {
        return match tier.action_on_limit {
            ActionOnLimit::Block => format!(
                "quota exceeded for {} tier: ${:.2} of ${:.2} used",
                tier.name, usage, limit
            ),
            ActionOnLimit::Warn => format!(
                "quota exceeded for {} tier: ${:.2} of ${:.2} used (warning only)",
                tier.name, usage, limit
            ),
        };
    }
    let base = format!("within quota: {:.1}% of {} tier used", percentage, tier.name);
    if warning_level.is_none() {
        base
    } else {
        format!("{} (warning: {})", base, warning_level)
    }
}
