use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::domain::entity::check_result::WarningLevel;
use crate::domain::entity::principal::Principal;
use crate::domain::entity::quota_event::{QuotaEvent, QuotaEventMetadata, QuotaEventType};
use crate::domain::entity::quota_override::{OverrideKind, QuotaOverride};
use crate::domain::entity::quota_tier::QuotaTier;
use crate::domain::repository::QuotaEventRepository;
use crate::infrastructure::kafka_producer::{NoopQuotaEventPublisher, QuotaEventPublisher};

pub const DEFAULT_DEDUP_WINDOW_MINUTES: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum RecordQuotaEventError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// QuotaEventRecorder は監査イベントを永続化する。
/// warning のみ、同一ユーザー・同一閾値の直近イベントがウィンドウ内にあれば記録しない。
pub struct QuotaEventRecorder {
    event_repo: Arc<dyn QuotaEventRepository>,
    publisher: Arc<dyn QuotaEventPublisher>,
    dedup_window: Duration,
}

impl QuotaEventRecorder {
    pub fn new(
        event_repo: Arc<dyn QuotaEventRepository>,
        publisher: Arc<dyn QuotaEventPublisher>,
        dedup_window_minutes: i64,
    ) -> Self {
        Self {
            event_repo,
            publisher,
            dedup_window: Duration::minutes(dedup_window_minutes),
        }
    }

    pub fn new_without_publisher(event_repo: Arc<dyn QuotaEventRepository>) -> Self {
        Self::new(
            event_repo,
            Arc::new(NoopQuotaEventPublisher),
            DEFAULT_DEDUP_WINDOW_MINUTES,
        )
    }

    /// 記録した場合は true、重複としてスキップした場合は false を返す。
    #[allow(clippy::too_many_arguments)]
    pub async fn record_warning_if_needed(
        &self,
        principal: &Principal,
        tier: &QuotaTier,
        current_usage: f64,
        limit: f64,
        percentage: f64,
        threshold: WarningLevel,
        now: DateTime<Utc>,
    ) -> Result<bool, RecordQuotaEventError> {
        if threshold.is_none() {
            return Ok(false);
        }

        let since = now - self.dedup_window;
        let recent = self
            .event_repo
            .find_recent(&principal.user_id, QuotaEventType::Warning, since)
            .await
            .map_err(|e| RecordQuotaEventError::StorageUnavailable(e.to_string()))?;

        if let Some(recent) = recent {
            if recent.metadata.threshold() == Some(threshold) {
                debug!(
                    user_id = %principal.user_id,
                    threshold = %threshold,
                    last_recorded_at = %recent.timestamp,
                    "duplicate quota warning skipped"
                );
                return Ok(false);
            }
        }

        let event = QuotaEvent::new(
            &principal.user_id,
            &tier.id,
            current_usage,
            Some(limit),
            percentage,
            now,
            QuotaEventMetadata::Warning { threshold },
        );
        self.persist(event).await?;
        Ok(true)
    }

    pub async fn record_block(
        &self,
        principal: &Principal,
        tier: &QuotaTier,
        current_usage: f64,
        limit: f64,
        percentage: f64,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<QuotaEvent, RecordQuotaEventError> {
        let event = QuotaEvent::new(
            &principal.user_id,
            &tier.id,
            current_usage,
            Some(limit),
            percentage,
            now,
            QuotaEventMetadata::Block {
                message: message.to_string(),
            },
        );
        self.persist(event).await
    }

    /// オーバーライドの tier_id には合成ティアの ID を記録する。
    pub async fn record_override_applied(
        &self,
        ovr: &QuotaOverride,
        now: DateTime<Utc>,
    ) -> Result<QuotaEvent, RecordQuotaEventError> {
        let limit = match &ovr.kind {
            OverrideKind::CustomLimit { monthly_limit, .. } => Some(*monthly_limit),
            OverrideKind::Unlimited => None,
        };
        let event = QuotaEvent::new(
            &ovr.user_id,
            &ovr.to_synthetic_tier().id,
            0.0,
            limit,
            0.0,
            now,
            QuotaEventMetadata::OverrideApplied {
                override_id: ovr.id.clone(),
                override_type: ovr.kind.as_str().to_string(),
                reason: ovr.reason.clone(),
                created_by: ovr.created_by.clone(),
            },
        );
        self.persist(event).await
    }

    pub async fn record_reset(
        &self,
        user_id: &str,
        tier_id: &str,
        reason: &str,
        reset_by: &str,
        now: DateTime<Utc>,
    ) -> Result<QuotaEvent, RecordQuotaEventError> {
        let event = QuotaEvent::new(
            user_id,
            tier_id,
            0.0,
            None,
            0.0,
            now,
            QuotaEventMetadata::Reset {
                reason: reason.to_string(),
                reset_by: reset_by.to_string(),
            },
        );
        self.persist(event).await
    }

    async fn persist(&self, event: QuotaEvent) -> Result<QuotaEvent, RecordQuotaEventError> {
        self.event_repo
            .record(&event)
            .await
            .map_err(|e| RecordQuotaEventError::StorageUnavailable(e.to_string()))?;

        info!(
            event_id = %event.id,
            event_type = event.event_type.as_str(),
            user_id = %event.user_id,
            tier_id = %event.tier_id,
            percentage = event.percentage,
            "quota event recorded"
        );

        if let Err(e) = self.publisher.publish(&event).await {
            warn!(event_id = %event.id, error = %e, "failed to publish quota event");
        }
        Ok(event)
    }
}
