use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::check_result::WarningLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaEventType {
    Warning,
    Block,
    Reset,
    OverrideApplied,
}

impl QuotaEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaEventType::Warning => "warning",
            QuotaEventType::Block => "block",
            QuotaEventType::Reset => "reset",
            QuotaEventType::OverrideApplied => "override_applied",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "warning" => Some(QuotaEventType::Warning),
            "block" => Some(QuotaEventType::Block),
            "reset" => Some(QuotaEventType::Reset),
            "override_applied" => Some(QuotaEventType::OverrideApplied),
            _ => None,
        }
    }
}

/// イベント種別ごとのメタデータ。重複排除は Warning の `threshold` で判定する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuotaEventMetadata {
    Warning {
        threshold: WarningLevel,
    },
    Block {
        message: String,
    },
    Reset {
        reason: String,
        reset_by: String,
    },
    OverrideApplied {
        override_id: String,
        override_type: String,
        reason: String,
        created_by: String,
    },
}

impl QuotaEventMetadata {
    pub fn event_type(&self) -> QuotaEventType {
        match self {
            QuotaEventMetadata::Warning { .. } => QuotaEventType::Warning,
            QuotaEventMetadata::Block { .. } => QuotaEventType::Block,
            QuotaEventMetadata::Reset { .. } => QuotaEventType::Reset,
            QuotaEventMetadata::OverrideApplied { .. } => QuotaEventType::OverrideApplied,
        }
    }

    pub fn threshold(&self) -> Option<WarningLevel> {
        match self {
            QuotaEventMetadata::Warning { threshold } => Some(*threshold),
            _ => None,
        }
    }
}

/// QuotaEvent は追記専用の監査レコード。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaEvent {
    pub id: String,
    pub user_id: String,
    pub tier_id: String,
    pub event_type: QuotaEventType,
    pub current_usage: f64,
    pub limit: Option<f64>,
    pub percentage: f64,
    pub timestamp: DateTime<Utc>,
    pub metadata: QuotaEventMetadata,
}

impl QuotaEvent {
    /// event_type はメタデータから導出するため、両者が食い違うことはない。
    pub fn new(
        user_id: &str,
        tier_id: &str,
        current_usage: f64,
        limit: Option<f64>,
        percentage: f64,
        timestamp: DateTime<Utc>,
        metadata: QuotaEventMetadata,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            tier_id: tier_id.to_string(),
            event_type: metadata.event_type(),
            current_usage,
            limit,
            percentage,
            timestamp,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_roundtrip() {
        for t in [
            QuotaEventType::Warning,
            QuotaEventType::Block,
            QuotaEventType::Reset,
            QuotaEventType::OverrideApplied,
        ] {
            assert_eq!(QuotaEventType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(QuotaEventType::from_str("exceeded"), None);
    }

    #[test]
    fn test_event_type_derived_from_metadata() {
        let event = QuotaEvent::new(
            "user-1",
            "basic",
            42.5,
            Some(50.0),
            85.0,
            Utc::now(),
            QuotaEventMetadata::Warning {
                threshold: WarningLevel::Threshold(80),
            },
        );
        assert_eq!(event.event_type, QuotaEventType::Warning);
        assert_eq!(event.metadata.threshold(), Some(WarningLevel::Threshold(80)));
    }

    #[test]
    fn test_metadata_serialization() {
        let meta = QuotaEventMetadata::Warning {
            threshold: WarningLevel::Threshold(90),
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["kind"], "warning");
        assert_eq!(json["threshold"], "90%");

        let back: QuotaEventMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }
}
