use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::quota_tier::{validate_limit, ActionOnLimit, PeriodType, QuotaTier, DEFAULT_SOFT_LIMIT_PERCENT};
use super::validation::ValidationError;

/// OverrideKind はオーバーライドの種類。custom_limit は必ず上限値を持つ。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "override_type", rename_all = "snake_case")]
pub enum OverrideKind {
    CustomLimit {
        monthly_limit: f64,
        #[serde(default)]
        daily_limit: Option<f64>,
    },
    Unlimited,
}

impl OverrideKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideKind::CustomLimit { .. } => "custom_limit",
            OverrideKind::Unlimited => "unlimited",
        }
    }

    pub fn from_parts(
        override_type: &str,
        monthly_limit: Option<f64>,
        daily_limit: Option<f64>,
    ) -> Result<Self, ValidationError> {
        match override_type {
            "custom_limit" => {
                let monthly_limit = monthly_limit.ok_or(ValidationError::MissingCustomLimit)?;
                Ok(OverrideKind::CustomLimit {
                    monthly_limit,
                    daily_limit,
                })
            }
            "unlimited" => Ok(OverrideKind::Unlimited),
            other => Err(ValidationError::UnknownVariant {
                field: "override_type",
                allowed: "custom_limit, unlimited",
                value: other.to_string(),
            }),
        }
    }
}

/// QuotaOverride はユーザー単位の期間限定の例外設定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaOverride {
    pub id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub kind: OverrideKind,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub reason: String,
    pub created_by: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl QuotaOverride {
    pub fn new(
        user_id: String,
        kind: OverrideKind,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
        reason: String,
        created_by: String,
    ) -> Self {
        Self {
            id: format!("ovr_{}", uuid::Uuid::new_v4().simple()),
            user_id,
            kind,
            valid_from,
            valid_until,
            reason,
            created_by,
            enabled: true,
            created_at: Utc::now(),
        }
    }

    /// インデックスは期限切れ・無効化済みの行を返し得るため、呼び出し側で必ず確認する。
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.valid_from <= now && now <= self.valid_until
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("user_id"));
        }
        if let OverrideKind::CustomLimit {
            monthly_limit,
            daily_limit,
        } = &self.kind
        {
            validate_limit("monthly_limit", *monthly_limit)?;
            if let Some(daily) = daily_limit {
                validate_limit("daily_limit", *daily)?;
            }
        }
        if self.valid_until <= self.valid_from {
            return Err(ValidationError::InvalidValidityWindow {
                valid_from: self.valid_from.to_rfc3339(),
                valid_until: self.valid_until.to_rfc3339(),
            });
        }
        Ok(())
    }

    /// オーバーライドを合成ティアとして具体化する。
    /// unlimited は warn、custom_limit は block かつソフトリミット 80%。
    pub fn to_synthetic_tier(&self) -> QuotaTier {
        let (name, monthly_limit, daily_limit, action, unlimited) = match &self.kind {
            OverrideKind::Unlimited => ("Unlimited (override)".to_string(), 0.0, None, ActionOnLimit::Warn, true),
            OverrideKind::CustomLimit {
                monthly_limit,
                daily_limit,
            } => (
                "Custom limit (override)".to_string(),
                *monthly_limit,
                *daily_limit,
                ActionOnLimit::Block,
                false,
            ),
        };
        QuotaTier {
            id: format!("override:{}", self.id),
            name,
            description: Some(self.reason.clone()),
            monthly_limit,
            daily_limit,
            period_type: PeriodType::Monthly,
            soft_limit_percent: DEFAULT_SOFT_LIMIT_PERCENT,
            action_on_limit: action,
            enabled: true,
            unlimited,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_override(kind: OverrideKind) -> QuotaOverride {
        let now = Utc::now();
        QuotaOverride::new(
            "user-1".to_string(),
            kind,
            now - Duration::days(1),
            now + Duration::days(1),
            "conference deadline".to_string(),
            "admin@example.com".to_string(),
        )
    }

    #[test]
    fn test_from_parts_custom_requires_limit() {
        assert_eq!(
            OverrideKind::from_parts("custom_limit", None, None),
            Err(ValidationError::MissingCustomLimit)
        );
        assert_eq!(
            OverrideKind::from_parts("custom_limit", Some(100.0), None),
            Ok(OverrideKind::CustomLimit {
                monthly_limit: 100.0,
                daily_limit: None
            })
        );
        assert_eq!(OverrideKind::from_parts("unlimited", None, None), Ok(OverrideKind::Unlimited));
        assert!(OverrideKind::from_parts("temporary", None, None).is_err());
    }

    #[test]
    fn test_is_active_window() {
        let ovr = sample_override(OverrideKind::Unlimited);
        let now = Utc::now();
        assert!(ovr.is_active(now));
        assert!(!ovr.is_active(now + Duration::days(2)));
        assert!(!ovr.is_active(now - Duration::days(2)));
        assert!(ovr.is_active(ovr.valid_until));
        assert!(ovr.is_active(ovr.valid_from));
    }

    #[test]
    fn test_is_active_disabled() {
        let mut ovr = sample_override(OverrideKind::Unlimited);
        ovr.enabled = false;
        assert!(!ovr.is_active(Utc::now()));
    }

    #[test]
    fn test_validate_window_and_limit() {
        let mut ovr = sample_override(OverrideKind::CustomLimit {
            monthly_limit: 0.0,
            daily_limit: None,
        });
        assert!(matches!(ovr.validate(), Err(ValidationError::NonPositiveLimit { .. })));

        ovr.kind = OverrideKind::CustomLimit {
            monthly_limit: 100.0,
            daily_limit: None,
        };
        assert!(ovr.validate().is_ok());

        ovr.valid_until = ovr.valid_from;
        assert!(matches!(ovr.validate(), Err(ValidationError::InvalidValidityWindow { .. })));
    }

    #[test]
    fn test_synthetic_tier_unlimited() {
        let ovr = sample_override(OverrideKind::Unlimited);
        let tier = ovr.to_synthetic_tier();
        assert!(tier.unlimited);
        assert_eq!(tier.action_on_limit, ActionOnLimit::Warn);
        assert_eq!(tier.period_limit(), None);
        assert!(tier.id.starts_with("override:ovr_"));
    }

    #[test]
    fn test_synthetic_tier_custom() {
        let ovr = sample_override(OverrideKind::CustomLimit {
            monthly_limit: 250.0,
            daily_limit: Some(20.0),
        });
        let tier = ovr.to_synthetic_tier();
        assert!(!tier.unlimited);
        assert_eq!(tier.action_on_limit, ActionOnLimit::Block);
        assert_eq!(tier.soft_limit_percent, 80);
        assert_eq!(tier.period_type, PeriodType::Monthly);
        assert_eq!(tier.period_limit(), Some(250.0));
        assert_eq!(tier.daily_limit, Some(20.0));
    }

    #[test]
    fn test_serialize_override_type_tag() {
        let ovr = sample_override(OverrideKind::CustomLimit {
            monthly_limit: 250.0,
            daily_limit: None,
        });
        let json = serde_json::to_value(&ovr).unwrap();
        assert_eq!(json["override_type"], "custom_limit");
        assert_eq!(json["monthly_limit"], 250.0);
    }
}
