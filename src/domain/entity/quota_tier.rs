use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::validation::ValidationError;

pub const DEFAULT_SOFT_LIMIT_PERCENT: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Daily,
    Monthly,
}

impl PeriodType {
    pub fn as_str(&self) -> &str {
        match self {
            PeriodType::Daily => "daily",
            PeriodType::Monthly => "monthly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(PeriodType::Daily),
            "monthly" => Some(PeriodType::Monthly),
            _ => None,
        }
    }

    /// 使用量プロバイダーへ渡す期間キーを生成する。
    /// daily は `YYYY-MM-DD`、monthly は `YYYY-MM`。
    pub fn period_key(&self, now: DateTime<Utc>) -> String {
        match self {
            PeriodType::Daily => format!("{:04}-{:02}-{:02}", now.year(), now.month(), now.day()),
            PeriodType::Monthly => format!("{:04}-{:02}", now.year(), now.month()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOnLimit {
    Block,
    Warn,
}

impl ActionOnLimit {
    pub fn as_str(&self) -> &str {
        match self {
            ActionOnLimit::Block => "block",
            ActionOnLimit::Warn => "warn",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "block" => Some(ActionOnLimit::Block),
            "warn" => Some(ActionOnLimit::Warn),
            _ => None,
        }
    }
}

/// QuotaTier は利用上限の定義。管理者が作成・更新し、エンジン自身は変更しない。
///
/// `unlimited` が true のティアは上限を持たず、`monthly_limit` は参照されない。
/// オーバーライド由来の合成ティアでのみ使われる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaTier {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub monthly_limit: f64,
    #[serde(default)]
    pub daily_limit: Option<f64>,
    pub period_type: PeriodType,
    #[serde(default = "default_soft_limit_percent")]
    pub soft_limit_percent: u8,
    pub action_on_limit: ActionOnLimit,
    pub enabled: bool,
    #[serde(default)]
    pub unlimited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_soft_limit_percent() -> u8 {
    DEFAULT_SOFT_LIMIT_PERCENT
}

impl QuotaTier {
    pub fn new(
        id: String,
        name: String,
        monthly_limit: f64,
        daily_limit: Option<f64>,
        period_type: PeriodType,
        soft_limit_percent: u8,
        action_on_limit: ActionOnLimit,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            description: None,
            monthly_limit,
            daily_limit,
            period_type,
            soft_limit_percent,
            action_on_limit,
            enabled: true,
            unlimited: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// 判定対象期間の上限を返す。None は無制限を意味する。
    pub fn period_limit(&self) -> Option<f64> {
        if self.unlimited {
            return None;
        }
        match self.period_type {
            PeriodType::Daily => Some(self.daily_limit.unwrap_or(self.monthly_limit)),
            PeriodType::Monthly => Some(self.monthly_limit),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::EmptyField("id"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name"));
        }
        if !self.unlimited {
            validate_limit("monthly_limit", self.monthly_limit)?;
        }
        if let Some(daily) = self.daily_limit {
            validate_limit("daily_limit", daily)?;
        }
        if self.period_type == PeriodType::Daily && self.daily_limit.is_none() && !self.unlimited {
            return Err(ValidationError::MissingDailyLimit);
        }
        if self.soft_limit_percent == 0 || self.soft_limit_percent > 100 {
            return Err(ValidationError::SoftLimitOutOfRange(self.soft_limit_percent));
        }
        Ok(())
    }
}

/// 上限値は正の有限値でなければならない（0 は作成時に拒否する）。
pub(crate) fn validate_limit(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::NonPositiveLimit { field, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_tier() -> QuotaTier {
        QuotaTier::new(
            "basic".to_string(),
            "Basic".to_string(),
            50.0,
            None,
            PeriodType::Monthly,
            80,
            ActionOnLimit::Block,
        )
    }

    #[test]
    fn test_period_type_roundtrip() {
        assert_eq!(PeriodType::from_str("daily"), Some(PeriodType::Daily));
        assert_eq!(PeriodType::from_str("monthly"), Some(PeriodType::Monthly));
        assert_eq!(PeriodType::from_str("weekly"), None);
        assert_eq!(PeriodType::Daily.as_str(), "daily");
    }

    #[test]
    fn test_action_on_limit_roundtrip() {
        assert_eq!(ActionOnLimit::from_str("block"), Some(ActionOnLimit::Block));
        assert_eq!(ActionOnLimit::from_str("warn"), Some(ActionOnLimit::Warn));
        assert_eq!(ActionOnLimit::from_str("deny"), None);
    }

    #[test]
    fn test_period_key() {
        let now = Utc.with_ymd_and_hms(2026, 3, 7, 15, 30, 0).unwrap();
        assert_eq!(PeriodType::Daily.period_key(now), "2026-03-07");
        assert_eq!(PeriodType::Monthly.period_key(now), "2026-03");
    }

    #[test]
    fn test_period_limit() {
        let mut tier = sample_tier();
        assert_eq!(tier.period_limit(), Some(50.0));

        tier.period_type = PeriodType::Daily;
        tier.daily_limit = Some(5.0);
        assert_eq!(tier.period_limit(), Some(5.0));

        tier.unlimited = true;
        assert_eq!(tier.period_limit(), None);
    }

    #[test]
    fn test_validate_ok() {
        assert!(sample_tier().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_limit() {
        let mut tier = sample_tier();
        tier.monthly_limit = 0.0;
        assert!(matches!(
            tier.validate(),
            Err(ValidationError::NonPositiveLimit { field: "monthly_limit", .. })
        ));
    }

    #[test]
    fn test_validate_nan_limit() {
        let mut tier = sample_tier();
        tier.monthly_limit = f64::NAN;
        assert!(tier.validate().is_err());
    }

    #[test]
    fn test_validate_daily_requires_daily_limit() {
        let mut tier = sample_tier();
        tier.period_type = PeriodType::Daily;
        assert!(matches!(tier.validate(), Err(ValidationError::MissingDailyLimit)));
    }

    #[test]
    fn test_validate_soft_limit_range() {
        let mut tier = sample_tier();
        tier.soft_limit_percent = 0;
        assert!(tier.validate().is_err());
        tier.soft_limit_percent = 101;
        assert!(tier.validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults_soft_limit() {
        let json = serde_json::json!({
            "id": "premium",
            "name": "Premium",
            "monthly_limit": 500.0,
            "period_type": "monthly",
            "action_on_limit": "block",
            "enabled": true,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        });
        let tier: QuotaTier = serde_json::from_value(json).unwrap();
        assert_eq!(tier.soft_limit_percent, 80);
        assert!(!tier.unlimited);
        assert_eq!(tier.daily_limit, None);
    }
}
