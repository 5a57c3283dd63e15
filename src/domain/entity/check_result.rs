use std::fmt;

use serde::{Deserialize, Serialize};

use super::quota_tier::QuotaTier;

/// 90% 以上は常にこの警告レベルになる。
pub const HARD_WARNING_PERCENT: u8 = 90;

/// WarningLevel は `"none"` または `"80%"` のような閾値ラベルとしてシリアライズする。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum WarningLevel {
    None,
    Threshold(u8),
}

impl WarningLevel {
    /// 使用率から警告レベルを決める。
    pub fn for_percentage(percentage: f64, soft_limit_percent: u8) -> Self {
        if percentage >= HARD_WARNING_PERCENT as f64 {
            WarningLevel::Threshold(HARD_WARNING_PERCENT)
        } else if percentage >= soft_limit_percent as f64 {
            WarningLevel::Threshold(soft_limit_percent)
        } else {
            WarningLevel::None
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, WarningLevel::None)
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningLevel::None => write!(f, "none"),
            WarningLevel::Threshold(p) => write!(f, "{}%", p),
        }
    }
}

impl From<WarningLevel> for String {
    fn from(level: WarningLevel) -> Self {
        level.to_string()
    }
}

impl TryFrom<String> for WarningLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == "none" {
            return Ok(WarningLevel::None);
        }
        s.strip_suffix('%')
            .and_then(|n| n.parse::<u8>().ok())
            .map(WarningLevel::Threshold)
            .ok_or_else(|| format!("invalid warning level: {}", s))
    }
}

/// CheckResult はチェッカーの判定結果。`allowed` が正であり、警告レベル・メッセージは参考情報。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub allowed: bool,
    pub message: String,
    pub tier: Option<QuotaTier>,
    pub matched_by: Option<String>,
    pub current_usage: f64,
    /// None は無制限。
    pub limit: Option<f64>,
    pub percentage: f64,
    pub remaining: Option<f64>,
    pub warning_level: WarningLevel,
}

impl CheckResult {
    pub fn unrestricted() -> Self {
        Self {
            allowed: true,
            message: "no quota configured".to_string(),
            tier: None,
            matched_by: None,
            current_usage: 0.0,
            limit: None,
            percentage: 0.0,
            remaining: None,
            warning_level: WarningLevel::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_percentage() {
        assert_eq!(WarningLevel::for_percentage(2.0, 80), WarningLevel::None);
        assert_eq!(WarningLevel::for_percentage(79.99, 80), WarningLevel::None);
        assert_eq!(WarningLevel::for_percentage(80.0, 80), WarningLevel::Threshold(80));
        assert_eq!(WarningLevel::for_percentage(85.0, 80), WarningLevel::Threshold(80));
        assert_eq!(WarningLevel::for_percentage(90.0, 80), WarningLevel::Threshold(90));
        assert_eq!(WarningLevel::for_percentage(150.0, 80), WarningLevel::Threshold(90));
        assert_eq!(WarningLevel::for_percentage(72.0, 70), WarningLevel::Threshold(70));
    }

    #[test]
    fn test_serialize_as_label() {
        assert_eq!(serde_json::to_value(WarningLevel::None).unwrap(), "none");
        assert_eq!(serde_json::to_value(WarningLevel::Threshold(80)).unwrap(), "80%");
        let back: WarningLevel = serde_json::from_str("\"90%\"").unwrap();
        assert_eq!(back, WarningLevel::Threshold(90));
        assert!(serde_json::from_str::<WarningLevel>("\"high\"").is_err());
    }

    #[test]
    fn test_unrestricted() {
        let r = CheckResult::unrestricted();
        assert!(r.allowed);
        assert_eq!(r.message, "no quota configured");
        assert_eq!(r.percentage, 0.0);
        assert!(r.warning_level.is_none());
    }
}
