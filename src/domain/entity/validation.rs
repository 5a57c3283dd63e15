/// ValidationError は書き込み時に拒否される設定不備を表す。
/// リゾルバー・チェッカーには到達しない。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("{field} must be a positive finite number, got: {value}")]
    NonPositiveLimit { field: &'static str, value: f64 },

    #[error("daily tiers require daily_limit")]
    MissingDailyLimit,

    #[error("soft_limit_percent must be between 1 and 100, got: {0}")]
    SoftLimitOutOfRange(u8),

    #[error("valid_until ({valid_until}) must be after valid_from ({valid_from})")]
    InvalidValidityWindow {
        valid_from: String,
        valid_until: String,
    },

    #[error("invalid email domain pattern {pattern:?}: {reason}")]
    InvalidDomainPattern { pattern: String, reason: String },

    #[error("custom_limit overrides require monthly_limit")]
    MissingCustomLimit,

    #[error("{field} must be one of: {allowed}, got: {value}")]
    UnknownVariant {
        field: &'static str,
        allowed: &'static str,
        value: String,
    },

    #[error("{assignment_type} assignments require exactly the {expected} selector")]
    SelectorMismatch {
        assignment_type: &'static str,
        expected: &'static str,
    },

    #[error("tier not found: {0}")]
    UnknownTier(String),
}
