pub mod check_result;
pub mod principal;
pub mod quota_assignment;
pub mod quota_event;
pub mod quota_override;
pub mod quota_tier;
pub mod resolved_quota;
pub mod validation;

pub use check_result::{CheckResult, WarningLevel};
pub use principal::Principal;
pub use quota_assignment::{AssignmentSelector, AssignmentType, QuotaAssignment};
pub use quota_event::{QuotaEvent, QuotaEventMetadata, QuotaEventType};
pub use quota_override::{OverrideKind, QuotaOverride};
pub use quota_tier::{ActionOnLimit, PeriodType, QuotaTier};
pub use resolved_quota::ResolvedQuota;
pub use validation::ValidationError;
