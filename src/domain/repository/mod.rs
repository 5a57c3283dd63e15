pub mod quota_assignment_repository;
pub mod quota_event_repository;
pub mod quota_override_repository;
pub mod quota_tier_repository;
pub mod usage_provider;

pub use quota_assignment_repository::QuotaAssignmentRepository;
pub use quota_event_repository::QuotaEventRepository;
pub use quota_override_repository::QuotaOverrideRepository;
pub use quota_tier_repository::QuotaTierRepository;
pub use usage_provider::{UsageProvider, UsageSummary};
