pub mod check_quota;
pub mod create_quota_assignment;
pub mod create_quota_override;
pub mod create_quota_tier;
pub mod disable_quota_assignment;
pub mod disable_quota_override;
pub mod list_quota_events;
pub mod list_quota_tiers;
pub mod record_quota_event;
pub mod reset_user_quota;
pub mod resolve_quota;
pub mod update_quota_tier;

pub use check_quota::CheckQuotaUseCase;
pub use create_quota_assignment::CreateQuotaAssignmentUseCase;
pub use create_quota_override::CreateQuotaOverrideUseCase;
pub use create_quota_tier::CreateQuotaTierUseCase;
pub use disable_quota_assignment::DisableQuotaAssignmentUseCase;
pub use disable_quota_override::DisableQuotaOverrideUseCase;
pub use list_quota_events::ListQuotaEventsUseCase;
pub use list_quota_tiers::ListQuotaTiersUseCase;
pub use record_quota_event::QuotaEventRecorder;
pub use reset_user_quota::ResetUserQuotaUseCase;
pub use resolve_quota::ResolveQuotaUseCase;
pub use update_quota_tier::UpdateQuotaTierUseCase;
