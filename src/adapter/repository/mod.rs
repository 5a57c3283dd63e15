pub mod quota_assignment_postgres;
pub mod quota_event_postgres;
pub mod quota_in_memory;
pub mod quota_override_postgres;
pub mod quota_tier_postgres;

pub use quota_assignment_postgres::QuotaAssignmentPostgresRepository;
pub use quota_event_postgres::QuotaEventPostgresRepository;
pub use quota_in_memory::{
    InMemoryQuotaAssignmentRepository, InMemoryQuotaEventRepository, InMemoryQuotaOverrideRepository,
    InMemoryQuotaTierRepository,
};
pub use quota_override_postgres::QuotaOverridePostgresRepository;
pub use quota_tier_postgres::QuotaTierPostgresRepository;
