use serde::{Deserialize, Serialize};

use super::quota_assignment::QuotaAssignment;
use super::quota_override::QuotaOverride;
use super::quota_tier::QuotaTier;

/// ResolvedQuota はリゾルバーの出力で、チェッカーの入力。永続化しない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedQuota {
    pub user_id: String,
    pub tier: QuotaTier,
    pub matched_by: String,
    pub assignment: Option<QuotaAssignment>,
    #[serde(rename = "override")]
    pub quota_override: Option<QuotaOverride>,
}

impl ResolvedQuota {
    pub fn from_assignment(user_id: &str, tier: QuotaTier, assignment: QuotaAssignment) -> Self {
        Self {
            user_id: user_id.to_string(),
            tier,
            matched_by: assignment.describe(),
            assignment: Some(assignment),
            quota_override: None,
        }
    }

    pub fn from_override(user_id: &str, quota_override: QuotaOverride) -> Self {
        Self {
            user_id: user_id.to_string(),
            tier: quota_override.to_synthetic_tier(),
            matched_by: format!("override:{}", quota_override.kind.as_str()),
            assignment: None,
            quota_override: Some(quota_override),
        }
    }
}
