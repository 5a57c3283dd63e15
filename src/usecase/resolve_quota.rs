use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::entity::principal::Principal;
use crate::domain::entity::quota_assignment::{sort_by_priority_desc, AssignmentType, QuotaAssignment};
use crate::domain::entity::quota_tier::QuotaTier;
use crate::domain::entity::resolved_quota::ResolvedQuota;
use crate::domain::repository::{QuotaAssignmentRepository, QuotaOverrideRepository, QuotaTierRepository};
use crate::domain::service::domain_pattern::DomainRule;
use crate::infrastructure::cache::QuotaCache;

#[derive(Debug, thiserror::Error)]
pub enum ResolveQuotaError {
    /// ストア障害は「アサインメントなし」と区別して呼び出し元へ返す。
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

fn storage_unavailable(e: anyhow::Error) -> ResolveQuotaError {
    ResolveQuotaError::StorageUnavailable(e.to_string())
}

/// ResolveQuotaUseCase はプリンシパルに適用されるティアを優先順位に従って解決する。
///
/// 1. 有効なオーバーライド
/// 2. direct_user アサインメント
/// 3. jwt_role アサインメント（全ロールをマージして優先度順）
/// 4. email_domain アサインメント
/// 5. default_tier アサインメント
///
/// 結果（該当なしを含む）は (user_id, roles_hash) 単位でキャッシュする。
pub struct ResolveQuotaUseCase {
    tier_repo: Arc<dyn QuotaTierRepository>,
    assignment_repo: Arc<dyn QuotaAssignmentRepository>,
    override_repo: Arc<dyn QuotaOverrideRepository>,
    cache: Arc<QuotaCache>,
}

impl ResolveQuotaUseCase {
    pub fn new(
        tier_repo: Arc<dyn QuotaTierRepository>,
        assignment_repo: Arc<dyn QuotaAssignmentRepository>,
        override_repo: Arc<dyn QuotaOverrideRepository>,
        cache: Arc<QuotaCache>,
    ) -> Self {
        Self {
            tier_repo,
            assignment_repo,
            override_repo,
            cache,
        }
    }

    pub async fn execute(&self, principal: &Principal) -> Result<Option<ResolvedQuota>, ResolveQuotaError> {
        self.execute_at(principal, Utc::now()).await
    }

    pub async fn execute_at(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<Option<ResolvedQuota>, ResolveQuotaError> {
        if let Some(cached) = self.cache.get(principal).await {
            debug!(user_id = %principal.user_id, "quota resolution cache hit");
            return Ok(cached.as_ref().clone());
        }
        debug!(user_id = %principal.user_id, "quota resolution cache miss");

        // エラーはキャッシュしない
        let resolved = self.resolve_uncached(principal, now).await?;
        self.cache.insert(principal, resolved.clone()).await;
        Ok(resolved)
    }

    /// 指定ユーザーのキャッシュエントリを破棄する。管理系の更新後に呼ばれる。
    pub async fn invalidate(&self, user_id: &str) {
        self.cache.invalidate(user_id).await;
    }

    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all().await;
    }

    async fn resolve_uncached(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<Option<ResolvedQuota>, ResolveQuotaError> {
        let user_id = principal.user_id.as_str();

        if let Some(ovr) = self
            .override_repo
            .find_active(user_id, now)
            .await
            .map_err(storage_unavailable)?
        {
            if ovr.is_active(now) {
                return Ok(Some(ResolvedQuota::from_override(user_id, ovr)));
            }
            debug!(user_id = %user_id, override_id = %ovr.id, "latest override is not active");
        }

        if let Some(direct) = self
            .assignment_repo
            .find_for_user(user_id)
            .await
            .map_err(storage_unavailable)?
        {
            if let Some(resolved) = self.first_with_enabled_tier(user_id, [direct]).await? {
                return Ok(Some(resolved));
            }
        }

        let mut role_matches = Vec::new();
        for role in &principal.roles {
            let found = self
                .assignment_repo
                .find_for_role(role)
                .await
                .map_err(storage_unavailable)?;
            role_matches.extend(found);
        }
        sort_by_priority_desc(&mut role_matches);
        if let Some(resolved) = self.first_with_enabled_tier(user_id, role_matches).await? {
            return Ok(Some(resolved));
        }

        if let Some(domain) = principal.email_domain() {
            let rules = self.domain_rules().await?;
            let candidates: Vec<QuotaAssignment> = rules
                .iter()
                .filter(|rule| rule.matches(&domain))
                .map(|rule| rule.assignment.clone())
                .collect();
            if let Some(resolved) = self.first_with_enabled_tier(user_id, candidates).await? {
                return Ok(Some(resolved));
            }
        }

        let defaults = self
            .assignment_repo
            .find_by_type(AssignmentType::DefaultTier, true)
            .await
            .map_err(storage_unavailable)?;
        self.first_with_enabled_tier(user_id, defaults).await
    }

    /// 優先度順の候補から、アサインメント自体とティアの両方が有効な最初のものを採用する。
    async fn first_with_enabled_tier<I>(
        &self,
        user_id: &str,
        candidates: I,
    ) -> Result<Option<ResolvedQuota>, ResolveQuotaError>
    where
        I: IntoIterator<Item = QuotaAssignment>,
    {
        for assignment in candidates {
            if !assignment.enabled {
                continue;
            }
            if let Some(tier) = self.enabled_tier(&assignment.tier_id).await? {
                return Ok(Some(ResolvedQuota::from_assignment(user_id, tier, assignment)));
            }
        }
        Ok(None)
    }

    async fn enabled_tier(&self, tier_id: &str) -> Result<Option<QuotaTier>, ResolveQuotaError> {
        let tier = self
            .tier_repo
            .find_by_id(tier_id)
            .await
            .map_err(storage_unavailable)?;
        Ok(tier.filter(|t| t.enabled))
    }

    /// email_domain ルールは単一のインデックス検索に絞れないため、全件取得して別キーでキャッシュする。
    async fn domain_rules(&self) -> Result<Arc<Vec<DomainRule>>, ResolveQuotaError> {
        if let Some(rules) = self.cache.get_domain_rules().await {
            return Ok(rules);
        }
        let mut assignments = self
            .assignment_repo
            .find_by_type(AssignmentType::EmailDomain, true)
            .await
            .map_err(storage_unavailable)?;
        sort_by_priority_desc(&mut assignments);
        let rules = assignments.into_iter().map(DomainRule::compile).collect();
        Ok(self.cache.insert_domain_rules(rules).await)
    }
}
