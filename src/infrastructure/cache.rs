//! QuotaCache はリゾルバーの解決結果のインメモリキャッシュ。
//! moka::future::Cache を使用し、TTL 付きで解決結果と email_domain ルールをキャッシュする。
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::entity::principal::Principal;
use crate::domain::entity::resolved_quota::ResolvedQuota;
use crate::domain::service::domain_pattern::DomainRule;

const DOMAIN_RULES_KEY: &str = "email_domain_rules";

/// 解決結果のキャッシュキーは "user_id:roles_hash" 形式の文字列。
/// ロールが変わるとキーも変わるため、明示的な削除なしに古いエントリは参照されなくなる。
pub struct QuotaCache {
    resolved: Cache<String, Arc<Option<ResolvedQuota>>>,
    domain_rules: Cache<&'static str, Arc<Vec<DomainRule>>>,
}

impl QuotaCache {
    /// 新しい QuotaCache を作成する。
    ///
    /// # Arguments
    /// * `max_capacity` - キャッシュに保持する最大エントリ数
    /// * `ttl` - エントリの有効期間
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let resolved = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        let domain_rules = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self {
            resolved,
            domain_rules,
        }
    }

    pub fn cache_key(user_id: &str, roles_hash: u64) -> String {
        format!("{}:{:016x}", user_id, roles_hash)
    }

    /// 外側の None はキャッシュミス、内側の None は「該当ティアなし」のキャッシュ済み結果。
    pub async fn get(&self, principal: &Principal) -> Option<Arc<Option<ResolvedQuota>>> {
        let key = Self::cache_key(&principal.user_id, principal.roles_hash());
        self.resolved.get(&key).await
    }

    /// 後勝ちで上書きする。
    pub async fn insert(&self, principal: &Principal, resolved: Option<ResolvedQuota>) {
        let key = Self::cache_key(&principal.user_id, principal.roles_hash());
        self.resolved.insert(key, Arc::new(resolved)).await;
    }

    pub async fn get_domain_rules(&self) -> Option<Arc<Vec<DomainRule>>> {
        self.domain_rules.get(&DOMAIN_RULES_KEY).await
    }

    pub async fn insert_domain_rules(&self, rules: Vec<DomainRule>) -> Arc<Vec<DomainRule>> {
        let rules = Arc::new(rules);
        self.domain_rules.insert(DOMAIN_RULES_KEY, rules.clone()).await;
        rules
    }

    /// 指定ユーザーのすべてのエントリ（全ロールハッシュ分）を削除する。
    /// `user_id:` で始まるキーを収集してから個別に invalidate する。
    pub async fn invalidate(&self, user_id: &str) {
        let prefix = format!("{}:", user_id);
        let keys_to_remove: Vec<String> = self
            .resolved
            .iter()
            .filter(|(k, _v)| k.starts_with(&prefix))
            .map(|(k, _v)| k.as_ref().clone())
            .collect();

        for key in keys_to_remove {
            self.resolved.invalidate(&key).await;
        }
    }

    /// 解決結果と email_domain ルールの両方を破棄する。
    pub async fn invalidate_all(&self) {
        self.resolved.invalidate_all();
        self.domain_rules.invalidate_all();
        self.resolved.run_pending_tasks().await;
        self.domain_rules.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::quota_assignment::{AssignmentSelector, QuotaAssignment};
    use crate::domain::entity::quota_tier::{ActionOnLimit, PeriodType, QuotaTier};

    fn make_resolved(user_id: &str) -> ResolvedQuota {
        let tier = QuotaTier::new(
            "basic".to_string(),
            "Basic".to_string(),
            50.0,
            None,
            PeriodType::Monthly,
            80,
            ActionOnLimit::Block,
        );
        let assignment = QuotaAssignment::new("basic".to_string(), AssignmentSelector::DefaultTier, 100);
        ResolvedQuota::from_assignment(user_id, tier, assignment)
    }

    fn make_cache() -> QuotaCache {
        QuotaCache::new(100, Duration::from_secs(60))
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(QuotaCache::cache_key("user-1", 0xabc), "user-1:0000000000000abc");
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = make_cache();
        let p = Principal::new("user-1").with_roles(["Faculty"]);
        cache.insert(&p, Some(make_resolved("user-1"))).await;

        let hit = cache.get(&p).await.unwrap();
        assert_eq!(hit.as_ref().as_ref().unwrap().matched_by, "default_tier");
    }

    #[tokio::test]
    async fn test_negative_result_is_cached() {
        let cache = make_cache();
        let p = Principal::new("user-1");
        cache.insert(&p, None).await;

        let hit = cache.get(&p).await;
        assert!(hit.is_some());
        assert!(hit.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_role_change_misses() {
        let cache = make_cache();
        let faculty = Principal::new("user-1").with_roles(["Faculty"]);
        cache.insert(&faculty, Some(make_resolved("user-1"))).await;

        let student = Principal::new("user-1").with_roles(["Student"]);
        assert!(cache.get(&student).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_removes_all_role_variants_of_user() {
        let cache = make_cache();
        let a = Principal::new("user-1").with_roles(["Faculty"]);
        let b = Principal::new("user-1").with_roles(["Student"]);
        let other = Principal::new("user-2");
        cache.insert(&a, Some(make_resolved("user-1"))).await;
        cache.insert(&b, None).await;
        cache.insert(&other, Some(make_resolved("user-2"))).await;

        cache.invalidate("user-1").await;

        assert!(cache.get(&a).await.is_none());
        assert!(cache.get(&b).await.is_none());
        assert!(cache.get(&other).await.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_does_not_touch_user_with_shared_prefix() {
        let cache = make_cache();
        let user1 = Principal::new("user-1");
        let user10 = Principal::new("user-10");
        cache.insert(&user1, None).await;
        cache.insert(&user10, None).await;

        cache.invalidate("user-1").await;

        assert!(cache.get(&user1).await.is_none());
        assert!(cache.get(&user10).await.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_all_clears_domain_rules() {
        let cache = make_cache();
        let p = Principal::new("user-1");
        cache.insert(&p, None).await;
        cache.insert_domain_rules(Vec::new()).await;
        assert!(cache.get_domain_rules().await.is_some());

        cache.invalidate_all().await;

        assert!(cache.get(&p).await.is_none());
        assert!(cache.get_domain_rules().await.is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = QuotaCache::new(100, Duration::from_millis(200));
        let p = Principal::new("user-1");
        cache.insert(&p, None).await;
        assert!(cache.get(&p).await.is_some());

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(cache.get(&p).await.is_none());
    }
}
