//! インメモリのリポジトリ実装。PostgreSQL 実装と同じセカンダリインデックスを
//! HashMap / BTreeSet で保持し、検索はすべてインデックス経由で行う。
use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::entity::quota_assignment::{sort_by_priority_desc, AssignmentType, QuotaAssignment};
use crate::domain::entity::quota_event::{QuotaEvent, QuotaEventType};
use crate::domain::entity::quota_override::QuotaOverride;
use crate::domain::entity::quota_tier::QuotaTier;
use crate::domain::repository::{
    QuotaAssignmentRepository, QuotaEventRepository, QuotaOverrideRepository, QuotaTierRepository,
};

/// monthly_limit の全順序キー。
#[derive(Debug, Clone, Copy, PartialEq)]
struct LimitKey(f64);

impl Eq for LimitKey {}

impl PartialOrd for LimitKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LimitKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

type TierKey = (LimitKey, String);

#[derive(Default)]
struct TierIndexes {
    by_id: HashMap<String, QuotaTier>,
    by_limit: BTreeSet<TierKey>,
    enabled_by_limit: BTreeSet<TierKey>,
}

impl TierIndexes {
    fn key(tier: &QuotaTier) -> TierKey {
        (LimitKey(tier.monthly_limit), tier.id.clone())
    }

    fn index(&mut self, tier: &QuotaTier) {
        let key = Self::key(tier);
        if tier.enabled {
            self.enabled_by_limit.insert(key.clone());
        }
        self.by_limit.insert(key);
    }

    fn unindex(&mut self, tier: &QuotaTier) {
        let key = Self::key(tier);
        self.enabled_by_limit.remove(&key);
        self.by_limit.remove(&key);
    }
}

/// InMemoryQuotaTierRepository はインメモリのティアリポジトリ。
/// 一覧は (monthly_limit, id) の順序付きインデックスから返す。
#[derive(Default)]
pub struct InMemoryQuotaTierRepository {
    inner: RwLock<TierIndexes>,
}

impl InMemoryQuotaTierRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaTierRepository for InMemoryQuotaTierRepository {
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<QuotaTier>> {
        let inner = self.inner.read().await;
        Ok(inner.by_id.get(id).cloned())
    }

    async fn list(&self, enabled_only: bool) -> anyhow::Result<Vec<QuotaTier>> {
        let inner = self.inner.read().await;
        let index = if enabled_only {
            &inner.enabled_by_limit
        } else {
            &inner.by_limit
        };
        Ok(index
            .iter()
            .filter_map(|(_, id)| inner.by_id.get(id).cloned())
            .collect())
    }

    async fn create(&self, tier: &QuotaTier) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        if inner.by_id.contains_key(&tier.id) {
            anyhow::bail!("quota tier already exists: {}", tier.id);
        }
        inner.index(tier);
        inner.by_id.insert(tier.id.clone(), tier.clone());
        Ok(())
    }

    async fn update(&self, tier: &QuotaTier) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        let Some(existing) = inner.by_id.remove(&tier.id) else {
            anyhow::bail!("quota tier not found: {}", tier.id);
        };
        inner.unindex(&existing);
        inner.index(tier);
        inner.by_id.insert(tier.id.clone(), tier.clone());
        Ok(())
    }
}

#[derive(Default)]
struct AssignmentIndexes {
    by_id: HashMap<String, QuotaAssignment>,
    by_user: HashMap<String, Vec<String>>,
    by_role: HashMap<String, Vec<String>>,
    by_type: HashMap<AssignmentType, Vec<String>>,
}

impl AssignmentIndexes {
    fn collect(&self, ids: Option<&Vec<String>>) -> Vec<QuotaAssignment> {
        let mut found: Vec<QuotaAssignment> = ids
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect();
        sort_by_priority_desc(&mut found);
        found
    }
}

/// InMemoryQuotaAssignmentRepository は user_id / role / assignment_type の
/// 各インデックスを保持するアサインメントリポジトリ。
#[derive(Default)]
pub struct InMemoryQuotaAssignmentRepository {
    inner: RwLock<AssignmentIndexes>,
}

impl InMemoryQuotaAssignmentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaAssignmentRepository for InMemoryQuotaAssignmentRepository {
    async fn find_for_user(&self, user_id: &str) -> anyhow::Result<Option<QuotaAssignment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .collect(inner.by_user.get(user_id))
            .into_iter()
            .find(|a| a.enabled))
    }

    async fn find_for_role(&self, role: &str) -> anyhow::Result<Vec<QuotaAssignment>> {
        let inner = self.inner.read().await;
        let mut found = inner.collect(inner.by_role.get(role));
        found.retain(|a| a.enabled);
        Ok(found)
    }

    async fn find_by_type(
        &self,
        assignment_type: AssignmentType,
        enabled_only: bool,
    ) -> anyhow::Result<Vec<QuotaAssignment>> {
        let inner = self.inner.read().await;
        let mut found = inner.collect(inner.by_type.get(&assignment_type));
        if enabled_only {
            found.retain(|a| a.enabled);
        }
        Ok(found)
    }

    async fn create(&self, assignment: &QuotaAssignment) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        if inner.by_id.contains_key(&assignment.id) {
            anyhow::bail!("quota assignment already exists: {}", assignment.id);
        }
        let id = assignment.id.clone();
        if let Some(user_id) = assignment.selector.user_id() {
            inner.by_user.entry(user_id.to_string()).or_default().push(id.clone());
        }
        if let Some(role) = assignment.selector.role() {
            inner.by_role.entry(role.to_string()).or_default().push(id.clone());
        }
        inner
            .by_type
            .entry(assignment.assignment_type())
            .or_default()
            .push(id.clone());
        inner.by_id.insert(id, assignment.clone());
        Ok(())
    }

    async fn disable(&self, id: &str) -> anyhow::Result<Option<QuotaAssignment>> {
        let mut inner = self.inner.write().await;
        match inner.by_id.get_mut(id) {
            Some(assignment) if assignment.enabled => {
                assignment.enabled = false;
                assignment.updated_at = Utc::now();
                Ok(Some(assignment.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[derive(Default)]
struct OverrideIndexes {
    by_id: HashMap<String, QuotaOverride>,
    by_user: HashMap<String, Vec<String>>,
}

/// InMemoryQuotaOverrideRepository は user_id インデックスを持つオーバーライドリポジトリ。
#[derive(Default)]
pub struct InMemoryQuotaOverrideRepository {
    inner: RwLock<OverrideIndexes>,
}

impl InMemoryQuotaOverrideRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaOverrideRepository for InMemoryQuotaOverrideRepository {
    async fn find_active(&self, user_id: &str, now: DateTime<Utc>) -> anyhow::Result<Option<QuotaOverride>> {
        let inner = self.inner.read().await;
        let latest = inner
            .by_user
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|o| o.is_active(now))
            .max_by_key(|o| o.valid_until);
        Ok(latest.cloned())
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<QuotaOverride>> {
        let inner = self.inner.read().await;
        Ok(inner.by_id.get(id).cloned())
    }

    async fn create(&self, quota_override: &QuotaOverride) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        if inner.by_id.contains_key(&quota_override.id) {
            anyhow::bail!("quota override already exists: {}", quota_override.id);
        }
        inner
            .by_user
            .entry(quota_override.user_id.clone())
            .or_default()
            .push(quota_override.id.clone());
        inner
            .by_id
            .insert(quota_override.id.clone(), quota_override.clone());
        Ok(())
    }

    async fn disable(&self, id: &str) -> anyhow::Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.by_id.get_mut(id) {
            Some(o) if o.enabled => {
                o.enabled = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// 時刻キー。同時刻のイベントは挿入順で並べる。
type TimeKey = (DateTime<Utc>, usize);

#[derive(Default)]
struct EventIndexes {
    events: Vec<QuotaEvent>,
    by_user: HashMap<String, BTreeSet<TimeKey>>,
    by_tier: HashMap<String, BTreeSet<TimeKey>>,
}

impl EventIndexes {
    fn newest_first(&self, keys: Option<&BTreeSet<TimeKey>>, limit: u32) -> Vec<QuotaEvent> {
        keys.into_iter()
            .flat_map(|set| set.iter().rev())
            .take(limit as usize)
            .map(|(_, idx)| self.events[*idx].clone())
            .collect()
    }
}

/// InMemoryQuotaEventRepository は追記専用のイベントストア。
/// (user_id, timestamp) と (tier_id, timestamp) の範囲インデックスを持つ。
#[derive(Default)]
pub struct InMemoryQuotaEventRepository {
    inner: RwLock<EventIndexes>,
}

impl InMemoryQuotaEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.events.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl QuotaEventRepository for InMemoryQuotaEventRepository {
    async fn record(&self, event: &QuotaEvent) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        let idx = inner.events.len();
        let key = (event.timestamp, idx);
        inner.events.push(event.clone());
        inner.by_user.entry(event.user_id.clone()).or_default().insert(key);
        inner.by_tier.entry(event.tier_id.clone()).or_default().insert(key);
        Ok(())
    }

    async fn find_recent(
        &self,
        user_id: &str,
        event_type: QuotaEventType,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Option<QuotaEvent>> {
        let inner = self.inner.read().await;
        let found = inner.by_user.get(user_id).and_then(|keys| {
            keys.range((since, 0)..)
                .rev()
                .map(|(_, idx)| &inner.events[*idx])
                .find(|e| e.event_type == event_type)
        });
        Ok(found.cloned())
    }

    async fn find_by_user(&self, user_id: &str, limit: u32) -> anyhow::Result<Vec<QuotaEvent>> {
        let inner = self.inner.read().await;
        Ok(inner.newest_first(inner.by_user.get(user_id), limit))
    }

    async fn find_by_tier(&self, tier_id: &str, limit: u32) -> anyhow::Result<Vec<QuotaEvent>> {
        let inner = self.inner.read().await;
        Ok(inner.newest_first(inner.by_tier.get(tier_id), limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::check_result::WarningLevel;
    use crate::domain::entity::quota_assignment::AssignmentSelector;
    use crate::domain::entity::quota_event::QuotaEventMetadata;
    use crate::domain::entity::quota_override::OverrideKind;
    use crate::domain::entity::quota_tier::{ActionOnLimit, PeriodType};
    use chrono::Duration;

    fn role_assignment(role: &str, tier_id: &str, priority: i32) -> QuotaAssignment {
        QuotaAssignment::new(
            tier_id.to_string(),
            AssignmentSelector::JwtRole {
                role: role.to_string(),
            },
            priority,
        )
    }

    #[tokio::test]
    async fn test_tier_create_update_list() {
        let repo = InMemoryQuotaTierRepository::new();
        let mut basic = QuotaTier::new(
            "basic".to_string(),
            "Basic".to_string(),
            50.0,
            None,
            PeriodType::Monthly,
            80,
            ActionOnLimit::Block,
        );
        repo.create(&basic).await.unwrap();
        assert!(repo.create(&basic).await.is_err());

        basic.enabled = false;
        repo.update(&basic).await.unwrap();
        assert!(repo.list(true).await.unwrap().is_empty());
        assert_eq!(repo.list(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_tier_list_follows_limit_index_after_update() {
        let repo = InMemoryQuotaTierRepository::new();
        let tier = |id: &str, limit: f64| {
            QuotaTier::new(
                id.to_string(),
                id.to_string(),
                limit,
                None,
                PeriodType::Monthly,
                80,
                ActionOnLimit::Block,
            )
        };
        repo.create(&tier("premium", 500.0)).await.unwrap();
        repo.create(&tier("basic", 50.0)).await.unwrap();
        repo.create(&tier("alpha", 50.0)).await.unwrap();

        let ids = |tiers: Vec<QuotaTier>| tiers.into_iter().map(|t| t.id).collect::<Vec<_>>();
        assert_eq!(ids(repo.list(false).await.unwrap()), vec!["alpha", "basic", "premium"]);

        repo.update(&tier("basic", 1000.0)).await.unwrap();
        let mut alpha = tier("alpha", 50.0);
        alpha.enabled = false;
        repo.update(&alpha).await.unwrap();

        assert_eq!(ids(repo.list(false).await.unwrap()), vec!["alpha", "premium", "basic"]);
        assert_eq!(ids(repo.list(true).await.unwrap()), vec!["premium", "basic"]);
    }

    #[tokio::test]
    async fn test_disabled_assignment_leaves_indexes() {
        let repo = InMemoryQuotaAssignmentRepository::new();
        let high = role_assignment("Faculty", "premium", 200);
        repo.create(&high).await.unwrap();
        repo.create(&role_assignment("Faculty", "basic", 10)).await.unwrap();

        let disabled = repo.disable(&high.id).await.unwrap().unwrap();
        assert!(!disabled.enabled);
        assert!(repo.disable(&high.id).await.unwrap().is_none());
        assert!(repo.disable("qa_missing").await.unwrap().is_none());

        let found = repo.find_for_role("Faculty").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tier_id, "basic");
        let by_type = repo.find_by_type(AssignmentType::JwtRole, false).await.unwrap();
        assert_eq!(by_type.len(), 2);
    }

    #[tokio::test]
    async fn test_role_index_sorted_by_priority() {
        let repo = InMemoryQuotaAssignmentRepository::new();
        repo.create(&role_assignment("Faculty", "basic", 10)).await.unwrap();
        repo.create(&role_assignment("Faculty", "premium", 200)).await.unwrap();
        repo.create(&role_assignment("Student", "student", 50)).await.unwrap();

        let found = repo.find_for_role("Faculty").await.unwrap();
        let tiers: Vec<&str> = found.iter().map(|a| a.tier_id.as_str()).collect();
        assert_eq!(tiers, vec!["premium", "basic"]);
        assert!(repo.find_for_role("Staff").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_type_index_respects_enabled_filter() {
        let repo = InMemoryQuotaAssignmentRepository::new();
        let mut disabled = QuotaAssignment::new("old".to_string(), AssignmentSelector::DefaultTier, 500);
        disabled.enabled = false;
        repo.create(&disabled).await.unwrap();
        repo.create(&QuotaAssignment::new("basic".to_string(), AssignmentSelector::DefaultTier, 100))
            .await
            .unwrap();

        let enabled = repo.find_by_type(AssignmentType::DefaultTier, true).await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].tier_id, "basic");
        let all = repo.find_by_type(AssignmentType::DefaultTier, false).await.unwrap();
        assert_eq!(all[0].tier_id, "old");
    }

    #[tokio::test]
    async fn test_override_latest_and_disable() {
        let repo = InMemoryQuotaOverrideRepository::new();
        let now = Utc::now();
        let short = QuotaOverride::new(
            "user-1".to_string(),
            OverrideKind::Unlimited,
            now,
            now + Duration::days(1),
            "short".to_string(),
            "admin".to_string(),
        );
        let long = QuotaOverride::new(
            "user-1".to_string(),
            OverrideKind::Unlimited,
            now,
            now + Duration::days(30),
            "long".to_string(),
            "admin".to_string(),
        );
        repo.create(&short).await.unwrap();
        repo.create(&long).await.unwrap();

        assert_eq!(repo.find_active("user-1", now).await.unwrap().unwrap().id, long.id);
        assert!(repo.disable(&long.id).await.unwrap());
        assert!(!repo.disable(&long.id).await.unwrap());
        assert_eq!(repo.find_active("user-1", now).await.unwrap().unwrap().id, short.id);
        assert!(repo.find_active("user-2", now).await.unwrap().is_none());
        assert!(repo
            .find_active("user-1", now + Duration::days(2))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_scheduled_override_does_not_hide_current_one() {
        let repo = InMemoryQuotaOverrideRepository::new();
        let now = Utc::now();
        let current = QuotaOverride::new(
            "user-1".to_string(),
            OverrideKind::Unlimited,
            now - Duration::hours(1),
            now + Duration::days(1),
            "current".to_string(),
            "admin".to_string(),
        );
        let scheduled = QuotaOverride::new(
            "user-1".to_string(),
            OverrideKind::Unlimited,
            now + Duration::days(7),
            now + Duration::days(14),
            "scheduled".to_string(),
            "admin".to_string(),
        );
        repo.create(&current).await.unwrap();
        repo.create(&scheduled).await.unwrap();

        assert_eq!(repo.find_active("user-1", now).await.unwrap().unwrap().id, current.id);
        assert_eq!(
            repo.find_active("user-1", now + Duration::days(8))
                .await
                .unwrap()
                .unwrap()
                .id,
            scheduled.id
        );
    }

    #[tokio::test]
    async fn test_event_range_query() {
        let repo = InMemoryQuotaEventRepository::new();
        let t0 = Utc::now();
        let warning = |at| {
            QuotaEvent::new(
                "user-1",
                "basic",
                42.5,
                Some(50.0),
                85.0,
                at,
                QuotaEventMetadata::Warning {
                    threshold: WarningLevel::Threshold(80),
                },
            )
        };
        repo.record(&warning(t0 - Duration::minutes(90))).await.unwrap();
        repo.record(&warning(t0 - Duration::minutes(10))).await.unwrap();

        let recent = repo
            .find_recent("user-1", QuotaEventType::Warning, t0 - Duration::minutes(60))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recent.timestamp, t0 - Duration::minutes(10));

        assert!(repo
            .find_recent("user-1", QuotaEventType::Block, t0 - Duration::minutes(60))
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .find_recent("user-1", QuotaEventType::Warning, t0 - Duration::minutes(5))
            .await
            .unwrap()
            .is_none());

        let by_user = repo.find_by_user("user-1", 10).await.unwrap();
        assert_eq!(by_user.len(), 2);
        assert!(by_user[0].timestamp > by_user[1].timestamp);
        assert_eq!(repo.find_by_tier("basic", 1).await.unwrap().len(), 1);
        assert_eq!(repo.len().await, 2);
    }
}
