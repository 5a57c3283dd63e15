use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::ValidationError;
use crate::domain::service::domain_pattern::DomainPattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    DirectUser,
    JwtRole,
    EmailDomain,
    DefaultTier,
}

impl AssignmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentType::DirectUser => "direct_user",
            AssignmentType::JwtRole => "jwt_role",
            AssignmentType::EmailDomain => "email_domain",
            AssignmentType::DefaultTier => "default_tier",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "direct_user" => Some(AssignmentType::DirectUser),
            "jwt_role" => Some(AssignmentType::JwtRole),
            "email_domain" => Some(AssignmentType::EmailDomain),
            "default_tier" => Some(AssignmentType::DefaultTier),
            _ => None,
        }
    }
}

/// AssignmentSelector はアサインメントの適用条件。
/// バリアントごとに必須フィールドを持つため、種別とセレクタの不一致は表現できない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "assignment_type", rename_all = "snake_case")]
pub enum AssignmentSelector {
    DirectUser { user_id: String },
    JwtRole { role: String },
    EmailDomain { email_domain_pattern: String },
    DefaultTier,
}

impl AssignmentSelector {
    pub fn assignment_type(&self) -> AssignmentType {
        match self {
            AssignmentSelector::DirectUser { .. } => AssignmentType::DirectUser,
            AssignmentSelector::JwtRole { .. } => AssignmentType::JwtRole,
            AssignmentSelector::EmailDomain { .. } => AssignmentType::EmailDomain,
            AssignmentSelector::DefaultTier => AssignmentType::DefaultTier,
        }
    }

    /// 文字列の種別と任意のセレクタ列から組み立てる（DB 行や API 入力向け）。
    /// 種別に対応するフィールドだけが設定されていなければならない。
    pub fn from_parts(
        assignment_type: &str,
        user_id: Option<String>,
        role: Option<String>,
        email_domain_pattern: Option<String>,
    ) -> Result<Self, ValidationError> {
        let kind = AssignmentType::from_str(assignment_type).ok_or_else(|| {
            ValidationError::UnknownVariant {
                field: "assignment_type",
                allowed: "direct_user, jwt_role, email_domain, default_tier",
                value: assignment_type.to_string(),
            }
        })?;
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let (user_id, role, pattern) = (non_empty(user_id), non_empty(role), non_empty(email_domain_pattern));

        let mismatch = |expected: &'static str| ValidationError::SelectorMismatch {
            assignment_type: kind.as_str(),
            expected,
        };

        match (kind, user_id, role, pattern) {
            (AssignmentType::DirectUser, Some(user_id), None, None) => {
                Ok(AssignmentSelector::DirectUser { user_id })
            }
            (AssignmentType::JwtRole, None, Some(role), None) => Ok(AssignmentSelector::JwtRole { role }),
            (AssignmentType::EmailDomain, None, None, Some(email_domain_pattern)) => {
                Ok(AssignmentSelector::EmailDomain { email_domain_pattern })
            }
            (AssignmentType::DefaultTier, None, None, None) => Ok(AssignmentSelector::DefaultTier),
            (AssignmentType::DirectUser, ..) => Err(mismatch("user_id")),
            (AssignmentType::JwtRole, ..) => Err(mismatch("role")),
            (AssignmentType::EmailDomain, ..) => Err(mismatch("email_domain_pattern")),
            (AssignmentType::DefaultTier, ..) => Err(mismatch("no")),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            AssignmentSelector::DirectUser { user_id } => Some(user_id),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<&str> {
        match self {
            AssignmentSelector::JwtRole { role } => Some(role),
            _ => None,
        }
    }

    pub fn email_domain_pattern(&self) -> Option<&str> {
        match self {
            AssignmentSelector::EmailDomain { email_domain_pattern } => Some(email_domain_pattern),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaAssignment {
    pub id: String,
    pub tier_id: String,
    #[serde(flatten)]
    pub selector: AssignmentSelector,
    pub priority: i32,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuotaAssignment {
    pub fn new(tier_id: String, selector: AssignmentSelector, priority: i32) -> Self {
        let now = Utc::now();
        Self {
            id: format!("asg_{}", uuid::Uuid::new_v4().simple()),
            tier_id,
            selector,
            priority,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn assignment_type(&self) -> AssignmentType {
        self.selector.assignment_type()
    }

    /// `matched_by` に記録する説明文字列（例: `jwt_role:Faculty`）。
    pub fn describe(&self) -> String {
        match &self.selector {
            AssignmentSelector::DirectUser { user_id } => format!("direct_user:{}", user_id),
            AssignmentSelector::JwtRole { role } => format!("jwt_role:{}", role),
            AssignmentSelector::EmailDomain { email_domain_pattern } => {
                format!("email_domain:{}", email_domain_pattern)
            }
            AssignmentSelector::DefaultTier => "default_tier".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tier_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("tier_id"));
        }
        if let AssignmentSelector::EmailDomain { email_domain_pattern } = &self.selector {
            DomainPattern::parse(email_domain_pattern).map_err(|e| {
                ValidationError::InvalidDomainPattern {
                    pattern: email_domain_pattern.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(())
    }
}

/// 優先度の降順に並べる。同一優先度は元の順序を保つ。
pub fn sort_by_priority_desc(assignments: &mut [QuotaAssignment]) {
    assignments.sort_by(|a, b| b.priority.cmp(&a.priority));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_type_roundtrip() {
        for t in [
            AssignmentType::DirectUser,
            AssignmentType::JwtRole,
            AssignmentType::EmailDomain,
            AssignmentType::DefaultTier,
        ] {
            assert_eq!(AssignmentType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(AssignmentType::from_str("group"), None);
    }

    #[test]
    fn test_from_parts_matching_selector() {
        let sel = AssignmentSelector::from_parts("jwt_role", None, Some("Faculty".to_string()), None).unwrap();
        assert_eq!(sel, AssignmentSelector::JwtRole { role: "Faculty".to_string() });

        let sel = AssignmentSelector::from_parts("default_tier", None, None, None).unwrap();
        assert_eq!(sel, AssignmentSelector::DefaultTier);
    }

    #[test]
    fn test_from_parts_mismatch() {
        let err = AssignmentSelector::from_parts("direct_user", None, Some("Faculty".to_string()), None)
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::SelectorMismatch { assignment_type: "direct_user", expected: "user_id" }
        ));

        let err = AssignmentSelector::from_parts("default_tier", Some("u1".to_string()), None, None)
            .unwrap_err();
        assert!(matches!(err, ValidationError::SelectorMismatch { .. }));
    }

    #[test]
    fn test_from_parts_blank_selector_is_missing() {
        let err = AssignmentSelector::from_parts("jwt_role", None, Some("  ".to_string()), None).unwrap_err();
        assert!(matches!(err, ValidationError::SelectorMismatch { .. }));
    }

    #[test]
    fn test_from_parts_unknown_type() {
        let err = AssignmentSelector::from_parts("group", None, None, None).unwrap_err();
        assert!(err.to_string().contains("assignment_type"));
    }

    #[test]
    fn test_serialize_flattens_selector() {
        let a = QuotaAssignment::new(
            "premium".to_string(),
            AssignmentSelector::JwtRole { role: "Faculty".to_string() },
            200,
        );
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["assignment_type"], "jwt_role");
        assert_eq!(json["role"], "Faculty");
        assert_eq!(json["priority"], 200);
        assert!(json.get("user_id").is_none());

        let back: QuotaAssignment = serde_json::from_value(json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_describe() {
        let a = QuotaAssignment::new(
            "premium".to_string(),
            AssignmentSelector::JwtRole { role: "Faculty".to_string() },
            200,
        );
        assert_eq!(a.describe(), "jwt_role:Faculty");
        let d = QuotaAssignment::new("basic".to_string(), AssignmentSelector::DefaultTier, 100);
        assert_eq!(d.describe(), "default_tier");
    }

    #[test]
    fn test_validate_rejects_bad_regex() {
        let a = QuotaAssignment::new(
            "edu".to_string(),
            AssignmentSelector::EmailDomain { email_domain_pattern: "regex:([a-z".to_string() },
            10,
        );
        assert!(matches!(a.validate(), Err(ValidationError::InvalidDomainPattern { .. })));
    }

    #[test]
    fn test_sort_by_priority_desc_is_stable() {
        let mut list = vec![
            QuotaAssignment::new("a".to_string(), AssignmentSelector::DefaultTier, 10),
            QuotaAssignment::new("b".to_string(), AssignmentSelector::DefaultTier, 300),
            QuotaAssignment::new("c".to_string(), AssignmentSelector::DefaultTier, 10),
        ];
        sort_by_priority_desc(&mut list);
        let ids: Vec<&str> = list.iter().map(|a| a.tier_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
