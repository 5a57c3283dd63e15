use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Principal は上流で認証済みの利用者。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            roles: Vec::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// メールアドレスのドメイン部を小文字で返す。
    pub fn email_domain(&self) -> Option<String> {
        let email = self.email.as_deref()?.trim();
        let (_, domain) = email.rsplit_once('@')?;
        if domain.is_empty() {
            return None;
        }
        Some(domain.to_ascii_lowercase())
    }

    /// ロール集合のハッシュ。順序・重複に依存しない。
    pub fn roles_hash(&self) -> u64 {
        let normalized: BTreeSet<&str> = self.roles.iter().map(String::as_str).collect();
        let mut hasher = DefaultHasher::new();
        normalized.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_domain() {
        let p = Principal::new("u1").with_email("Alice@CS.University.edu");
        assert_eq!(p.email_domain(), Some("cs.university.edu".to_string()));
        assert_eq!(Principal::new("u1").email_domain(), None);
        assert_eq!(Principal::new("u1").with_email("no-at-sign").email_domain(), None);
        assert_eq!(Principal::new("u1").with_email("trailing@").email_domain(), None);
    }

    #[test]
    fn test_roles_hash_ignores_order_and_duplicates() {
        let a = Principal::new("u1").with_roles(["Faculty", "Staff"]);
        let b = Principal::new("u1").with_roles(["Staff", "Faculty", "Staff"]);
        let c = Principal::new("u1").with_roles(["Student"]);
        assert_eq!(a.roles_hash(), b.roles_hash());
        assert_ne!(a.roles_hash(), c.roles_hash());
    }

    #[test]
    fn test_deserialize_defaults() {
        let p: Principal = serde_json::from_str(r#"{"user_id":"u1"}"#).unwrap();
        assert_eq!(p.user_id, "u1");
        assert!(p.roles.is_empty());
        assert!(p.email.is_none());
    }
}
