use regex::Regex;

use crate::domain::entity::quota_assignment::QuotaAssignment;

/// DomainPattern は email_domain アサインメントのパターンをコンパイルしたもの。
///
/// 書式:
/// - `university.edu` 完全一致
/// - `*.university.edu` サブドメイン、またはベースドメインそのもの
/// - `regex:^(cs|eng)\.university\.edu$` ドメイン全体にアンカーした正規表現
/// - `a.edu,b.edu` いずれかに一致（各要素は再帰的に解釈する）
#[derive(Debug, Clone)]
pub enum DomainPattern {
    Exact(String),
    Wildcard(String),
    Regex(Regex),
    AnyOf(Vec<DomainPattern>),
}

impl DomainPattern {
    pub fn parse(pattern: &str) -> Result<Self, regex::Error> {
        let pattern = pattern.trim();
        // regex: を先に判定する（量指定子 {1,3} のカンマで分割しないため）
        if let Some(expr) = pattern.strip_prefix("regex:") {
            let anchored = format!("^(?:{})$", expr);
            return Regex::new(&anchored).map(DomainPattern::Regex);
        }
        if pattern.contains(',') {
            let parts = pattern
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(DomainPattern::parse)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(DomainPattern::AnyOf(parts));
        }
        if let Some(base) = pattern.strip_prefix("*.") {
            return Ok(DomainPattern::Wildcard(base.to_ascii_lowercase()));
        }
        Ok(DomainPattern::Exact(pattern.to_ascii_lowercase()))
    }

    /// `domain` は小文字化済みであること。
    pub fn matches(&self, domain: &str) -> bool {
        match self {
            DomainPattern::Exact(expected) => domain == expected,
            DomainPattern::Wildcard(base) => {
                domain == base
                    || (domain.len() > base.len()
                        && domain.ends_with(base.as_str())
                        && domain.as_bytes()[domain.len() - base.len() - 1] == b'.')
            }
            DomainPattern::Regex(re) => re.is_match(domain),
            DomainPattern::AnyOf(patterns) => patterns.iter().any(|p| p.matches(domain)),
        }
    }
}

/// DomainRule は email_domain アサインメントとコンパイル済みパターンの組。
/// パターンが不正な場合は `pattern` が None になり、どのドメインにも一致しない。
#[derive(Debug, Clone)]
pub struct DomainRule {
    pub assignment: QuotaAssignment,
    pattern: Option<DomainPattern>,
}

impl DomainRule {
    pub fn compile(assignment: QuotaAssignment) -> Self {
        let pattern = match assignment.selector.email_domain_pattern() {
            Some(raw) => match DomainPattern::parse(raw) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(
                        assignment_id = %assignment.id,
                        pattern = %raw,
                        error = %e,
                        "invalid email domain pattern, treating as non-match"
                    );
                    None
                }
            },
            None => None,
        };
        Self {
            assignment,
            pattern,
        }
    }

    pub fn matches(&self, domain: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.matches(domain))
    }
}
