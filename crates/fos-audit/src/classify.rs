//! Security level classification

use fos_csp::directive::{DEFAULT_SRC, FRAME_ANCESTORS, OBJECT_SRC, SCRIPT_SRC, STYLE_SRC, UPGRADE_INSECURE};
use fos_csp::{ContentSecurityPolicy, Keyword, UnsafeToken};
use serde::{Deserialize, Serialize};

/// Coarse policy strength, ordered weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    None,
    Weak,
    Moderate,
    Strong,
}

impl SecurityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::None => "none",
            SecurityLevel::Weak => "weak",
            SecurityLevel::Moderate => "moderate",
            SecurityLevel::Strong => "strong",
        }
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a parsed policy. Each level implies the conditions of the one below it.
pub fn classify(policy: &ContentSecurityPolicy) -> SecurityLevel {
    if policy.is_empty() {
        return SecurityLevel::None;
    }
    if !is_moderate(policy) {
        return SecurityLevel::Weak;
    }

    let upgrades = policy.contains(UPGRADE_INSECURE)
        || policy.get(DEFAULT_SRC).is_some_and(|d| d.is_self_only());
    let clean = UnsafeToken::ALL.iter().all(|token| !policy.has_unsafe_token(*token));

    if policy.contains(FRAME_ANCESTORS) && upgrades && clean {
        SecurityLevel::Strong
    } else {
        SecurityLevel::Moderate
    }
}

fn is_moderate(policy: &ContentSecurityPolicy) -> bool {
    let covered = policy.contains(DEFAULT_SRC)
        || [SCRIPT_SRC, STYLE_SRC, OBJECT_SRC].iter().all(|name| policy.contains(name));

    // script-src, else default-src
    let script_list_safe = policy
        .get(SCRIPT_SRC)
        .or_else(|| policy.get(DEFAULT_SRC))
        .is_none_or(|d| !d.has_keyword(Keyword::UnsafeInline) && !d.has_keyword(Keyword::UnsafeEval));

    covered && script_list_safe
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(text: &str) -> SecurityLevel {
        classify(&ContentSecurityPolicy::parse(text))
    }

    #[test]
    fn test_none_and_weak() {
        assert_eq!(level(""), SecurityLevel::None);
        assert_eq!(level("img-src 'self'"), SecurityLevel::Weak);
        assert_eq!(level("script-src 'self'; style-src 'self'"), SecurityLevel::Weak);
    }

    #[test]
    fn test_unsafe_script_list_is_weak() {
        assert_eq!(
            level("default-src 'self'; script-src 'self' 'unsafe-inline'"),
            SecurityLevel::Weak
        );
        assert_eq!(level("default-src 'self' 'unsafe-eval'"), SecurityLevel::Weak);
    }

    #[test]
    fn test_moderate() {
        assert_eq!(level("default-src 'self'"), SecurityLevel::Moderate);
        assert_eq!(
            level("script-src 'self'; style-src 'self'; object-src 'none'"),
            SecurityLevel::Moderate
        );
        assert_eq!(
            level("default-src 'self'; img-src *; frame-ancestors 'self'"),
            SecurityLevel::Moderate
        );
    }

    #[test]
    fn test_strong() {
        assert_eq!(level("default-src 'self'; frame-ancestors 'none'"), SecurityLevel::Strong);
        assert_eq!(
            level("default-src https://cdn.test; frame-ancestors 'self'; upgrade-insecure-requests"),
            SecurityLevel::Strong
        );
        assert_eq!(
            level("default-src https://cdn.test; frame-ancestors 'self'"),
            SecurityLevel::Moderate
        );
    }

    #[test]
    fn test_dropping_frame_ancestors_gives_moderate() {
        let strong = "default-src 'self'; object-src 'none'; frame-ancestors 'self'; upgrade-insecure-requests";
        assert_eq!(level(strong), SecurityLevel::Strong);
        assert_eq!(
            level("default-src 'self'; object-src 'none'; upgrade-insecure-requests"),
            SecurityLevel::Moderate
        );
    }

    #[test]
    fn test_ordering() {
        assert!(SecurityLevel::Strong > SecurityLevel::Moderate);
        assert!(SecurityLevel::Weak > SecurityLevel::None);
        assert_eq!(SecurityLevel::Moderate.to_string(), "moderate");
    }
}
