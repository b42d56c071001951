//! Content Security Policy
//!
//! Policy parsing and serialization.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::directive::IMG_SRC;
use crate::source::{Keyword, SourceExpression};

/// A single directive with its source list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Lower-cased directive name
    pub name: String,
    /// Source tokens verbatim, in policy order
    pub raw: Vec<String>,
    /// Classified sources, parallel to `raw`
    pub sources: Vec<SourceExpression>,
}

impl Directive {
    fn new(name: String, raw: Vec<String>) -> Self {
        let sources = raw.iter().map(|s| SourceExpression::parse(s)).collect();
        Self { name, raw, sources }
    }

    pub fn has_keyword(&self, keyword: Keyword) -> bool {
        self.sources.iter().any(|s| s.is_keyword(keyword))
    }

    /// Source list is exactly `'self'`
    pub fn is_self_only(&self) -> bool {
        matches!(self.sources.as_slice(), [s] if s.is_keyword(Keyword::SelfOrigin))
    }

    /// Unsafe token types present, each reported once, in a fixed order
    pub fn unsafe_tokens(&self) -> Vec<UnsafeToken> {
        UnsafeToken::ALL
            .into_iter()
            .filter(|token| self.sources.iter().any(|s| token.is_carried_by(s, &self.name)))
            .collect()
    }
}

/// Source tokens that weaken the directive carrying them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnsafeToken {
    UnsafeInline,
    UnsafeEval,
    Wildcard,
    /// `data:` anywhere except `img-src`
    DataScheme,
}

impl UnsafeToken {
    pub const ALL: [UnsafeToken; 4] = [
        UnsafeToken::UnsafeInline,
        UnsafeToken::UnsafeEval,
        UnsafeToken::Wildcard,
        UnsafeToken::DataScheme,
    ];

    fn is_carried_by(&self, source: &SourceExpression, directive: &str) -> bool {
        match self {
            UnsafeToken::UnsafeInline => source.is_keyword(Keyword::UnsafeInline),
            UnsafeToken::UnsafeEval => source.is_keyword(Keyword::UnsafeEval),
            UnsafeToken::Wildcard => matches!(source, SourceExpression::Wildcard),
            UnsafeToken::DataScheme => directive != IMG_SRC && source.is_scheme("data"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnsafeToken::UnsafeInline => "'unsafe-inline'",
            UnsafeToken::UnsafeEval => "'unsafe-eval'",
            UnsafeToken::Wildcard => "*",
            UnsafeToken::DataScheme => "data:",
        }
    }
}

impl std::fmt::Display for UnsafeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed policy: directives in declaration order, names unique
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentSecurityPolicy {
    directives: Vec<Directive>,
    duplicates: Vec<String>,
}

impl ContentSecurityPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a policy string. Never fails: malformed segments simply grant nothing.
    pub fn parse(text: &str) -> Self {
        let mut policy = Self::new();

        for segment in text.split(';') {
            let mut parts = segment.split_ascii_whitespace();
            let Some(name) = parts.next() else {
                continue;
            };

            let name = name.to_ascii_lowercase();
            if policy.contains(&name) {
                // First occurrence wins
                policy.duplicates.push(name);
                continue;
            }

            let raw = parts.map(str::to_string).collect();
            policy.directives.push(Directive::new(name, raw));
        }

        tracing::debug!(
            directives = policy.directives.len(),
            duplicates = policy.duplicates.len(),
            "parsed content security policy"
        );
        policy
    }

    pub fn get(&self, name: &str) -> Option<&Directive> {
        self.directives.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Directive> {
        self.directives.iter()
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Names that appeared again after their first occurrence
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// Any directive carries the given unsafe token
    pub fn has_unsafe_token(&self, token: UnsafeToken) -> bool {
        self.directives.iter().any(|d| d.unsafe_tokens().contains(&token))
    }

    /// Number of directives carrying at least one unsafe token
    pub fn unsafe_directive_count(&self) -> usize {
        self.directives
            .iter()
            .filter(|d| !d.unsafe_tokens().is_empty())
            .count()
    }

    /// Serialize back to policy text
    pub fn serialize(&self) -> String {
        self.directives
            .iter()
            .map(|d| {
                if d.raw.is_empty() {
                    d.name.clone()
                } else {
                    format!("{} {}", d.name, d.raw.join(" "))
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl Serialize for ContentSecurityPolicy {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.directives.len()))?;
        for directive in &self.directives {
            map.serialize_entry(&directive.name, &directive.raw)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csp() {
        let csp = ContentSecurityPolicy::parse("default-src 'self'; script-src 'self' https://cdn.example.com");

        assert!(csp.contains("default-src"));
        assert_eq!(csp.get("script-src").unwrap().raw, vec!["'self'", "https://cdn.example.com"]);
    }

    #[test]
    fn test_names_lowercased_sources_verbatim() {
        let csp = ContentSecurityPolicy::parse("Script-SRC 'SELF' CDN.example.com");
        let directive = csp.get("script-src").unwrap();
        assert_eq!(directive.raw, vec!["'SELF'", "CDN.example.com"]);
        assert!(directive.has_keyword(Keyword::SelfOrigin));
    }

    #[test]
    fn test_empty_segments_and_valueless_directives() {
        let csp = ContentSecurityPolicy::parse(" ; ;upgrade-insecure-requests;;  object-src ;");
        assert_eq!(csp.len(), 2);
        assert!(csp.get("upgrade-insecure-requests").unwrap().raw.is_empty());
        assert!(csp.get("object-src").unwrap().sources.is_empty());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let csp = ContentSecurityPolicy::parse("script-src 'none'; script-src *");
        assert_eq!(csp.len(), 1);
        assert_eq!(csp.get("script-src").unwrap().raw, vec!["'none'"]);
        assert_eq!(csp.duplicates(), ["script-src".to_string()]);
    }

    #[test]
    fn test_duplicate_tokens_preserved() {
        let csp = ContentSecurityPolicy::parse("img-src 'self' 'self' data:");
        assert_eq!(csp.get("img-src").unwrap().raw.len(), 3);
    }

    #[test]
    fn test_unsafe_tokens_deduplicated() {
        let csp = ContentSecurityPolicy::parse(
            "script-src 'unsafe-inline' 'unsafe-inline' * data:; img-src data:",
        );
        assert_eq!(
            csp.get("script-src").unwrap().unsafe_tokens(),
            vec![UnsafeToken::UnsafeInline, UnsafeToken::Wildcard, UnsafeToken::DataScheme]
        );
        assert!(csp.get("img-src").unwrap().unsafe_tokens().is_empty());
        assert_eq!(csp.unsafe_directive_count(), 1);
    }

    #[test]
    fn test_serialize_round_trip_text() {
        let text = "default-src 'self'; upgrade-insecure-requests";
        assert_eq!(ContentSecurityPolicy::parse(text).serialize(), text);
    }
}
