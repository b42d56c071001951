//! Source expressions
//!
//! Every token after a directive name is classified exactly once, when the
//! policy is parsed. Matching and the safety checks work on the classified
//! form and never look at the raw text again.

/// CSP source keywords
pub const SELF: &str = "'self'";
pub const NONE: &str = "'none'";
pub const UNSAFE_INLINE: &str = "'unsafe-inline'";
pub const UNSAFE_EVAL: &str = "'unsafe-eval'";
pub const UNSAFE_HASHES: &str = "'unsafe-hashes'";
pub const STRICT_DYNAMIC: &str = "'strict-dynamic'";

/// Quoted keyword source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Keyword {
    SelfOrigin,
    None,
    UnsafeInline,
    UnsafeEval,
    UnsafeHashes,
    StrictDynamic,
}

impl Keyword {
    /// Keyword for a quoted token, compared case-insensitively
    pub fn from_token(token: &str) -> Option<Self> {
        let keyword = match token.to_ascii_lowercase().as_str() {
            SELF => Keyword::SelfOrigin,
            NONE => Keyword::None,
            UNSAFE_INLINE => Keyword::UnsafeInline,
            UNSAFE_EVAL => Keyword::UnsafeEval,
            UNSAFE_HASHES => Keyword::UnsafeHashes,
            STRICT_DYNAMIC => Keyword::StrictDynamic,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::SelfOrigin => SELF,
            Keyword::None => NONE,
            Keyword::UnsafeInline => UNSAFE_INLINE,
            Keyword::UnsafeEval => UNSAFE_EVAL,
            Keyword::UnsafeHashes => UNSAFE_HASHES,
            Keyword::StrictDynamic => STRICT_DYNAMIC,
        }
    }
}

impl std::fmt::Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Digest algorithm of a hash source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "sha256" => Some(HashAlgorithm::Sha256),
            "sha384" => Some(HashAlgorithm::Sha384),
            "sha512" => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }
}

/// Port part of a host source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortPattern {
    Any,
    Exact(u16),
}

/// Host source such as `https://*.example.com:443/static/`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSource {
    /// Lower-cased scheme without `://`
    pub scheme: Option<String>,
    /// `*.` prefix; with an empty `host` this is the bare `*` host
    pub wildcard: bool,
    /// Lower-cased host, or the base domain when wildcarded
    pub host: String,
    pub port: Option<PortPattern>,
    pub path: Option<String>,
}

impl HostSource {
    fn parse(token: &str) -> Option<Self> {
        let (scheme, rest) = match token.find("://") {
            Some(idx) => {
                let scheme = &token[..idx];
                if !is_scheme(scheme) {
                    return None;
                }
                (Some(scheme.to_ascii_lowercase()), &token[idx + 3..])
            }
            None => (None, token),
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], Some(rest[idx..].to_string())),
            None => (rest, None),
        };

        let (host, port) = match authority.rfind(':') {
            Some(idx) => {
                let port = match &authority[idx + 1..] {
                    "*" => PortPattern::Any,
                    digits => PortPattern::Exact(digits.parse().ok()?),
                };
                (&authority[..idx], Some(port))
            }
            None => (authority, None),
        };

        let (wildcard, host) = if host == "*" {
            (true, "")
        } else if let Some(base) = host.strip_prefix("*.") {
            (true, base)
        } else {
            (false, host)
        };

        if !host.is_empty() && !is_host(host) {
            return None;
        }
        if host.is_empty() && (!wildcard || scheme.is_none()) {
            // A bare `*` is the wildcard source; `*:443` style tokens are not hosts.
            return None;
        }

        Some(Self {
            scheme,
            wildcard,
            host: host.to_ascii_lowercase(),
            port,
            path,
        })
    }

    /// `none`, `self` and friends written without their quotes
    pub fn looks_like_unquoted_keyword(&self) -> bool {
        self.scheme.is_none()
            && !self.wildcard
            && self.port.is_none()
            && self.path.is_none()
            && Keyword::from_token(&format!("'{}'", self.host)).is_some()
    }
}

/// A classified source expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceExpression {
    Keyword(Keyword),
    Nonce(String),
    Hash { algorithm: HashAlgorithm, digest: String },
    /// Lower-cased scheme without the trailing colon
    Scheme(String),
    Host(HostSource),
    Wildcard,
    /// Anything the grammar does not recognize; grants nothing
    Unknown(String),
}

impl SourceExpression {
    /// Classify a single token
    pub fn parse(token: &str) -> Self {
        let token = token.trim();

        if token == "*" {
            return SourceExpression::Wildcard;
        }

        if token.len() >= 2 && token.starts_with('\'') && token.ends_with('\'') {
            return Self::parse_quoted(token);
        }

        if let Some(scheme) = token.strip_suffix(':') {
            // `example.com:` is a host with a missing port, not a scheme
            if is_scheme(scheme) && !scheme.contains('.') {
                return SourceExpression::Scheme(scheme.to_ascii_lowercase());
            }
        }

        match HostSource::parse(token) {
            Some(host) => SourceExpression::Host(host),
            None => SourceExpression::Unknown(token.to_string()),
        }
    }

    fn parse_quoted(token: &str) -> Self {
        if let Some(keyword) = Keyword::from_token(token) {
            return SourceExpression::Keyword(keyword);
        }

        let inner = &token[1..token.len() - 1];
        if let Some((prefix, value)) = inner.split_once('-') {
            let prefix = prefix.to_ascii_lowercase();
            if !value.is_empty() && is_base64ish(value) {
                if prefix == "nonce" {
                    return SourceExpression::Nonce(value.to_string());
                }
                if let Some(algorithm) = HashAlgorithm::from_prefix(&prefix) {
                    return SourceExpression::Hash {
                        algorithm,
                        digest: value.to_string(),
                    };
                }
            }
        }

        SourceExpression::Unknown(token.to_string())
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self, SourceExpression::Keyword(k) if *k == keyword)
    }

    pub fn is_nonce_or_hash(&self) -> bool {
        matches!(self, SourceExpression::Nonce(_) | SourceExpression::Hash { .. })
    }

    pub fn is_scheme(&self, scheme: &str) -> bool {
        matches!(self, SourceExpression::Scheme(s) if s == scheme)
    }
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn is_host(s: &str) -> bool {
    !s.starts_with('.')
        && !s.ends_with('.')
        && !s.contains("..")
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

fn is_base64ish(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '-' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(SourceExpression::parse("'SELF'"), SourceExpression::Keyword(Keyword::SelfOrigin));
        assert_eq!(
            SourceExpression::parse("'Unsafe-Inline'"),
            SourceExpression::Keyword(Keyword::UnsafeInline)
        );
    }

    #[test]
    fn test_nonce_and_hash() {
        assert_eq!(SourceExpression::parse("'nonce-r4nd0m'"), SourceExpression::Nonce("r4nd0m".into()));
        assert!(matches!(
            SourceExpression::parse("'sha384-abc+/='"),
            SourceExpression::Hash { algorithm: HashAlgorithm::Sha384, .. }
        ));
        assert!(matches!(SourceExpression::parse("'nonce-'"), SourceExpression::Unknown(_)));
        assert!(matches!(SourceExpression::parse("'md5-abc'"), SourceExpression::Unknown(_)));
    }

    #[test]
    fn test_scheme() {
        assert_eq!(SourceExpression::parse("data:"), SourceExpression::Scheme("data".into()));
        assert_eq!(SourceExpression::parse("HTTPS:"), SourceExpression::Scheme("https".into()));
        assert_eq!(SourceExpression::parse("ms-appx-web:"), SourceExpression::Scheme("ms-appx-web".into()));
    }

    #[test]
    fn test_dotted_token_with_trailing_colon_is_unknown() {
        assert_eq!(
            SourceExpression::parse("example.com:"),
            SourceExpression::Unknown("example.com:".into())
        );
        assert!(matches!(SourceExpression::parse("cdn.example.com:"), SourceExpression::Unknown(_)));
    }

    #[test]
    fn test_host_source() {
        let SourceExpression::Host(host) = SourceExpression::parse("https://*.Example.com:8443/static/") else {
            panic!("expected host source");
        };
        assert_eq!(host.scheme.as_deref(), Some("https"));
        assert!(host.wildcard);
        assert_eq!(host.host, "example.com");
        assert_eq!(host.port, Some(PortPattern::Exact(8443)));
        assert_eq!(host.path.as_deref(), Some("/static/"));
    }

    #[test]
    fn test_any_host_with_scheme() {
        let SourceExpression::Host(host) = SourceExpression::parse("https://*") else {
            panic!("expected host source");
        };
        assert!(host.wildcard);
        assert!(host.host.is_empty());
    }

    #[test]
    fn test_unknown_tokens() {
        assert!(matches!(SourceExpression::parse("'self"), SourceExpression::Unknown(_)));
        assert!(matches!(SourceExpression::parse("exa mple"), SourceExpression::Unknown(_)));
        assert!(matches!(SourceExpression::parse("cdn.com:abc"), SourceExpression::Unknown(_)));
        assert!(matches!(SourceExpression::parse("*.*.com"), SourceExpression::Unknown(_)));
    }

    #[test]
    fn test_unquoted_keyword() {
        let SourceExpression::Host(host) = SourceExpression::parse("self") else {
            panic!("expected host source");
        };
        assert!(host.looks_like_unquoted_keyword());
    }
}
