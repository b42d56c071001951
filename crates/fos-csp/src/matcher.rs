//! Source matching
//!
//! A source list is a permissive union: a subject is allowed when any source
//! expression in the list admits it, unless the list contains `'none'`.

use url::Url;

use crate::origin::Origin;
use crate::source::{HostSource, Keyword, PortPattern, SourceExpression};

/// Schemes covered by the `*` source
const NETWORK_SCHEMES: &[&str] = &["http", "https", "ws", "wss", "ftp"];

/// Where inline content lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineKind {
    /// `<script>` or `<style>` body
    Element,
    /// `style=""` or `on*=""` attribute
    Attribute,
}

/// Nonce attribute as observed on the element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NonceAttr<'a> {
    #[default]
    Absent,
    /// Present, but the value is hidden from the snapshot
    Hidden,
    Value(&'a str),
}

/// Something a source list may or may not allow
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Url { url: &'a Url, nonce: NonceAttr<'a> },
    Inline { kind: InlineKind, nonce: NonceAttr<'a> },
}

/// Which kind of source admitted a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedBy {
    Wildcard,
    SelfOrigin,
    UnsafeInline,
    Nonce,
    /// Presence of a hash source; the digest itself is never checked
    Hash,
    Scheme,
    Host,
}

/// Matches subjects against source lists for one page origin
#[derive(Debug, Clone, Copy)]
pub struct SourceMatcher<'a> {
    origin: &'a Origin,
}

impl<'a> SourceMatcher<'a> {
    pub fn new(origin: &'a Origin) -> Self {
        Self { origin }
    }

    pub fn matches(&self, subject: Subject<'_>, sources: &[SourceExpression]) -> bool {
        self.matched_by(subject, sources).is_some()
    }

    /// The source kind that admits `subject`, if any.
    ///
    /// Hash sources are only consulted when nothing else matches, so callers
    /// can tell a verified match from an assumed one.
    pub fn matched_by(&self, subject: Subject<'_>, sources: &[SourceExpression]) -> Option<MatchedBy> {
        if sources.iter().any(|s| s.is_keyword(Keyword::None)) {
            return None;
        }

        if let Some(matched) = sources.iter().find_map(|source| self.match_source(source, subject)) {
            return Some(matched);
        }

        if sources.iter().any(|s| matches!(s, SourceExpression::Hash { .. })) {
            let unsafe_hashes = sources.iter().any(|s| s.is_keyword(Keyword::UnsafeHashes));
            return match_hash(subject, unsafe_hashes);
        }
        None
    }

    fn match_source(&self, source: &SourceExpression, subject: Subject<'_>) -> Option<MatchedBy> {
        match (source, subject) {
            (SourceExpression::Wildcard, Subject::Url { url, .. }) => {
                NETWORK_SCHEMES.iter().any(|s| *s == url.scheme()).then_some(MatchedBy::Wildcard)
            }
            (SourceExpression::Keyword(Keyword::SelfOrigin), Subject::Url { url, .. }) => {
                self.origin.contains(url).then_some(MatchedBy::SelfOrigin)
            }
            // Browsers ignore it next to a nonce or hash; the evaluator reports that separately
            (SourceExpression::Keyword(Keyword::UnsafeInline), Subject::Inline { .. }) => Some(MatchedBy::UnsafeInline),
            (SourceExpression::Nonce(expected), Subject::Url { nonce, .. } | Subject::Inline { nonce, .. }) => {
                nonce_matches(nonce, expected).then_some(MatchedBy::Nonce)
            }
            (SourceExpression::Scheme(scheme), Subject::Url { url, .. }) => {
                (url.scheme() == scheme).then_some(MatchedBy::Scheme)
            }
            (SourceExpression::Host(host), Subject::Url { url, .. }) => {
                host_matches(host, url).then_some(MatchedBy::Host)
            }
            _ => None,
        }
    }
}

fn match_hash(subject: Subject<'_>, unsafe_hashes: bool) -> Option<MatchedBy> {
    match subject {
        Subject::Inline { kind: InlineKind::Element, .. } => Some(MatchedBy::Hash),
        Subject::Inline { kind: InlineKind::Attribute, .. } if unsafe_hashes => Some(MatchedBy::Hash),
        _ => None,
    }
}

fn nonce_matches(attr: NonceAttr<'_>, expected: &str) -> bool {
    match attr {
        NonceAttr::Absent => false,
        NonceAttr::Hidden => true,
        NonceAttr::Value(value) => value == expected,
    }
}

/// Host-source matching with `.`-boundary wildcard semantics
pub fn host_matches(source: &HostSource, url: &Url) -> bool {
    if let Some(scheme) = &source.scheme {
        if url.scheme() != scheme {
            return false;
        }
    }

    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();

    let host_ok = if source.wildcard {
        source.host.is_empty()
            || (host.len() > source.host.len() + 1
                && host.ends_with(&source.host)
                && host.as_bytes()[host.len() - source.host.len() - 1] == b'.')
    } else {
        host == source.host
    };
    if !host_ok {
        return false;
    }

    let port_ok = match source.port {
        Some(PortPattern::Any) => true,
        Some(PortPattern::Exact(port)) => url.port_or_known_default() == Some(port),
        None => url.port().is_none(),
    };
    if !port_ok {
        return false;
    }

    match &source.path {
        Some(path) if path.ends_with('/') => url.path().starts_with(path.as_str()),
        Some(path) => url.path() == path,
        None => true,
    }
}
