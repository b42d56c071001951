//! fOS CSP
//!
//! Content Security Policy grammar for the fOS page auditor.
//!
//! Features:
//! - Policy parsing and serialization
//! - Source-expression classification
//! - Directive fallback resolution
//! - Source matching against URLs and inline content
//! - Origins for `'self'`

pub mod directive;
pub mod matcher;
pub mod origin;
pub mod policy;
pub mod resolve;
pub mod source;

pub use directive::Category;
pub use matcher::{InlineKind, MatchedBy, NonceAttr, SourceMatcher, Subject};
pub use origin::Origin;
pub use policy::{ContentSecurityPolicy, Directive, UnsafeToken};
pub use resolve::Resolution;
pub use source::{HashAlgorithm, HostSource, Keyword, PortPattern, SourceExpression};

/// CSP error
#[derive(Debug, thiserror::Error)]
pub enum CspError {
    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("URL has an opaque origin: {0}")]
    OpaqueOrigin(String),
}
