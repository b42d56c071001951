//! Web Origin
//!
//! The scheme/host/port triple used for `'self'` matching.

use url::Url;

use crate::CspError;

/// Web Origin
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
}

impl Origin {
    /// Create new origin
    pub fn new(scheme: &str, host: &str, port: Option<u16>) -> Self {
        Self {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
            port,
        }
    }

    /// Parse the origin of an absolute URL string
    pub fn parse(url: &str) -> Result<Self, CspError> {
        let parsed = Url::parse(url.trim()).map_err(|source| CspError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        Self::from_url(&parsed).ok_or_else(|| CspError::OpaqueOrigin(url.to_string()))
    }

    /// Origin of a parsed URL, `None` for opaque (host-less) URLs
    pub fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?;
        Some(Self::new(url.scheme(), host, url.port()))
    }

    /// Check if same origin
    pub fn is_same_origin(&self, other: &Origin) -> bool {
        self.scheme == other.scheme
            && self.host == other.host
            && self.effective_port() == other.effective_port()
    }

    /// Check whether a URL belongs to this origin
    pub fn contains(&self, url: &Url) -> bool {
        Self::from_url(url).is_some_and(|o| self.is_same_origin(&o))
    }

    /// Get effective port (default port for scheme if not specified)
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| default_port(&self.scheme).unwrap_or(0))
    }

    /// Serialize origin
    pub fn serialize(&self) -> String {
        let port_str = match self.port {
            Some(p) if Some(p) != default_port(&self.scheme) => format!(":{}", p),
            _ => String::new(),
        };

        format!("{}://{}{}", self.scheme, self.host, port_str)
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.serialize())
    }
}

/// Default port for a network scheme
pub fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        "ftp" => Some(21),
        _ => None,
    }
}
