//! Audit Configuration

use serde::{Deserialize, Serialize};

use crate::AuditError;

/// CSP audit configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditConfig {
    /// External domains copied into a recommended policy
    pub max_recommended_domains: usize,

    /// Evaluate inline script/style bodies and attributes
    pub check_inline: bool,

    /// Report unknown directives, suspicious tokens and similar hygiene issues
    pub report_syntax: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_recommended_domains: 5,
            check_inline: true,
            report_syntax: true,
        }
    }
}

impl AuditConfig {
    /// Load from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, AuditError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = AuditConfig::from_json(r#"{ "maxRecommendedDomains": 3 }"#).unwrap();
        assert_eq!(config.max_recommended_domains, 3);
        assert!(config.check_inline);
        assert!(config.report_syntax);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(AuditConfig::from_json("{"), Err(AuditError::Json(_))));
    }
}
