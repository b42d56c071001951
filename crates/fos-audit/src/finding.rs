//! Findings and recommendations

use serde::{Deserialize, Serialize};

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Major => write!(f, "major"),
            Severity::Minor => write!(f, "minor"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Stable identifier of a finding kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingCode {
    NoCsp,
    MissingDirective,
    WouldBeBlocked,
    UnsafeInline,
    UnsafeEval,
    WildcardSource,
    DataScheme,
    UnknownDirective,
    SuspiciousSource,
    DuplicateDirective,
    IgnoredInMeta,
    NonceOverridesUnsafeInline,
    UnverifiedHash,
    ReportOnlyIgnored,
    PolicyOutsideHead,
    AdditionalPolicy,
    UnreadableResources,
    UnresolvableResource,
    IncompleteRecommendation,
    AuditFailed,
}

/// A single audit finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub code: FindingCode,
    pub severity: Severity,
    pub message: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_element: Option<String>,
    pub remediation: String,
}

impl Finding {
    pub fn new(code: FindingCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            detail: String::new(),
            related_element: None,
            remediation: String::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_element(mut self, element: impl Into<String>) -> Self {
        self.related_element = Some(element.into());
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = remediation.into();
        self
    }
}

/// Recommendation priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Suggested change to the page's policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    /// Snippet to paste into the page or server configuration
    pub implementation: String,
    pub priority: Priority,
}

impl Recommendation {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        implementation: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            implementation: implementation.into(),
            priority,
        }
    }
}
