//! fOS Audit
//!
//! Page-level Content Security Policy auditor.
//!
//! Features:
//! - Page snapshots from JSON or HTML
//! - Policy location in `<meta http-equiv>` declarations
//! - Consistency checks against the page's resources
//! - Unsafe source and syntax findings
//! - Security level classification
//! - Recommended policy synthesis
//! - 0-100 scoring
//! - Security report runner with degraded results

pub mod analyzer;
pub mod classify;
pub mod config;
pub mod evaluate;
pub mod finding;
pub mod html;
pub mod locate;
pub mod report;
pub mod score;
pub mod snapshot;
pub mod synthesize;

pub use analyzer::{AnalysisResult, AnalysisStats, CspAnalyzer};
pub use classify::{SecurityLevel, classify};
pub use config::AuditConfig;
pub use finding::{Finding, FindingCode, Priority, Recommendation, Severity};
pub use locate::PolicySource;
pub use report::{Audit, AuditRunner, CategoryReport, SecurityReport};
pub use score::ScoreBreakdown;
pub use snapshot::{PageContext, PageSnapshot, PolicyDeclaration, ResourceKind, ResourceRef};
pub use synthesize::{BASELINE_POLICY, SynthesizedPolicy, Synthesizer};

/// Audit error
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error(transparent)]
    Csp(#[from] fos_csp::CspError),

    #[error("Invalid page URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTML read failed: {0}")]
    Html(#[from] std::io::Error),
}
