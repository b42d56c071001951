//! Security report
//!
//! Runs security audits over a snapshot and collects one category entry per
//! audit. A failing audit never removes its entry: it is replaced by a
//! degraded result carrying the error.

use serde::Serialize;

use crate::AuditError;
use crate::analyzer::{AnalysisResult, AnalysisStats, CspAnalyzer};
use crate::config::AuditConfig;
use crate::finding::{Finding, FindingCode, Recommendation, Severity};
use crate::snapshot::PageSnapshot;

/// A security audit over a page snapshot
pub trait Audit: std::fmt::Debug + Send + Sync {
    fn id(&self) -> &str;
    fn title(&self) -> &str;
    fn run(&self, snapshot: &PageSnapshot) -> Result<AnalysisResult, AuditError>;
}

impl Audit for CspAnalyzer {
    fn id(&self) -> &str {
        "content-security-policy"
    }

    fn title(&self) -> &str {
        "Content Security Policy"
    }

    fn run(&self, snapshot: &PageSnapshot) -> Result<AnalysisResult, AuditError> {
        self.analyze(snapshot)
    }
}

/// Category entry in a security report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryReport {
    pub id: String,
    pub title: String,
    pub score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<AnalysisStats>,
    pub issues: Vec<Finding>,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_error: Option<String>,
}

impl CategoryReport {
    fn completed(audit: &dyn Audit, result: AnalysisResult) -> Self {
        Self {
            id: audit.id().into(),
            title: audit.title().into(),
            score: result.score,
            stats: Some(result.stats),
            issues: result.issues,
            recommendations: result.recommendations,
            runtime_error: None,
        }
    }

    /// Score 0 with a single info issue carrying the error text
    fn degraded(audit: &dyn Audit, error: &AuditError) -> Self {
        let message = error.to_string();
        Self {
            id: audit.id().into(),
            title: audit.title().into(),
            score: 0,
            stats: None,
            issues: vec![
                Finding::new(FindingCode::AuditFailed, Severity::Info, format!("{} audit failed", audit.title()))
                    .with_detail(message.clone()),
            ],
            recommendations: Vec::new(),
            runtime_error: Some(message),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.runtime_error.is_some()
    }

    pub fn grade(&self) -> &'static str {
        if self.score >= 90 {
            "A"
        } else if self.score >= 50 {
            "B"
        } else {
            "C"
        }
    }
}

/// Security report for one page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityReport {
    pub url: String,
    pub categories: Vec<CategoryReport>,
}

impl SecurityReport {
    pub fn get_category(&self, id: &str) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Mean category score, rounded down
    pub fn overall_score(&self) -> u8 {
        if self.categories.is_empty() {
            return 0;
        }
        let total: usize = self.categories.iter().map(|c| c.score as usize).sum();
        (total / self.categories.len()) as u8
    }
}

/// Audit runner
#[derive(Debug, Default)]
pub struct AuditRunner {
    audits: Vec<Box<dyn Audit>>,
}

impl AuditRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner with the CSP analyzer registered
    pub fn with_csp(config: AuditConfig) -> Self {
        let mut runner = Self::new();
        runner.register(Box::new(CspAnalyzer::new(config)));
        runner
    }

    pub fn register(&mut self, audit: Box<dyn Audit>) {
        self.audits.push(audit);
    }

    pub fn run(&self, snapshot: &PageSnapshot) -> SecurityReport {
        let categories = self
            .audits
            .iter()
            .map(|audit| match audit.run(snapshot) {
                Ok(result) => CategoryReport::completed(audit.as_ref(), result),
                Err(err) => {
                    tracing::warn!(audit = audit.id(), error = %err, "audit failed, reporting degraded result");
                    CategoryReport::degraded(audit.as_ref(), &err)
                }
            })
            .collect();

        SecurityReport {
            url: snapshot.page_url.clone(),
            categories,
        }
    }
}
