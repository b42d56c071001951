//! CSP analyzer
//!
//! Runs one analysis over a page snapshot:
//! locate → parse → evaluate → classify → synthesize → score.
//! Without a policy the run short-circuits to the synthesized baseline and a
//! zero score.

use fos_csp::ContentSecurityPolicy;
use serde::Serialize;

use crate::AuditError;
use crate::classify::{SecurityLevel, classify};
use crate::config::AuditConfig;
use crate::evaluate::Evaluator;
use crate::finding::{Finding, FindingCode, Recommendation, Severity};
use crate::locate::{Location, PolicySource, locate};
use crate::score::ScoreBreakdown;
use crate::snapshot::{PageContext, PageSnapshot};
use crate::synthesize::{Synthesizer, absent_recommendation, hardening};

/// Summary numbers for the report UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    #[serde(rename = "hasCSP")]
    pub has_csp: bool,
    pub directives_count: usize,
    pub security_level: SecurityLevel,
    /// Directives carrying at least one unsafe token
    pub unsafe_directives: usize,
}

/// Result of one analysis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub score: u8,
    pub csp: Option<String>,
    pub source: Option<PolicySource>,
    pub directives: ContentSecurityPolicy,
    pub stats: AnalysisStats,
    pub issues: Vec<Finding>,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip)]
    pub breakdown: ScoreBreakdown,
}

impl AnalysisResult {
    /// Findings with the given code
    pub fn issues_with(&self, code: FindingCode) -> impl Iterator<Item = &Finding> {
        self.issues.iter().filter(move |f| f.code == code)
    }
}

/// Content Security Policy analyzer
#[derive(Debug, Clone, Default)]
pub struct CspAnalyzer {
    config: AuditConfig,
}

impl CspAnalyzer {
    pub fn new(config: AuditConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Analyze one snapshot. Fails only when the page URL has no usable origin.
    pub fn analyze(&self, snapshot: &PageSnapshot) -> Result<AnalysisResult, AuditError> {
        let page = PageContext::new(&snapshot.page_url)?;
        let synthesizer = Synthesizer::new(self.config.max_recommended_domains);

        let Location { policy: located, findings: notes } = locate(snapshot);
        let Some(located) = located else {
            return Ok(self.absent(snapshot, &page, &synthesizer, notes));
        };

        let policy = ContentSecurityPolicy::parse(located.text);
        let evaluator = Evaluator::new(&policy, &page, &self.config);

        let mut issues = evaluator.consistency(snapshot);
        let blocked = issues
            .iter()
            .filter(|f| f.code == FindingCode::WouldBeBlocked)
            .count();
        issues.extend(evaluator.safety());
        issues.extend(evaluator.hygiene());
        issues.extend(notes);

        let level = classify(&policy);
        let synthesized = synthesizer.synthesize(snapshot, &page);
        let recommendations = hardening(&policy, level, &synthesized);
        if level < SecurityLevel::Strong {
            // Baseline recommendation is only offered below strong
            issues.extend(synthesized.incomplete_finding());
        }

        let breakdown = ScoreBreakdown::compute(&policy, blocked);
        let score = breakdown.total();

        tracing::info!(
            score,
            level = %level,
            issues = issues.len(),
            "CSP analysis complete for {}",
            snapshot.page_url
        );

        Ok(AnalysisResult {
            score,
            csp: Some(located.text.to_string()),
            source: Some(located.source),
            stats: AnalysisStats {
                has_csp: true,
                directives_count: policy.len(),
                security_level: level,
                unsafe_directives: policy.unsafe_directive_count(),
            },
            directives: policy,
            issues,
            recommendations,
            breakdown,
        })
    }

    fn absent(
        &self,
        snapshot: &PageSnapshot,
        page: &PageContext,
        synthesizer: &Synthesizer,
        notes: Vec<Finding>,
    ) -> AnalysisResult {
        let synthesized = synthesizer.synthesize(snapshot, page);

        let mut issues = vec![
            Finding::new(FindingCode::NoCsp, Severity::Critical, "No Content Security Policy")
                .with_detail("The page declares no Content-Security-Policy, so any injected script can run")
                .with_remediation("Add a Content-Security-Policy header or meta tag"),
        ];
        issues.extend(notes);
        issues.extend(synthesized.incomplete_finding());

        tracing::info!(
            score = 0,
            level = %SecurityLevel::None,
            issues = issues.len(),
            "CSP analysis complete for {}",
            snapshot.page_url
        );

        AnalysisResult {
            score: 0,
            csp: None,
            source: None,
            directives: ContentSecurityPolicy::new(),
            stats: AnalysisStats {
                has_csp: false,
                directives_count: 0,
                security_level: SecurityLevel::None,
                unsafe_directives: 0,
            },
            issues,
            recommendations: vec![absent_recommendation(&synthesized)],
            breakdown: ScoreBreakdown::absent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{ResourceKind, ResourceRef};

    #[test]
    fn test_absent_policy() {
        let snapshot = PageSnapshot::new("https://example.com/")
            .with_resource(ResourceRef::external(ResourceKind::Script, "https://cdn-a.com/a.js"));

        let result = CspAnalyzer::default().analyze(&snapshot).unwrap();
        assert_eq!(result.score, 0);
        assert_eq!(result.csp, None);
        assert!(!result.stats.has_csp);
        assert_eq!(result.issues[0].code, FindingCode::NoCsp);
        assert!(result.recommendations[0]
            .implementation
            .contains("script-src 'self' cdn-a.com;"));
    }

    #[test]
    fn test_present_policy() {
        let snapshot = PageSnapshot::new("https://example.com/")
            .with_policy("default-src 'self'; frame-ancestors 'self'")
            .with_resource(ResourceRef::external(ResourceKind::Image, "https://img.test/a.png"));

        let result = CspAnalyzer::default().analyze(&snapshot).unwrap();
        assert_eq!(result.source, Some(PolicySource::Meta));
        assert_eq!(result.stats.directives_count, 2);
        assert_eq!(result.stats.security_level, SecurityLevel::Strong);
        assert_eq!(result.issues_with(FindingCode::WouldBeBlocked).count(), 1);
        // 30 + (5 + 3) + 30 + (20 - 5)
        assert_eq!(result.score, 83);
        assert_eq!(result.breakdown.total(), result.score);
    }

    #[test]
    fn test_invalid_page_url() {
        let snapshot = PageSnapshot::new("not a url").with_policy("default-src 'self'");
        assert!(CspAnalyzer::default().analyze(&snapshot).is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let snapshot = PageSnapshot::new("https://example.com/").with_policy("script-src 'self'; img-src");
        let result = CspAnalyzer::default().analyze(&snapshot).unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["stats"]["hasCSP"], true);
        assert_eq!(json["stats"]["securityLevel"], "weak");
        assert_eq!(json["source"], "meta");
        assert_eq!(json["directives"]["script-src"][0], "'self'");
        assert_eq!(json["directives"]["img-src"].as_array().unwrap().len(), 0);
        assert!(json.get("breakdown").is_none());
    }
}
