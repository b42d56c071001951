//! Policy synthesis
//!
//! Builds a recommended policy from a fixed baseline plus the external hosts
//! the page already loads scripts, styles and images from.

use fos_csp::directive::{self, SCRIPT_SRC};
use fos_csp::{Category, ContentSecurityPolicy, Keyword};

use crate::classify::SecurityLevel;
use crate::evaluate::{CRITICAL_CATEGORIES, missing_severity, suggested_directive};
use crate::finding::{Finding, FindingCode, Priority, Recommendation, Severity};
use crate::snapshot::{PageContext, PageSnapshot, ResourceKind};

/// Recommended policy for a page with no external dependencies
pub const BASELINE_POLICY: &str =
    "default-src 'self'; script-src 'self'; object-src 'none'; frame-ancestors 'self'; upgrade-insecure-requests;";

/// Resource kinds whose external hosts are carried into the recommendation
const DEPENDENCY_KINDS: [ResourceKind; 3] = [ResourceKind::Script, ResourceKind::Style, ResourceKind::Image];

/// Synthesized policy text and the hosts it allows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedPolicy {
    pub policy: String,
    /// Hosts included, first-seen order
    pub domains: Vec<String>,
    /// Hosts seen but left out because of the cap
    pub omitted: Vec<String>,
}

impl SynthesizedPolicy {
    pub fn is_complete(&self) -> bool {
        self.omitted.is_empty()
    }

    /// Meta tag carrying the policy
    pub fn meta_tag(&self) -> String {
        format!(
            "<meta http-equiv=\"Content-Security-Policy\" content=\"{}\">",
            self.policy
        )
    }

    /// Finding for a recommendation truncated by the domain cap
    pub fn incomplete_finding(&self) -> Option<Finding> {
        if self.is_complete() {
            return None;
        }
        Some(
            Finding::new(
                FindingCode::IncompleteRecommendation,
                Severity::Info,
                "Recommended policy does not list every external host",
            )
            .with_detail(format!(
                "Only the first {} external hosts were included; left out: {}",
                self.domains.len(),
                self.omitted.join(" ")
            ))
            .with_remediation("Review the remaining hosts and add the ones the page needs"),
        )
    }
}

/// Builds recommended policies from a page snapshot
#[derive(Debug, Clone, Copy)]
pub struct Synthesizer {
    max_domains: usize,
}

impl Synthesizer {
    pub fn new(max_domains: usize) -> Self {
        Self { max_domains }
    }

    pub fn synthesize(&self, snapshot: &PageSnapshot, page: &PageContext) -> SynthesizedPolicy {
        let mut hosts: Vec<String> = Vec::new();

        for resource in &snapshot.resources {
            if resource.inline || !DEPENDENCY_KINDS.contains(&resource.kind) {
                continue;
            }
            let Some(url) = resource.url.as_deref().and_then(|raw| page.resolve(raw)) else {
                continue;
            };
            if !page.is_cross_origin(&url) {
                continue;
            }
            // A bare host only admits the scheme's default port
            let host = match (url.host_str(), url.port()) {
                (Some(host), Some(port)) => format!("{}:{}", host, port),
                (Some(host), None) => host.to_string(),
                (None, _) => continue,
            };
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }

        let omitted = if hosts.len() > self.max_domains {
            hosts.split_off(self.max_domains)
        } else {
            Vec::new()
        };

        tracing::debug!(
            domains = hosts.len(),
            omitted = omitted.len(),
            "synthesized recommended policy"
        );

        SynthesizedPolicy {
            policy: render(&hosts),
            domains: hosts,
            omitted,
        }
    }
}

fn render(domains: &[String]) -> String {
    if domains.is_empty() {
        return BASELINE_POLICY.to_string();
    }
    let sources = format!("'self' {}", domains.join(" "));
    format!(
        "default-src {sources}; script-src {sources}; object-src 'none'; frame-ancestors 'self'; upgrade-insecure-requests;"
    )
}

/// Recommendation for a page without any policy
pub fn absent_recommendation(synthesized: &SynthesizedPolicy) -> Recommendation {
    Recommendation::new(
        "Add a Content Security Policy",
        "The page declares no policy, so injected scripts run unrestricted. Start from this policy and tighten it; \
         send it as a response header so frame-ancestors also takes effect.",
        synthesized.meta_tag(),
        Priority::High,
    )
}

/// Recommendations for strengthening an existing policy
pub fn hardening(
    policy: &ContentSecurityPolicy,
    level: SecurityLevel,
    synthesized: &SynthesizedPolicy,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    for category in CRITICAL_CATEGORIES {
        if !policy.resolve(category).is_unrestricted() {
            continue;
        }
        let priority = match missing_severity(category) {
            Severity::Critical => Priority::High,
            Severity::Major => Priority::Medium,
            _ => Priority::Low,
        };
        recommendations.push(Recommendation::new(
            format!("Add {}", category.primary_directive()),
            missing_description(category),
            format!("{};", suggested_directive(category)),
            priority,
        ));
    }

    let unsafe_script = policy
        .iter()
        .filter(|d| directive::governs_scripts(&d.name))
        .any(|d| d.has_keyword(Keyword::UnsafeInline) || d.has_keyword(Keyword::UnsafeEval));
    if unsafe_script {
        recommendations.push(Recommendation::new(
            "Replace 'unsafe-inline' and 'unsafe-eval' with nonces",
            "Give each legitimate inline script a per-response nonce, move string evaluation out of the code, \
             then drop the unsafe keywords.",
            format!("{} 'self' 'nonce-{{RANDOM}}';", SCRIPT_SRC),
            Priority::High,
        ));
    }

    if level < SecurityLevel::Strong {
        recommendations.push(Recommendation::new(
            "Adopt a strict baseline policy",
            format!(
                "The current policy is rated {}. This baseline keeps the external hosts the page already uses.",
                level
            ),
            synthesized.meta_tag(),
            if level == SecurityLevel::Moderate {
                Priority::Low
            } else {
                Priority::Medium
            },
        ));
    }

    recommendations
}

fn missing_description(category: Category) -> String {
    if category.falls_back_to_default() {
        format!(
            "Nothing restricts {} resources. Add {} or a default-src fallback.",
            category,
            category.primary_directive()
        )
    } else {
        format!(
            "{} does not inherit from default-src and must be set explicitly.",
            category.primary_directive()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::ResourceRef;

    fn page() -> PageContext {
        PageContext::new("https://example.com/").unwrap()
    }

    #[test]
    fn test_baseline_without_external_hosts() {
        let snapshot = PageSnapshot::new("https://example.com/")
            .with_resource(ResourceRef::external(ResourceKind::Script, "/app.js"))
            .with_resource(ResourceRef::inline(ResourceKind::Script));

        let synthesized = Synthesizer::new(5).synthesize(&snapshot, &page());
        assert_eq!(synthesized.policy, BASELINE_POLICY);
        assert!(synthesized.is_complete());
        assert!(synthesized.incomplete_finding().is_none());
    }

    #[test]
    fn test_hosts_first_seen_order_deduplicated() {
        let snapshot = PageSnapshot::new("https://example.com/")
            .with_resource(ResourceRef::external(ResourceKind::Script, "https://cdn-b.com/x.js"))
            .with_resource(ResourceRef::external(ResourceKind::Style, "https://CDN-A.com/x.css"))
            .with_resource(ResourceRef::external(ResourceKind::Image, "https://cdn-b.com/x.png"))
            .with_resource(ResourceRef::external(ResourceKind::Frame, "https://frames.test/"))
            .with_resource(ResourceRef::external(ResourceKind::Image, "data:image/png;base64,AAAA"));

        let synthesized = Synthesizer::new(5).synthesize(&snapshot, &page());
        assert_eq!(synthesized.domains, vec!["cdn-b.com", "cdn-a.com"]);
        assert!(synthesized
            .policy
            .contains("script-src 'self' cdn-b.com cdn-a.com;"));
        assert!(synthesized.policy.starts_with("default-src 'self' cdn-b.com cdn-a.com;"));
    }

    #[test]
    fn test_non_default_port_kept() {
        let snapshot = PageSnapshot::new("https://example.com/")
            .with_resource(ResourceRef::external(ResourceKind::Script, "https://cdn.test:8443/a.js"))
            .with_resource(ResourceRef::external(ResourceKind::Script, "https://cdn.test:443/b.js"))
            .with_resource(ResourceRef::external(ResourceKind::Image, "https://cdn.test:8443/c.png"));

        let synthesized = Synthesizer::new(5).synthesize(&snapshot, &page());
        assert_eq!(synthesized.domains, vec!["cdn.test:8443", "cdn.test"]);
        assert!(synthesized.policy.contains("script-src 'self' cdn.test:8443 cdn.test;"));
    }

    #[test]
    fn test_cap() {
        let mut snapshot = PageSnapshot::new("https://example.com/");
        for i in 0..7 {
            snapshot = snapshot.with_resource(ResourceRef::external(
                ResourceKind::Script,
                format!("https://cdn{}.test/app.js", i),
            ));
        }

        let synthesized = Synthesizer::new(5).synthesize(&snapshot, &page());
        assert_eq!(synthesized.domains.len(), 5);
        assert_eq!(synthesized.omitted, vec!["cdn5.test", "cdn6.test"]);
        let finding = synthesized.incomplete_finding().unwrap();
        assert_eq!(finding.code, FindingCode::IncompleteRecommendation);
    }

    #[test]
    fn test_hardening() {
        let policy = ContentSecurityPolicy::parse("default-src 'self'; script-src 'self' 'unsafe-inline'");
        let synthesized = Synthesizer::new(5).synthesize(&PageSnapshot::new("https://example.com/"), &page());

        let recommendations = hardening(&policy, SecurityLevel::Weak, &synthesized);
        let titles: Vec<_> = recommendations.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Add form-action",
                "Add frame-ancestors",
                "Add base-uri",
                "Replace 'unsafe-inline' and 'unsafe-eval' with nonces",
                "Adopt a strict baseline policy",
            ]
        );
        assert_eq!(recommendations[0].implementation, "form-action 'self';");
        assert_eq!(recommendations[2].priority, Priority::Low);
    }

    #[test]
    fn test_strong_policy_needs_no_baseline() {
        let policy = ContentSecurityPolicy::parse(
            "default-src 'self'; form-action 'self'; frame-ancestors 'none'; base-uri 'none'",
        );
        let synthesized = Synthesizer::new(5).synthesize(&PageSnapshot::new("https://example.com/"), &page());
        assert!(hardening(&policy, SecurityLevel::Strong, &synthesized).is_empty());
    }
}
