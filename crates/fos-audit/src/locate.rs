//! Policy source locator
//!
//! Only `<meta http-equiv>` policies are observable from inside the page.

use serde::{Deserialize, Serialize};

use crate::finding::{Finding, FindingCode, Severity};
use crate::snapshot::PageSnapshot;

const CSP_HTTP_EQUIV: &str = "content-security-policy";
const CSP_REPORT_ONLY_HTTP_EQUIV: &str = "content-security-policy-report-only";

/// Where the analyzed policy came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicySource {
    Meta,
}

/// The declaration chosen for analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatedPolicy<'a> {
    pub text: &'a str,
    pub source: PolicySource,
}

/// Locator outcome: the policy, if any, plus notes about ignored declarations
#[derive(Debug, Clone, Default)]
pub struct Location<'a> {
    pub policy: Option<LocatedPolicy<'a>>,
    pub findings: Vec<Finding>,
}

/// Find the first enforceable in-page policy declaration
pub fn locate(snapshot: &PageSnapshot) -> Location<'_> {
    let mut location = Location::default();
    let mut report_only = 0usize;
    let mut outside_head = 0usize;
    let mut additional = 0usize;

    for declaration in &snapshot.policies {
        let http_equiv = declaration.http_equiv.trim().to_ascii_lowercase();
        if http_equiv == CSP_REPORT_ONLY_HTTP_EQUIV {
            report_only += 1;
            continue;
        }
        if http_equiv != CSP_HTTP_EQUIV {
            continue;
        }
        if !declaration.in_head {
            outside_head += 1;
            continue;
        }
        if location.policy.is_some() {
            additional += 1;
            continue;
        }
        location.policy = Some(LocatedPolicy {
            text: declaration.content.as_str(),
            source: PolicySource::Meta,
        });
    }

    if report_only > 0 {
        location.findings.push(
            Finding::new(
                FindingCode::ReportOnlyIgnored,
                Severity::Info,
                "Report-only policy in a meta tag is ignored",
            )
            .with_detail(format!(
                "{} Content-Security-Policy-Report-Only meta declaration(s) found; browsers only honor report-only policies delivered as HTTP headers",
                report_only
            ))
            .with_remediation("Send Content-Security-Policy-Report-Only as a response header instead"),
        );
    }

    if outside_head > 0 {
        location.findings.push(
            Finding::new(
                FindingCode::PolicyOutsideHead,
                Severity::Info,
                "Policy meta tag outside <head> is ignored",
            )
            .with_detail(format!(
                "{} Content-Security-Policy meta declaration(s) appear outside the document head",
                outside_head
            ))
            .with_remediation("Move the meta tag into <head>, before any script or style"),
        );
    }

    if additional > 0 {
        location.findings.push(
            Finding::new(
                FindingCode::AdditionalPolicy,
                Severity::Info,
                "Multiple policy declarations found",
            )
            .with_detail(format!(
                "Only the first declaration was analyzed; {} further declaration(s) are also enforced by browsers",
                additional
            ))
            .with_remediation("Merge the policies into a single declaration"),
        );
    }

    tracing::debug!(found = location.policy.is_some(), "located content security policy");
    location
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::PolicyDeclaration;

    fn declaration(http_equiv: &str, content: &str, in_head: bool) -> PolicyDeclaration {
        PolicyDeclaration {
            http_equiv: http_equiv.to_string(),
            content: content.to_string(),
            in_head,
        }
    }

    #[test]
    fn test_absent() {
        let snapshot = PageSnapshot::new("https://example.com/");
        let location = locate(&snapshot);
        assert!(location.policy.is_none());
        assert!(location.findings.is_empty());
    }

    #[test]
    fn test_first_declaration_case_insensitive() {
        let mut snapshot = PageSnapshot::new("https://example.com/");
        snapshot.policies.push(declaration("content-SECURITY-policy", "default-src 'self'", true));
        snapshot.policies.push(declaration("Content-Security-Policy", "img-src *", true));

        let location = locate(&snapshot);
        assert_eq!(location.policy.unwrap().text, "default-src 'self'");
        assert_eq!(location.findings.len(), 1);
        assert_eq!(location.findings[0].code, FindingCode::AdditionalPolicy);
    }

    #[test]
    fn test_report_only_and_body_declarations_skipped() {
        let mut snapshot = PageSnapshot::new("https://example.com/");
        snapshot
            .policies
            .push(declaration("Content-Security-Policy-Report-Only", "default-src 'self'", true));
        snapshot.policies.push(declaration("Content-Security-Policy", "default-src 'self'", false));

        let location = locate(&snapshot);
        assert!(location.policy.is_none());
        let codes: Vec<_> = location.findings.iter().map(|f| f.code).collect();
        assert_eq!(codes, vec![FindingCode::ReportOnlyIgnored, FindingCode::PolicyOutsideHead]);
    }
}
