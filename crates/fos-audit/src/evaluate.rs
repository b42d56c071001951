//! Policy evaluation
//!
//! Consistency findings name page resources the policy would block; safety
//! findings name source lists that weaken protection. Each check returns its
//! own findings and never sees another check's output.

use std::collections::{BTreeSet, HashSet};

use fos_csp::directive::{self, META_IGNORED};
use fos_csp::{
    Category, ContentSecurityPolicy, Directive, Keyword, MatchedBy, Resolution, SourceExpression, SourceMatcher,
    UnsafeToken,
};
use url::Url;

use crate::config::AuditConfig;
use crate::finding::{Finding, FindingCode, Severity};
use crate::snapshot::{PageContext, PageSnapshot, ResolvedResource, ResourceKind, ResourceRef};

/// Categories resolved whether or not the page loads anything for them
pub(crate) const CRITICAL_CATEGORIES: [Category; 5] = [
    Category::Script,
    Category::Object,
    Category::FormAction,
    Category::FrameAncestors,
    Category::BaseUri,
];

/// Severity of a category left without any governing directive
pub fn missing_severity(category: Category) -> Severity {
    match category {
        Category::Script => Severity::Critical,
        Category::Object | Category::FormAction | Category::FrameAncestors => Severity::Major,
        _ => Severity::Minor,
    }
}

/// Directive text recommended when a category is unrestricted
pub(crate) fn suggested_directive(category: Category) -> &'static str {
    match category {
        Category::Script => "script-src 'self'",
        Category::Object => "object-src 'none'",
        Category::FormAction => "form-action 'self'",
        Category::FrameAncestors => "frame-ancestors 'self'",
        Category::BaseUri => "base-uri 'self'",
        Category::Style => "style-src 'self'",
        Category::Image => "img-src 'self'",
        Category::Frame => "frame-src 'self'",
        Category::Font => "font-src 'self'",
        Category::Media => "media-src 'self'",
        Category::Connect => "connect-src 'self'",
    }
}

/// Evaluates one parsed policy against one page
#[derive(Debug)]
pub struct Evaluator<'a> {
    policy: &'a ContentSecurityPolicy,
    page: &'a PageContext,
    matcher: SourceMatcher<'a>,
    config: &'a AuditConfig,
}

impl<'a> Evaluator<'a> {
    pub fn new(policy: &'a ContentSecurityPolicy, page: &'a PageContext, config: &'a AuditConfig) -> Self {
        Self {
            policy,
            page,
            matcher: SourceMatcher::new(&page.origin),
            config,
        }
    }

    /// Resolve and match every snapshot resource; report missing critical directives
    pub fn consistency(&self, snapshot: &PageSnapshot) -> Vec<Finding> {
        let mut findings = Vec::new();
        let mut missing = BTreeSet::new();
        let mut blocked = HashSet::new();
        let mut unresolvable = HashSet::new();
        let mut assumed_hashes = 0usize;

        let unreadable: BTreeSet<ResourceKind> = snapshot.unreadable.iter().copied().collect();
        for kind in &unreadable {
            findings.push(
                Finding::new(
                    FindingCode::UnreadableResources,
                    Severity::Info,
                    format!("Could not enumerate {} resources", kind),
                )
                .with_detail(format!(
                    "The page snapshot could not read {} resources (for example cross-origin restrictions); consistency checks for them were skipped",
                    kind
                ))
                .with_remediation("Re-run the audit from a context that can read these resources"),
            );
        }

        for resource in &snapshot.resources {
            if unreadable.contains(&resource.kind) || (resource.inline && !self.config.check_inline) {
                continue;
            }

            let category = resource.kind.category();
            let resolution = if resource.attribute.is_some() {
                self.policy.resolve_attribute(category)
            } else {
                self.policy.resolve(category)
            };
            let (directive, via_default) = match resolution {
                Resolution::Unrestricted => {
                    if missing.insert(category) {
                        findings.push(missing_directive(category).with_element(resource.describe()));
                    }
                    continue;
                }
                Resolution::Governed { directive, via_default } => (directive, via_default),
            };

            let Some(resolved) = ResolvedResource::new(resource, self.page) else {
                let element = resource.describe();
                tracing::debug!(resource = %element, "resource has no usable URL");
                if unresolvable.insert(element.clone()) {
                    findings.push(unresolvable_resource(resource, element));
                }
                continue;
            };

            match self.matcher.matched_by(resolved.subject(), &directive.sources) {
                Some(MatchedBy::Hash) => assumed_hashes += 1,
                Some(_) => {}
                None => {
                    let element = resource.describe();
                    if blocked.insert((directive.name.clone(), element)) {
                        findings.push(would_be_blocked(
                            resource,
                            resolved.url.as_ref(),
                            directive,
                            category,
                            via_default,
                        ));
                    }
                }
            }
        }

        for category in CRITICAL_CATEGORIES {
            if self.policy.resolve(category).is_unrestricted() && missing.insert(category) {
                findings.push(missing_directive(category));
            }
        }

        if assumed_hashes > 0 {
            findings.push(
                Finding::new(
                    FindingCode::UnverifiedHash,
                    Severity::Info,
                    "Inline content assumed allowed by hash sources",
                )
                .with_detail(format!(
                    "{} inline block(s) are only allowed if their digest matches a hash source; digests are not computed by this audit",
                    assumed_hashes
                ))
                .with_remediation("Verify the hashes against the exact inline content after every change"),
            );
        }

        tracing::debug!(findings = findings.len(), "consistency evaluation complete");
        findings
    }

    /// One finding per unsafe token type per directive
    pub fn safety(&self) -> Vec<Finding> {
        let mut findings = Vec::new();

        for directive in self.policy.iter() {
            let severity = if directive::governs_scripts(&directive.name) {
                Severity::Major
            } else {
                Severity::Minor
            };
            for token in directive.unsafe_tokens() {
                findings.push(unsafe_token(token, directive, severity));
            }
        }

        findings
    }

    /// Syntax and delivery issues that do not change matching
    pub fn hygiene(&self) -> Vec<Finding> {
        if !self.config.report_syntax {
            return Vec::new();
        }

        let mut findings = Vec::new();

        for name in self.policy.duplicates() {
            findings.push(
                Finding::new(
                    FindingCode::DuplicateDirective,
                    Severity::Info,
                    format!("Duplicate {} directive ignored", name),
                )
                .with_detail("Only the first occurrence of a directive takes effect")
                .with_remediation(format!("Merge all {} sources into one directive", name)),
            );
        }

        for directive in self.policy.iter() {
            if !directive::is_known(&directive.name) {
                findings.push(
                    Finding::new(
                        FindingCode::UnknownDirective,
                        Severity::Info,
                        format!("Unknown directive {}", directive.name),
                    )
                    .with_detail("Browsers ignore directives they do not recognize")
                    .with_remediation("Check the directive name for typos"),
                );
            }

            if META_IGNORED.iter().any(|name| *name == directive.name) {
                findings.push(
                    Finding::new(
                        FindingCode::IgnoredInMeta,
                        Severity::Info,
                        format!("{} has no effect in a meta tag", directive.name),
                    )
                    .with_detail("Browsers ignore this directive when the policy is delivered with <meta http-equiv>")
                    .with_remediation(format!(
                        "Send {} in a Content-Security-Policy response header",
                        directive.name
                    )),
                );
            }

            let suspicious = suspicious_tokens(directive);
            if !suspicious.is_empty() {
                findings.push(
                    Finding::new(
                        FindingCode::SuspiciousSource,
                        Severity::Minor,
                        format!("Suspicious source expression in {}", directive.name),
                    )
                    .with_detail(format!("Not a valid source or missing quotes: {}", suspicious.join(" ")))
                    .with_remediation("Quote keywords ('self', 'none') and check host syntax"),
                );
            }

            if directive.has_keyword(Keyword::UnsafeInline)
                && directive.sources.iter().any(SourceExpression::is_nonce_or_hash)
            {
                findings.push(
                    Finding::new(
                        FindingCode::NonceOverridesUnsafeInline,
                        Severity::Info,
                        format!("'unsafe-inline' is ignored in {}", directive.name),
                    )
                    .with_detail("When a nonce or hash is present, browsers disregard 'unsafe-inline'")
                    .with_remediation("Keep 'unsafe-inline' only as a fallback for very old browsers"),
                );
            }
        }

        findings
    }
}

fn suspicious_tokens(directive: &Directive) -> Vec<&str> {
    directive
        .sources
        .iter()
        .zip(&directive.raw)
        .filter(|(source, _)| match source {
            SourceExpression::Unknown(_) => true,
            SourceExpression::Host(host) => host.looks_like_unquoted_keyword(),
            _ => false,
        })
        .map(|(_, raw)| raw.as_str())
        .collect()
}

fn missing_directive(category: Category) -> Finding {
    let primary = category.primary_directive();
    let detail = if category.falls_back_to_default() {
        format!(
            "Neither {} nor default-src is present, so {} resources are unrestricted",
            primary, category
        )
    } else {
        format!("{} is absent and does not inherit from default-src", primary)
    };

    Finding::new(
        FindingCode::MissingDirective,
        missing_severity(category),
        format!("No directive restricts {} resources", category),
    )
    .with_detail(detail)
    .with_remediation(format!("Add {}", suggested_directive(category)))
}

fn unresolvable_resource(resource: &ResourceRef, element: String) -> Finding {
    let detail = match &resource.url {
        Some(url) => format!("{} could not be resolved against the page URL", url),
        None => format!("The {} is neither inline nor carries a URL", resource.kind),
    };

    Finding::new(
        FindingCode::UnresolvableResource,
        Severity::Info,
        format!("Could not check {} against the policy", element),
    )
    .with_detail(detail)
    .with_element(element)
    .with_remediation("Mark inline content as inline in the snapshot or supply an absolute URL")
}

fn would_be_blocked(
    resource: &ResourceRef,
    url: Option<&Url>,
    directive: &Directive,
    category: Category,
    via_default: bool,
) -> Finding {
    let severity = match resource.kind {
        ResourceKind::Image | ResourceKind::Font | ResourceKind::Media => Severity::Minor,
        _ => Severity::Major,
    };

    let inherited = if via_default { " (inherited from default-src)" } else { "" };
    let detail = if directive.raw.is_empty() {
        format!("{} has an empty source list{}, which blocks everything", directive.name, inherited)
    } else {
        format!(
            "Not matched by {} {}{}",
            directive.name,
            directive.raw.join(" "),
            inherited
        )
    };

    let remediation = match (url, &resource.attribute) {
        (Some(url), _) => format!(
            "Allow {} in {} if this {} is expected",
            source_for(url),
            category.primary_directive(),
            resource.kind
        ),
        (None, Some(attribute)) => format!(
            "Replace the {} attribute with an external stylesheet or addEventListener",
            attribute
        ),
        (None, None) => format!(
            "Add a nonce to the inline <{}> and list 'nonce-<value>' in {}",
            resource.kind,
            category.primary_directive()
        ),
    };

    Finding::new(
        FindingCode::WouldBeBlocked,
        severity,
        format!("{} would be blocked by {}", resource.describe(), directive.name),
    )
    .with_detail(detail)
    .with_element(resource.describe())
    .with_remediation(remediation)
}

/// Narrowest host source covering a URL
fn source_for(url: &Url) -> String {
    match url.host_str() {
        Some(host) => match url.port() {
            Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
            None => format!("{}://{}", url.scheme(), host),
        },
        None => format!("{}:", url.scheme()),
    }
}

fn unsafe_token(token: UnsafeToken, directive: &Directive, severity: Severity) -> Finding {
    let (code, message, detail, remediation) = match token {
        UnsafeToken::UnsafeInline => (
            FindingCode::UnsafeInline,
            format!("'unsafe-inline' in {}", directive.name),
            "Any inline code injected into the page is allowed to run",
            "Move inline code to external files or allow it with nonces or hashes, then remove 'unsafe-inline'",
        ),
        UnsafeToken::UnsafeEval => (
            FindingCode::UnsafeEval,
            format!("'unsafe-eval' in {}", directive.name),
            "eval(), new Function() and string timers are allowed",
            "Refactor code that evaluates strings, then remove 'unsafe-eval'",
        ),
        UnsafeToken::Wildcard => (
            FindingCode::WildcardSource,
            format!("Wildcard source in {}", directive.name),
            "Any host on the network is allowed",
            "List the specific origins the page needs instead of *",
        ),
        UnsafeToken::DataScheme => (
            FindingCode::DataScheme,
            format!("data: allowed in {}", directive.name),
            "data: URLs can carry attacker-controlled content",
            "Remove data: from this directive; keep it in img-src only if needed",
        ),
    };

    Finding::new(code, severity, message)
        .with_detail(detail)
        .with_remediation(remediation)
}
