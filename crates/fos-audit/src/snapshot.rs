//! Page snapshot
//!
//! The immutable view of a page an analysis run works on. It is taken once,
//! before evaluation, and passed explicitly to every component.

use fos_csp::{Category, InlineKind, NonceAttr, Origin, Subject};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AuditError;

/// Element kinds that load or embed content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Script,
    Style,
    Image,
    Frame,
    Font,
    Media,
    Object,
    Form,
}

impl ResourceKind {
    /// Directive category governing this kind
    pub fn category(&self) -> Category {
        match self {
            ResourceKind::Script => Category::Script,
            ResourceKind::Style => Category::Style,
            ResourceKind::Image => Category::Image,
            ResourceKind::Frame => Category::Frame,
            ResourceKind::Font => Category::Font,
            ResourceKind::Media => Category::Media,
            ResourceKind::Object => Category::Object,
            ResourceKind::Form => Category::FormAction,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Script => "script",
            ResourceKind::Style => "style",
            ResourceKind::Image => "image",
            ResourceKind::Frame => "frame",
            ResourceKind::Font => "font",
            ResourceKind::Media => "media",
            ResourceKind::Object => "object",
            ResourceKind::Form => "form",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource-consuming element or inline code block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub kind: ResourceKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "isInline")]
    pub inline: bool,
    #[serde(default, alias = "nonceValue")]
    pub nonce: Option<String>,
    #[serde(default)]
    pub has_nonce_attribute: bool,
    /// Attribute carrying the inline content (`style`, `onclick`, ...)
    #[serde(default)]
    pub attribute: Option<String>,
}

impl ResourceRef {
    /// Element loading `url`
    pub fn external(kind: ResourceKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: Some(url.into()),
            inline: false,
            nonce: None,
            has_nonce_attribute: false,
            attribute: None,
        }
    }

    /// Inline `<script>` or `<style>` body
    pub fn inline(kind: ResourceKind) -> Self {
        Self {
            kind,
            url: None,
            inline: true,
            nonce: None,
            has_nonce_attribute: false,
            attribute: None,
        }
    }

    /// Inline attribute such as `style=""` or `onclick=""`
    pub fn attribute(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            attribute: Some(name.into()),
            ..Self::inline(kind)
        }
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self.has_nonce_attribute = true;
        self
    }

    /// Nonce attribute present, value not observable
    pub fn with_hidden_nonce(mut self) -> Self {
        self.nonce = None;
        self.has_nonce_attribute = true;
        self
    }

    pub fn nonce_attr(&self) -> NonceAttr<'_> {
        match self.nonce.as_deref() {
            Some(value) if !value.is_empty() => NonceAttr::Value(value),
            _ if self.has_nonce_attribute => NonceAttr::Hidden,
            _ => NonceAttr::Absent,
        }
    }

    /// Human-readable reference used in findings
    pub fn describe(&self) -> String {
        match (&self.attribute, &self.url) {
            (Some(attribute), _) => format!("{}=\"...\" attribute", attribute),
            (None, _) if self.inline => format!("inline <{}>", self.element_name()),
            (None, Some(url)) => url.clone(),
            (None, None) => format!("<{}> without URL", self.element_name()),
        }
    }

    fn element_name(&self) -> &'static str {
        match self.kind {
            ResourceKind::Script => "script",
            ResourceKind::Style => "style",
            ResourceKind::Image => "img",
            ResourceKind::Frame => "iframe",
            ResourceKind::Font => "font",
            ResourceKind::Media => "video",
            ResourceKind::Object => "object",
            ResourceKind::Form => "form",
        }
    }
}

/// An in-page `<meta http-equiv>` policy declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDeclaration {
    pub http_equiv: String,
    pub content: String,
    #[serde(default = "default_in_head")]
    pub in_head: bool,
}

fn default_in_head() -> bool {
    true
}

/// Immutable snapshot of the page under analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub page_url: String,
    #[serde(default)]
    pub policies: Vec<PolicyDeclaration>,
    #[serde(default)]
    pub resources: Vec<ResourceRef>,
    /// Kinds the snapshot could not enumerate (cross-origin stylesheets, ...)
    #[serde(default)]
    pub unreadable: Vec<ResourceKind>,
}

impl PageSnapshot {
    pub fn new(page_url: impl Into<String>) -> Self {
        Self {
            page_url: page_url.into(),
            policies: Vec::new(),
            resources: Vec::new(),
            unreadable: Vec::new(),
        }
    }

    /// Add a `Content-Security-Policy` meta declaration in `<head>`
    pub fn with_policy(mut self, content: impl Into<String>) -> Self {
        self.policies.push(PolicyDeclaration {
            http_equiv: "Content-Security-Policy".to_string(),
            content: content.into(),
            in_head: true,
        });
        self
    }

    pub fn with_resource(mut self, resource: ResourceRef) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_unreadable(mut self, kind: ResourceKind) -> Self {
        self.unreadable.push(kind);
        self
    }

    /// Parse a snapshot supplied as JSON
    pub fn from_json(json: &str) -> Result<Self, AuditError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_readable(&self, kind: ResourceKind) -> bool {
        !self.unreadable.contains(&kind)
    }
}

/// The page URL and origin resolved once per run
#[derive(Debug, Clone)]
pub struct PageContext {
    pub url: Url,
    pub origin: Origin,
}

impl PageContext {
    pub fn new(page_url: &str) -> Result<Self, AuditError> {
        let origin = Origin::parse(page_url)?;
        let url = Url::parse(page_url.trim())?;
        Ok(Self { url, origin })
    }

    /// Resolve a possibly relative resource URL against the page
    pub fn resolve(&self, raw: &str) -> Option<Url> {
        match self.url.join(raw.trim()) {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::debug!(url = raw, error = %err, "skipping unresolvable resource URL");
                None
            }
        }
    }

    pub fn is_cross_origin(&self, url: &Url) -> bool {
        !self.origin.contains(url)
    }
}

/// A resource together with its resolved URL, ready for matching
#[derive(Debug, Clone)]
pub(crate) struct ResolvedResource<'a> {
    pub resource: &'a ResourceRef,
    pub url: Option<Url>,
}

impl<'a> ResolvedResource<'a> {
    /// `None` for an external resource whose URL is missing or unresolvable
    pub fn new(resource: &'a ResourceRef, page: &PageContext) -> Option<Self> {
        if resource.inline {
            return Some(Self { resource, url: None });
        }
        let url = page.resolve(resource.url.as_deref()?)?;
        Some(Self {
            resource,
            url: Some(url),
        })
    }

    pub fn subject(&self) -> Subject<'_> {
        let nonce = self.resource.nonce_attr();
        match &self.url {
            Some(url) => Subject::Url { url, nonce },
            None => {
                let kind = if self.resource.attribute.is_some() {
                    InlineKind::Attribute
                } else {
                    InlineKind::Element
                };
                // Attributes cannot carry a nonce of their own.
                let nonce = if kind == InlineKind::Attribute { NonceAttr::Absent } else { nonce };
                Subject::Inline { kind, nonce }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_from_json() {
        let json = r#"{
            "pageUrl": "https://example.com/",
            "policies": [{ "httpEquiv": "Content-Security-Policy", "content": "default-src 'self'" }],
            "resources": [
                { "kind": "script", "url": "https://cdn.test/a.js" },
                { "kind": "style", "inline": true, "attribute": "style" }
            ],
            "unreadable": ["style"]
        }"#;
        let snapshot = PageSnapshot::from_json(json).unwrap();

        assert!(snapshot.policies[0].in_head);
        assert_eq!(snapshot.resources.len(), 2);
        assert!(!snapshot.is_readable(ResourceKind::Style));
    }

    #[test]
    fn test_snapshot_collaborator_field_names() {
        let json = r#"{
            "pageUrl": "https://example.com/",
            "resources": [
                { "kind": "script", "url": null, "isInline": true, "nonceValue": "abc" },
                { "kind": "style", "url": null, "isInline": true, "nonceValue": null }
            ]
        }"#;
        let snapshot = PageSnapshot::from_json(json).unwrap();

        assert!(snapshot.resources.iter().all(|r| r.inline));
        assert_eq!(snapshot.resources[0].nonce.as_deref(), Some("abc"));
        assert_eq!(snapshot.resources[0].nonce_attr(), NonceAttr::Value("abc"));
        assert_eq!(snapshot.resources[1].nonce_attr(), NonceAttr::Absent);
    }

    #[test]
    fn test_nonce_attr() {
        let script = ResourceRef::inline(ResourceKind::Script);
        assert_eq!(script.nonce_attr(), NonceAttr::Absent);
        assert_eq!(script.clone().with_nonce("abc").nonce_attr(), NonceAttr::Value("abc"));
        assert_eq!(script.with_hidden_nonce().nonce_attr(), NonceAttr::Hidden);
    }

    #[test]
    fn test_describe() {
        assert_eq!(ResourceRef::inline(ResourceKind::Script).describe(), "inline <script>");
        assert_eq!(
            ResourceRef::attribute(ResourceKind::Script, "onclick").describe(),
            "onclick=\"...\" attribute"
        );
        assert_eq!(
            ResourceRef::external(ResourceKind::Image, "https://img.test/a.png").describe(),
            "https://img.test/a.png"
        );
    }

    #[test]
    fn test_page_context_resolves_relative() {
        let page = PageContext::new("https://example.com/blog/post").unwrap();
        let url = page.resolve("../static/app.js").unwrap();
        assert_eq!(url.as_str(), "https://example.com/static/app.js");
        assert!(!page.is_cross_origin(&url));
    }

    #[test]
    fn test_page_context_rejects_opaque() {
        assert!(PageContext::new("about:blank").is_err());
    }
}
