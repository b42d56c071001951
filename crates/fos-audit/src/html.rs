//! HTML snapshot reader
//!
//! Builds a [`PageSnapshot`] from markup with html5ever's RcDom.

use html5ever::tendril::TendrilSink;
use html5ever::{Attribute, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use url::Url;

use crate::AuditError;
use crate::snapshot::{PageContext, PageSnapshot, PolicyDeclaration, ResourceKind, ResourceRef};

/// `type` values that make a `<script>` executable
const SCRIPT_TYPES: &[&str] = &[
    "module",
    "text/javascript",
    "application/javascript",
    "application/x-javascript",
    "text/ecmascript",
    "application/ecmascript",
    "text/jscript",
];

impl PageSnapshot {
    /// Read policies and resources from an HTML document served at `page_url`
    pub fn from_html(html: &str, page_url: &str) -> Result<Self, AuditError> {
        let page = PageContext::new(page_url)?;

        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())?;

        let base = find_base(&dom.document)
            .and_then(|href| page.resolve(&href))
            .unwrap_or_else(|| page.url.clone());

        let mut reader = SnapshotReader {
            base,
            snapshot: PageSnapshot::new(page_url),
        };
        reader.walk(&dom.document, false);

        tracing::debug!(
            policies = reader.snapshot.policies.len(),
            resources = reader.snapshot.resources.len(),
            "read page snapshot from HTML"
        );
        Ok(reader.snapshot)
    }
}

struct SnapshotReader {
    base: Url,
    snapshot: PageSnapshot,
}

impl SnapshotReader {
    fn walk(&mut self, handle: &Handle, in_head: bool) {
        let in_head = match &handle.data {
            NodeData::Element { name, attrs, .. } => {
                let tag: &str = &name.local;
                self.visit(tag, &attrs.borrow(), handle, in_head);
                in_head || tag == "head"
            }
            _ => in_head,
        };

        for child in handle.children.borrow().iter() {
            self.walk(child, in_head);
        }
    }

    fn visit(&mut self, tag: &str, attrs: &[Attribute], handle: &Handle, in_head: bool) {
        match tag {
            "meta" => {
                if let Some(http_equiv) = attr(attrs, "http-equiv") {
                    self.snapshot.policies.push(PolicyDeclaration {
                        http_equiv: http_equiv.to_string(),
                        content: attr(attrs, "content").unwrap_or_default().to_string(),
                        in_head,
                    });
                }
            }
            "script" if is_executable(attrs) => match attr(attrs, "src") {
                Some(src) => self.external(ResourceKind::Script, src, attrs),
                None => self.inline(ResourceKind::Script, handle, attrs),
            },
            "style" => self.inline(ResourceKind::Style, handle, attrs),
            "link" if is_stylesheet(attrs) => {
                if let Some(href) = attr(attrs, "href") {
                    self.external(ResourceKind::Style, href, attrs);
                }
            }
            "img" => self.src(ResourceKind::Image, "src", attrs),
            "iframe" | "frame" => {
                if let Some(src) = attr(attrs, "src") {
                    let lower = src.trim().to_ascii_lowercase();
                    // Local documents are never fetched
                    if !lower.starts_with("about:") && !lower.starts_with("javascript:") {
                        self.external(ResourceKind::Frame, src, attrs);
                    }
                }
            }
            "object" => self.src(ResourceKind::Object, "data", attrs),
            "embed" => self.src(ResourceKind::Object, "src", attrs),
            "audio" | "video" | "source" | "track" => self.src(ResourceKind::Media, "src", attrs),
            "form" => self.src(ResourceKind::Form, "action", attrs),
            _ => {}
        }

        for attribute in attrs {
            let name: &str = &attribute.name.local;
            if name == "style" {
                self.snapshot
                    .resources
                    .push(ResourceRef::attribute(ResourceKind::Style, name));
            } else if name.starts_with("on") && name.len() > 2 {
                self.snapshot
                    .resources
                    .push(ResourceRef::attribute(ResourceKind::Script, name));
            }
        }
    }

    fn src(&mut self, kind: ResourceKind, name: &str, attrs: &[Attribute]) {
        if let Some(value) = attr(attrs, name) {
            self.external(kind, value, attrs);
        }
    }

    fn external(&mut self, kind: ResourceKind, raw: &str, attrs: &[Attribute]) {
        if raw.trim().is_empty() {
            return;
        }
        match self.base.join(raw.trim()) {
            Ok(url) => {
                let resource = with_nonce(ResourceRef::external(kind, url.to_string()), attrs);
                self.snapshot.resources.push(resource);
            }
            Err(err) => {
                tracing::debug!(url = raw, error = %err, "dropping unresolvable {} URL", kind);
            }
        }
    }

    fn inline(&mut self, kind: ResourceKind, handle: &Handle, attrs: &[Attribute]) {
        if text_content(handle).trim().is_empty() {
            return;
        }
        let resource = with_nonce(ResourceRef::inline(kind), attrs);
        self.snapshot.resources.push(resource);
    }
}

fn attr<'a>(attrs: &'a [Attribute], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|a| &*a.name.local == name)
        .map(|a| &*a.value)
}

fn with_nonce(resource: ResourceRef, attrs: &[Attribute]) -> ResourceRef {
    match attr(attrs, "nonce") {
        Some(nonce) if !nonce.is_empty() => resource.with_nonce(nonce),
        _ => resource,
    }
}

fn is_executable(attrs: &[Attribute]) -> bool {
    match attr(attrs, "type").map(str::trim) {
        None | Some("") => true,
        Some(kind) => SCRIPT_TYPES.iter().any(|t| t.eq_ignore_ascii_case(kind)),
    }
}

fn is_stylesheet(attrs: &[Attribute]) -> bool {
    attr(attrs, "rel").is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
    })
}

fn text_content(handle: &Handle) -> String {
    let mut text = String::new();
    for child in handle.children.borrow().iter() {
        if let NodeData::Text { contents } = &child.data {
            text.push_str(&contents.borrow());
        }
    }
    text
}

/// First `<base href>` in document order
fn find_base(handle: &Handle) -> Option<String> {
    if let NodeData::Element { name, attrs, .. } = &handle.data {
        if &*name.local == "base" {
            if let Some(href) = attr(&attrs.borrow(), "href") {
                return Some(href.to_string());
            }
        }
    }
    handle.children.borrow().iter().find_map(find_base)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta http-equiv="Content-Security-Policy" content="default-src 'self'">
  <base href="https://static.example.com/assets/">
  <link rel="Preload Stylesheet" href="site.css">
  <script src="app.js" nonce="r4nd0m"></script>
  <script type="application/ld+json">{"@type": "Thing"}</script>
  <script>window.ready = true;</script>
  <style>   </style>
</head>
<body onload="init()">
  <meta http-equiv="Content-Security-Policy" content="img-src *">
  <img src="/logo.png" style="width: 10px">
  <iframe src="about:blank"></iframe>
  <iframe src="https://video.test/embed"></iframe>
  <object data="movie.swf"></object>
  <video src="clip.mp4"></video>
  <form action="/login"></form>
</body>
</html>"#;

    fn read() -> PageSnapshot {
        PageSnapshot::from_html(PAGE, "https://example.com/index.html").unwrap()
    }

    #[test]
    fn test_policies_with_head_flag() {
        let snapshot = read();
        assert_eq!(snapshot.policies.len(), 2);
        assert!(snapshot.policies[0].in_head);
        assert!(!snapshot.policies[1].in_head);
        assert_eq!(snapshot.policies[1].content, "img-src *");
    }

    #[test]
    fn test_resources_resolved_against_base() {
        let snapshot = read();
        let urls: Vec<_> = snapshot
            .resources
            .iter()
            .filter_map(|r| r.url.as_deref())
            .collect();

        assert_eq!(
            urls,
            vec![
                "https://static.example.com/assets/site.css",
                "https://static.example.com/assets/app.js",
                "https://static.example.com/logo.png",
                "https://video.test/embed",
                "https://static.example.com/assets/movie.swf",
                "https://static.example.com/assets/clip.mp4",
                "https://static.example.com/login",
            ]
        );
    }

    #[test]
    fn test_inline_content() {
        let snapshot = read();
        let script = &snapshot.resources[1];
        assert_eq!(script.nonce.as_deref(), Some("r4nd0m"));

        let inline: Vec<_> = snapshot
            .resources
            .iter()
            .filter(|r| r.inline)
            .map(ResourceRef::describe)
            .collect();
        // data block and whitespace-only <style> are skipped
        assert_eq!(
            inline,
            vec!["inline <script>", "onload=\"...\" attribute", "style=\"...\" attribute"]
        );
    }

    #[test]
    fn test_opaque_page_url_rejected() {
        assert!(PageSnapshot::from_html("<p>hi</p>", "about:blank").is_err());
    }
}
