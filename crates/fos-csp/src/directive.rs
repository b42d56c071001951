//! Directive names and resource categories

use serde::{Deserialize, Serialize};

/// CSP directive names
pub const DEFAULT_SRC: &str = "default-src";
pub const SCRIPT_SRC: &str = "script-src";
pub const SCRIPT_SRC_ELEM: &str = "script-src-elem";
pub const SCRIPT_SRC_ATTR: &str = "script-src-attr";
pub const STYLE_SRC: &str = "style-src";
pub const STYLE_SRC_ELEM: &str = "style-src-elem";
pub const STYLE_SRC_ATTR: &str = "style-src-attr";
pub const IMG_SRC: &str = "img-src";
pub const FONT_SRC: &str = "font-src";
pub const CONNECT_SRC: &str = "connect-src";
pub const MEDIA_SRC: &str = "media-src";
pub const OBJECT_SRC: &str = "object-src";
pub const FRAME_SRC: &str = "frame-src";
pub const CHILD_SRC: &str = "child-src";
pub const WORKER_SRC: &str = "worker-src";
pub const MANIFEST_SRC: &str = "manifest-src";
pub const PREFETCH_SRC: &str = "prefetch-src";
pub const BASE_URI: &str = "base-uri";
pub const FORM_ACTION: &str = "form-action";
pub const FRAME_ANCESTORS: &str = "frame-ancestors";
pub const NAVIGATE_TO: &str = "navigate-to";
pub const SANDBOX: &str = "sandbox";
pub const PLUGIN_TYPES: &str = "plugin-types";
pub const REPORT_URI: &str = "report-uri";
pub const REPORT_TO: &str = "report-to";
pub const REQUIRE_TRUSTED_TYPES_FOR: &str = "require-trusted-types-for";
pub const TRUSTED_TYPES: &str = "trusted-types";
pub const UPGRADE_INSECURE: &str = "upgrade-insecure-requests";
pub const BLOCK_ALL_MIXED: &str = "block-all-mixed-content";

const KNOWN_DIRECTIVES: &[&str] = &[
    DEFAULT_SRC,
    SCRIPT_SRC,
    SCRIPT_SRC_ELEM,
    SCRIPT_SRC_ATTR,
    STYLE_SRC,
    STYLE_SRC_ELEM,
    STYLE_SRC_ATTR,
    IMG_SRC,
    FONT_SRC,
    CONNECT_SRC,
    MEDIA_SRC,
    OBJECT_SRC,
    FRAME_SRC,
    CHILD_SRC,
    WORKER_SRC,
    MANIFEST_SRC,
    PREFETCH_SRC,
    BASE_URI,
    FORM_ACTION,
    FRAME_ANCESTORS,
    NAVIGATE_TO,
    SANDBOX,
    PLUGIN_TYPES,
    REPORT_URI,
    REPORT_TO,
    REQUIRE_TRUSTED_TYPES_FOR,
    TRUSTED_TYPES,
    UPGRADE_INSECURE,
    BLOCK_ALL_MIXED,
];

/// Directives a `<meta>` delivered policy cannot express
pub const META_IGNORED: &[&str] = &[FRAME_ANCESTORS, REPORT_URI, SANDBOX];

/// Whether a directive name is part of CSP
pub fn is_known(name: &str) -> bool {
    KNOWN_DIRECTIVES.iter().any(|d| *d == name)
}

/// Directives whose source list governs script execution
pub fn governs_scripts(name: &str) -> bool {
    matches!(
        name,
        DEFAULT_SRC | SCRIPT_SRC | SCRIPT_SRC_ELEM | SCRIPT_SRC_ATTR | OBJECT_SRC
    )
}

/// Resource category a directive is resolved for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Script,
    Style,
    Image,
    Frame,
    Font,
    Media,
    Object,
    Connect,
    FormAction,
    FrameAncestors,
    BaseUri,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Script,
        Category::Style,
        Category::Image,
        Category::Frame,
        Category::Font,
        Category::Media,
        Category::Object,
        Category::Connect,
        Category::FormAction,
        Category::FrameAncestors,
        Category::BaseUri,
    ];

    /// Specific directives consulted before `default-src`, most specific first
    pub fn directives(&self) -> &'static [&'static str] {
        match self {
            Category::Script => &[SCRIPT_SRC_ELEM, SCRIPT_SRC],
            Category::Style => &[STYLE_SRC_ELEM, STYLE_SRC],
            Category::Image => &[IMG_SRC],
            Category::Frame => &[FRAME_SRC, CHILD_SRC],
            Category::Font => &[FONT_SRC],
            Category::Media => &[MEDIA_SRC],
            Category::Object => &[OBJECT_SRC],
            Category::Connect => &[CONNECT_SRC],
            Category::FormAction => &[FORM_ACTION],
            Category::FrameAncestors => &[FRAME_ANCESTORS],
            Category::BaseUri => &[BASE_URI],
        }
    }

    /// Chain for inline attributes (`onclick=`, `style=`)
    pub fn attribute_directives(&self) -> &'static [&'static str] {
        match self {
            Category::Script => &[SCRIPT_SRC_ATTR, SCRIPT_SRC],
            Category::Style => &[STYLE_SRC_ATTR, STYLE_SRC],
            _ => self.directives(),
        }
    }

    /// Directive named in messages for this category
    pub fn primary_directive(&self) -> &'static str {
        match self {
            Category::Script => SCRIPT_SRC,
            Category::Style => STYLE_SRC,
            Category::Image => IMG_SRC,
            Category::Frame => FRAME_SRC,
            Category::Font => FONT_SRC,
            Category::Media => MEDIA_SRC,
            Category::Object => OBJECT_SRC,
            Category::Connect => CONNECT_SRC,
            Category::FormAction => FORM_ACTION,
            Category::FrameAncestors => FRAME_ANCESTORS,
            Category::BaseUri => BASE_URI,
        }
    }

    /// Navigation and document directives never inherit `default-src`
    pub fn falls_back_to_default(&self) -> bool {
        !matches!(
            self,
            Category::FormAction | Category::FrameAncestors | Category::BaseUri
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Script => "script",
            Category::Style => "style",
            Category::Image => "image",
            Category::Frame => "frame",
            Category::Font => "font",
            Category::Media => "media",
            Category::Object => "object",
            Category::Connect => "connect",
            Category::FormAction => "form-action",
            Category::FrameAncestors => "frame-ancestors",
            Category::BaseUri => "base-uri",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
