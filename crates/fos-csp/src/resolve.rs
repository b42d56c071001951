//! Directive resolution
//!
//! An empty source list blocks everything; a missing directive leaves the
//! category unrestricted. The two are never conflated.

use crate::directive::{Category, DEFAULT_SRC};
use crate::policy::{ContentSecurityPolicy, Directive};

/// Outcome of resolving a category against a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// A directive governs the category
    Governed {
        directive: &'a Directive,
        /// The list was inherited from `default-src`
        via_default: bool,
    },
    /// No directive governs the category
    Unrestricted,
}

impl<'a> Resolution<'a> {
    pub fn directive(&self) -> Option<&'a Directive> {
        match self {
            Resolution::Governed { directive, .. } => Some(directive),
            Resolution::Unrestricted => None,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Resolution::Unrestricted)
    }
}

impl ContentSecurityPolicy {
    /// Resolve the directive governing a category
    pub fn resolve(&self, category: Category) -> Resolution<'_> {
        self.resolve_chain(category, category.directives())
    }

    /// Resolve the directive governing inline attributes of a category
    pub fn resolve_attribute(&self, category: Category) -> Resolution<'_> {
        self.resolve_chain(category, category.attribute_directives())
    }

    fn resolve_chain(&self, category: Category, chain: &[&str]) -> Resolution<'_> {
        if let Some(directive) = chain.iter().find_map(|name| self.get(name)) {
            return Resolution::Governed {
                directive,
                via_default: false,
            };
        }

        if category.falls_back_to_default() {
            if let Some(directive) = self.get(DEFAULT_SRC) {
                return Resolution::Governed {
                    directive,
                    via_default: true,
                };
            }
        }

        Resolution::Unrestricted
    }
}
