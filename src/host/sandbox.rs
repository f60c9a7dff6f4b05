//! Sandbox capability set of the isolated execution context.

use std::fmt;

/// One `sandbox` token granted to the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Run scripts.
    Scripts,
    /// Keep the guest's own origin, so its local storage works.
    SameOrigin,
    /// Submit forms.
    Forms,
    /// Open popups.
    Popups,
    /// Trigger `alert`/`confirm`/`prompt`.
    Modals,
}

impl Capability {
    pub const fn token(self) -> &'static str {
        match self {
            Self::Scripts => "allow-scripts",
            Self::SameOrigin => "allow-same-origin",
            Self::Forms => "allow-forms",
            Self::Popups => "allow-popups",
            Self::Modals => "allow-modals",
        }
    }
}

/// A fixed set of sandbox capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxPolicy(&'static [Capability]);

/// Capabilities typical demo code needs, and nothing more.
///
/// Top-level navigation, pointer lock, downloads and the like stay denied.
/// `allow-same-origin` is only safe because guest documents are served from
/// a different origin than the host page.
pub const PREVIEW_SANDBOX: SandboxPolicy = SandboxPolicy(&[
    Capability::Scripts,
    Capability::SameOrigin,
    Capability::Forms,
    Capability::Popups,
    Capability::Modals,
]);

impl SandboxPolicy {
    /// Value of the iframe `sandbox` attribute.
    pub fn attribute(&self) -> String {
        self.0
            .iter()
            .map(|c| c.token())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Value of the `Content-Security-Policy` header for guest documents.
    ///
    /// Applies the same sandbox when the document is opened outside the
    /// preview frame.
    pub fn csp_header(&self) -> String {
        format!("sandbox {}", self.attribute())
    }
}

impl fmt::Display for SandboxPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.attribute())
    }
}
