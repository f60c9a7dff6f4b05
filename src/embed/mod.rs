//! Embedded static resources for livepad.
//!
//! # Module Structure
//!
//! - `template` - Template types for typed variable injection
//! - `guest` - Resources that end up inside the isolated document
//!   (diagnostics shim, placeholder page)
//! - `serve` - Host-origin preview shell page
//! - `init` - Starter workspace written by `livepad init`
//!
//! # Usage
//!
//! ```ignore
//! use embed::guest::{SHIM_JS, ShimVars};
//!
//! let js = SHIM_JS.render(&ShimVars {
//!     handle: handle.to_string(),
//!     ws_url: "ws://127.0.0.1:5312/".into(),
//! });
//! ```

mod template;

pub use template::{Template, TemplateVars, js_literal};

pub mod guest {
    use super::{Template, TemplateVars, js_literal};

    /// Variables for the diagnostics shim.
    pub struct ShimVars {
        /// Handle id the guest declares as its message source.
        pub handle: String,
        /// WebSocket endpoint of the message channel.
        pub ws_url: String,
    }

    impl TemplateVars for ShimVars {
        fn apply(&self, content: &str) -> String {
            content
                .replace("__LIVEPAD_HANDLE__", &js_literal(&self.handle))
                .replace("__LIVEPAD_WS_URL__", &js_literal(&self.ws_url))
        }
    }

    /// Diagnostics shim installed ahead of any guest script.
    pub const SHIM_JS: Template<ShimVars> = Template::new(include_str!("guest/shim.js"));

    /// Document used when the entry-point markup does not exist.
    pub const PLACEHOLDER_HTML: &str = include_str!("guest/placeholder.html");
}

pub mod serve {
    use super::{Template, TemplateVars, js_literal};

    /// Variables for host.html.
    pub struct HostVars {
        pub ws_url: String,
        /// Value of the iframe `sandbox` attribute.
        pub sandbox: String,
        /// Document of the live run, or `about:blank`.
        pub initial_src: String,
    }

    impl TemplateVars for HostVars {
        fn apply(&self, content: &str) -> String {
            content
                .replace("__LIVEPAD_WS_URL__", &js_literal(&self.ws_url))
                .replace("__LIVEPAD_SANDBOX__", &escape_attr(&self.sandbox))
                .replace("__LIVEPAD_INITIAL_SRC__", &escape_attr(&self.initial_src))
        }
    }

    fn escape_attr(value: &str) -> String {
        value
            .replace('&', "&amp;")
            .replace('"', "&quot;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }

    /// Preview shell page served at the host origin.
    pub const HOST_HTML: Template<HostVars> = Template::new(include_str!("serve/host.html"));
}

pub mod init {
    /// Starter workspace files: `(file name, content)`.
    pub const STARTER_FILES: &[(&str, &str)] = &[
        ("index.html", include_str!("init/index.html")),
        ("style.css", include_str!("init/style.css")),
        ("script.js", include_str!("init/script.js")),
        ("livepad.toml", include_str!("init/livepad.toml")),
    ];
}

#[cfg(test)]
mod tests {
    use super::guest::{PLACEHOLDER_HTML, SHIM_JS, ShimVars};
    use super::serve::{HOST_HTML, HostVars};

    #[test]
    fn test_shim_renders_all_placeholders() {
        let js = SHIM_JS.render(&ShimVars {
            handle: "00ff".into(),
            ws_url: "ws://127.0.0.1:5312/".into(),
        });
        assert!(!js.contains("__LIVEPAD_"));
        assert!(js.contains(r#"var HANDLE = "00ff";"#));
        assert!(js.contains(r#"var WS_URL = "ws://127.0.0.1:5312/";"#));
        assert!(js.contains("unhandledrejection"));
    }

    #[test]
    fn test_host_page_renders_sandbox() {
        let html = HOST_HTML.render(&HostVars {
            ws_url: "ws://localhost:5312/".into(),
            sandbox: "allow-scripts allow-forms".into(),
            initial_src: "about:blank".into(),
        });
        assert!(!html.contains("__LIVEPAD_"));
        assert!(html.contains(r#"sandbox="allow-scripts allow-forms""#));
        assert!(html.contains(r#"src="about:blank""#));
    }

    #[test]
    fn test_placeholder_has_no_script() {
        assert!(!PLACEHOLDER_HTML.to_ascii_lowercase().contains("<script"));
    }
}
