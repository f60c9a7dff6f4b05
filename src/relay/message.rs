//! Wire protocol of the guest/host message channel.
//!
//! Every WebSocket client first announces its role:
//!
//! ```text
//! {"role":"host"}                      preview shell page (receives HostEvents)
//! {"role":"guest","handle":"<id>"}     instrumented document (sends GuestMessages)
//! ```
//!
//! Guest messages are tagged by `kind`; anything else is rejected.

use serde::{Deserialize, Serialize};

/// First message of every WebSocket client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ClientHello {
    Host,
    Guest { handle: String },
}

impl ClientHello {
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}

/// Console entry point the guest called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
}

impl ConsoleLevel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Message posted by the diagnostics shim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GuestMessage {
    Console {
        level: ConsoleLevel,
        parts: Vec<String>,
        #[serde(default)]
        timestamp: Option<u64>,
    },
    Error {
        message: String,
        #[serde(default)]
        stack: Option<String>,
        #[serde(default)]
        line: Option<u32>,
        #[serde(default)]
        column: Option<u32>,
    },
    /// The shim connected; the document has loaded far enough to run it.
    Ready,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_roles() {
        assert_eq!(ClientHello::from_json(r#"{"role":"host"}"#), Some(ClientHello::Host));
        assert_eq!(
            ClientHello::from_json(r#"{"role":"guest","handle":"ab"}"#),
            Some(ClientHello::Guest { handle: "ab".into() })
        );
        assert_eq!(ClientHello::from_json(r#"{"role":"admin"}"#), None);
        assert_eq!(ClientHello::from_json(r#"{"role":"guest"}"#), None);
    }

    #[test]
    fn test_console_message() {
        let msg: GuestMessage = serde_json::from_str(
            r#"{"kind":"console","level":"warn","parts":["a","{\"b\":1}"],"timestamp":1700000000000}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            GuestMessage::Console {
                level: ConsoleLevel::Warn,
                parts: vec!["a".into(), r#"{"b":1}"#.into()],
                timestamp: Some(1_700_000_000_000),
            }
        );
    }

    #[test]
    fn test_error_message_optional_fields() {
        let msg: GuestMessage = serde_json::from_str(r#"{"kind":"error","message":"x"}"#).unwrap();
        assert_eq!(
            msg,
            GuestMessage::Error {
                message: "x".into(),
                stack: None,
                line: None,
                column: None,
            }
        );
    }

    #[test]
    fn test_unknown_kind_and_level_rejected() {
        assert!(serde_json::from_str::<GuestMessage>(r#"{"kind":"eval","code":"1"}"#).is_err());
        assert!(
            serde_json::from_str::<GuestMessage>(r#"{"kind":"console","level":"debug","parts":[]}"#)
                .is_err()
        );
        assert!(serde_json::from_str::<GuestMessage>(r#"{"kind":"console","level":"log"}"#).is_err());
    }
}
