//! Configuration section definitions.
//!
//! Each module corresponds to a section in `livepad.toml`:
//!
//! | Module    | TOML Section | Purpose                                  |
//! |-----------|--------------|------------------------------------------|
//! | `serve`   | `[serve]`    | Listeners: host, guest, websocket        |
//! | `preview` | `[preview]`  | Entry point, debounce, document limits   |

mod preview;
mod serve;

pub use preview::PreviewSection;
pub use serve::{ServeConfig, http_origin};
