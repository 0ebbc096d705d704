//! Shared types for the shellview session bridge.
//!
//! - [`surface`]: JSON envelope between a rendered panel and its relay
//! - Default endpoint and timing constants shared by the runtime and the CLI

pub mod surface;

pub use surface::{InputMessage, OutputMessage, parse_input};

/// Default remote execution endpoint.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:9280/";

/// Interval between readiness checks when establishing by polling.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Default WebSocket host for the panel server.
pub const PANEL_HOST: &str = "127.0.0.1";

/// Default WebSocket port for the panel server.
pub const PANEL_PORT: u16 = 9281;

/// Route on the panel server that carries the surface envelope.
pub const PANEL_SOCKET_PATH: &str = "/panel";
