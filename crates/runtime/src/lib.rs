//! shellview runtime - connection establishment and session relay
//!
//! This crate bridges an interactive panel to a remote line-oriented execution
//! endpoint:
//!
//! - **Transport**: raw text frames over WebSocket (or in memory for tests)
//! - **Establisher**: starts a link and waits until it reports open
//! - **Relay**: panel input out as lines, remote frames back as display updates
//! - **Session**: owns one panel's connection from creation to disposal
//!
//! # Architecture
//!
//! ```text
//! ┌───────┐   execute    ┌─────────┐  "value\n"  ┌────────┐
//! │ Panel │ ───────────▶ │ Session │ ──────────▶ │ Remote │
//! │       │ ◀─────────── │ (Relay) │ ◀────────── │        │
//! └───────┘ updateOutput └─────────┘  raw frame  └────────┘
//! ```
//!
//! The session starts connecting as soon as it is spawned; the relay only runs
//! once the establisher saw the link open.

pub mod connection;
pub mod error;
pub mod establish;
pub mod relay;
pub mod session;
pub mod state;
pub mod surface;
pub mod transport;

pub use connection::Connection;
pub use error::{Error, Result, SendError};
pub use establish::{EstablishOptions, PendingConnection, Readiness, establish};
pub use relay::{Relay, RelayOutcome, RelayStats, StopReason};
pub use session::{PendingInputPolicy, SessionConfig, SessionHandle, SessionReport};
pub use state::{ConnectionState, StateReporter};
pub use surface::{Displays, SurfaceHandle, SurfacePort, Submitter};
pub use transport::{
	Connector, MemoryConnector, MemoryRemote, TransportParts, WebSocketConnector,
};
