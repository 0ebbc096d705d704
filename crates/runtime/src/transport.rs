//! Transport layer carrying raw text frames to a remote execution endpoint.
//!
//! A [`Connector`] starts a link and hands back [`TransportParts`] right away,
//! with the link still `Connecting`. The parts expose:
//!
//! - a bounded outbound queue of text frames
//! - an unbounded inbound stream of text frames, ending when the link closes
//! - a [`ConnectionState`] watch that doubles as the readiness event
//! - the failure reason, if the link died with an error
//!
//! Dropping the parts tears the link down.

mod memory;
mod websocket;


use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::state::ConnectionState;

pub use memory::{MemoryConnector, MemoryRemote};
pub use websocket::WebSocketConnector;

/// Default number of outbound frames buffered before sends start waiting.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

/// Starts transport links.
///
/// Implementations must return without waiting for the link to open; the
/// establisher observes readiness through [`TransportParts::state`].
pub trait Connector: Send + Sync {
	fn connect(&self, endpoint: &str) -> Result<TransportParts>;
}

/// Both halves of a started link plus its lifecycle signals.
#[derive(Debug)]
pub struct TransportParts {
	pub outbound: mpsc::Sender<String>,
	pub inbound: mpsc::UnboundedReceiver<String>,
	pub state: watch::Receiver<ConnectionState>,
	pub failure: FailureSlot,
	pub guard: Option<TaskGuard>,
}

/// First error reported by a link, shared between its driver and its owner.
#[derive(Debug, Clone, Default)]
pub struct FailureSlot(Arc<Mutex<Option<String>>>);

impl FailureSlot {
	/// Records `reason` unless an earlier failure was already recorded.
	pub fn set(&self, reason: impl Into<String>) {
		let mut slot = self.0.lock();
		if slot.is_none() {
			*slot = Some(reason.into());
		}
	}

	pub fn get(&self) -> Option<String> {
		self.0.lock().clone()
	}
}

/// Owns a link's background task and aborts it when dropped.
#[derive(Debug)]
pub struct TaskGuard {
	handle: Option<JoinHandle<()>>,
}

impl TaskGuard {
	pub fn new(handle: JoinHandle<()>) -> Self {
		Self {
			handle: Some(handle),
		}
	}

	/// Waits up to `grace` for the task to finish on its own, then aborts it.
	pub async fn shutdown(mut self, grace: Duration) {
		if let Some(mut handle) = self.handle.take() {
			if tokio::time::timeout(grace, &mut handle).await.is_err() {
				handle.abort();
			}
		}
	}
}

impl Drop for TaskGuard {
	fn drop(&mut self) {
		if let Some(handle) = self.handle.take() {
			handle.abort();
		}
	}
}
