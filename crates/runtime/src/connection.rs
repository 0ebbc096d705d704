//! Handle to an open transport link.

use std::time::Duration;

use shellview_protocol::InputMessage;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::error::SendError;
use crate::state::ConnectionState;
use crate::transport::{FailureSlot, TaskGuard, TransportParts};

/// How long [`Connection::close`] waits for the transport to flush its close frame.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// An established link to the remote endpoint.
///
/// Produced by the establisher once the transport reports `Open`. Owned by
/// exactly one relay; dropping it tears the transport down.
#[derive(Debug)]
pub struct Connection {
	endpoint: String,
	outbound: mpsc::Sender<String>,
	inbound: mpsc::UnboundedReceiver<String>,
	state: watch::Receiver<ConnectionState>,
	failure: FailureSlot,
	send_timeout: Option<Duration>,
	guard: Option<TaskGuard>,
}

impl Connection {
	pub(crate) fn from_parts(
		endpoint: String,
		parts: TransportParts,
		send_timeout: Option<Duration>,
	) -> Self {
		Self {
			endpoint,
			outbound: parts.outbound,
			inbound: parts.inbound,
			state: parts.state,
			failure: parts.failure,
			send_timeout,
			guard: parts.guard,
		}
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	pub fn state(&self) -> ConnectionState {
		*self.state.borrow()
	}

	/// Error the transport died with, if any.
	pub fn failure_reason(&self) -> Option<String> {
		self.failure.get()
	}

	/// Sends the wire line for `message`: its value plus a trailing newline.
	pub async fn send_line(&self, message: &InputMessage) -> Result<(), SendError> {
		self.send_frame(message.to_wire_line()).await
	}

	/// Hands one text frame to the transport.
	///
	/// Returns once the frame is queued, not once it reached the remote. With
	/// a send timeout configured, a queue that stays full for the whole timeout
	/// yields [`SendError::Backpressure`].
	pub async fn send_frame(&self, frame: String) -> Result<(), SendError> {
		match self.state() {
			ConnectionState::Connecting => return Err(SendError::NotReady),
			ConnectionState::Closed => return Err(SendError::Closed),
			ConnectionState::Open => {}
		}

		let len = frame.len();
		match self.send_timeout {
			Some(limit) => self
				.outbound
				.send_timeout(frame, limit)
				.await
				.map_err(|err| match err {
					SendTimeoutError::Timeout(_) => SendError::Backpressure {
						ms: limit.as_millis() as u64,
					},
					SendTimeoutError::Closed(_) => SendError::Closed,
				})?,
			None => self
				.outbound
				.send(frame)
				.await
				.map_err(|_| SendError::Closed)?,
		}

		debug!(target = "shellview", endpoint = %self.endpoint, bytes = len, "frame queued");
		Ok(())
	}

	/// Next frame from the remote, or `None` once the link is gone.
	pub async fn next_frame(&mut self) -> Option<String> {
		self.inbound.recv().await
	}

	/// Closes the link, letting the transport send its close frame first.
	pub async fn close(self) {
		let Connection {
			endpoint,
			outbound,
			guard,
			..
		} = self;

		drop(outbound);
		if let Some(guard) = guard {
			guard.shutdown(CLOSE_GRACE).await;
		}
		debug!(target = "shellview", endpoint = %endpoint, "connection released");
	}
}
