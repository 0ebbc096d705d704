use tokio::sync::mpsc;

use super::{Connector, FailureSlot, TransportParts};
use crate::error::Result;
use crate::state::{ConnectionState, StateReporter};

/// In-process connector whose links are driven by a [`MemoryRemote`].
///
/// Every `connect` call creates a fresh link in `Connecting` and publishes the
/// remote end on the channel returned by [`MemoryConnector::pair`]. The remote
/// decides when the link opens, what it sends and when it dies.
#[derive(Debug)]
pub struct MemoryConnector {
	outbound_capacity: usize,
	remotes: mpsc::UnboundedSender<MemoryRemote>,
}

impl MemoryConnector {
	pub fn pair(outbound_capacity: usize) -> (Self, mpsc::UnboundedReceiver<MemoryRemote>) {
		let (remotes, rx) = mpsc::unbounded_channel();
		let connector = Self {
			outbound_capacity: outbound_capacity.max(1),
			remotes,
		};
		(connector, rx)
	}
}

impl Connector for MemoryConnector {
	fn connect(&self, endpoint: &str) -> Result<TransportParts> {
		let (reporter, state) = StateReporter::channel();
		let failure = FailureSlot::default();
		let (outbound_tx, outbound_rx) = mpsc::channel(self.outbound_capacity);
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

		let remote = MemoryRemote {
			endpoint: endpoint.to_string(),
			reporter,
			failure: failure.clone(),
			frames: Some(inbound_tx),
			lines: outbound_rx,
		};
		// Nobody listening for remotes just means the link never opens.
		let _ = self.remotes.send(remote);

		Ok(TransportParts {
			outbound: outbound_tx,
			inbound: inbound_rx,
			state,
			failure,
			guard: None,
		})
	}
}

/// Remote end of a [`MemoryConnector`] link.
///
/// Dropping it closes the link.
#[derive(Debug)]
pub struct MemoryRemote {
	endpoint: String,
	reporter: StateReporter,
	failure: FailureSlot,
	frames: Option<mpsc::UnboundedSender<String>>,
	lines: mpsc::Receiver<String>,
}

impl MemoryRemote {
	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	pub fn state(&self) -> ConnectionState {
		self.reporter.current()
	}

	/// Reports the link ready.
	pub fn open(&self) -> bool {
		self.reporter.open()
	}

	/// Kills the link with an error before or after it opened.
	pub fn fail(&mut self, reason: &str) {
		self.failure.set(reason);
		self.close();
	}

	/// Tears the link down from the remote side.
	pub fn close(&mut self) {
		self.frames = None;
		self.reporter.close();
	}

	/// Pushes one frame toward the local side. Returns false once the link
	/// is closed or the local side is gone.
	pub fn push(&self, frame: impl Into<String>) -> bool {
		match &self.frames {
			Some(frames) => frames.send(frame.into()).is_ok(),
			None => false,
		}
	}

	/// Next frame the local side sent, or `None` once it dropped its sender.
	pub async fn recv(&mut self) -> Option<String> {
		self.lines.recv().await
	}

	pub fn try_recv(&mut self) -> Option<String> {
		self.lines.try_recv().ok()
	}

	/// True once the local side released its end of the link.
	pub fn is_released(&self) -> bool {
		self.lines.is_closed()
	}
}
