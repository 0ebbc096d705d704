//! Channel contract between an interactive panel and its session.
//!
//! The panel side ([`SurfaceHandle`]) submits input and receives display
//! updates; the session side ([`SurfacePort`]) consumes submits and produces
//! display updates. Dropping every [`Submitter`] disposes the panel, which the
//! session observes as the end of its submit stream.

use shellview_protocol::{InputMessage, OutputMessage};
use tokio::sync::mpsc;

/// Creates a connected panel/session channel pair.
pub fn channel() -> (SurfaceHandle, SurfacePort) {
	let (submits_tx, submits_rx) = mpsc::unbounded_channel();
	let (displays_tx, displays_rx) = mpsc::unbounded_channel();

	let handle = SurfaceHandle {
		submitter: Submitter { tx: submits_tx },
		displays: Displays { rx: displays_rx },
	};
	let port = SurfacePort {
		submits: submits_rx,
		displays: displays_tx,
	};
	(handle, port)
}

/// Panel side of the contract.
#[derive(Debug)]
pub struct SurfaceHandle {
	submitter: Submitter,
	displays: Displays,
}

impl SurfaceHandle {
	/// Submits one line for execution. Returns false once the session is gone.
	pub fn submit(&self, value: impl Into<String>) -> bool {
		self.submitter.submit(value)
	}

	pub fn post(&self, message: InputMessage) -> bool {
		self.submitter.post(message)
	}

	/// Next display update, or `None` once the session stopped delivering.
	pub async fn next_display(&mut self) -> Option<OutputMessage> {
		self.displays.recv().await
	}

	pub fn try_next_display(&mut self) -> Option<OutputMessage> {
		self.displays.try_recv()
	}

	/// Splits into independently owned input and output halves.
	pub fn split(self) -> (Submitter, Displays) {
		(self.submitter, self.displays)
	}

	/// Disposes the panel side; the session tears down once it notices.
	pub fn dispose(self) {}
}

/// Input half of a panel.
#[derive(Debug, Clone)]
pub struct Submitter {
	tx: mpsc::UnboundedSender<InputMessage>,
}

impl Submitter {
	pub fn submit(&self, value: impl Into<String>) -> bool {
		self.post(InputMessage::execute(value))
	}

	pub fn post(&self, message: InputMessage) -> bool {
		self.tx.send(message).is_ok()
	}

	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}

/// Output half of a panel.
#[derive(Debug)]
pub struct Displays {
	rx: mpsc::UnboundedReceiver<OutputMessage>,
}

impl Displays {
	pub async fn recv(&mut self) -> Option<OutputMessage> {
		self.rx.recv().await
	}

	pub fn try_recv(&mut self) -> Option<OutputMessage> {
		self.rx.try_recv().ok()
	}
}

/// Session side of the contract.
#[derive(Debug)]
pub struct SurfacePort {
	submits: mpsc::UnboundedReceiver<InputMessage>,
	displays: mpsc::UnboundedSender<OutputMessage>,
}

impl SurfacePort {
	/// Next submitted message, or `None` once the panel is disposed.
	pub async fn next_submit(&mut self) -> Option<InputMessage> {
		self.submits.recv().await
	}

	/// Delivers one update. Returns false if the panel stopped listening.
	pub fn display(&self, message: OutputMessage) -> bool {
		self.displays.send(message).is_ok()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn submits_and_displays_flow_through() {
		let (mut handle, mut port) = channel();

		assert!(handle.submit("show dbs"));
		assert_eq!(port.next_submit().await, Some(InputMessage::execute("show dbs")));

		assert!(port.display(OutputMessage::from_frame("admin")));
		assert_eq!(
			handle.next_display().await,
			Some(OutputMessage::from_frame("admin"))
		);
	}

	#[tokio::test]
	async fn disposing_panel_ends_submit_stream() {
		let (handle, mut port) = channel();
		handle.dispose();

		assert_eq!(port.next_submit().await, None);
		assert!(!port.display(OutputMessage::from_frame("late")));
	}

	#[tokio::test]
	async fn split_halves_keep_panel_alive() {
		let (handle, mut port) = channel();
		let (submitter, _displays) = handle.split();
		let second = submitter.clone();

		drop(submitter);
		assert!(second.submit("still here"));
		assert_eq!(
			port.next_submit().await,
			Some(InputMessage::execute("still here"))
		);

		drop(second);
		assert_eq!(port.next_submit().await, None);
	}

	#[test]
	fn submit_fails_once_session_is_gone() {
		let (handle, port) = channel();
		drop(port);
		assert!(!handle.submit("ls"));
	}
}
