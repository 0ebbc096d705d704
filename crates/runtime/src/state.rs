//! Connection lifecycle state.
//!
//! State only moves forward: `Connecting -> Open -> Closed`, or straight from
//! `Connecting` to `Closed`. Nothing reopens a closed link.

use std::fmt;

use tokio::sync::watch;

/// Lifecycle of one transport link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
	Connecting,
	Open,
	Closed,
}

impl ConnectionState {
	pub fn is_open(self) -> bool {
		self == ConnectionState::Open
	}

	pub fn is_closed(self) -> bool {
		self == ConnectionState::Closed
	}
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ConnectionState::Connecting => "connecting",
			ConnectionState::Open => "open",
			ConnectionState::Closed => "closed",
		};
		f.write_str(s)
	}
}

/// Write side of a [`ConnectionState`] watch channel.
///
/// Enforces forward-only transitions and reports `Closed` when dropped, so a
/// task that owns a reporter always leaves its link closed when it ends or is
/// aborted.
#[derive(Debug)]
pub struct StateReporter {
	tx: watch::Sender<ConnectionState>,
}

impl StateReporter {
	/// Creates a reporter in `Connecting` with its first subscriber.
	pub fn channel() -> (Self, watch::Receiver<ConnectionState>) {
		let (tx, rx) = watch::channel(ConnectionState::Connecting);
		(Self { tx }, rx)
	}

	pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
		self.tx.subscribe()
	}

	pub fn current(&self) -> ConnectionState {
		*self.tx.borrow()
	}

	/// Moves `Connecting -> Open`. Returns false if the link already left `Connecting`.
	pub fn open(&self) -> bool {
		self.tx.send_if_modified(|state| {
			if *state == ConnectionState::Connecting {
				*state = ConnectionState::Open;
				true
			} else {
				false
			}
		})
	}

	/// Moves to `Closed`. Returns false if it was already closed.
	pub fn close(&self) -> bool {
		self.tx.send_if_modified(|state| {
			if *state == ConnectionState::Closed {
				false
			} else {
				*state = ConnectionState::Closed;
				true
			}
		})
	}
}

impl Drop for StateReporter {
	fn drop(&mut self) {
		self.close();
	}
}
