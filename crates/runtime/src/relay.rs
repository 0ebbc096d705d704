//! Session relay between a panel and an open connection.
//!
//! Runs as a single loop reacting to three sources: the shutdown signal, panel
//! submits and remote frames. Each source is handled in FIFO order; shutdown
//! always wins a race so nothing is sent or delivered once disposal is seen.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use shellview_protocol::{InputMessage, OutputMessage};
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::SendError;
use crate::surface::SurfacePort;

/// Counters kept by a relay over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
	/// Input lines handed to the transport.
	pub sent: u64,
	/// Remote frames delivered to the panel.
	pub delivered: u64,
	/// Inputs the session discarded without reaching the transport.
	///
	/// Input offered after the session stopped is refused at the surface
	/// (`submit` returns false) and never reaches this counter.
	pub dropped: u64,
	/// Sends the transport refused.
	pub send_failures: u64,
}

/// Why a relay or session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
	/// The owner disposed the session.
	Disposed,
	/// The panel dropped its side of the surface.
	SurfaceClosed,
	/// The remote link went away.
	TransportClosed,
	/// The link never opened.
	ConnectFailed,
	/// The session task panicked or was cancelled.
	Aborted,
}

/// Final state of a finished relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
	pub reason: StopReason,
	pub stats: RelayStats,
}

/// Forwards panel input to the connection and remote output to the panel.
#[derive(Debug)]
pub struct Relay {
	connection: Connection,
	port: SurfacePort,
	stats: RelayStats,
	backlog: VecDeque<InputMessage>,
}

impl Relay {
	pub fn new(connection: Connection, port: SurfacePort) -> Self {
		Self::with_stats(connection, port, RelayStats::default())
	}

	/// Continues counting from `stats`, e.g. drops seen while connecting.
	pub fn with_stats(connection: Connection, port: SurfacePort, stats: RelayStats) -> Self {
		Self {
			connection,
			port,
			stats,
			backlog: VecDeque::new(),
		}
	}

	/// Input held back while connecting, sent in order before anything else.
	pub fn with_backlog(mut self, backlog: VecDeque<InputMessage>) -> Self {
		self.backlog = backlog;
		self
	}

	pub fn stats(&self) -> RelayStats {
		self.stats
	}

	/// Sends one panel message as a newline-terminated line.
	///
	/// At-most-once: a failed send is counted and returned, never retried.
	pub async fn forward(&mut self, message: &InputMessage) -> Result<(), SendError> {
		match self.connection.send_line(message).await {
			Ok(()) => {
				self.stats.sent += 1;
				debug!(target = "shellview", message = ?message, "forwarded input");
				Ok(())
			}
			Err(err) => {
				self.stats.send_failures += 1;
				self.stats.dropped += 1;
				warn!(target = "shellview", error = %err, "dropping input");
				Err(err)
			}
		}
	}

	/// Forwards `message` unless `shutdown` resolves first. Returns false when
	/// the send was abandoned; the message then counts as dropped.
	async fn forward_or_shutdown<F>(&mut self, message: &InputMessage, shutdown: Pin<&mut F>) -> bool
	where
		F: Future<Output = ()>,
	{
		tokio::select! {
			biased;

			_ = shutdown => {
				self.stats.dropped += 1;
				debug!(target = "shellview", "send abandoned on shutdown");
				false
			}

			_ = self.forward(message) => true,
		}
	}

	/// Wraps one remote frame and hands it to the panel.
	pub fn deliver(&mut self, frame: String) -> bool {
		debug!(target = "shellview", bytes = frame.len(), "delivering output");
		let delivered = self.port.display(OutputMessage::from_frame(frame));
		if delivered {
			self.stats.delivered += 1;
		}
		delivered
	}

	/// Relays until `shutdown` resolves, the panel goes away or the link closes,
	/// then releases the connection.
	pub async fn run<F>(mut self, shutdown: F) -> RelayOutcome
	where
		F: Future<Output = ()>,
	{
		tokio::pin!(shutdown);

		let mut backlog = std::mem::take(&mut self.backlog);
		let reason = 'relay: {
			while let Some(message) = backlog.pop_front() {
				if !self.forward_or_shutdown(&message, shutdown.as_mut()).await {
					self.stats.dropped += backlog.len() as u64;
					break 'relay StopReason::Disposed;
				}
			}

			loop {
				tokio::select! {
					biased;

					_ = &mut shutdown => break StopReason::Disposed,

					frame = self.connection.next_frame() => match frame {
						Some(frame) => {
							if !self.deliver(frame) {
								break StopReason::SurfaceClosed;
							}
						}
						None => break StopReason::TransportClosed,
					},

					submit = self.port.next_submit() => match submit {
						Some(message) => {
							if !self.forward_or_shutdown(&message, shutdown.as_mut()).await {
								break StopReason::Disposed;
							}
						}
						None => break StopReason::SurfaceClosed,
					},
				}
			}
		};

		let Relay {
			connection, stats, ..
		} = self;
		if let Some(reason) = connection.failure_reason() {
			warn!(target = "shellview", reason = %reason, "transport failed");
		}
		connection.close().await;

		info!(
			target = "shellview",
			reason = ?reason,
			sent = stats.sent,
			delivered = stats.delivered,
			dropped = stats.dropped,
			"relay stopped"
		);
		RelayOutcome { reason, stats }
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use tokio::sync::oneshot;

	use super::*;
	use crate::surface;
	use crate::transport::{Connector, MemoryConnector, MemoryRemote};

	async fn open_relay() -> (Relay, surface::SurfaceHandle, MemoryRemote) {
		let (connector, mut remotes) = MemoryConnector::pair(8);
		let parts = connector.connect("memory://shell").unwrap();
		let remote = remotes.recv().await.unwrap();
		remote.open();
		let connection = Connection::from_parts("memory://shell".into(), parts, None);
		let (handle, port) = surface::channel();
		(Relay::new(connection, port), handle, remote)
	}

	#[tokio::test]
	async fn submitted_value_is_sent_with_newline() {
		let (relay, handle, mut remote) = open_relay().await;
		let (stop_tx, stop_rx) = oneshot::channel::<()>();
		let task = tokio::spawn(relay.run(async move {
			let _ = stop_rx.await;
		}));

		for value in ["db.collection.find()", "", "line\nwith break", "ünïcødé"] {
			assert!(handle.submit(value));
			assert_eq!(remote.recv().await, Some(format!("{value}\n")));
		}

		let _ = stop_tx.send(());
		let outcome = task.await.unwrap();
		assert_eq!(outcome.reason, StopReason::Disposed);
		assert_eq!(outcome.stats.sent, 4);
	}

	#[tokio::test]
	async fn frames_are_delivered_once_in_order() {
		let (relay, mut handle, remote) = open_relay().await;
		let (stop_tx, stop_rx) = oneshot::channel::<()>();
		let task = tokio::spawn(relay.run(async move {
			let _ = stop_rx.await;
		}));

		let frames: Vec<String> = (0..50).map(|i| format!("frame {i}")).collect();
		for frame in &frames {
			assert!(remote.push(frame.clone()));
		}

		for frame in &frames {
			let message = handle.next_display().await.unwrap();
			assert_eq!(message.value(), frame);
		}

		let _ = stop_tx.send(());
		let outcome = task.await.unwrap();
		assert_eq!(outcome.stats.delivered, 50);
		assert_eq!(handle.try_next_display(), None);
	}

	#[tokio::test]
	async fn remote_close_stops_relay() {
		let (relay, mut handle, mut remote) = open_relay().await;
		remote.push("bye");
		remote.close();

		let outcome = relay.run(std::future::pending()).await;

		assert_eq!(outcome.reason, StopReason::TransportClosed);
		assert_eq!(handle.next_display().await.map(|m| m.value().to_string()), Some("bye".into()));
		assert!(!handle.submit("after close"));
	}

	#[tokio::test]
	async fn disposed_panel_stops_relay_and_releases_link() {
		let (relay, handle, mut remote) = open_relay().await;
		handle.dispose();

		let outcome = relay.run(std::future::pending()).await;

		assert_eq!(outcome.reason, StopReason::SurfaceClosed);
		assert_eq!(remote.recv().await, None);
	}

	#[tokio::test]
	async fn shutdown_wins_over_pending_work() {
		let (relay, mut handle, mut remote) = open_relay().await;
		remote.push("never shown");
		handle.submit("never sent");

		let outcome = relay.run(async {}).await;

		assert_eq!(outcome.reason, StopReason::Disposed);
		assert_eq!(outcome.stats, RelayStats::default());
		assert_eq!(remote.recv().await, None);
		assert_eq!(handle.next_display().await, None);
	}

	#[tokio::test(start_paused = true)]
	async fn failed_send_is_counted_not_retried() {
		let (connector, mut remotes) = MemoryConnector::pair(1);
		let parts = connector.connect("memory://shell").unwrap();
		let mut remote = remotes.recv().await.unwrap();
		remote.open();
		let connection =
			Connection::from_parts("memory://shell".into(), parts, Some(Duration::from_millis(20)));
		let (_handle, port) = surface::channel();
		let mut relay = Relay::new(connection, port);

		relay.forward(&InputMessage::execute("a")).await.unwrap();
		let err = relay.forward(&InputMessage::execute("b")).await.unwrap_err();

		assert_eq!(err, SendError::Backpressure { ms: 20 });
		assert_eq!(relay.stats().sent, 1);
		assert_eq!(relay.stats().send_failures, 1);
		assert_eq!(remote.recv().await.as_deref(), Some("a\n"));
		assert_eq!(remote.try_recv(), None);
	}
}
