//! Session lifecycle: one panel, one connection, one task.
//!
//! [`spawn`] starts connecting right away and relays once the link opens.
//! Input submitted while the link is still connecting follows the session's
//! [`PendingInputPolicy`]. Disposing the [`SessionHandle`] (or dropping it)
//! stops the task wherever it is: a pending establishment is cancelled along
//! with its poll timer, an open link is closed.

use std::collections::VecDeque;
use std::sync::Arc;

use shellview_protocol::{DEFAULT_ENDPOINT, InputMessage};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::Error;
use crate::establish::{EstablishOptions, PendingConnection};
use crate::relay::{Relay, RelayStats, StopReason};
use crate::state::{ConnectionState, StateReporter};
use crate::surface::SurfacePort;
use crate::transport::Connector;

/// What happens to input submitted before the link opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingInputPolicy {
	/// Discard it; it is never delivered late.
	Drop,
	/// Buffer up to `capacity` messages and flush them in order once open.
	Queue { capacity: usize },
}

impl Default for PendingInputPolicy {
	fn default() -> Self {
		PendingInputPolicy::Drop
	}
}

/// Everything a session needs besides its connector and surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
	pub endpoint: String,
	pub establish: EstablishOptions,
	pub pending_input: PendingInputPolicy,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			endpoint: DEFAULT_ENDPOINT.to_string(),
			establish: EstablishOptions::default(),
			pending_input: PendingInputPolicy::Drop,
		}
	}
}

/// Summary of a finished session.
#[derive(Debug)]
pub struct SessionReport {
	pub reason: StopReason,
	pub stats: RelayStats,
	/// Set when the link never opened.
	pub error: Option<Error>,
}

impl SessionReport {
	fn stopped(reason: StopReason, stats: RelayStats) -> Self {
		Self {
			reason,
			stats,
			error: None,
		}
	}
}

/// Owner's handle on a running session.
///
/// Dropping the handle disposes the session without waiting for it.
#[derive(Debug)]
pub struct SessionHandle {
	state: watch::Receiver<ConnectionState>,
	shutdown: Option<oneshot::Sender<()>>,
	task: Option<JoinHandle<SessionReport>>,
}

/// Starts a session bridging `port` to `config.endpoint`.
pub fn spawn(
	connector: Arc<dyn Connector>,
	config: SessionConfig,
	port: SurfacePort,
) -> SessionHandle {
	let (reporter, state) = StateReporter::channel();
	let (shutdown_tx, shutdown_rx) = oneshot::channel();

	let task = tokio::spawn(run(connector, config, port, shutdown_rx, reporter));

	SessionHandle {
		state,
		shutdown: Some(shutdown_tx),
		task: Some(task),
	}
}

impl SessionHandle {
	pub fn state(&self) -> ConnectionState {
		*self.state.borrow()
	}

	pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
		self.state.clone()
	}

	/// Waits until the session leaves `Connecting` and returns the new state.
	pub async fn settled(&mut self) -> ConnectionState {
		self.state
			.wait_for(|s| *s != ConnectionState::Connecting)
			.await
			.map(|s| *s)
			.unwrap_or(ConnectionState::Closed)
	}

	pub fn is_finished(&self) -> bool {
		self.task.as_ref().is_none_or(JoinHandle::is_finished)
	}

	/// Stops the session and waits for it to release its connection.
	pub async fn dispose(mut self) -> SessionReport {
		if let Some(shutdown) = self.shutdown.take() {
			let _ = shutdown.send(());
		}
		self.join().await
	}

	/// Waits for the session to end on its own.
	pub async fn finished(mut self) -> SessionReport {
		self.join().await
	}

	async fn join(&mut self) -> SessionReport {
		match self.task.take() {
			Some(task) => task.await.unwrap_or_else(|err| {
				warn!(target = "shellview", error = %err, "session task ended abnormally");
				SessionReport::stopped(StopReason::Aborted, RelayStats::default())
			}),
			None => SessionReport::stopped(StopReason::Aborted, RelayStats::default()),
		}
	}
}

impl Drop for SessionHandle {
	fn drop(&mut self) {
		if let Some(shutdown) = self.shutdown.take() {
			let _ = shutdown.send(());
		}
	}
}

async fn run(
	connector: Arc<dyn Connector>,
	config: SessionConfig,
	mut port: SurfacePort,
	mut shutdown: oneshot::Receiver<()>,
	reporter: StateReporter,
) -> SessionReport {
	let mut stats = RelayStats::default();

	let pending = match PendingConnection::start(connector.as_ref(), &config.endpoint) {
		Ok(pending) => pending,
		Err(err) => {
			warn!(target = "shellview", endpoint = %config.endpoint, error = %err, "session could not start");
			reporter.close();
			return SessionReport {
				reason: StopReason::ConnectFailed,
				stats,
				error: Some(err),
			};
		}
	};

	let mut queued: VecDeque<InputMessage> = VecDeque::new();
	let ready = pending.ready(&config.establish);
	tokio::pin!(ready);

	let connection = loop {
		tokio::select! {
			biased;

			_ = &mut shutdown => {
				info!(target = "shellview", endpoint = %config.endpoint, "session disposed while connecting");
				reporter.close();
				return SessionReport::stopped(StopReason::Disposed, stats);
			}

			result = &mut ready => match result {
				Ok(connection) => break connection,
				Err(err) => {
					reporter.close();
					stats.dropped += queued.len() as u64;
					return SessionReport {
						reason: StopReason::ConnectFailed,
						stats,
						error: Some(err),
					};
				}
			},

			submit = port.next_submit() => match submit {
				Some(message) => hold_pending(config.pending_input, &mut queued, message, &mut stats),
				None => {
					info!(target = "shellview", "panel disposed while connecting");
					reporter.close();
					return SessionReport::stopped(StopReason::SurfaceClosed, stats);
				}
			},
		}
	};

	reporter.open();

	let outcome = Relay::with_stats(connection, port, stats)
		.with_backlog(queued)
		.run(async move {
			let _ = shutdown.await;
		})
		.await;

	reporter.close();
	SessionReport::stopped(outcome.reason, outcome.stats)
}

fn hold_pending(
	policy: PendingInputPolicy,
	queued: &mut VecDeque<InputMessage>,
	message: InputMessage,
	stats: &mut RelayStats,
) {
	match policy {
		PendingInputPolicy::Queue { capacity } if queued.len() < capacity => {
			queued.push_back(message);
		}
		PendingInputPolicy::Queue { capacity } => {
			stats.dropped += 1;
			warn!(target = "shellview", capacity, "pending input queue full, dropping input");
		}
		PendingInputPolicy::Drop => {
			stats.dropped += 1;
			warn!(target = "shellview", "connection not open yet, dropping input");
		}
	}
}
