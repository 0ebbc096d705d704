//! Connection establishment.
//!
//! [`establish`] starts a link and suspends until the transport reports it
//! open. Readiness is observed either through the transport's state-change
//! notification ([`Readiness::Watch`]) or by checking the state flag on a
//! fixed interval ([`Readiness::Poll`]), 10ms apart unless configured
//! otherwise.
//!
//! Dropping an establish future at any point cancels the poll timer and tears
//! the half-open link down.

use std::time::Duration;

use shellview_protocol::DEFAULT_POLL_INTERVAL_MS;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::state::ConnectionState;
use crate::transport::{Connector, TransportParts};

/// Default upper bound on how long establishment may take.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default upper bound on waiting for outbound buffer space.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Shortest poll period; shorter intervals are raised to this.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How establishment notices the link became ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
	/// Await the transport's state-change notification.
	Watch,
	/// Check the state flag every `interval`, giving up after `max_polls` checks.
	Poll {
		interval: Duration,
		max_polls: Option<u32>,
	},
}

impl Readiness {
	pub fn poll(interval: Duration) -> Self {
		Readiness::Poll {
			interval: interval.max(MIN_POLL_INTERVAL),
			max_polls: None,
		}
	}
}

impl Default for Readiness {
	fn default() -> Self {
		Readiness::Watch
	}
}

/// Knobs for [`establish`] and for the resulting [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstablishOptions {
	pub readiness: Readiness,
	/// `None` waits forever.
	pub connect_timeout: Option<Duration>,
	/// `None` waits forever for outbound buffer space.
	pub send_timeout: Option<Duration>,
}

impl EstablishOptions {
	/// Unbounded 10ms polling with no timeouts.
	pub fn reference() -> Self {
		Self {
			readiness: Readiness::poll(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)),
			connect_timeout: None,
			send_timeout: None,
		}
	}
}

impl Default for EstablishOptions {
	fn default() -> Self {
		Self {
			readiness: Readiness::Watch,
			connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
			send_timeout: Some(DEFAULT_SEND_TIMEOUT),
		}
	}
}

/// Opens a link to `endpoint` and waits until it is ready.
pub async fn establish(
	connector: &dyn Connector,
	endpoint: &str,
	options: &EstablishOptions,
) -> Result<Connection> {
	PendingConnection::start(connector, endpoint)?
		.ready(options)
		.await
}

/// A link that has been started but not yet confirmed open.
#[derive(Debug)]
pub struct PendingConnection {
	endpoint: String,
	parts: TransportParts,
}

impl PendingConnection {
	/// Starts connecting immediately.
	pub fn start(connector: &dyn Connector, endpoint: &str) -> Result<Self> {
		debug!(target = "shellview", endpoint, "starting connection");
		let parts = connector.connect(endpoint)?;
		Ok(Self {
			endpoint: endpoint.to_string(),
			parts,
		})
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	pub fn state(&self) -> ConnectionState {
		*self.parts.state.borrow()
	}

	/// Resolves once the transport reports `Open`.
	///
	/// On failure the link is dropped before the error is returned.
	pub async fn ready(self, options: &EstablishOptions) -> Result<Connection> {
		let mut state = self.parts.state.clone();
		let wait = wait_ready(&mut state, options.readiness);

		let outcome = match options.connect_timeout {
			Some(limit) => match tokio::time::timeout(limit, wait).await {
				Ok(outcome) => outcome,
				Err(_) => {
					warn!(target = "shellview", endpoint = %self.endpoint, timeout_ms = limit.as_millis() as u64, "connect timed out");
					return Err(Error::ConnectTimeout {
						endpoint: self.endpoint,
						ms: limit.as_millis() as u64,
					});
				}
			},
			None => wait.await,
		};

		match outcome {
			Ok(()) => {
				info!(target = "shellview", endpoint = %self.endpoint, "connection established");
				Ok(Connection::from_parts(
					self.endpoint,
					self.parts,
					options.send_timeout,
				))
			}
			Err(NotReady::Closed) => {
				let reason = self
					.parts
					.failure
					.get()
					.unwrap_or_else(|| "transport closed before opening".to_string());
				warn!(target = "shellview", endpoint = %self.endpoint, reason = %reason, "connect failed");
				Err(Error::ConnectFailed {
					endpoint: self.endpoint,
					reason,
				})
			}
			Err(NotReady::PollsExhausted(polls)) => {
				warn!(target = "shellview", endpoint = %self.endpoint, polls, "gave up waiting for readiness");
				Err(Error::PollsExhausted {
					endpoint: self.endpoint,
					polls,
				})
			}
		}
	}
}

enum NotReady {
	Closed,
	PollsExhausted(u32),
}

async fn wait_ready(
	state: &mut watch::Receiver<ConnectionState>,
	readiness: Readiness,
) -> std::result::Result<(), NotReady> {
	match readiness {
		Readiness::Watch => {
			let settled = state
				.wait_for(|s| *s != ConnectionState::Connecting)
				.await
				.map(|s| *s)
				.unwrap_or(ConnectionState::Closed);
			if settled.is_open() {
				Ok(())
			} else {
				Err(NotReady::Closed)
			}
		}
		Readiness::Poll {
			interval,
			max_polls,
		} => {
			// interval_at panics on a zero period
			let interval = interval.max(MIN_POLL_INTERVAL);
			let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			let mut polls: u32 = 0;
			loop {
				ticker.tick().await;
				polls = polls.saturating_add(1);

				let current = *state.borrow();
				match current {
					ConnectionState::Open => return Ok(()),
					ConnectionState::Closed => return Err(NotReady::Closed),
					ConnectionState::Connecting => {}
				}
				if max_polls.is_some_and(|max| polls >= max) {
					return Err(NotReady::PollsExhausted(polls));
				}
			}
		}
	}
}
