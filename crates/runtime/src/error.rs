//! Error types for the session runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while establishing or running a session.
#[derive(Debug, Error)]
pub enum Error {
	/// Endpoint could not be turned into a connection request.
	#[error("Invalid endpoint '{endpoint}': {reason}")]
	InvalidEndpoint { endpoint: String, reason: String },

	/// Transport reported closed before it ever opened.
	#[error("Failed to connect to {endpoint}: {reason}")]
	ConnectFailed { endpoint: String, reason: String },

	/// Transport did not open within the connect timeout.
	#[error("Timed out after {ms}ms connecting to {endpoint}")]
	ConnectTimeout { endpoint: String, ms: u64 },

	/// Readiness polling gave up after the configured number of checks.
	#[error("{endpoint} not ready after {polls} readiness checks")]
	PollsExhausted { endpoint: String, polls: u32 },

	/// Sending on an established connection failed.
	#[error(transparent)]
	Send(#[from] SendError),
}

impl Error {
	/// Returns true for any failure to bring the link up.
	pub fn is_connect_failure(&self) -> bool {
		matches!(
			self,
			Error::InvalidEndpoint { .. }
				| Error::ConnectFailed { .. }
				| Error::ConnectTimeout { .. }
				| Error::PollsExhausted { .. }
		)
	}

	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		matches!(
			self,
			Error::ConnectTimeout { .. } | Error::Send(SendError::Backpressure { .. })
		)
	}
}

/// Why an outbound frame was not handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
	/// Link is still connecting.
	#[error("Connection is not open yet")]
	NotReady,

	/// Link was torn down.
	#[error("Connection closed")]
	Closed,

	/// Outbound buffer stayed full for the whole send timeout.
	#[error("Outbound buffer full for {ms}ms")]
	Backpressure { ms: u64 },
}
