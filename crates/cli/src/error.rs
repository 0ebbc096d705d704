use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("failed to read config file {path}")]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file {path}")]
	ConfigParse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("session ended: {0}")]
	Session(String),

	#[error(transparent)]
	Runtime(#[from] shellview_runtime::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

/// Stable error codes printed alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
	InvalidConfig,
	ConnectFailed,
	Timeout,
	SessionEnded,
	IoError,
	InternalError,
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ErrorCode::InvalidConfig => "INVALID_CONFIG",
			ErrorCode::ConnectFailed => "CONNECT_FAILED",
			ErrorCode::Timeout => "TIMEOUT",
			ErrorCode::SessionEnded => "SESSION_ENDED",
			ErrorCode::IoError => "IO_ERROR",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		};
		f.write_str(s)
	}
}

impl CliError {
	pub fn code(&self) -> ErrorCode {
		match self {
			CliError::Config(_) | CliError::ConfigRead { .. } | CliError::ConfigParse { .. } => {
				ErrorCode::InvalidConfig
			}
			CliError::Session(_) => ErrorCode::SessionEnded,
			CliError::Runtime(err) if err.is_timeout() => ErrorCode::Timeout,
			CliError::Runtime(err) if err.is_connect_failure() => ErrorCode::ConnectFailed,
			CliError::Runtime(_) => ErrorCode::InternalError,
			CliError::Io(_) => ErrorCode::IoError,
			CliError::Json(_) | CliError::Anyhow(_) => ErrorCode::InternalError,
		}
	}

	/// Message including the source chain, for stderr.
	pub fn detailed_message(&self) -> String {
		let mut message = self.to_string();
		let mut source = StdError::source(self);
		while let Some(err) = source {
			message.push_str(": ");
			message.push_str(&err.to_string());
			source = err.source();
		}
		message
	}
}
