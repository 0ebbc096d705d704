//! Message envelope exchanged between a rendered panel and its session relay.
//!
//! The envelope is a flat JSON object carrying a `command` literal and a
//! `value` string. It never crosses the remote link: the relay unwraps
//! [`InputMessage`] into a plain text line before sending, and wraps raw remote
//! frames into [`OutputMessage`] before display.
//!
//! 1. Panel submits [`InputMessage::Execute`] with the line the user typed
//! 2. Relay sends `value + "\n"` as one text frame (see [`InputMessage::to_wire_line`])
//! 3. Each text frame from the remote becomes [`OutputMessage::UpdateOutput`]
//!
//! # Main Types
//!
//! - [`InputMessage`] - Messages from the panel to the relay
//! - [`OutputMessage`] - Messages from the relay to the panel

use serde::{Deserialize, Serialize};

/// Message sent from the panel to the relay.
///
/// New message kinds are added as new `command` literals; there is no
/// version field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum InputMessage {
	/// A line the user submitted for execution on the remote endpoint.
	Execute {
		/// Submitted text, without the trailing newline.
		value: String,
	},
}

impl InputMessage {
	pub fn execute(value: impl Into<String>) -> Self {
		Self::Execute {
			value: value.into(),
		}
	}

	/// Text frame sent to the remote endpoint for this message.
	///
	/// The submitted value is forwarded byte-for-byte with a single `\n`
	/// appended, even when the value already ends with one.
	pub fn to_wire_line(&self) -> String {
		match self {
			Self::Execute { value } => {
				let mut line = String::with_capacity(value.len() + 1);
				line.push_str(value);
				line.push('\n');
				line
			}
		}
	}
}

/// Message sent from the relay to the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum OutputMessage {
	/// Output produced by the remote endpoint, delivered untouched.
	UpdateOutput {
		/// Raw frame text as received.
		value: String,
	},
}

impl OutputMessage {
	/// Wraps one raw remote frame.
	pub fn from_frame(frame: impl Into<String>) -> Self {
		Self::UpdateOutput {
			value: frame.into(),
		}
	}

	pub fn value(&self) -> &str {
		match self {
			Self::UpdateOutput { value } => value,
		}
	}
}

/// Parses a panel envelope.
///
/// Unknown `command` literals and malformed JSON are both reported as
/// [`serde_json::Error`]; callers log and skip them.
pub fn parse_input(raw: &str) -> serde_json::Result<InputMessage> {
	serde_json::from_str(raw)
}
