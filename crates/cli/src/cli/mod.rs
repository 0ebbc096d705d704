
use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand};

use crate::config::{ConfigFile, PendingInputMode, ReadinessMode};

/// Root CLI for shellview.
#[derive(Parser, Debug)]
#[command(name = "shellview")]
#[command(about = "Bridge a panel or terminal to a remote shell endpoint")]
#[command(version)]
#[command(styles = help_styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Read configuration from FILE instead of the global and project files
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Relay stdin lines to the endpoint and print its output.
	Attach(SessionArgs),
	/// Host the panel page and relay each panel socket to the endpoint.
	Serve(ServeArgs),
	/// Print the effective configuration as JSON.
	Config(ServeArgs),
}

/// Connection flags shared by every command that opens a session.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
	/// Remote endpoint (ws:// or wss://)
	#[arg(short, long, value_name = "URL")]
	pub endpoint: Option<String>,

	/// How to detect that the link opened
	#[arg(long, value_enum)]
	pub readiness: Option<ReadinessMode>,

	/// Interval between readiness checks in poll mode
	#[arg(long, value_name = "MS")]
	pub poll_interval_ms: Option<u64>,

	/// Give up after this many readiness checks in poll mode
	#[arg(long, value_name = "N")]
	pub max_polls: Option<u32>,

	/// Abort connecting after MS milliseconds (0 waits forever)
	#[arg(long, value_name = "MS")]
	pub connect_timeout_ms: Option<u64>,

	/// Wait at most MS milliseconds for outbound buffer space (0 waits forever)
	#[arg(long, value_name = "MS")]
	pub send_timeout_ms: Option<u64>,

	/// What to do with input submitted before the link opens
	#[arg(long, value_enum)]
	pub pending_input: Option<PendingInputMode>,

	/// Maximum queued lines when --pending-input=queue
	#[arg(long, value_name = "N")]
	pub queue_capacity: Option<usize>,
}

impl SessionArgs {
	/// Flags as a configuration layer; unset flags leave the files alone.
	pub fn as_layer(&self) -> ConfigFile {
		ConfigFile {
			endpoint: self.endpoint.clone(),
			readiness: self.readiness,
			poll_interval_ms: self.poll_interval_ms,
			max_polls: self.max_polls,
			connect_timeout_ms: self.connect_timeout_ms,
			send_timeout_ms: self.send_timeout_ms,
			pending_input: self.pending_input,
			queue_capacity: self.queue_capacity,
			..ConfigFile::default()
		}
	}
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
	#[command(flatten)]
	pub session: SessionArgs,

	/// Address to bind the panel host to
	#[arg(long, value_name = "HOST")]
	pub host: Option<String>,

	/// Port to bind the panel host to (0 picks a free port)
	#[arg(short, long, value_name = "PORT")]
	pub port: Option<u16>,

	/// Directory holding index.html for the panel page
	#[arg(long, value_name = "DIR")]
	pub assets: Option<PathBuf>,
}

impl ServeArgs {
	pub fn as_layer(&self) -> ConfigFile {
		ConfigFile {
			panel_host: self.host.clone(),
			panel_port: self.port,
			assets: self.assets.clone(),
			..self.session.as_layer()
		}
	}
}

/// Cargo-like help colors.
fn help_styles() -> Styles {
	let accent = AnsiColor::Cyan.on_default();
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(accent)
		.placeholder(accent)
		.valid(accent)
}
