//! Configuration files and their resolution into runtime settings.
//!
//! Layers, later wins:
//! * built-in defaults
//! * global file `$XDG_CONFIG_HOME/shellview/config.json`
//! * project file `.shellview/config.json` under the working directory
//! * command line flags
//!
//! An explicit `--config FILE` replaces both file layers.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use shellview_protocol::{DEFAULT_ENDPOINT, DEFAULT_POLL_INTERVAL_MS, PANEL_HOST, PANEL_PORT};
use shellview_runtime::transport::DEFAULT_OUTBOUND_CAPACITY;
use shellview_runtime::{
	EstablishOptions, PendingInputPolicy, Readiness, SessionConfig, WebSocketConnector,
};
use url::Url;

use crate::error::{CliError, Result};

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SEND_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// How a session notices that its link opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessMode {
	/// Wait for the transport's open notification
	#[default]
	Watch,
	/// Check the link state on a fixed interval
	Poll,
}

/// What happens to input typed before the link opens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PendingInputMode {
	/// Discard it
	#[default]
	Drop,
	/// Buffer it and send once connected
	Queue,
}

/// One configuration layer as stored on disk. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub endpoint: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub readiness: Option<ReadinessMode>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub poll_interval_ms: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_polls: Option<u32>,
	/// `0` disables the timeout.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub connect_timeout_ms: Option<u64>,
	/// `0` disables the timeout.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub send_timeout_ms: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub outbound_capacity: Option<usize>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pending_input: Option<PendingInputMode>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub queue_capacity: Option<usize>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub panel_host: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub panel_port: Option<u16>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub assets: Option<PathBuf>,
}

impl ConfigFile {
	/// Overlays every field `other` sets.
	pub fn merge(&mut self, other: &ConfigFile) {
		macro_rules! take {
			($($field:ident),* $(,)?) => {
				$(if other.$field.is_some() {
					self.$field = other.$field.clone();
				})*
			};
		}
		take!(
			endpoint,
			readiness,
			poll_interval_ms,
			max_polls,
			connect_timeout_ms,
			send_timeout_ms,
			outbound_capacity,
			pending_input,
			queue_capacity,
			panel_host,
			panel_port,
			assets,
		);
	}
}

/// Where configuration files are looked up.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
	pub global: Option<PathBuf>,
	pub project: PathBuf,
}

impl ConfigPaths {
	pub fn new(project_root: &Path) -> Self {
		let config_home = std::env::var_os("XDG_CONFIG_HOME")
			.map(PathBuf::from)
			.or_else(dirs::config_dir);

		Self {
			global: config_home.map(|dir| dir.join("shellview").join("config.json")),
			project: project_root.join(".shellview").join("config.json"),
		}
	}

	/// Reads and merges the global and project layers. Missing files are skipped.
	pub fn load(&self) -> Result<ConfigFile> {
		let mut config = match &self.global {
			Some(path) => read_layer(path)?.unwrap_or_default(),
			None => ConfigFile::default(),
		};
		if let Some(project) = read_layer(&self.project)? {
			config.merge(&project);
		}
		Ok(config)
	}
}

/// Loads configuration from `explicit`, or from the default locations.
pub fn load(explicit: Option<&Path>, project_root: &Path) -> Result<ConfigFile> {
	match explicit {
		Some(path) => read_layer(path)?.ok_or_else(|| CliError::ConfigRead {
			path: path.to_path_buf(),
			source: std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
		}),
		None => ConfigPaths::new(project_root).load(),
	}
}

fn read_layer(path: &Path) -> Result<Option<ConfigFile>> {
	let raw = match fs::read_to_string(path) {
		Ok(raw) => raw,
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(source) => {
			return Err(CliError::ConfigRead {
				path: path.to_path_buf(),
				source,
			});
		}
	};

	serde_json::from_str(&raw)
		.map(Some)
		.map_err(|source| CliError::ConfigParse {
			path: path.to_path_buf(),
			source,
		})
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellviewConfig {
	pub endpoint: String,
	pub readiness: ReadinessMode,
	pub poll_interval_ms: u64,
	pub max_polls: Option<u32>,
	pub connect_timeout_ms: Option<u64>,
	pub send_timeout_ms: Option<u64>,
	pub outbound_capacity: usize,
	pub pending_input: PendingInputMode,
	pub queue_capacity: usize,
	pub panel_host: String,
	pub panel_port: u16,
	pub assets: Option<PathBuf>,
}

impl ShellviewConfig {
	/// Applies defaults to a merged layer and validates the result.
	pub fn resolve(layer: ConfigFile) -> Result<Self> {
		let endpoint = layer.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
		validate_endpoint(&endpoint)?;

		let poll_interval_ms = layer.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
		if poll_interval_ms == 0 {
			return Err(CliError::Config("pollIntervalMs must be at least 1".into()));
		}

		let outbound_capacity = layer.outbound_capacity.unwrap_or(DEFAULT_OUTBOUND_CAPACITY);
		if outbound_capacity == 0 {
			return Err(CliError::Config("outboundCapacity must be at least 1".into()));
		}

		Ok(Self {
			endpoint,
			readiness: layer.readiness.unwrap_or_default(),
			poll_interval_ms,
			max_polls: layer.max_polls.filter(|n| *n > 0),
			connect_timeout_ms: nonzero(layer.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS),
			send_timeout_ms: nonzero(layer.send_timeout_ms, DEFAULT_SEND_TIMEOUT_MS),
			outbound_capacity,
			pending_input: layer.pending_input.unwrap_or_default(),
			queue_capacity: layer.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
			panel_host: layer.panel_host.unwrap_or_else(|| PANEL_HOST.to_string()),
			panel_port: layer.panel_port.unwrap_or(PANEL_PORT),
			assets: layer.assets,
		})
	}

	pub fn establish_options(&self) -> EstablishOptions {
		let readiness = match self.readiness {
			ReadinessMode::Watch => Readiness::Watch,
			ReadinessMode::Poll => Readiness::Poll {
				interval: Duration::from_millis(self.poll_interval_ms),
				max_polls: self.max_polls,
			},
		};

		EstablishOptions {
			readiness,
			connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
			send_timeout: self.send_timeout_ms.map(Duration::from_millis),
		}
	}

	pub fn pending_input_policy(&self) -> PendingInputPolicy {
		match self.pending_input {
			PendingInputMode::Drop => PendingInputPolicy::Drop,
			PendingInputMode::Queue => PendingInputPolicy::Queue {
				capacity: self.queue_capacity,
			},
		}
	}

	pub fn session_config(&self) -> SessionConfig {
		SessionConfig {
			endpoint: self.endpoint.clone(),
			establish: self.establish_options(),
			pending_input: self.pending_input_policy(),
		}
	}

	pub fn connector(&self) -> WebSocketConnector {
		WebSocketConnector::new(self.outbound_capacity)
	}
}

fn nonzero(value: Option<u64>, default: u64) -> Option<u64> {
	match value {
		Some(0) => None,
		Some(ms) => Some(ms),
		None => Some(default),
	}
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
	let url = Url::parse(endpoint)
		.map_err(|e| CliError::Config(format!("endpoint '{endpoint}' is not a valid URL: {e}")))?;

	if !matches!(url.scheme(), "ws" | "wss") {
		return Err(CliError::Config(format!(
			"endpoint '{endpoint}' must use ws:// or wss://"
		)));
	}
	if url.host_str().is_none() {
		return Err(CliError::Config(format!("endpoint '{endpoint}' has no host")));
	}
	Ok(())
}
