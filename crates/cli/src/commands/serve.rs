use std::sync::Arc;

use colored::Colorize;
use tracing::info;

use crate::config::ShellviewConfig;
use crate::error::Result;
use crate::panel::PanelHost;

pub async fn execute(config: &ShellviewConfig) -> Result<()> {
	let host = PanelHost::bind(
		&config.panel_host,
		config.panel_port,
		Arc::new(config.connector()),
		config.session_config(),
		config.assets.clone(),
	)
	.await?;

	eprintln!(
		"{} {} {} {}",
		"Panel".green().bold(),
		host.url().cyan(),
		"relaying to".dimmed(),
		config.endpoint.cyan()
	);

	tokio::signal::ctrl_c().await?;
	info!(target = "shellview", "interrupted, closing panels");

	host.shutdown().await?;
	Ok(())
}
