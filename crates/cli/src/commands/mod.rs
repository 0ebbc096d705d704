mod attach;
mod serve;

pub use attach::run_terminal;

use std::path::Path;

use crate::cli::{Cli, Commands};
use crate::config::{self, ConfigFile, ShellviewConfig};
use crate::error::Result;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let cwd = std::env::current_dir()?;

	match cli.command {
		Commands::Attach(args) => {
			let config = effective(cli.config.as_deref(), &cwd, &args.as_layer())?;
			attach::execute(&config).await
		}
		Commands::Serve(args) => {
			let config = effective(cli.config.as_deref(), &cwd, &args.as_layer())?;
			serve::execute(&config).await
		}
		Commands::Config(args) => {
			let config = effective(cli.config.as_deref(), &cwd, &args.as_layer())?;
			println!("{}", serde_json::to_string_pretty(&config)?);
			Ok(())
		}
	}
}

/// Files first, then flags.
fn effective(
	explicit: Option<&Path>,
	project_root: &Path,
	flags: &ConfigFile,
) -> Result<ShellviewConfig> {
	let mut layer = config::load(explicit, project_root)?;
	layer.merge(flags);
	ShellviewConfig::resolve(layer)
}
