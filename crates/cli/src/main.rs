use clap::Parser;
use colored::Colorize;
use shellview_cli::cli::Cli;
use shellview_cli::error::CliError;
use shellview_cli::{commands, logging};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = commands::dispatch(cli).await {
		report(&err);
		std::process::exit(1);
	}
}

fn report(err: &CliError) {
	eprintln!(
		"{} [{}]: {}",
		"Error".red().bold(),
		err.code(),
		err.detailed_message()
	);
}
