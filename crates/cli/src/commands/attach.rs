//! Terminal surface: each stdin line is submitted for execution and every
//! remote frame is written to stdout.

use std::future::Future;
use std::sync::Arc;

use shellview_runtime::{
	ConnectionState, Connector, SessionConfig, SessionReport, StopReason, session, surface,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::config::ShellviewConfig;
use crate::error::{CliError, Result};

pub async fn execute(config: &ShellviewConfig) -> Result<()> {
	info!(target = "shellview", endpoint = %config.endpoint, "attaching terminal");

	let stdin = tokio::io::BufReader::new(tokio::io::stdin());
	let report = run_terminal(
		Arc::new(config.connector()),
		config.session_config(),
		stdin,
		tokio::io::stdout(),
		async {
			let _ = tokio::signal::ctrl_c().await;
		},
	)
	.await?;

	finish(report)
}

/// Why the terminal stopped feeding the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Detach {
	Interrupted,
	EndOfInput,
	SessionEnded,
}

/// Runs one session with `input` as its panel and `output` as its display.
///
/// Returns once input ends, `interrupt` resolves or the session closes.
pub async fn run_terminal<R, W, F>(
	connector: Arc<dyn Connector>,
	session_config: SessionConfig,
	input: R,
	mut output: W,
	interrupt: F,
) -> Result<SessionReport>
where
	R: AsyncBufRead + Unpin,
	W: AsyncWrite + Unpin + Send + 'static,
	F: Future<Output = ()>,
{
	let (panel, port) = surface::channel();
	let handle = session::spawn(connector, session_config, port);
	let mut state = handle.subscribe();
	let (submitter, mut displays) = panel.split();

	let printer = tokio::spawn(async move {
		while let Some(message) = displays.recv().await {
			let value = message.value();
			output.write_all(value.as_bytes()).await?;
			if !value.ends_with('\n') {
				output.write_all(b"\n").await?;
			}
			output.flush().await?;
		}
		Ok::<_, std::io::Error>(())
	});

	let mut lines = input.lines();
	tokio::pin!(interrupt);

	let detach = loop {
		tokio::select! {
			_ = &mut interrupt => break Detach::Interrupted,
			_ = state.wait_for(|s| *s == ConnectionState::Closed) => break Detach::SessionEnded,
			line = lines.next_line() => match line? {
				Some(line) => {
					if !submitter.submit(line) {
						break Detach::SessionEnded;
					}
				}
				None => break Detach::EndOfInput,
			},
		}
	};
	debug!(target = "shellview", ?detach, "terminal detached");

	let report = handle.dispose().await;
	drop(submitter);

	match printer.await {
		Ok(written) => written?,
		Err(err) => return Err(CliError::Session(format!("output task failed: {err}"))),
	}

	Ok(report)
}

fn finish(report: SessionReport) -> Result<()> {
	info!(
		target = "shellview",
		reason = ?report.reason,
		sent = report.stats.sent,
		delivered = report.stats.delivered,
		dropped = report.stats.dropped,
		"session finished"
	);

	if let Some(err) = report.error {
		return Err(err.into());
	}
	match report.reason {
		StopReason::TransportClosed => {
			Err(CliError::Session("endpoint closed the connection".into()))
		}
		_ => Ok(()),
	}
}
