//! Panel host: serves the panel page and gives every panel socket its own
//! session.
//!
//! Each WebSocket on [`PANEL_SOCKET_PATH`] carries the JSON envelope from
//! `shellview_protocol::surface`. Closing the socket disposes the session;
//! the session ending closes the socket.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use shellview_protocol::{PANEL_SOCKET_PATH, parse_input};
use shellview_runtime::{ConnectionState, Connector, SessionConfig, SessionReport, session, surface};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

/// Page served when no assets directory is configured.
const BUILTIN_INDEX: &str = include_str!("../assets/index.html");

const SOCKET_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Close frame reasons must fit in a control frame.
const MAX_CLOSE_REASON: usize = 120;

/// What every panel socket shares.
#[derive(Clone)]
struct PanelState {
	connector: Arc<dyn Connector>,
	session: SessionConfig,
	assets: Option<PathBuf>,
	closing: watch::Receiver<bool>,
}

/// A running panel host. Dropping it stops accepting panels.
#[derive(Debug)]
pub struct PanelHost {
	addr: SocketAddr,
	closing: watch::Sender<bool>,
	stop: Option<oneshot::Sender<()>>,
	server: Option<JoinHandle<Result<()>>>,
}

impl PanelHost {
	/// Binds `host:port` and starts serving.
	pub async fn bind(
		host: &str,
		port: u16,
		connector: Arc<dyn Connector>,
		session: SessionConfig,
		assets: Option<PathBuf>,
	) -> Result<Self> {
		let addr: SocketAddr = format!("{host}:{port}")
			.parse()
			.with_context(|| format!("Invalid host/port combination: {host}:{port}"))?;

		let listener = TcpListener::bind(addr)
			.await
			.with_context(|| format!("Failed to bind panel host to {addr}"))?;
		let addr = listener.local_addr().context("Reading panel host address")?;

		let (closing_tx, closing_rx) = watch::channel(false);
		let state = PanelState {
			connector,
			session,
			assets,
			closing: closing_rx,
		};

		let app = Router::new()
			.route("/", get(index))
			.route(PANEL_SOCKET_PATH, get(upgrade))
			.with_state(state);

		let (stop_tx, stop_rx) = oneshot::channel::<()>();
		let server = tokio::spawn(async move {
			axum::serve(listener, app.into_make_service())
				.with_graceful_shutdown(async {
					let _ = stop_rx.await;
				})
				.await
				.context("Panel host error")
		});

		info!(target = "shellview", %addr, "panel host listening");

		Ok(Self {
			addr,
			closing: closing_tx,
			stop: Some(stop_tx),
			server: Some(server),
		})
	}

	pub fn local_addr(&self) -> SocketAddr {
		self.addr
	}

	/// Address of the panel page.
	pub fn url(&self) -> String {
		format!("http://{}/", self.addr)
	}

	/// Address panels connect their socket to.
	pub fn socket_url(&self) -> String {
		format!("ws://{}{}", self.addr, PANEL_SOCKET_PATH)
	}

	/// Disposes every open session and stops the server.
	pub async fn shutdown(mut self) -> Result<()> {
		self.signal();
		match self.server.take() {
			Some(server) => server.await.context("Panel host task failed")?,
			None => Ok(()),
		}
	}

	fn signal(&mut self) {
		self.closing.send_replace(true);
		if let Some(stop) = self.stop.take() {
			let _ = stop.send(());
		}
	}
}

impl Drop for PanelHost {
	fn drop(&mut self) {
		self.signal();
	}
}

async fn index(State(state): State<PanelState>) -> Response {
	let Some(dir) = state.assets else {
		return Html(BUILTIN_INDEX).into_response();
	};

	let path = dir.join("index.html");
	match tokio::fs::read_to_string(&path).await {
		Ok(page) => Html(page).into_response(),
		Err(err) => {
			warn!(target = "shellview", path = %path.display(), error = %err, "panel page unavailable");
			(StatusCode::NOT_FOUND, "panel page not found").into_response()
		}
	}
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<PanelState>) -> Response {
	ws.on_upgrade(move |socket| handle_panel_socket(socket, state))
}

async fn handle_panel_socket(socket: WebSocket, state: PanelState) {
	info!(target = "shellview", endpoint = %state.session.endpoint, "panel connected");

	let (panel, port) = surface::channel();
	let handle = session::spawn(state.connector.clone(), state.session.clone(), port);
	let mut session_state = handle.subscribe();
	let mut closing = state.closing.clone();
	let (submitter, mut displays) = panel.split();

	let (tx, rx) = mpsc::unbounded_channel::<Message>();
	let mut rx_stream = UnboundedReceiverStream::new(rx);
	let (mut ws_tx, mut ws_rx) = socket.split();

	let send_task = tokio::spawn(async move {
		while let Some(msg) = rx_stream.next().await {
			if ws_tx.send(msg).await.is_err() {
				break;
			}
		}
	});

	let display_tx = tx.clone();
	let forward_task = tokio::spawn(async move {
		while let Some(message) = displays.recv().await {
			match serde_json::to_string(&message) {
				Ok(json) => {
					if display_tx.send(Message::Text(json.into())).is_err() {
						break;
					}
				}
				Err(err) => warn!(target = "shellview", error = %err, "Failed encoding panel update"),
			}
		}
	});

	loop {
		tokio::select! {
			msg = ws_rx.next() => match msg {
				Some(Ok(Message::Text(text))) => match parse_input(text.as_str()) {
					Ok(message) => {
						if !submitter.post(message) {
							break;
						}
					}
					Err(err) => {
						warn!(target = "shellview", error = %err, "Ignoring malformed panel message");
					}
				},
				Some(Ok(Message::Close(_))) | None => break,
				Some(Ok(_)) => {}
				Some(Err(err)) => {
					warn!(target = "shellview", error = %err, "Panel websocket error");
					break;
				}
			},
			_ = session_state.wait_for(|s| *s == ConnectionState::Closed) => break,
			_ = closing.wait_for(|closing| *closing) => break,
		}
	}

	let report = handle.dispose().await;
	drop(submitter);
	let _ = forward_task.await;

	let _ = tx.send(Message::Close(Some(close_frame(&report))));
	drop(tx);

	let abort = send_task.abort_handle();
	if tokio::time::timeout(SOCKET_CLOSE_GRACE, send_task).await.is_err() {
		debug!(target = "shellview", "panel socket did not drain, aborting");
		abort.abort();
	}

	info!(
		target = "shellview",
		reason = ?report.reason,
		sent = report.stats.sent,
		delivered = report.stats.delivered,
		dropped = report.stats.dropped,
		"panel disconnected"
	);
}

fn close_frame(report: &SessionReport) -> CloseFrame {
	match &report.error {
		Some(err) => {
			let mut reason = err.to_string();
			if reason.len() > MAX_CLOSE_REASON {
				let mut cut = MAX_CLOSE_REASON;
				while !reason.is_char_boundary(cut) {
					cut -= 1;
				}
				reason.truncate(cut);
			}
			CloseFrame {
				code: close_code::ERROR,
				reason: reason.into(),
			}
		}
		None => CloseFrame {
			code: close_code::NORMAL,
			reason: "session ended".into(),
		},
	}
}

#[cfg(test)]
mod tests {
	use shellview_runtime::{Error, RelayStats, StopReason};

	use super::*;

	#[test]
	fn close_frame_carries_connect_error() {
		let report = SessionReport {
			reason: StopReason::ConnectFailed,
			stats: RelayStats::default(),
			error: Some(Error::ConnectFailed {
				endpoint: "ws://127.0.0.1:9280/".into(),
				reason: "x".repeat(400),
			}),
		};
		let frame = close_frame(&report);
		assert_eq!(frame.code, close_code::ERROR);
		assert!(frame.reason.as_str().len() <= MAX_CLOSE_REASON);
	}

	#[test]
	fn close_frame_normal_when_disposed() {
		let report = SessionReport {
			reason: StopReason::Disposed,
			stats: RelayStats::default(),
			error: None,
		};
		assert_eq!(close_frame(&report).code, close_code::NORMAL);
	}
}
