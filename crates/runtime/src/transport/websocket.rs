use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tracing::{debug, info, warn};

use super::{Connector, DEFAULT_OUTBOUND_CAPACITY, FailureSlot, TaskGuard, TransportParts};
use crate::error::{Error, Result};
use crate::state::StateReporter;

/// Opens WebSocket links carrying one text message per frame.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
	outbound_capacity: usize,
}

impl WebSocketConnector {
	pub fn new(outbound_capacity: usize) -> Self {
		Self {
			outbound_capacity: outbound_capacity.max(1),
		}
	}
}

impl Default for WebSocketConnector {
	fn default() -> Self {
		Self::new(DEFAULT_OUTBOUND_CAPACITY)
	}
}

impl Connector for WebSocketConnector {
	fn connect(&self, endpoint: &str) -> Result<TransportParts> {
		let request = build_request(endpoint)?;

		let (reporter, state) = StateReporter::channel();
		let failure = FailureSlot::default();
		let (outbound_tx, outbound_rx) = mpsc::channel(self.outbound_capacity);
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

		let task = tokio::spawn(drive(
			endpoint.to_string(),
			request,
			reporter,
			failure.clone(),
			outbound_rx,
			inbound_tx,
		));

		Ok(TransportParts {
			outbound: outbound_tx,
			inbound: inbound_rx,
			state,
			failure,
			guard: Some(TaskGuard::new(task)),
		})
	}
}

fn build_request(endpoint: &str) -> Result<Request> {
	let invalid = |reason: String| Error::InvalidEndpoint {
		endpoint: endpoint.to_string(),
		reason,
	};

	let request = endpoint
		.into_client_request()
		.map_err(|e| invalid(e.to_string()))?;

	match request.uri().scheme_str() {
		Some("ws") | Some("wss") => Ok(request),
		Some(other) => Err(invalid(format!("unsupported scheme '{other}'"))),
		None => Err(invalid("missing scheme".to_string())),
	}
}

/// Runs one link from handshake to teardown.
///
/// `reporter` lives for the whole task, so the link reads `Closed` as soon as
/// this returns or is aborted.
async fn drive(
	endpoint: String,
	request: Request,
	reporter: StateReporter,
	failure: FailureSlot,
	mut outbound: mpsc::Receiver<String>,
	inbound: mpsc::UnboundedSender<String>,
) {
	let (stream, _response) = match connect_async(request).await {
		Ok(connected) => connected,
		Err(err) => {
			warn!(target = "shellview", endpoint = %endpoint, error = %err, "websocket connect failed");
			failure.set(err.to_string());
			return;
		}
	};

	reporter.open();
	info!(target = "shellview", endpoint = %endpoint, "websocket open");

	let (mut sink, mut source) = stream.split();

	loop {
		tokio::select! {
			frame = outbound.recv() => match frame {
				Some(text) => {
					if let Err(err) = sink.send(Message::Text(text)).await {
						warn!(target = "shellview", error = %err, "websocket write failed");
						failure.set(err.to_string());
						break;
					}
				}
				None => {
					debug!(target = "shellview", endpoint = %endpoint, "outbound closed, sending close frame");
					let _ = sink.send(Message::Close(None)).await;
					break;
				}
			},
			incoming = source.next() => match incoming {
				Some(Ok(Message::Text(text))) => {
					if inbound.send(text).is_err() {
						break;
					}
				}
				Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
					Ok(text) => {
						if inbound.send(text).is_err() {
							break;
						}
					}
					Err(err) => {
						warn!(target = "shellview", len = err.as_bytes().len(), "skipping non-UTF-8 binary frame");
					}
				},
				Some(Ok(Message::Close(frame))) => {
					debug!(target = "shellview", ?frame, "remote closed websocket");
					break;
				}
				Some(Ok(_)) => {}
				Some(Err(err)) => {
					warn!(target = "shellview", error = %err, "websocket read failed");
					failure.set(err.to_string());
					break;
				}
				None => break,
			},
		}
	}

	reporter.close();
	info!(target = "shellview", endpoint = %endpoint, "websocket closed");
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_ws_and_wss() {
		assert!(build_request("ws://127.0.0.1:9280/").is_ok());
		assert!(build_request("wss://kernel.example.com/shell").is_ok());
	}

	#[test]
	fn rejects_other_schemes() {
		let err = build_request("http://127.0.0.1:9280/").unwrap_err();
		assert!(matches!(err, Error::InvalidEndpoint { .. }));
		assert!(err.to_string().contains("unsupported scheme 'http'"));
	}

	#[test]
	fn rejects_garbage() {
		assert!(matches!(
			build_request("not a url"),
			Err(Error::InvalidEndpoint { .. })
		));
	}
}
