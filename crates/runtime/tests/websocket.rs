//! Sessions against a real WebSocket endpoint served in-process.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::{Message, WebSocket};
use axum::routing::get;
use shellview_runtime::{
	ConnectionState, EstablishOptions, Error, PendingInputPolicy, SessionConfig, StopReason,
	WebSocketConnector, establish, session, surface,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

#[derive(Debug, PartialEq)]
enum KernelEvent {
	Line(String),
	Closed,
}

/// Fake kernel: records every text frame and answers one known query.
async fn spawn_kernel() -> (String, mpsc::UnboundedReceiver<KernelEvent>) {
	let (events_tx, events_rx) = mpsc::unbounded_channel();

	let app = Router::new().route(
		"/shell",
		get(move |ws: WebSocketUpgrade| {
			let events = events_tx.clone();
			async move { ws.on_upgrade(move |socket| kernel(socket, events)) }
		}),
	);

	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});

	(format!("ws://{addr}/shell"), events_rx)
}

async fn kernel(mut socket: WebSocket, events: mpsc::UnboundedSender<KernelEvent>) {
	while let Some(Ok(message)) = socket.recv().await {
		match message {
			Message::Text(text) => {
				let line = text.as_str().to_owned();
				let reply: Vec<Message> = match line.as_str() {
					"db.collection.find()\n" => vec![Message::Text(r#"{"result": 3}"#.into())],
					"binary\n" => vec![
						Message::Binary(b"bytes as text".to_vec().into()),
						Message::Binary(vec![0xff, 0xfe, 0x00].into()),
						Message::Text("after binary".into()),
					],
					_ => Vec::new(),
				};
				let _ = events.send(KernelEvent::Line(line));
				for message in reply {
					let _ = socket.send(message).await;
				}
			}
			Message::Close(_) => break,
			_ => {}
		}
	}
	let _ = events.send(KernelEvent::Closed);
}

fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[tokio::test]
async fn session_round_trip_over_websocket() {
	init_tracing();
	let (endpoint, mut events) = spawn_kernel().await;

	let (mut panel, port) = surface::channel();
	let config = SessionConfig {
		endpoint,
		establish: EstablishOptions::default(),
		pending_input: PendingInputPolicy::Drop,
	};
	let mut handle = session::spawn(Arc::new(WebSocketConnector::default()), config, port);
	assert_eq!(handle.settled().await, ConnectionState::Open);

	assert!(panel.submit("db.collection.find()"));
	assert_eq!(
		events.recv().await,
		Some(KernelEvent::Line("db.collection.find()\n".into()))
	);

	let output = tokio::time::timeout(Duration::from_secs(5), panel.next_display())
		.await
		.unwrap()
		.unwrap();
	assert_eq!(output.value(), r#"{"result": 3}"#);

	let report = handle.dispose().await;
	assert_eq!(report.reason, StopReason::Disposed);
	assert_eq!(report.stats.sent, 1);
	assert_eq!(report.stats.delivered, 1);
	assert_eq!(events.recv().await, Some(KernelEvent::Closed));
	assert_eq!(panel.next_display().await, None);
}

#[tokio::test]
async fn establish_with_reference_polling() {
	init_tracing();
	let (endpoint, mut events) = spawn_kernel().await;

	let connector = WebSocketConnector::default();
	let connection = establish(&connector, &endpoint, &EstablishOptions::reference())
		.await
		.unwrap();
	assert_eq!(connection.state(), ConnectionState::Open);

	connection.send_frame("print(1)\n".into()).await.unwrap();
	assert_eq!(events.recv().await, Some(KernelEvent::Line("print(1)\n".into())));

	connection.close().await;
	assert_eq!(events.recv().await, Some(KernelEvent::Closed));
}

#[tokio::test]
async fn refused_connection_is_connect_failure() {
	init_tracing();
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);

	let connector = WebSocketConnector::default();
	let err = establish(&connector, &format!("ws://{addr}/shell"), &EstablishOptions::default())
		.await
		.unwrap_err();

	assert!(matches!(err, Error::ConnectFailed { .. }), "got {err:?}");
}

#[tokio::test]
async fn invalid_endpoint_fails_fast() {
	let (_panel, port) = surface::channel();
	let config = SessionConfig {
		endpoint: "http://127.0.0.1:1/".into(),
		..SessionConfig::default()
	};

	let report = session::spawn(Arc::new(WebSocketConnector::default()), config, port)
		.finished()
		.await;

	assert_eq!(report.reason, StopReason::ConnectFailed);
	assert!(matches!(report.error, Some(Error::InvalidEndpoint { .. })));
}

#[tokio::test]
async fn utf8_binary_frames_relay_as_text_others_skipped() {
	init_tracing();
	let (endpoint, mut events) = spawn_kernel().await;

	let (mut panel, port) = surface::channel();
	let config = SessionConfig {
		endpoint,
		..SessionConfig::default()
	};
	let mut handle = session::spawn(Arc::new(WebSocketConnector::default()), config, port);
	assert_eq!(handle.settled().await, ConnectionState::Open);

	assert!(panel.submit("binary"));
	assert_eq!(events.recv().await, Some(KernelEvent::Line("binary\n".into())));

	let mut shown = Vec::new();
	for _ in 0..2 {
		let output = tokio::time::timeout(Duration::from_secs(5), panel.next_display())
			.await
			.unwrap()
			.unwrap();
		shown.push(output.value().to_string());
	}
	assert_eq!(shown, ["bytes as text", "after binary"]);
	assert_eq!(handle.state(), ConnectionState::Open);

	let report = handle.dispose().await;
	assert_eq!(report.reason, StopReason::Disposed);
	assert_eq!(report.stats.delivered, 2);
	assert_eq!(panel.try_next_display(), None);
}
