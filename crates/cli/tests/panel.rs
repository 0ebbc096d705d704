//! Panel host end to end: a real WebSocket client against an in-memory endpoint.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use shellview_cli::panel::PanelHost;
use shellview_runtime::{
	EstablishOptions, MemoryConnector, MemoryRemote, PendingInputPolicy, SessionConfig,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

fn session_config() -> SessionConfig {
	SessionConfig {
		endpoint: "memory://shell".into(),
		establish: EstablishOptions::reference(),
		pending_input: PendingInputPolicy::Queue { capacity: 8 },
	}
}

async fn start_host(
	assets: Option<std::path::PathBuf>,
) -> (PanelHost, mpsc::UnboundedReceiver<MemoryRemote>) {
	let (connector, remotes) = MemoryConnector::pair(8);
	let host = PanelHost::bind("127.0.0.1", 0, Arc::new(connector), session_config(), assets)
		.await
		.unwrap();
	(host, remotes)
}

async fn get(host: &PanelHost, path: &str) -> String {
	let mut stream = TcpStream::connect(host.local_addr()).await.unwrap();
	let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
	stream.write_all(request.as_bytes()).await.unwrap();
	let mut response = String::new();
	stream.read_to_string(&mut response).await.unwrap();
	response
}

async fn wait_released(remote: &MemoryRemote) {
	tokio::time::timeout(Duration::from_secs(5), async {
		while !remote.is_released() {
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
	})
	.await
	.expect("link was not released");
}

#[tokio::test]
async fn panel_socket_relays_both_directions() {
	let (host, mut remotes) = start_host(None).await;
	let (mut ws, _) = tokio_tungstenite::connect_async(host.socket_url()).await.unwrap();

	let mut remote = remotes.recv().await.unwrap();

	ws.send(Message::Text("not an envelope".into())).await.unwrap();
	ws.send(Message::Text(r#"{"command":"execute","value":"db.stats()"}"#.into()))
		.await
		.unwrap();

	remote.open();
	assert_eq!(remote.recv().await.as_deref(), Some("db.stats()\n"));

	assert!(remote.push(r#"{"ok": 1}"#));
	let reply = ws.next().await.unwrap().unwrap();
	let reply: serde_json::Value = serde_json::from_str(reply.to_text().unwrap()).unwrap();
	assert_eq!(
		reply,
		serde_json::json!({"command": "updateOutput", "value": r#"{"ok": 1}"#})
	);

	ws.close(None).await.unwrap();
	wait_released(&remote).await;

	host.shutdown().await.unwrap();
}

#[tokio::test]
async fn remote_close_closes_panel_socket() {
	let (host, mut remotes) = start_host(None).await;
	let (mut ws, _) = tokio_tungstenite::connect_async(host.socket_url()).await.unwrap();

	let mut remote = remotes.recv().await.unwrap();
	remote.open();
	tokio::time::sleep(Duration::from_millis(50)).await;
	remote.close();

	let closed = tokio::time::timeout(Duration::from_secs(5), async {
		while let Some(msg) = ws.next().await {
			if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
				return true;
			}
		}
		true
	})
	.await
	.unwrap();
	assert!(closed);

	host.shutdown().await.unwrap();
}

#[tokio::test]
async fn failed_connect_reports_reason_in_close_frame() {
	let (host, mut remotes) = start_host(None).await;
	let (mut ws, _) = tokio_tungstenite::connect_async(host.socket_url()).await.unwrap();

	let mut remote = remotes.recv().await.unwrap();
	remote.fail("connection refused");

	let frame = tokio::time::timeout(Duration::from_secs(5), async {
		loop {
			match ws.next().await {
				Some(Ok(Message::Close(frame))) => return frame,
				Some(Ok(_)) => continue,
				_ => return None,
			}
		}
	})
	.await
	.unwrap()
	.expect("close frame");

	assert!(frame.reason.contains("connection refused"), "{}", frame.reason);

	host.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_disposes_open_panels() {
	let (host, mut remotes) = start_host(None).await;
	let (_ws, _) = tokio_tungstenite::connect_async(host.socket_url()).await.unwrap();

	let remote = remotes.recv().await.unwrap();
	remote.open();

	host.shutdown().await.unwrap();
	wait_released(&remote).await;
}

#[tokio::test]
async fn serves_builtin_page() {
	let (host, _remotes) = start_host(None).await;

	let response = get(&host, "/").await;
	assert!(response.starts_with("HTTP/1.1 200"), "{response}");
	assert!(response.contains("<title>shellview</title>"));

	host.shutdown().await.unwrap();
}

#[tokio::test]
async fn serves_page_from_assets_dir() {
	let dir = tempfile::tempdir().unwrap();
	std::fs::write(dir.path().join("index.html"), "<p>custom panel</p>").unwrap();
	let (host, _remotes) = start_host(Some(dir.path().to_path_buf())).await;

	let response = get(&host, "/").await;
	assert!(response.contains("<p>custom panel</p>"));

	host.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_assets_page_is_not_found() {
	let dir = tempfile::tempdir().unwrap();
	let (host, _remotes) = start_host(Some(dir.path().to_path_buf())).await;

	let response = get(&host, "/").await;
	assert!(response.starts_with("HTTP/1.1 404"), "{response}");

	host.shutdown().await.unwrap();
}
