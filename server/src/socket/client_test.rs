use super::*;
use axum::Router;
use axum::extract::ws::{CloseFrame, Message as AxumMessage, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use bytes::Bytes;
use crate::policy::PolicyError;
use futures::SinkExt;
use std::net::SocketAddr;
use tokio::time::timeout;

/// Echo server: repeats every data message; `"bye"` closes with 4000/"done".
async fn echo(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(|mut socket: WebSocket| async move {
        while let Some(Ok(msg)) = socket.recv().await {
            match msg {
                AxumMessage::Text(text) if text.as_str() == "bye" => {
                    let frame = CloseFrame { code: 4000, reason: "done".into() };
                    let _ = socket.send(AxumMessage::Close(Some(frame))).await;
                    break;
                }
                AxumMessage::Text(_) | AxumMessage::Binary(_) => {
                    if socket.send(msg).await.is_err() {
                        break;
                    }
                }
                AxumMessage::Close(_) => {
                    // The close reply is queued by the library; flush it before dropping.
                    let _ = socket.flush().await;
                    break;
                }
                _ => {}
            }
        }
    })
}

async fn spawn_echo_server() -> SocketAddr {
    let app = Router::new().route("/echo", get(echo));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn connector(blocked: &[&str]) -> TungsteniteConnector {
    TungsteniteConnector::new(HostPolicy::new(blocked.iter().copied()), Duration::from_secs(2))
}

fn open(url: String) -> WsOpen {
    WsOpen { url, protocols: Vec::new() }
}

async fn next(socket: &mut Box<dyn RelaySocket>) -> SocketEvent {
    timeout(Duration::from_secs(2), socket.next_event())
        .await
        .expect("socket event timed out")
        .expect("socket event")
}

#[tokio::test]
async fn echoes_text_and_binary() {
    let addr = spawn_echo_server().await;
    let mut socket = connector(&[]).connect(&open(format!("ws://{addr}/echo"))).await.expect("connect");

    socket.send(OutgoingMessage::Text("hi".into())).await.expect("send text");
    assert_eq!(next(&mut socket).await, SocketEvent::Message(IncomingMessage::Text("hi".into())));

    socket
        .send(OutgoingMessage::Binary(Bytes::from_static(&[1, 2, 3])))
        .await
        .expect("send binary");
    assert_eq!(
        next(&mut socket).await,
        SocketEvent::Message(IncomingMessage::Binary(Bytes::from_static(&[1, 2, 3])))
    );
}

#[tokio::test]
async fn remote_close_reports_code_and_reason() {
    let addr = spawn_echo_server().await;
    let mut socket = connector(&[]).connect(&open(format!("ws://{addr}/echo"))).await.expect("connect");
    socket.send(OutgoingMessage::Text("bye".into())).await.expect("send");
    assert_eq!(
        next(&mut socket).await,
        SocketEvent::Closed(CloseInfo { code: 4000, reason: "done".into(), was_clean: true })
    );
}

#[tokio::test]
async fn local_close_completes_handshake_cleanly() {
    let addr = spawn_echo_server().await;
    let mut socket = connector(&[]).connect(&open(format!("ws://{addr}/echo"))).await.expect("connect");
    socket.close().await.expect("close");
    let SocketEvent::Closed(info) = next(&mut socket).await else {
        panic!("expected close event");
    };
    assert!(info.was_clean);
}

#[tokio::test]
async fn blocked_host_is_refused_before_connecting() {
    let err = match connector(&["blocked.test"]).connect(&open("ws://blocked.test/".into())).await {
        Ok(_) => panic!("expected policy error"),
        Err(err) => err,
    };
    assert!(matches!(err, SocketError::Policy(PolicyError::Blocked(_))));
}

#[tokio::test]
async fn http_scheme_is_refused() {
    let result = connector(&[]).connect(&open("http://example.test/".into())).await;
    assert!(matches!(result, Err(SocketError::Policy(PolicyError::UnsupportedScheme(_)))));
}

#[tokio::test]
async fn refused_connection_is_connect_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let result = connector(&[]).connect(&open(format!("ws://{addr}/"))).await;
    assert!(matches!(result, Err(SocketError::Connect(_))));
}

#[test]
fn normalize_skips_control_frames() {
    assert_eq!(normalize(Message::Ping(Bytes::new())).expect("ping"), None);
    assert_eq!(normalize(Message::Pong(Bytes::new())).expect("pong"), None);
}

#[test]
fn normalize_close_without_frame_reports_no_status() {
    let event = normalize(Message::Close(None)).expect("close");
    assert_eq!(
        event,
        Some(SocketEvent::Closed(CloseInfo { code: CLOSE_NO_STATUS, reason: String::new(), was_clean: true }))
    );
}

#[test]
fn normalize_text_becomes_text_message() {
    let event = normalize(Message::Text("hello".into())).expect("text");
    assert_eq!(event, Some(SocketEvent::Message(IncomingMessage::Text("hello".into()))));
}
