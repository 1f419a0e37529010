//! Per-connection lifecycle: two pumps sharing one outbound queue.
//!
//! Inbound pump: decode one envelope per frame, run the hello handshake,
//! persist + broadcast authenticated traffic, reply with acks/errors.
//! Outbound pump: drain the bounded queue to the socket in arrival order;
//! queue closure triggers a graceful close.
//!
//! State machine per connection: Unauthenticated → Authenticated (first
//! valid `hello`) → Closed. Decode and auth errors keep the socket open;
//! only transport errors end it.

use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use relaycast_core::protocol::{Ack, Envelope, EnvelopeKind, ErrorReply, MessageStatus};
use relaycast_core::RelayError;

use crate::app_state::AppState;
use crate::broadcast::{ConnectionHandle, OUTBOUND_QUEUE_CAPACITY};

pub async fn ws_upgrade(State(app): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_connection(app, socket))
}

/// Peer identity, assigned on successful hello.
struct Session {
    peer_id: Option<String>,
}

async fn run_connection(app: AppState, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(OUTBOUND_QUEUE_CAPACITY);

    // Outbound pump: FIFO drain; write order equals enqueue order.
    let writer = tokio::spawn(async move {
        while let Some(bytes) = out_rx.recv().await {
            let text = match String::from_utf8(bytes) {
                Ok(t) => t,
                Err(_) => continue, // payloads are always JSON text
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        // queue closed: graceful close handshake
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    let mut session = Session { peer_id: None };

    // Inbound pump.
    while let Some(incoming) = ws_rx.next().await {
        let Ok(msg) = incoming else { break };
        match msg {
            Message::Text(s) => handle_frame(&app, &out_tx, &mut session, s.as_bytes()).await,
            Message::Binary(b) => handle_frame(&app, &out_tx, &mut session, &b).await,
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => break,
        }
    }

    // Deregister only after completed authentication, and only while this
    // socket's queue is still the registered one.
    if let Some(id) = session.peer_id.take() {
        app.deregister(&id, &out_tx);
        tracing::info!(peer = %id, "connection closed");
    }

    drop(out_tx);
    let _ = writer.await;
}

async fn handle_frame(
    app: &AppState,
    out_tx: &mpsc::Sender<Vec<u8>>,
    session: &mut Session,
    raw: &[u8],
) {
    let mut env = match Envelope::decode(raw) {
        Ok(env) => env,
        Err(e) => {
            tracing::warn!(error = %e, "frame decode failed");
            send_error(out_tx, "", "malformed envelope", e.client_code());
            return;
        }
    };

    env.ensure_id();

    if env.from.is_empty() || env.parse_kind().is_none() {
        tracing::warn!(from = %env.from, kind = %env.kind, "envelope validation failed");
        let e = RelayError::Validation("missing sender or unknown type".into());
        send_error(out_tx, &env.id, e.to_string(), e.client_code());
        return;
    }

    env.touch_timestamp();

    // hello handshake: self-declared identity, registers the send handle
    if env.is(EnvelopeKind::Hello) && session.peer_id.is_none() {
        let peer_id = env.from.clone();
        session.peer_id = Some(peer_id.clone());
        app.register(ConnectionHandle::new(peer_id.clone(), out_tx.clone()));
        tracing::info!(peer = %peer_id, "peer authenticated");
        send_ack(out_tx, &env.id, "success", "authenticated");
        return;
    }

    if session.peer_id.is_none() {
        tracing::warn!(kind = %env.kind, "envelope before hello");
        let e = RelayError::Unauthenticated;
        send_error(out_tx, &env.id, e.to_string(), e.client_code());
        return;
    }

    // liveness probe: answered directly, never routed
    if env.is(EnvelopeKind::Ping) {
        let mut pong = env.clone();
        pong.kind = EnvelopeKind::Pong.as_str().into();
        if let Ok(bytes) = pong.encode() {
            enqueue_reply(out_tx, bytes);
        }
        return;
    }

    let bytes = match env.encode() {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "envelope re-encode failed");
            send_error(out_tx, &env.id, "internal error", 500);
            return;
        }
    };

    // Best-effort persistence: store failures are logged, never fatal.
    let ttl = app.message_ttl();
    if let Err(e) = app.store().store_message(&env.id, &bytes, ttl).await {
        tracing::warn!(id = %env.id, error = %e, "message store failed");
    }
    if let Err(e) = app
        .store()
        .set_status(&env.id, MessageStatus::Processing, ttl)
        .await
    {
        tracing::warn!(id = %env.id, error = %e, "status store failed");
    }

    match app.core().broadcaster.broadcast(&bytes) {
        Ok(outcome) => {
            set_status(app, &env.id, MessageStatus::Success).await;
            send_ack(
                out_tx,
                &env.id,
                "success",
                format!("delivered to {}/{} targets", outcome.delivered, outcome.targets),
            );
        }
        Err(e) => {
            tracing::error!(id = %env.id, error = %e, "broadcast failed");
            set_status(app, &env.id, MessageStatus::Failed).await;
            send_error(out_tx, &env.id, e.to_string(), e.client_code());
        }
    }
}

async fn set_status(app: &AppState, id: &str, status: MessageStatus) {
    if let Err(e) = app.store().set_status(id, status, app.message_ttl()).await {
        tracing::warn!(%id, error = %e, "status store failed");
    }
}

fn send_ack(out_tx: &mpsc::Sender<Vec<u8>>, id: &str, status: &str, message: impl Into<String>) {
    if let Ok(bytes) = Ack::new(id, status, message.into()).encode() {
        enqueue_reply(out_tx, bytes);
    }
}

fn send_error(out_tx: &mpsc::Sender<Vec<u8>>, id: &str, error: impl Into<String>, code: u16) {
    if let Ok(bytes) = ErrorReply::new(id, error.into(), code).encode() {
        enqueue_reply(out_tx, bytes);
    }
}

fn enqueue_reply(out_tx: &mpsc::Sender<Vec<u8>>, bytes: Vec<u8>) {
    // own queue full or closing; control replies are droppable
    if out_tx.try_send(bytes).is_err() {
        tracing::debug!("reply dropped, outbound queue unavailable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::app_state::AppState;
    use crate::config;

    fn app(yaml: &str) -> AppState {
        AppState::new(config::load_from_str(yaml).expect("config")).expect("state")
    }

    fn frame(v: serde_json::Value) -> Vec<u8> {
        v.to_string().into_bytes()
    }

    fn reply(rx: &mut mpsc::Receiver<Vec<u8>>) -> serde_json::Value {
        let bytes = rx.try_recv().expect("reply expected");
        serde_json::from_slice(&bytes).expect("reply is json")
    }

    const PAIR: &str = "groups:\n  - name: pair\n    members: [a, b]\n";

    #[tokio::test]
    async fn traffic_before_hello_gets_401_without_registration() {
        let app = app("{}");
        let (tx, mut rx) = mpsc::channel(8);
        let mut session = Session { peer_id: None };

        let raw = frame(json!({
            "from": "a", "type": "chat",
            "body": { "sender": "s", "chatMessage": "hi" }, "id": "m1",
        }));
        handle_frame(&app, &tx, &mut session, &raw).await;

        let r = reply(&mut rx);
        assert_eq!(r["type"], "error");
        assert_eq!(r["code"], 401);
        assert!(session.peer_id.is_none(), "still unauthenticated");
        assert_eq!(app.core().broadcaster.connection_count(), 0);
    }

    #[tokio::test]
    async fn hello_registers_then_ping_is_answered_not_routed() {
        let app = app(PAIR);
        let (b_tx, mut b_rx) = mpsc::channel(8);
        app.register(ConnectionHandle::new("b", b_tx));

        let (tx, mut rx) = mpsc::channel(8);
        let mut session = Session { peer_id: None };

        let hello = frame(json!({ "from": "a", "type": "hello", "body": {}, "id": "h1" }));
        handle_frame(&app, &tx, &mut session, &hello).await;
        let r = reply(&mut rx);
        assert_eq!(r["type"], "ack");
        assert_eq!(r["status"], "success");
        assert_eq!(session.peer_id.as_deref(), Some("a"));
        assert_eq!(app.core().broadcaster.connection_count(), 2);

        let ping = frame(json!({ "from": "a", "type": "ping", "body": {}, "id": "p1" }));
        handle_frame(&app, &tx, &mut session, &ping).await;
        let r = reply(&mut rx);
        assert_eq!(r["type"], "pong");
        assert_eq!(r["id"], "p1");
        assert!(b_rx.try_recv().is_err(), "ping is never routed");
    }

    #[tokio::test]
    async fn failed_broadcast_marks_status_failed() {
        let app = app(PAIR);
        let (tx, mut rx) = mpsc::channel(8);
        let mut session = Session { peer_id: None };

        let hello = frame(json!({ "from": "a", "type": "hello", "body": {}, "id": "h1" }));
        handle_frame(&app, &tx, &mut session, &hello).await;
        let _ = reply(&mut rx);

        // command pinned to a target that never connected
        let cmd = frame(json!({
            "from": "a", "type": "command",
            "body": { "sender": "op", "command": "stop", "executeAt": "b" },
            "id": "c1",
        }));
        handle_frame(&app, &tx, &mut session, &cmd).await;
        let r = reply(&mut rx);
        assert_eq!(r["type"], "error");
        assert_eq!(r["code"], 500);
        assert_eq!(
            app.store().get_status("c1").await.expect("status stored"),
            MessageStatus::Failed
        );
    }

    #[tokio::test]
    async fn delivered_broadcast_marks_status_success() {
        let app = app(PAIR);
        let (b_tx, mut b_rx) = mpsc::channel(8);
        app.register(ConnectionHandle::new("b", b_tx));

        let (tx, mut rx) = mpsc::channel(8);
        let mut session = Session { peer_id: None };

        let hello = frame(json!({ "from": "a", "type": "hello", "body": {}, "id": "h1" }));
        handle_frame(&app, &tx, &mut session, &hello).await;
        let _ = reply(&mut rx);

        let chat = frame(json!({
            "from": "a", "type": "chat",
            "body": { "sender": "s", "chatMessage": "hi" }, "id": "m2",
        }));
        handle_frame(&app, &tx, &mut session, &chat).await;
        let r = reply(&mut rx);
        assert_eq!(r["type"], "ack");
        assert_eq!(r["status"], "success");
        assert_eq!(
            app.store().get_status("m2").await.expect("status stored"),
            MessageStatus::Success
        );
        assert!(b_rx.try_recv().is_ok(), "b received the chat");
    }
}
