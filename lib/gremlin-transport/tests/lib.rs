// Copyright 2024 - developers of the `gremlin-rs` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! End-to-end exercise of [`Connection`]/[`Host`] against a local mock
//! Gremlin Server: a bare WebSocket loopback that speaks just enough of
//! the subprotocol (frame encoding, status-code dispatch, the SASL
//! round-trip) to drive eval, chunked traversals, empty results, server
//! errors, authentication, and pool admission control end to end. There
//! is no live Gremlin Server to test against in CI, so this stands in
//! for one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use gremlin_protocol::{frame, GraphSONV2Serializer, MessageSerializer, Protocol};
use gremlin_transport::reconnection::NoReconnect;
use gremlin_transport::{Configuration, Connection, Host};
use gremlin_types::RequestMessage;
use serde_json::{json, Map, Value};
use simple_logger::SimpleLogger;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use uuid::Uuid;

type WsSink = SplitSink<WebSocketStream<TcpStream>, WsMessage>;

/// A bare-bones mock Gremlin Server: accepts WebSocket connections and
/// answers each request according to the `gremlin` script it named,
/// optionally gating the first request per connection behind a SASL
/// challenge.
struct MockServer {
    addr: String,
}

impl MockServer {
    async fn start(credentials: Option<(&'static str, &'static str)>) -> Self {
        let _ = SimpleLogger::new().with_level(log::LevelFilter::Debug).init();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(serve_connection(stream, credentials));
            }
        });
        Self { addr }
    }

    fn url(&self) -> String {
        format!("ws://{}/gremlin", self.addr)
    }
}

async fn serve_connection(stream: TcpStream, credentials: Option<(&'static str, &'static str)>) {
    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = ws.split();
    // Only the first request on a fresh connection is challenged.
    let mut needs_challenge = credentials.is_some();
    let mut pending: HashMap<Uuid, Value> = HashMap::new();

    while let Some(Ok(message)) = source.next().await {
        let bytes = match message {
            WsMessage::Binary(data) => data.to_vec(),
            WsMessage::Close(_) => break,
            _ => continue,
        };
        let Ok((_mime, body)) = frame::decode(&bytes) else {
            continue;
        };
        let request: Value = serde_json::from_slice(body).unwrap();
        let request_id: Uuid = request["requestId"].as_str().unwrap().parse().unwrap();
        let op = request["op"].as_str().unwrap_or("");

        if op == "authentication" {
            handle_authentication(&mut sink, &mut pending, credentials, request_id, &request).await;
            continue;
        }

        if needs_challenge {
            needs_challenge = false;
            pending.insert(request_id, request);
            send_status(&mut sink, request_id, 407, "authenticate", Value::Null).await;
            continue;
        }

        respond_to_script(&mut sink, request_id, &request).await;
    }
}

async fn handle_authentication(
    sink: &mut WsSink,
    pending: &mut HashMap<Uuid, Value>,
    credentials: Option<(&'static str, &'static str)>,
    request_id: Uuid,
    request: &Value,
) {
    let (user, pass) = credentials.expect("server only challenges when credentials are configured");
    let expected = BASE64.encode(format!("\0{user}\0{pass}"));
    let sasl = request["args"]["sasl"].as_str().unwrap_or("");
    if sasl != expected {
        send_status(sink, request_id, 401, "bad credentials", Value::Null).await;
        return;
    }
    if let Some(original) = pending.remove(&request_id) {
        respond_to_script(sink, request_id, &original).await;
    } else {
        // A second 407 round-trip for a request we already answered once
        // would be a bug in the mock — not exercised by these tests.
        send_status(sink, request_id, 401, "no pending request for this id", Value::Null).await;
    }
}

async fn respond_to_script(sink: &mut WsSink, request_id: Uuid, request: &Value) {
    let gremlin = request["args"]["gremlin"].as_str().unwrap_or("");
    match gremlin {
        "x + x" => send_status(sink, request_id, 200, "", json!([8])).await,
        "graph.tx().commit()" => send_status(sink, request_id, 204, "", Value::Null).await,
        "x + x g.asdfas" => send_status(sink, request_id, 597, "script evaluation error", Value::Null).await,
        _ => {
            // Bytecode traversals (e.g. `g.V()`) arrive with a non-string
            // `gremlin` value; answer with a partial chunk then a final one.
            send_status(sink, request_id, 206, "", json!([1, 2, 3])).await;
            send_status(sink, request_id, 200, "", json!([4, 5, 6])).await;
        }
    }
}

async fn send_status(sink: &mut WsSink, request_id: Uuid, code: u16, message: &str, data: Value) {
    let body = json!({
        "requestId": request_id.to_string(),
        "status": {"code": code, "message": message},
        "result": {"data": data, "meta": {}},
    });
    let frame = frame::encode(
        GraphSONV2Serializer::new().mime_type(),
        &serde_json::to_vec(&body).unwrap(),
    );
    let _ = sink.send(WsMessage::Binary(frame.into())).await;
}

fn protocol(credentials: Option<(&str, &str)>) -> Arc<Protocol> {
    let (user, pass) = credentials.unwrap_or(("", ""));
    Arc::new(Protocol::new(Box::new(GraphSONV2Serializer::new()), user.to_string(), pass.to_string()))
}

fn eval(script: &str) -> RequestMessage {
    RequestMessage::eval(Uuid::nil(), script, None, Map::new())
}

fn bytecode() -> RequestMessage {
    RequestMessage::bytecode(Uuid::nil(), json!({"step": ["V"]}).into(), Map::new())
}

/// S1: eval with bindings — a single 200 chunk with the expected data.
#[tokio::test]
async fn eval_with_bindings_yields_one_success_chunk() {
    let server = MockServer::start(None).await;
    let conn = Connection::open(server.url(), protocol(None), 16, None, Arc::new(NoReconnect))
        .await
        .unwrap();

    let mut bindings = Map::new();
    bindings.insert("x".to_string(), json!(4));
    let request = RequestMessage::eval(Uuid::nil(), "x + x", Some(bindings), Map::new());
    let mut rs = conn.write(request).await.unwrap();

    let all = rs.all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].data, json!([8]));
}

/// S2: a chunked traversal response assembles into two messages whose
/// flattened data totals six elements.
#[tokio::test]
async fn chunked_traversal_assembles_both_chunks() {
    let server = MockServer::start(None).await;
    let conn = Connection::open(server.url(), protocol(None), 16, None, Arc::new(NoReconnect))
        .await
        .unwrap();

    let mut rs = conn.write(bytecode()).await.unwrap();
    let all = rs.all().await.unwrap();
    assert_eq!(all.len(), 2);
    let flattened: usize = all.iter().map(|m| m.data.as_array().unwrap().len()).sum();
    assert_eq!(flattened, 6);
}

/// S3: a no-content response drains to an empty list, not an error.
#[tokio::test]
async fn no_content_drains_empty() {
    let server = MockServer::start(None).await;
    let conn = Connection::open(server.url(), protocol(None), 16, None, Arc::new(NoReconnect))
        .await
        .unwrap();

    let mut rs = conn.write(eval("graph.tx().commit()")).await.unwrap();
    assert!(rs.all().await.unwrap().is_empty());
}

/// S4: a server error status surfaces as an error carrying that status
/// code, and the connection's inflight slot still gets released.
#[tokio::test]
async fn server_error_surfaces_status_code() {
    let server = MockServer::start(None).await;
    let conn = Connection::open(server.url(), protocol(None), 1, None, Arc::new(NoReconnect))
        .await
        .unwrap();

    let mut rs = conn.write(eval("x + x g.asdfas")).await.unwrap();
    let err = rs.all().await.unwrap_err();
    assert_eq!(err.status_code(), Some(597));

    // The inflight permit must have come back: a second request on this
    // connection (capacity 1) would otherwise hang.
    let mut rs2 = conn.write(eval("x + x")).await.unwrap();
    assert_eq!(rs2.all().await.unwrap()[0].data, json!([8]));
}

/// S5: the first frame is a 407, exactly one SASL response is sent back,
/// and the consumer sees only the eventual 200 as its sole result.
#[tokio::test]
async fn authentication_round_trip_is_transparent_to_the_caller() {
    let creds = ("stephen", "password");
    let server = MockServer::start(Some(creds)).await;
    let conn = Connection::open(server.url(), protocol(Some(creds)), 16, None, Arc::new(NoReconnect))
        .await
        .unwrap();

    let mut rs = conn.write(eval("x + x")).await.unwrap();
    let all = rs.all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].data, json!([8]));
}

/// S6: 100 concurrent submits on a pool capped at `max_conns=4` all
/// complete, and the pool never grows past that cap.
#[tokio::test]
async fn concurrent_submits_respect_the_pool_cap() {
    let server = MockServer::start(None).await;
    let config = Configuration {
        min_conns: 1,
        max_conns: 4,
        max_inflight: 16,
        max_times_acquired: 1_000,
        ..Configuration::default()
    };
    let host = Arc::new(
        Host::open(server.url(), &config, protocol(None), Arc::new(NoReconnect))
            .await
            .unwrap(),
    );

    let successes = Arc::new(AtomicUsize::new(0));
    let mut tasks = Vec::new();
    for _ in 0..100 {
        let host = host.clone();
        let successes = successes.clone();
        tasks.push(tokio::spawn(async move {
            let conn = host.get_connection().await.unwrap();
            let mut rs = conn.write(eval("x + x")).await.unwrap();
            let all = rs.all().await.unwrap();
            assert_eq!(all[0].data, json!([8]));
            host.release(&conn).await;
            successes.fetch_add(1, Ordering::Relaxed);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(successes.load(Ordering::Relaxed), 100);
    assert!(host.connection_count().await <= 4);
}

/// Property 5: closing a Connection twice is a harmless no-op.
#[tokio::test]
async fn connection_close_is_idempotent() {
    let server = MockServer::start(None).await;
    let conn = Connection::open(server.url(), protocol(None), 16, None, Arc::new(NoReconnect))
        .await
        .unwrap();
    conn.close().await.unwrap();
    conn.close().await.unwrap();
}

/// A dropped transport is reconnected transparently on the next `write`
/// rather than surfacing the old closed-connection error to the caller.
#[tokio::test]
async fn closed_transport_reconnects_on_next_write() {
    let server = MockServer::start(None).await;
    let conn = Connection::open(server.url(), protocol(None), 16, None, Arc::new(NoReconnect))
        .await
        .unwrap();

    conn.close().await.unwrap();
    // `close()` marks the shared state closed; a fresh `write` must dial
    // a new transport rather than surface the old closed-connection error.
    let timeout = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(mut rs) = conn.write(eval("x + x")).await {
                if let Ok(all) = rs.all().await {
                    if all.first().map(|m| &m.data) == Some(&json!([8])) {
                        return;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(timeout.is_ok(), "connection never recovered after close()");
}
