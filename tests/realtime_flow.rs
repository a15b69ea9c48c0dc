//! End-to-end tests against a live server on an ephemeral port.
//!
//! Runs on the in-memory store, drives the WebSocket protocol with
//! `tokio-tungstenite`, and checks REST state with `reqwest`.

#![allow(clippy::panic, clippy::indexing_slicing)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use devconnect_realtime::config::RealtimeConfig;
use devconnect_realtime::domain::{UserId, UserProfile};
use devconnect_realtime::persistence::InMemoryStore;
use devconnect_realtime::server::{build_app, build_state};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn profile(name: &str) -> UserProfile {
    UserProfile {
        id: UserId::new(),
        name: name.to_string(),
        username: name.to_lowercase(),
        email: format!("{}@example.com", name.to_lowercase()),
        avatar: None,
        created_at: Utc::now(),
    }
}

/// Starts a server seeded with `users` and returns its address.
async fn spawn_server(users: &[UserProfile]) -> SocketAddr {
    let store = Arc::new(InMemoryStore::new());
    for user in users {
        store.insert_user(user.clone()).await;
    }
    let state = build_state(&RealtimeConfig::default(), Arc::clone(&store) as _, store);
    let app = build_app(state, Duration::from_secs(10));

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let Ok((ws, _)) = connect_async(format!("ws://{addr}/ws")).await else {
        panic!("ws connect failed");
    };
    ws
}

async fn emit(ws: &mut Client, frame: Value) {
    let Ok(()) = ws.send(Message::text(frame.to_string())).await else {
        panic!("ws send failed");
    };
}

/// Reads frames until one named `event` arrives and returns it.
async fn expect_event(ws: &mut Client, event: &str) -> Value {
    let read = async {
        loop {
            let Some(Ok(msg)) = ws.next().await else {
                panic!("socket closed while waiting for {event}");
            };
            let Ok(text) = msg.to_text() else {
                continue;
            };
            let Ok(frame) = serde_json::from_str::<Value>(text) else {
                continue;
            };
            if frame["event"] == event {
                return frame;
            }
        }
    };
    let Ok(frame) = tokio::time::timeout(WAIT, read).await else {
        panic!("timed out waiting for {event}");
    };
    frame
}

async fn get_json(url: String) -> (reqwest::StatusCode, Value) {
    let Ok(response) = reqwest::get(url).await else {
        panic!("http request failed");
    };
    let status = response.status();
    let Ok(body) = response.json::<Value>().await else {
        panic!("response was not json");
    };
    (status, body)
}

/// Polls the presence endpoint until `count` users are online.
async fn wait_for_online(addr: SocketAddr, count: u64) {
    let poll = async {
        loop {
            let (_, body) = get_json(format!("http://{addr}/api/v1/presence")).await;
            if body["count"] == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    if tokio::time::timeout(WAIT, poll).await.is_err() {
        panic!("never saw {count} users online");
    }
}

async fn join(ws: &mut Client, user: UserId) {
    emit(ws, json!({ "event": "user:join", "data": user })).await;
}

async fn send(ws: &mut Client, from: UserId, to: UserId, content: &str) {
    emit(
        ws,
        json!({
            "event": "message:send",
            "data": { "senderId": from, "receiverId": to, "content": content }
        }),
    )
    .await;
}

#[tokio::test]
async fn two_users_exchange_messages_and_see_presence() {
    let (ada, bob) = (profile("Ada"), profile("Bob"));
    let addr = spawn_server(&[ada.clone(), bob.clone()]).await;

    let mut a = connect(addr).await;
    join(&mut a, ada.id).await;
    wait_for_online(addr, 1).await;

    let mut b = connect(addr).await;
    join(&mut b, bob.id).await;
    let online = expect_event(&mut a, "user:online").await;
    assert_eq!(online["data"], bob.id.to_string());
    wait_for_online(addr, 2).await;

    send(&mut a, ada.id, bob.id, "hi").await;
    let received = expect_event(&mut b, "message:receive").await;
    assert_eq!(received["data"]["content"], "hi");
    assert_eq!(received["data"]["sender"]["_id"], ada.id.to_string());
    assert_eq!(received["data"]["sender"]["username"], "ada");
    let sent = expect_event(&mut a, "message:sent").await;
    assert_eq!(sent["data"]["_id"], received["data"]["_id"]);
    assert_eq!(received["data"]["receiver"]["_id"], bob.id.to_string());

    send(&mut b, bob.id, ada.id, "bye").await;
    let received = expect_event(&mut a, "message:receive").await;
    assert_eq!(received["data"]["content"], "bye");
    expect_event(&mut b, "message:sent").await;

    let Ok(()) = b.close(None).await else {
        panic!("close failed");
    };
    let offline = expect_event(&mut a, "user:offline").await;
    assert_eq!(offline["data"], bob.id.to_string());
    wait_for_online(addr, 1).await;

    let (status, body) =
        get_json(format!("http://{addr}/api/v1/messages/{}/{}", bob.id, ada.id)).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["data"][0]["content"], "hi");
    assert_eq!(body["data"][1]["content"], "bye");
}

#[tokio::test]
async fn message_to_offline_user_is_persisted_for_later() {
    let (ada, bob) = (profile("Ada"), profile("Bob"));
    let addr = spawn_server(&[ada.clone(), bob.clone()]).await;

    let mut a = connect(addr).await;
    join(&mut a, ada.id).await;
    wait_for_online(addr, 1).await;

    send(&mut a, ada.id, bob.id, "are you there?").await;
    expect_event(&mut a, "message:sent").await;

    let (_, body) = get_json(format!("http://{addr}/api/v1/messages/{}/{}", bob.id, ada.id)).await;
    assert_eq!(body["data"][0]["content"], "are you there?");
}

#[tokio::test]
async fn typing_is_relayed_to_receiver() {
    let (ada, bob) = (profile("Ada"), profile("Bob"));
    let addr = spawn_server(&[ada.clone(), bob.clone()]).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    join(&mut a, ada.id).await;
    join(&mut b, bob.id).await;
    wait_for_online(addr, 2).await;

    let typing = json!({ "senderId": ada.id, "receiverId": bob.id });
    emit(&mut a, json!({ "event": "typing:start", "data": typing })).await;
    let shown = expect_event(&mut b, "typing:show").await;
    assert_eq!(shown["data"]["userId"], ada.id.to_string());

    emit(&mut a, json!({ "event": "typing:stop", "data": typing })).await;
    let hidden = expect_event(&mut b, "typing:hide").await;
    assert_eq!(hidden["data"]["userId"], ada.id.to_string());
}

#[tokio::test]
async fn unknown_sender_gets_message_error() {
    let ada = profile("Ada");
    let addr = spawn_server(std::slice::from_ref(&ada)).await;

    let mut a = connect(addr).await;
    join(&mut a, ada.id).await;
    wait_for_online(addr, 1).await;

    send(&mut a, ada.id, UserId::new(), "hello?").await;
    let error = expect_event(&mut a, "message:error").await;
    assert_eq!(error["data"]["message"], "Failed to send message");
}

#[tokio::test]
async fn malformed_frames_get_error_frames() {
    let addr = spawn_server(&[]).await;
    let mut ws = connect(addr).await;

    let Ok(()) = ws.send(Message::text("not json")).await else {
        panic!("ws send failed");
    };
    let error = expect_event(&mut ws, "error").await;
    assert_eq!(error["data"]["code"], 400);

    emit(&mut ws, json!({ "event": "post:like", "data": {} })).await;
    let error = expect_event(&mut ws, "error").await;
    assert_eq!(error["data"]["code"], 404);

    // The connection survives bad input.
    let ada = UserId::new();
    join(&mut ws, ada).await;
    wait_for_online(addr, 1).await;
}

#[tokio::test]
async fn health_and_user_lookup() {
    let ada = profile("Ada");
    let addr = spawn_server(std::slice::from_ref(&ada)).await;

    let (status, body) = get_json(format!("http://{addr}/health")).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = get_json(format!("http://{addr}/api/v1/users/{}", ada.id)).await;
    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(body["name"], "Ada");
    assert_eq!(body["online"], false);

    let (status, _) = get_json(format!("http://{addr}/api/v1/users/{}", UserId::new())).await;
    assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
}
