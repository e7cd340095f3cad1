// Shared server bootstrap and WebSocket client helpers for integration tests.
#![allow(dead_code)]

use arena_server::WorldSettings;
use arena_server::domain::tuning::FieldTuning;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Message, protocol::CloseFrame},
};

// Roster broadcasts fire this long after a spawn in the test server.
pub const TEST_GRACE: Duration = Duration::from_millis(50);
// Clients that never join are dropped this long after connecting.
pub const TEST_JOIN_TIMEOUT: Duration = Duration::from_millis(1000);
// Upper bound for any single expected frame.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(3);

// Global `ws://` base URL used by all tests after the server publishes its bound address.
static SERVER_URL: OnceLock<String> = OnceLock::new();
// One-time guard that ensures the server bootstrap path runs only once.
static SERVER_READY: OnceLock<()> = OnceLock::new();

/// Starts the arena server once per test binary and returns its base URL.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_addr = Arc::new(OnceLock::<String>::new());
        let published_addr_thread = Arc::clone(&published_addr);
        // The server gets its own OS thread and runtime so it outlives every
        // `#[tokio::test]` runtime in the binary.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_addr_thread.set(addr.to_string());
                arena_server::run_with_settings(
                    listener,
                    WorldSettings {
                        spawn_broadcast_grace: TEST_GRACE,
                        join_timeout: TEST_JOIN_TIMEOUT,
                        field: FieldTuning::default(),
                    },
                )
                .await
                .expect("server failed");
            });
        });
        wait_for_readiness(published_addr);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

fn wait_for_readiness(published_addr: Arc<OnceLock<String>>) {
    let addr = loop {
        if let Some(addr) = published_addr.get() {
            break addr.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = SERVER_URL.set(format!("ws://{addr}"));

    for _ in 0..100 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}

pub struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    /// Connection id announced by the server; also used as this client's tank id.
    pub connid: String,
}

impl Client {
    /// Connects to `/ws` and waits for the identity frame.
    pub async fn connect() -> Self {
        let url = format!("{}/ws", ensure_server());
        let (ws, _response) = connect_async(url).await.expect("websocket connect");
        let mut client = Self {
            ws,
            connid: String::new(),
        };
        let identity = client.next_event("identity").await;
        client.connid = identity["connid"]
            .as_str()
            .expect("identity carries connid")
            .to_string();
        client
    }

    pub async fn send(&mut self, event: &str, data: Value) {
        let frame = if data.is_null() {
            json!({ "event": event })
        } else {
            json!({ "event": event, "data": data })
        };
        self.send_raw(Message::Text(frame.to_string().into())).await;
    }

    pub async fn send_raw(&mut self, message: Message) {
        self.ws.send(message).await.expect("websocket send");
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }

    /// Sends `join` and returns the snapshot payload.
    pub async fn join(&mut self) -> Value {
        let connid = self.connid.clone();
        self.send("join", json!(connid)).await;
        self.next_event("snapshot").await
    }

    /// Spawns this client's tank at `(x, y)`, heading east.
    pub async fn spawn_tank(&mut self, x: f64, y: f64) {
        let data = json!({
            "tankid": self.connid,
            "x": x,
            "y": y,
            "heading": 0,
            "tankColor": "#3366ff",
            "playername": format!("pilot-{}", self.connid),
        });
        self.send("spawnTank", data).await;
    }

    pub async fn move_tank(&mut self, x: f64, y: f64) {
        let data = json!({
            "tankid": self.connid,
            "x": x,
            "y": y,
            "heading": 0,
            "tankColor": "#3366ff",
        });
        self.send("moveTank", data).await;
    }

    /// Payload of the next frame named `event`; other frames are skipped.
    pub async fn next_event(&mut self, event: &str) -> Value {
        self.next_matching(event, |_| true).await
    }

    /// Payload of the next frame named `event` whose payload satisfies `accept`.
    pub async fn next_matching(&mut self, event: &str, accept: impl Fn(&Value) -> bool) -> Value {
        let wanted = event.to_string();
        tokio::time::timeout(EVENT_TIMEOUT, async {
            loop {
                let frame = self.next_frame().await;
                if frame["event"] == wanted.as_str() && accept(&frame["data"]) {
                    return frame["data"].clone();
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {wanted}"))
    }

    /// Asserts no matching frame named `event` arrives within `wait`.
    pub async fn expect_silence(
        &mut self,
        event: &str,
        accept: impl Fn(&Value) -> bool,
        wait: Duration,
    ) {
        let outcome = tokio::time::timeout(wait, async {
            loop {
                let frame = self.next_frame().await;
                if frame["event"] == event && accept(&frame["data"]) {
                    return frame;
                }
            }
        })
        .await;
        if let Ok(frame) = outcome {
            panic!("unexpected {event}: {frame}");
        }
    }

    /// Reads until the server closes the socket and returns its close frame.
    pub async fn next_close(&mut self) -> Option<CloseFrame> {
        tokio::time::timeout(EVENT_TIMEOUT, async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Close(frame))) => return frame,
                    Some(Ok(_)) => continue,
                    Some(Err(_)) | None => return None,
                }
            }
        })
        .await
        .expect("timed out waiting for close")
    }

    async fn next_frame(&mut self) -> Value {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).expect("server sends valid json");
                }
                Some(Ok(Message::Close(frame))) => panic!("server closed the socket: {frame:?}"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("websocket error: {e}"),
                None => panic!("websocket stream ended"),
            }
        }
    }
}

/// True when a `[id, entity]` pair list contains `id`.
pub fn pairs_contain(pairs: &Value, id: &str) -> bool {
    pairs
        .as_array()
        .is_some_and(|pairs| pairs.iter().any(|pair| pair[0] == id))
}
