//! Scripted stand-in for the backend, driven over an in-memory stream

use ncplay::ipc::IpcClient;
use ncplay_common::{Album, Artist, Track};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// What the fake sends back for one command: `None` means no reply at all
pub type Reply = Option<Result<Value, String>>;

enum Outbound {
    Line(String),
    HangUp,
}

pub struct FakeBackend {
    requests: Arc<Mutex<Vec<Value>>>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl FakeBackend {
    /// Client connected to a fake answering each command via `responder`
    pub fn start<F>(timeout: Duration, responder: F) -> (IpcClient, FakeBackend)
    where
        F: FnMut(&[Value]) -> Reply + Send + 'static,
    {
        let (client_side, backend_side) = tokio::io::duplex(64 * 1024);
        let client = IpcClient::from_stream(client_side, timeout);

        let (read_half, mut write_half) = tokio::io::split(backend_side);
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                match message {
                    Outbound::Line(text) => {
                        if write_half.write_all(text.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                    Outbound::HangUp => {
                        let _ = write_half.shutdown().await;
                        break;
                    }
                }
            }
        });

        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let replies = outbound.clone();
        tokio::spawn(async move {
            let mut responder = responder;
            let mut reader = BufReader::new(read_half);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                let Ok(request) = serde_json::from_str::<Value>(&line) else {
                    continue;
                };
                recorded.lock().unwrap().push(request.clone());

                let id = request["request_id"].clone();
                let command = request["command"].as_array().cloned().unwrap_or_default();
                let reply = match responder(&command) {
                    Some(Ok(data)) => json!({ "request_id": id, "error": "success", "data": data }),
                    Some(Err(message)) => json!({ "request_id": id, "error": message }),
                    None => continue,
                };
                if replies.send(Outbound::Line(format!("{}\n", reply))).is_err() {
                    break;
                }
            }
        });

        (client, FakeBackend { requests, outbound })
    }

    /// Write raw bytes to the client
    pub fn push(&self, text: &str) {
        let _ = self.outbound.send(Outbound::Line(text.to_string()));
    }

    /// Emit an event line
    pub fn emit(&self, event: Value) {
        self.push(&format!("{}\n", event));
    }

    /// Close the backend's side of the connection
    pub fn hang_up(&self) {
        let _ = self.outbound.send(Outbound::HangUp);
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    /// Commands (the `command` arrays) received so far
    pub fn commands(&self) -> Vec<Value> {
        self.requests().into_iter().map(|r| r["command"].clone()).collect()
    }

    /// Wait until at least `count` requests arrived
    pub async fn wait_for_requests(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.requests.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("backend did not receive the expected requests");
    }
}

/// Minimal mpv-like property store: answers get/set_property and acks
/// everything else
pub fn property_backend(initial: &[(&str, Value)]) -> impl FnMut(&[Value]) -> Reply + Send + 'static {
    let mut props: HashMap<String, Value> = initial.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
    move |command| {
        let name = command.first().and_then(Value::as_str).unwrap_or_default();
        let property = command.get(1).and_then(Value::as_str).unwrap_or_default().to_string();
        match name {
            "get_property" => Some(props.get(&property).cloned().ok_or_else(|| "property unavailable".to_string())),
            "set_property" => {
                props.insert(property, command.get(2).cloned().unwrap_or(Value::Null));
                Some(Ok(Value::Null))
            }
            _ => Some(Ok(Value::Null)),
        }
    }
}

pub fn track(location: &str, name: &str) -> Track {
    Track {
        id: location.to_string(),
        name: name.to_string(),
        artists: vec![Artist {
            id: "ar1".to_string(),
            name: "Artist".to_string(),
        }],
        album: Album::default(),
        duration: 200_000,
        uri: location.to_string(),
    }
}
