// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/ws_hub.rs
// Version: 1.0.0
//
// This file implements the WebSocket hub for the real-time mining dashboard.
// The hub fans typed event envelopes out to every connected client, replays
// recent log envelopes to new subscribers and enforces keepalive and frame
// limits per connection.
//
// Tree Location:
// - src/ws_hub.rs (WebSocket hub and per-client pumps)
// - Depends on: axum, tokio, futures-util, serde_json, chrono

use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const LOG_TARGET: &str = "soloforge::ws";

/// Per-client outbound buffer; slow clients skip messages rather than stall
/// the broadcast.
const CLIENT_BUFFER: usize = 256;

/// Log envelopes replayed to new subscribers
const LOG_HISTORY_SIZE: usize = 50;

/// Keepalive ping interval
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Clients idle longer than this are disconnected
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum size of a single client frame, in bytes
pub const MAX_CLIENT_FRAME: usize = 512;

struct HubState {
    clients: HashMap<usize, mpsc::Sender<String>>,
    log_history: VecDeque<Value>,
}

/// Fan-out hub for dashboard WebSocket clients.
pub struct WsHub {
    state: Mutex<HubState>,
    next_client_id: AtomicUsize,
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}

impl WsHub {
    pub fn new() -> Self {
        WsHub {
            state: Mutex::new(HubState {
                clients: HashMap::new(),
                log_history: VecDeque::with_capacity(LOG_HISTORY_SIZE),
            }),
            next_client_id: AtomicUsize::new(1),
        }
    }

    pub fn client_count(&self) -> usize {
        self.state.lock().unwrap().clients.len()
    }

    /// Broadcast a typed envelope `{type, data, timestamp_ms}` to every
    /// connected client. Log envelopes are additionally kept for replay.
    pub fn broadcast_event(&self, event_type: &str, data: Value) {
        let envelope = json!({
            "type": event_type,
            "data": data,
            "timestamp_ms": Utc::now().timestamp_millis(),
        });
        let message = envelope.to_string();

        let mut state = self.state.lock().unwrap();
        if event_type == "log" {
            if state.log_history.len() >= LOG_HISTORY_SIZE {
                state.log_history.pop_front();
            }
            state.log_history.push_back(envelope);
        }
        for sender in state.clients.values() {
            // Buffer full means a stalled client; it catches up on the next
            // stats tick
            let _ = sender.try_send(message.clone());
        }
    }

    /// Convenience wrapper for log lines shown in the dashboard console.
    pub fn log(&self, line: &str) {
        self.broadcast_event("log", json!({ "message": line }));
    }

    fn register(&self) -> (usize, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
        let id = self.next_client_id.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap();
        // Queue the log backlog before the client can miss anything
        for envelope in &state.log_history {
            let _ = tx.try_send(envelope.to_string());
        }
        state.clients.insert(id, tx);
        (id, rx)
    }

    fn unregister(&self, id: usize) {
        self.state.lock().unwrap().clients.remove(&id);
    }

    /// Drive one upgraded WebSocket connection until it closes or idles out.
    pub async fn handle_socket(self: Arc<Self>, socket: WebSocket) {
        let (id, mut rx) = self.register();
        info!(target: LOG_TARGET, "✅ WebSocket client {} connected ({} active)", id, self.client_count());

        let (mut sender, mut receiver) = socket.split();

        // Outbound pump: hub messages plus keepalive pings
        let write_task = tokio::spawn(async move {
            let mut ping = tokio::time::interval(PING_INTERVAL);
            ping.tick().await; // first tick fires immediately
            loop {
                tokio::select! {
                    message = rx.recv() => {
                        match message {
                            Some(message) => {
                                if sender.send(Message::Text(message.into())).await.is_err() {
                                    return;
                                }
                            }
                            None => {
                                let _ = sender.send(Message::Close(None)).await;
                                return;
                            }
                        }
                    }
                    _ = ping.tick() => {
                        if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        // Inbound pump: any frame (including pongs) counts as activity
        loop {
            match tokio::time::timeout(IDLE_TIMEOUT, receiver.next()).await {
                Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
                Ok(Some(Ok(_))) => continue,
                Ok(Some(Err(e))) => {
                    debug!(target: LOG_TARGET, "WebSocket client {} read error: {}", id, e);
                    break;
                }
                Err(_) => {
                    debug!(target: LOG_TARGET, "WebSocket client {} idle timeout", id);
                    break;
                }
            }
        }

        self.unregister(id);
        write_task.abort();
        info!(target: LOG_TARGET, "🔌 WebSocket client {} disconnected", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_history_bounded() {
        let hub = WsHub::new();
        for i in 0..80 {
            hub.log(&format!("line {}", i));
        }
        let state = hub.state.lock().unwrap();
        assert_eq!(state.log_history.len(), LOG_HISTORY_SIZE);
        assert_eq!(
            state.log_history.back().unwrap()["data"]["message"],
            "line 79"
        );
        assert_eq!(
            state.log_history.front().unwrap()["data"]["message"],
            "line 30"
        );
    }

    #[test]
    fn test_new_client_receives_backlog() {
        let hub = WsHub::new();
        hub.log("hello");
        hub.broadcast_event("stats", json!({"hashrate": 0}));

        let (id, mut rx) = hub.register();
        let first = rx.try_recv().expect("backlog should be queued");
        let envelope: Value = serde_json::from_str(&first).unwrap();
        assert_eq!(envelope["type"], "log");
        assert_eq!(envelope["data"]["message"], "hello");
        assert!(rx.try_recv().is_err(), "stats events are not replayed");
        hub.unregister(id);
        assert_eq!(hub.client_count(), 0);
    }

    #[test]
    fn test_envelope_shape() {
        let hub = WsHub::new();
        let (_id, mut rx) = hub.register();
        hub.broadcast_event("share", json!({"difficulty": 42.0}));
        let envelope: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(envelope["type"], "share");
        assert_eq!(envelope["data"]["difficulty"], 42.0);
        assert!(envelope["timestamp_ms"].is_i64());
    }
}
