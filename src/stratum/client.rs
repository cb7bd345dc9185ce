// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/stratum/client.rs
// Version: 1.0.0
//
// This file implements the Stratum V1 client for SoloForge, located in the
// stratum subdirectory. It manages the TCP connection to the pool, runs the
// line-framed read loop, drives the subscribe/authorize handshake and
// dispatches events to a single observer.
//
// Tree Location:
// - src/stratum/client.rs (Stratum V1 client)
// - Depends on: tokio, serde_json, stratum::messages, core::types

use crate::core::types::{ExtranonceInfo, Job};
use crate::error::{Error, Result};
use crate::stratum::messages::{self, Notification, Request, Response, StratumMessage};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Notify};

const LOG_TARGET: &str = "soloforge::stratum";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// mining.subscribe is always request id 1
pub const SUBSCRIBE_ID: u64 = 1;
/// mining.authorize is always request id 2
pub const AUTHORIZE_ID: u64 = 2;

/// Phases of a pool connection. `Subscribed` and `Authorized` are monotonic
/// within a connection; any transport failure returns to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Subscribed,
    Authorized,
}

/// Observer for pool events. All methods default to no-ops so an implementor
/// binds only what it needs; the coordinator is the single observer in the
/// running miner.
pub trait StratumObserver: Send + Sync {
    fn on_connected(&self) {}
    fn on_disconnected(&self, _cause: &Error) {}
    fn on_subscribed(&self, _extranonce1: &str, _extranonce2_size: usize) {}
    fn on_authorized(&self, _authorized: bool) {}
    fn on_job(&self, _job: &Job) {}
    fn on_submit_result(&self, _id: u64, _accepted: bool) {}
}

struct ClientInner {
    extranonce: ExtranonceInfo,
    subscribed: bool,
    authorized: bool,
    current_job: Option<Job>,
    running: bool,
}

/// Stratum V1 client for a single pool connection.
///
/// Each protocol message is one line of UTF-8 JSON terminated by `\n`. The
/// read loop runs as a background task and survives until the pool closes
/// the socket, a read fails, or `close` is called.
pub struct StratumClient {
    pool_url: String,
    pool_port: u16,
    inner: Mutex<ClientInner>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    observer: RwLock<Option<Arc<dyn StratumObserver>>>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    next_request_id: AtomicU64,
    shutdown: Mutex<Arc<Notify>>,
}

impl StratumClient {
    pub fn new(pool_url: &str, pool_port: u16) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        StratumClient {
            pool_url: pool_url.to_string(),
            pool_port,
            inner: Mutex::new(ClientInner {
                extranonce: ExtranonceInfo::default(),
                subscribed: false,
                authorized: false,
                current_job: None,
                running: false,
            }),
            writer: tokio::sync::Mutex::new(None),
            observer: RwLock::new(None),
            state_tx,
            state_rx,
            next_request_id: AtomicU64::new(AUTHORIZE_ID),
            shutdown: Mutex::new(Arc::new(Notify::new())),
        }
    }

    /// Install the single event observer. Must be called before `connect`.
    pub fn set_observer(&self, observer: Arc<dyn StratumObserver>) {
        *self.observer.write().unwrap() = Some(observer);
    }

    fn observer(&self) -> Option<Arc<dyn StratumObserver>> {
        self.observer.read().unwrap().clone()
    }

    /// Establish the TCP connection and launch the read loop.
    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        {
            let inner = self.inner.lock().unwrap();
            if inner.running {
                return Ok(());
            }
        }

        let addr = format!("{}:{}", self.pool_url, self.pool_port);
        self.state_tx.send_replace(ConnectionState::Connecting);
        info!(target: LOG_TARGET, "🔗 Connecting to pool {}", addr);

        let stream = match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return Err(Error::Transport(format!(
                    "failed to connect to pool {}: {}",
                    addr, e
                )));
            }
            Err(_) => {
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return Err(Error::Transport(format!(
                    "connection to pool {} timed out",
                    addr
                )));
            }
        };
        stream.set_nodelay(true)?; // Disable Nagle's algorithm for low latency

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(write_half);

        let shutdown = Arc::new(Notify::new());
        {
            let mut inner = self.inner.lock().unwrap();
            inner.running = true;
            inner.subscribed = false;
            inner.authorized = false;
            inner.extranonce = ExtranonceInfo::default();
            *self.shutdown.lock().unwrap() = shutdown.clone();
        }
        self.next_request_id.store(AUTHORIZE_ID, Ordering::SeqCst);
        self.state_tx.send_replace(ConnectionState::Connected);

        let client = Arc::clone(self);
        tokio::spawn(async move {
            client.read_loop(read_half, shutdown).await;
        });

        info!(target: LOG_TARGET, "✅ Connected to pool {}", addr);
        if let Some(observer) = self.observer() {
            observer.on_connected();
        }
        Ok(())
    }

    /// Send mining.subscribe (always id 1).
    pub async fn subscribe(&self) -> Result<()> {
        self.send(&Request::subscribe(SUBSCRIBE_ID)).await
    }

    /// Send mining.authorize (always id 2). An empty password becomes "x".
    pub async fn authorize(&self, user: &str, password: &str) -> Result<()> {
        self.send(&Request::authorize(AUTHORIZE_ID, user, password))
            .await
    }

    /// Submit a share. Returns the request id used; the pool's verdict
    /// arrives asynchronously via `on_submit_result`.
    pub async fn submit(
        &self,
        user: &str,
        job_id: &str,
        extranonce2: &str,
        ntime: &str,
        nonce: &str,
    ) -> Result<u64> {
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.send(&Request::submit(id, user, job_id, extranonce2, ntime, nonce))
            .await?;
        Ok(id)
    }

    /// Shut down the read loop and close the socket. Idempotent.
    pub async fn close(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.running {
                return Ok(());
            }
            inner.running = false;
            inner.subscribed = false;
            inner.authorized = false;
        }
        self.shutdown.lock().unwrap().notify_one();
        *self.writer.lock().await = None;
        self.state_tx.send_replace(ConnectionState::Disconnected);
        info!(target: LOG_TARGET, "🔌 Pool connection closed");
        Ok(())
    }

    pub fn extranonce1(&self) -> String {
        self.inner.lock().unwrap().extranonce.extranonce1.clone()
    }

    pub fn extranonce2_size(&self) -> usize {
        self.inner.lock().unwrap().extranonce.extranonce2_size
    }

    pub fn current_job(&self) -> Option<Job> {
        self.inner.lock().unwrap().current_job.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().running
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.lock().unwrap().subscribed
    }

    pub fn is_authorized(&self) -> bool {
        self.inner.lock().unwrap().authorized
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Wait until the connection reaches at least `target`, bounded by
    /// `timeout`. Returns whether the state was reached.
    pub async fn wait_for_state(&self, target: ConnectionState, timeout: Duration) -> bool {
        let mut rx = self.state_rx.clone();
        if *rx.borrow() >= target {
            return true;
        }
        tokio::time::timeout(timeout, async {
            while rx.changed().await.is_ok() {
                if *rx.borrow() >= target {
                    return true;
                }
            }
            false
        })
        .await
        .unwrap_or(false)
    }

    async fn send(&self, req: &Request) -> Result<()> {
        let mut data = serde_json::to_string(req)?;
        data.push('\n');
        debug!(target: LOG_TARGET, "📤 TX: {}", data.trim_end());

        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(writer) => {
                writer
                    .write_all(data.as_bytes())
                    .await
                    .map_err(|e| Error::Transport(format!("pool write failed: {}", e)))?;
                Ok(())
            }
            None => Err(Error::Internal("not connected".to_string())),
        }
    }

    async fn read_loop(self: Arc<Self>, read_half: OwnedReadHalf, shutdown: Arc<Notify>) {
        // Lines carry full merkle branch arrays; read_line is unbounded, so
        // arbitrarily long frames are fine.
        let mut lines = BufReader::new(read_half).lines();
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!(target: LOG_TARGET, "Read loop shut down");
                    return;
                }
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            debug!(target: LOG_TARGET, "📥 RX: {}", line.trim_end());
                            self.handle_line(&line);
                        }
                        Ok(None) => {
                            self.handle_disconnect(Error::Transport(
                                "connection closed by pool".to_string(),
                            ))
                            .await;
                            return;
                        }
                        Err(e) => {
                            self.handle_disconnect(Error::Transport(format!(
                                "pool read failed: {}",
                                e
                            )))
                            .await;
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle_disconnect(&self, cause: Error) {
        {
            let mut inner = self.inner.lock().unwrap();
            if !inner.running {
                // close() already tore the connection down
                return;
            }
            inner.running = false;
            inner.subscribed = false;
            inner.authorized = false;
        }
        *self.writer.lock().await = None;
        self.state_tx.send_replace(ConnectionState::Disconnected);
        warn!(target: LOG_TARGET, "🔌 Disconnected from pool: {}", cause);
        if let Some(observer) = self.observer() {
            observer.on_disconnected(&cause);
        }
    }

    fn handle_line(&self, line: &str) {
        match messages::parse_message(line) {
            Some(StratumMessage::Response(resp)) => self.handle_response(resp),
            Some(StratumMessage::Notification(notif)) => self.handle_notification(notif),
            None => {
                warn!(target: LOG_TARGET, "Dropping unparseable pool message: {}", line.trim_end());
            }
        }
    }

    fn handle_response(&self, resp: Response) {
        match resp.id {
            SUBSCRIBE_ID => {
                if resp.is_error() {
                    // Stay CONNECTED; the operator can retry
                    warn!(target: LOG_TARGET, "❌ Subscribe rejected: {}", resp.error);
                    return;
                }
                let Some((extranonce1, extranonce2_size)) =
                    messages::parse_subscribe_result(&resp.result)
                else {
                    warn!(target: LOG_TARGET, "Malformed subscribe result: {}", resp.result);
                    return;
                };
                {
                    let mut inner = self.inner.lock().unwrap();
                    inner.extranonce = ExtranonceInfo {
                        extranonce1: extranonce1.clone(),
                        extranonce2_size,
                    };
                    inner.subscribed = true;
                }
                self.state_tx.send_replace(ConnectionState::Subscribed);
                info!(target: LOG_TARGET,
                    "📡 Subscribed: extranonce1={}, extranonce2_size={}",
                    extranonce1, extranonce2_size
                );
                if let Some(observer) = self.observer() {
                    observer.on_subscribed(&extranonce1, extranonce2_size);
                }
            }
            AUTHORIZE_ID => {
                if resp.is_error() {
                    warn!(target: LOG_TARGET, "❌ Authorize rejected: {}", resp.error);
                    return;
                }
                let Some(authorized) = resp.result.as_bool() else {
                    warn!(target: LOG_TARGET, "Malformed authorize result: {}", resp.result);
                    return;
                };
                {
                    let mut inner = self.inner.lock().unwrap();
                    inner.authorized = authorized;
                }
                if authorized {
                    self.state_tx.send_replace(ConnectionState::Authorized);
                    info!(target: LOG_TARGET, "🔐 Authorized with pool");
                } else {
                    warn!(target: LOG_TARGET, "❌ Authorization refused by pool");
                }
                if let Some(observer) = self.observer() {
                    observer.on_authorized(authorized);
                }
            }
            id => {
                // Submit acknowledgement; a null result counts as accepted
                let accepted = if resp.is_error() {
                    false
                } else if let Some(ok) = resp.result.as_bool() {
                    ok
                } else {
                    resp.result.is_null()
                };
                debug!(target: LOG_TARGET, "Submit response for id {}: accepted={}", id, accepted);
                if let Some(observer) = self.observer() {
                    observer.on_submit_result(id, accepted);
                }
            }
        }
    }

    fn handle_notification(&self, notif: Notification) {
        match notif.method.as_str() {
            "mining.notify" => {
                let Some(job) = messages::parse_notify_params(&notif.params) else {
                    // Short or malformed params are dropped silently
                    debug!(target: LOG_TARGET, "Dropping malformed mining.notify");
                    return;
                };
                {
                    let mut inner = self.inner.lock().unwrap();
                    inner.current_job = Some(job.clone());
                }
                info!(target: LOG_TARGET,
                    "📋 New job {} (clean_jobs={})",
                    job.job_id, job.clean_jobs
                );
                if let Some(observer) = self.observer() {
                    observer.on_job(&job);
                }
            }
            "mining.set_difficulty" => {
                // Acknowledged only: submission uses the job's nbits target
                debug!(target: LOG_TARGET, "Pool difficulty update acknowledged");
            }
            other => {
                debug!(target: LOG_TARGET, "Ignoring unknown notification {:?}", other);
            }
        }
    }
}
