// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/coordinator.rs
// Version: 1.0.0
//
// This file implements the mining coordinator for SoloForge. It wires the
// Stratum client to the worker pool and statistics collector: new jobs fan
// out to the workers, found shares flow back to the pool, and start/stop
// drive the whole engine.
//
// Tree Location:
// - src/coordinator.rs (engine wiring and lifecycle)
// - Depends on: stratum, miner, stats, config, ws_hub, tokio

use crate::config::ConfigHandle;
use crate::core::coinbase::parse_coinbase_height;
use crate::core::types::{Job, Share};
use crate::error::{Error, Result};
use crate::miner::WorkerManager;
use crate::stats::Collector;
use crate::stratum::{ConnectionState, StratumClient, StratumObserver};
use crate::ws_hub::WsHub;
use log::{error, info, warn};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const LOG_TARGET: &str = "soloforge::coordinator";

/// Bound on each handshake wait during start_mining
const HANDSHAKE_WAIT: Duration = Duration::from_secs(1);

/// Glues the Stratum client, worker pool and statistics together.
///
/// The coordinator is the single observer of the Stratum client and the sole
/// consumer of worker share events. Workers emit shares from their hashing
/// threads into a channel; an async task forwards each one to the pool while
/// authorized.
pub struct Coordinator {
    config: ConfigHandle,
    stratum: Arc<StratumClient>,
    pool: Arc<WorkerManager>,
    stats: Arc<Collector>,
    hub: Arc<WsHub>,
    // Outstanding submits by request id, for resolving pool verdicts
    pending_submits: Mutex<HashMap<u64, (String, String)>>,
    last_prev_hash: Mutex<Option<String>>,
}

impl Coordinator {
    /// Build the coordinator and wire it into the client and pool. Spawns
    /// the share-forwarding task, so a tokio runtime must be active.
    pub fn new(
        config: ConfigHandle,
        stratum: Arc<StratumClient>,
        pool: Arc<WorkerManager>,
        stats: Arc<Collector>,
        hub: Arc<WsHub>,
    ) -> Arc<Self> {
        let coordinator = Arc::new(Coordinator {
            config,
            stratum: stratum.clone(),
            pool: pool.clone(),
            stats,
            hub,
            pending_submits: Mutex::new(HashMap::new()),
            last_prev_hash: Mutex::new(None),
        });

        stratum.set_observer(coordinator.clone());

        let (share_tx, mut share_rx) = mpsc::unbounded_channel::<Share>();
        pool.set_share_callback(Arc::new(move |share| {
            // Called from a hashing thread; hand off to the async side
            let _ = share_tx.send(share);
        }));

        let forwarder = coordinator.clone();
        tokio::spawn(async move {
            while let Some(share) = share_rx.recv().await {
                forwarder.process_share(share).await;
            }
        });

        coordinator
    }

    /// Connect, handshake and start the worker fleet. Each handshake step
    /// waits on the client's state channel instead of sleeping; any failing
    /// step short-circuits.
    pub async fn start_mining(&self) -> Result<()> {
        if !self.stratum.is_connected() {
            self.stratum.connect().await?;
            self.stratum.subscribe().await?;
            if !self
                .stratum
                .wait_for_state(ConnectionState::Subscribed, HANDSHAKE_WAIT)
                .await
            {
                return Err(Error::Protocol(
                    "no subscribe response from pool".to_string(),
                ));
            }

            let wallet = self.config.wallet_address();
            if wallet.is_empty() {
                return Err(Error::Config("no wallet address configured".to_string()));
            }
            self.stratum.authorize(&wallet, "x").await?;
            if !self
                .stratum
                .wait_for_state(ConnectionState::Authorized, HANDSHAKE_WAIT)
                .await
            {
                return Err(Error::Protocol(
                    "pool did not authorize the wallet".to_string(),
                ));
            }
        }

        self.pool.set_stratum_data(
            &self.stratum.extranonce1(),
            self.stratum.extranonce2_size(),
        );
        self.pool.set_cpu_percent(self.config.max_cpu_percent());

        if self.pool.worker_count() == 0 {
            // Zero means one worker per CPU core
            let num_workers = match self.config.num_workers() {
                0 => num_cpus::get(),
                n => n,
            };
            for _ in 0..num_workers {
                self.pool.add_worker("");
            }
        }
        self.pool.start_all();

        if let Some(job) = self.stratum.current_job() {
            self.pool.broadcast_job(&job);
        }

        self.stats.begin_session();
        info!(target: LOG_TARGET, "⛏️ Mining started with {} workers", self.pool.worker_count());
        self.hub.log("Mining started");
        Ok(())
    }

    /// Stop the workers, close the pool connection and end the session.
    pub async fn stop_mining(&self) {
        self.pool.stop_all();
        if let Err(e) = self.stratum.close().await {
            warn!(target: LOG_TARGET, "Error closing pool connection: {}", e);
        }
        self.stats.end_session();
        if let Err(e) = self.stats.save() {
            warn!(target: LOG_TARGET, "Failed to save statistics: {}", e);
        }
        info!(target: LOG_TARGET, "🛑 Mining stopped");
        self.hub.log("Mining stopped");
    }

    async fn process_share(&self, share: Share) {
        // Recorded as accepted at emission; an explicit pool rejection flips
        // the entry later via on_submit_result.
        self.stats.add_share(
            share.worker_id,
            &share.worker_name,
            &share.job_id,
            &share.nonce,
            share.difficulty,
            true,
        );
        self.hub.broadcast_event(
            "share",
            serde_json::to_value(&share).unwrap_or_else(|_| json!({})),
        );
        self.hub.log(&format!(
            "Share found by {} (difficulty {})",
            share.worker_name, share.difficulty
        ));

        if !self.stratum.is_authorized() {
            error!(target: LOG_TARGET,
                "Share from worker {} dropped: not authorized with pool",
                share.worker_id
            );
            return;
        }

        let wallet = self.config.wallet_address();
        match self
            .stratum
            .submit(
                &wallet,
                &share.job_id,
                &share.extranonce2,
                &share.ntime,
                &share.nonce,
            )
            .await
        {
            Ok(id) => {
                self.pending_submits
                    .lock()
                    .unwrap()
                    .insert(id, (share.job_id.clone(), share.nonce.clone()));
                info!(target: LOG_TARGET,
                    "📤 Submitted share: job={} nonce={} difficulty={}",
                    share.job_id, share.nonce, share.difficulty
                );
            }
            Err(e) => {
                error!(target: LOG_TARGET, "Failed to submit share: {}", e);
            }
        }
    }
}

impl StratumObserver for Coordinator {
    fn on_connected(&self) {
        self.hub.log("Connected to pool");
    }

    fn on_disconnected(&self, cause: &Error) {
        self.hub.log(&format!("Disconnected from pool: {}", cause));
    }

    fn on_subscribed(&self, extranonce1: &str, extranonce2_size: usize) {
        self.pool.set_stratum_data(extranonce1, extranonce2_size);
        self.hub.log("Subscribed to pool work notifications");
    }

    fn on_authorized(&self, authorized: bool) {
        if authorized {
            self.hub.log("Authorized with pool");
        } else {
            self.hub.log("Pool refused authorization");
        }
    }

    fn on_job(&self, job: &Job) {
        // A changed prev_hash means the network found a block
        let mut last = self.last_prev_hash.lock().unwrap();
        let tip_changed = last.as_deref() != Some(job.prev_hash.as_str());
        if tip_changed {
            if last.is_some() {
                let height = parse_coinbase_height(&job.coinbase1).unwrap_or(0);
                self.stats.add_block(height, &job.prev_hash);
                self.hub.broadcast_event(
                    "block",
                    json!({ "height": height, "prev_hash": job.prev_hash }),
                );
            }
            *last = Some(job.prev_hash.clone());
        }
        drop(last);

        self.pool.broadcast_job(job);
        self.hub.broadcast_event(
            "job",
            json!({ "job_id": job.job_id, "clean_jobs": job.clean_jobs }),
        );
        self.hub.log(&format!("New job {} from pool", job.job_id));
    }

    fn on_submit_result(&self, id: u64, accepted: bool) {
        let pending = self.pending_submits.lock().unwrap().remove(&id);
        let Some((job_id, nonce)) = pending else {
            return;
        };
        if accepted {
            info!(target: LOG_TARGET, "✅ Share accepted by pool (job={})", job_id);
            self.hub.log("Share accepted by pool");
        } else {
            warn!(target: LOG_TARGET, "❌ Share rejected by pool (job={})", job_id);
            self.stats.mark_share_rejected(&job_id, &nonce);
            self.hub.log("Share rejected by pool");
        }
    }
}
