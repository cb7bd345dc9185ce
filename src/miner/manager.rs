// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/manager.rs
// Version: 1.0.0
//
// This file implements the worker pool for SoloForge, located in the miner
// subdirectory. It owns the lifecycle of all workers, fans jobs out to them
// and aggregates their counters.
//
// Tree Location:
// - src/miner/manager.rs (worker pool)
// - Depends on: miner::worker, core::types

use crate::core::types::{ExtranonceInfo, Job};
use crate::miner::worker::{ShareCallback, Worker};
use log::info;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

const LOG_TARGET: &str = "soloforge::manager";

const DEFAULT_CPU_PERCENT: u32 = 80;

struct ManagerState {
    next_id: u32,
    cpu_percent: u32,
    extranonce: Option<ExtranonceInfo>,
    share_callback: Option<ShareCallback>,
}

/// Pool of mining workers.
///
/// Worker ids start at 1, grow monotonically and are never reused within a
/// process; only removal frees a worker. Enumeration takes the read side of
/// the workers lock, membership changes the write side.
pub struct WorkerManager {
    workers: RwLock<HashMap<u32, Arc<Worker>>>,
    state: Mutex<ManagerState>,
}

impl Default for WorkerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerManager {
    pub fn new() -> Self {
        WorkerManager {
            workers: RwLock::new(HashMap::new()),
            state: Mutex::new(ManagerState {
                next_id: 1,
                cpu_percent: DEFAULT_CPU_PERCENT,
                extranonce: None,
                share_callback: None,
            }),
        }
    }

    /// Set the callback attached to every current and future worker.
    pub fn set_share_callback(&self, callback: ShareCallback) {
        {
            let mut state = self.state.lock().unwrap();
            state.share_callback = Some(callback.clone());
        }
        for worker in self.workers.read().unwrap().values() {
            worker.set_share_callback(callback.clone());
        }
    }

    /// Record the session extranonce data from the Stratum subscription.
    /// Workers added afterwards start immediately.
    pub fn set_stratum_data(&self, extranonce1: &str, extranonce2_size: usize) {
        let mut state = self.state.lock().unwrap();
        state.extranonce = Some(ExtranonceInfo {
            extranonce1: extranonce1.to_string(),
            extranonce2_size,
        });
    }

    /// Create a worker and start it when stratum data is already known.
    /// An empty name gets the default "Worker A", "Worker B", ... scheme.
    pub fn add_worker(&self, name: &str) -> u32 {
        let (worker, extranonce) = {
            let mut state = self.state.lock().unwrap();
            let id = state.next_id;
            state.next_id += 1;

            let name = if name.is_empty() {
                default_worker_name(id)
            } else {
                name.to_string()
            };

            let worker = Arc::new(Worker::new(id, &name, state.cpu_percent));
            if let Some(callback) = &state.share_callback {
                worker.set_share_callback(callback.clone());
            }
            (worker, state.extranonce.clone())
        };

        let id = worker.id;
        self.workers.write().unwrap().insert(id, worker.clone());
        info!(target: LOG_TARGET, "👷 Added worker {} ({})", id, worker.name);

        if let Some(extranonce) = extranonce {
            worker.start(&extranonce.extranonce1, extranonce.extranonce2_size);
        }
        id
    }

    /// Stop and remove a worker. The id is never handed out again.
    pub fn remove_worker(&self, id: u32) -> bool {
        let removed = self.workers.write().unwrap().remove(&id);
        match removed {
            Some(worker) => {
                worker.stop();
                info!(target: LOG_TARGET, "🗑️ Removed worker {} ({})", id, worker.name);
                true
            }
            None => false,
        }
    }

    pub fn get_worker(&self, id: u32) -> Option<Arc<Worker>> {
        self.workers.read().unwrap().get(&id).cloned()
    }

    /// All workers, ordered by id.
    pub fn workers(&self) -> Vec<Arc<Worker>> {
        let mut workers: Vec<Arc<Worker>> =
            self.workers.read().unwrap().values().cloned().collect();
        workers.sort_by_key(|w| w.id);
        workers
    }

    pub fn worker_count(&self) -> usize {
        self.workers.read().unwrap().len()
    }

    /// Start every stopped worker with the current stratum data.
    pub fn start_all(&self) {
        let extranonce = self.state.lock().unwrap().extranonce.clone();
        let Some(extranonce) = extranonce else {
            return;
        };
        for worker in self.workers.read().unwrap().values() {
            if !worker.is_running() {
                worker.start(&extranonce.extranonce1, extranonce.extranonce2_size);
            }
        }
    }

    /// Cooperatively stop every worker. Ids survive for a later start_all.
    pub fn stop_all(&self) {
        for worker in self.workers.read().unwrap().values() {
            worker.stop();
        }
    }

    /// Deliver the same job snapshot to every worker. Non-blocking: each
    /// worker's mailbox drops its oldest entry rather than stalling us.
    pub fn broadcast_job(&self, job: &Job) {
        for worker in self.workers.read().unwrap().values() {
            worker.update_job(job.clone());
        }
    }

    /// Update the pool default throttle and forward it to every worker.
    pub fn set_cpu_percent(&self, percent: u32) {
        let percent = percent.clamp(1, 100);
        self.state.lock().unwrap().cpu_percent = percent;
        for worker in self.workers.read().unwrap().values() {
            worker.set_cpu_percent(percent);
        }
    }

    pub fn total_hashrate(&self) -> f64 {
        self.workers
            .read()
            .unwrap()
            .values()
            .map(|w| w.hashrate())
            .sum()
    }

    pub fn total_hash_count(&self) -> u64 {
        self.workers
            .read()
            .unwrap()
            .values()
            .map(|w| w.hash_count())
            .sum()
    }
}

fn default_worker_name(id: u32) -> String {
    if (1..=26).contains(&id) {
        format!("Worker {}", (b'A' + (id - 1) as u8) as char)
    } else {
        format!("Worker {}", id)
    }
}
