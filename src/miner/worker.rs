// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/worker.rs
// Version: 1.0.0
//
// This file contains the implementation of a single mining worker for
// SoloForge, located in the miner subdirectory. Each worker owns one hashing
// thread that searches random nonces over the current job snapshot, counts
// hashes and emits shares when a candidate meets the network target.
//
// Tree Location:
// - src/miner/worker.rs (single worker hashing loop)
// - Depends on: core, rand, hex

use crate::core::difficulty::{decode_compact_target, hash_difficulty, hash_meets_target};
use crate::core::header::build_header;
use crate::core::sha256::sha256d;
use crate::core::types::{Job, Share};
use log::{debug, info, warn};
use rand::{Rng, RngCore};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

const LOG_TARGET: &str = "soloforge::worker";

/// Nonce attempts per batch; stop/throttle/job changes are observed at batch
/// boundaries.
const BATCH_SIZE: usize = 1000;

/// Job mailbox depth; the oldest queued job is dropped when full
const JOB_MAILBOX_DEPTH: usize = 10;

/// Sleep while no job is available
const IDLE_SLEEP: Duration = Duration::from_millis(100);

/// Callback invoked from the mining thread when a share is found.
pub type ShareCallback = Arc<dyn Fn(Share) + Send + Sync>;

struct WorkerState {
    start_time: Instant,
    extranonce1: String,
    extranonce2: String,
    job: Option<Job>,
}

/// A single mining worker backed by one hashing thread.
///
/// The id is stable for the process lifetime and never reused. All hot-path
/// state is atomic; the job snapshot and extranonce pair live behind a lock
/// taken once per batch.
pub struct Worker {
    pub id: u32,
    pub name: String,
    running: AtomicBool,
    generation: AtomicU64,
    hash_count: AtomicU64,
    cpu_percent: AtomicU32,
    state: Mutex<WorkerState>,
    mailbox: Mutex<VecDeque<Job>>,
    share_callback: RwLock<Option<ShareCallback>>,
}

impl Worker {
    pub fn new(id: u32, name: &str, cpu_percent: u32) -> Self {
        Worker {
            id,
            name: name.to_string(),
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            hash_count: AtomicU64::new(0),
            cpu_percent: AtomicU32::new(cpu_percent.clamp(1, 100)),
            state: Mutex::new(WorkerState {
                start_time: Instant::now(),
                extranonce1: String::new(),
                extranonce2: String::new(),
                job: None,
            }),
            mailbox: Mutex::new(VecDeque::with_capacity(JOB_MAILBOX_DEPTH)),
            share_callback: RwLock::new(None),
        }
    }

    /// Set the callback invoked on every found share.
    pub fn set_share_callback(&self, callback: ShareCallback) {
        *self.share_callback.write().unwrap() = Some(callback);
    }

    /// Begin mining with the session's extranonce data. Idempotent while
    /// already running. A fresh random extranonce2 is allocated on start and
    /// regenerated on every job change.
    pub fn start(self: &Arc<Self>, extranonce1: &str, extranonce2_size: usize) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        // A superseded thread from an earlier start exits when it sees the
        // generation move on.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.lock().unwrap();
            state.start_time = Instant::now();
            state.extranonce1 = extranonce1.to_string();
            state.extranonce2 = generate_extranonce2(extranonce2_size);
        }

        let worker = Arc::clone(self);
        std::thread::spawn(move || {
            debug!(target: LOG_TARGET, "Worker {} ({}) mining thread started", worker.id, worker.name);
            worker.mine_loop(generation);
            debug!(target: LOG_TARGET, "Worker {} mining thread stopped", worker.id);
        });
    }

    /// Request cooperative shutdown; the thread finishes at most one more
    /// batch. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Deliver a new job. Lossy-latest: when the mailbox is full the oldest
    /// queued job is dropped so the newest is always accepted without
    /// blocking the producer.
    pub fn update_job(&self, job: Job) {
        let mut mailbox = self.mailbox.lock().unwrap();
        if mailbox.len() >= JOB_MAILBOX_DEPTH {
            mailbox.pop_front();
        }
        mailbox.push_back(job);
    }

    /// Update the CPU throttle percentage, clamped to [1, 100].
    pub fn set_cpu_percent(&self, percent: u32) {
        self.cpu_percent
            .store(percent.clamp(1, 100), Ordering::Relaxed);
    }

    /// Hashes per second since the last start. Zero before any time elapsed.
    pub fn hashrate(&self) -> f64 {
        let elapsed = self.state.lock().unwrap().start_time.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.hash_count.load(Ordering::Relaxed) as f64 / elapsed
    }

    /// Total hashes computed; monotonically increasing.
    pub fn hash_count(&self) -> u64 {
        self.hash_count.load(Ordering::Relaxed)
    }

    fn mine_loop(self: &Arc<Self>, generation: u64) {
        let mut rng = rand::thread_rng();

        while self.running.load(Ordering::SeqCst)
            && self.generation.load(Ordering::SeqCst) == generation
        {
            // Drain the mailbox first; every job change regenerates
            // extranonce2 so distinct (worker, job) pairs get distinct
            // coinbases.
            let next_job = self.mailbox.lock().unwrap().pop_front();
            if let Some(job) = next_job {
                let mut state = self.state.lock().unwrap();
                let size = state.extranonce2.len() / 2;
                state.extranonce2 = generate_extranonce2(size);
                state.job = Some(job);
                continue;
            }

            let (job, extranonce1, extranonce2) = {
                let state = self.state.lock().unwrap();
                (
                    state.job.clone(),
                    state.extranonce1.clone(),
                    state.extranonce2.clone(),
                )
            };

            let Some(job) = job else {
                std::thread::sleep(IDLE_SLEEP);
                continue;
            };

            if let Some(share) = self.mine_batch(&job, &extranonce1, &extranonce2, &mut rng) {
                info!(target: LOG_TARGET,
                    "💎 Worker {} found share! job={} nonce={} difficulty={}",
                    self.id, share.job_id, share.nonce, share.difficulty
                );
                let callback = self.share_callback.read().unwrap().clone();
                if let Some(callback) = callback {
                    callback(share);
                }
            }

            // Coarse throttle, not a CPU quota
            let cpu_percent = self.cpu_percent.load(Ordering::Relaxed);
            if cpu_percent < 100 {
                std::thread::sleep(Duration::from_micros(((100 - cpu_percent) * 10) as u64));
            }
        }
    }

    fn mine_batch(
        &self,
        job: &Job,
        extranonce1: &str,
        extranonce2: &str,
        rng: &mut impl Rng,
    ) -> Option<Share> {
        let mut header = match build_header(job, extranonce1, extranonce2) {
            Ok(header) => header,
            Err(e) => {
                // Workers never fail upward; log and wait for a usable job
                warn!(target: LOG_TARGET, "Worker {}: unusable job {}: {}", self.id, job.job_id, e);
                std::thread::sleep(IDLE_SLEEP);
                return None;
            }
        };
        let target = decode_compact_target(&job.nbits);

        let mut best_difficulty = 0.0f64;
        let mut best_nonce = 0u32;

        for _ in 0..BATCH_SIZE {
            let nonce = rng.gen::<u32>();
            header.set_nonce(nonce);
            let hash = sha256d(header.as_bytes());
            self.hash_count.fetch_add(1, Ordering::Relaxed);

            let difficulty = hash_difficulty(&hash);
            if difficulty > best_difficulty {
                best_difficulty = difficulty;
                best_nonce = nonce;
            }

            if hash_meets_target(&hash, target) {
                return Some(Share {
                    worker_id: self.id,
                    worker_name: self.name.clone(),
                    job_id: job.job_id.clone(),
                    extranonce2: extranonce2.to_string(),
                    ntime: job.ntime.clone(),
                    nonce: format!("{:08x}", nonce),
                    difficulty,
                });
            }
        }

        debug!(target: LOG_TARGET,
            "Worker {}: batch best difficulty {} at nonce {:08x}",
            self.id, best_difficulty, best_nonce
        );
        None
    }
}

/// Generate a random extranonce2 of the given byte size, hex-encoded.
pub fn generate_extranonce2(size: usize) -> String {
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
