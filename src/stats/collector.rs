// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/stats/collector.rs
// Version: 1.0.0
//
// This file implements the statistics collector for SoloForge, located in
// the stats subdirectory. It tracks counters, bounded share/block/session
// histories and accumulated mining time, and persists everything to a JSON
// snapshot that survives restarts.
//
// Tree Location:
// - src/stats/collector.rs (counters, histories, persistence)
// - Depends on: serde, serde_json, chrono

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

const LOG_TARGET: &str = "soloforge::stats";

const DEFAULT_HISTORY_SIZE: usize = 1000;
const SESSION_HISTORY_SIZE: usize = 50;
const STATS_FILE: &str = "stats.json";

/// A found share in history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareEntry {
    pub timestamp: DateTime<Utc>,
    pub worker_id: u32,
    pub worker_name: String,
    pub job_id: String,
    pub nonce: String,
    pub difficulty: f64,
    pub accepted: bool,
}

/// A block-detection event (the network moved to a new tip).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockEntry {
    pub timestamp: DateTime<Utc>,
    pub height: u64,
    pub prev_hash: String,
}

/// One completed mining session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub total_hashes: u64,
    pub best_difficulty: f64,
}

/// The document persisted to stats.json.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PersistedStats {
    total_hashes: u64,
    total_shares: u64,
    accepted_shares: u64,
    rejected_shares: u64,
    best_difficulty: f64,
    total_mining_seconds: f64,
    share_history: Vec<ShareEntry>,
    block_history: Vec<BlockEntry>,
    session_history: Vec<SessionRecord>,
    last_saved: Option<DateTime<Utc>>,
}

/// Counter snapshot served to the REST and WebSocket layers.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_hashes: u64,
    pub total_shares: u64,
    pub accepted_shares: u64,
    pub rejected_shares: u64,
    pub best_difficulty: f64,
    pub uptime_seconds: f64,
    pub session_uptime: f64,
}

struct CollectorInner {
    total_hashes: u64,
    total_shares: u64,
    accepted_shares: u64,
    rejected_shares: u64,
    best_difficulty: f64,

    // Session tracking
    session_started_at: DateTime<Utc>,
    session_start: Instant,
    start_hashes: u64,
    last_pool_count: u64,
    previous_mining_seconds: f64,

    share_history: VecDeque<ShareEntry>,
    block_history: VecDeque<BlockEntry>,
    session_history: VecDeque<SessionRecord>,
}

/// Thread-safe statistics collector with JSON persistence.
pub struct Collector {
    inner: Mutex<CollectorInner>,
    data_path: PathBuf,
    max_history: usize,
    // Cleared when the on-disk snapshot is unreadable, so a later save does
    // not clobber data the operator may want to inspect.
    persist_ok: AtomicBool,
}

impl Collector {
    /// Create a collector persisting to `<data_dir>/stats.json`, restoring
    /// any previous snapshot. Missing files start fresh; a malformed file
    /// disables persistence for this process.
    pub fn new(data_dir: &Path, max_history: usize) -> Self {
        let max_history = if max_history == 0 {
            DEFAULT_HISTORY_SIZE
        } else {
            max_history
        };

        let collector = Collector {
            inner: Mutex::new(CollectorInner {
                total_hashes: 0,
                total_shares: 0,
                accepted_shares: 0,
                rejected_shares: 0,
                best_difficulty: 0.0,
                session_started_at: Utc::now(),
                session_start: Instant::now(),
                start_hashes: 0,
                last_pool_count: 0,
                previous_mining_seconds: 0.0,
                share_history: VecDeque::new(),
                block_history: VecDeque::new(),
                session_history: VecDeque::new(),
            }),
            data_path: data_dir.join(STATS_FILE),
            max_history,
            persist_ok: AtomicBool::new(true),
        };

        match collector.load() {
            Ok(true) => {
                info!(target: LOG_TARGET, "📂 Restored statistics from {:?}", collector.data_path)
            }
            Ok(false) => {}
            Err(e) => {
                warn!(target: LOG_TARGET,
                    "❌ Could not restore statistics from {:?}: {} (persistence disabled)",
                    collector.data_path, e
                );
                collector.persist_ok.store(false, Ordering::SeqCst);
            }
        }
        collector
    }

    fn load(&self) -> crate::Result<bool> {
        let data = match std::fs::read(&self.data_path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let persisted: PersistedStats = serde_json::from_slice(&data)
            .map_err(|e| crate::Error::Internal(format!("malformed stats file: {}", e)))?;

        let mut inner = self.inner.lock().unwrap();
        inner.total_hashes = persisted.total_hashes;
        inner.total_shares = persisted.total_shares;
        inner.accepted_shares = persisted.accepted_shares;
        inner.rejected_shares = persisted.rejected_shares;
        inner.best_difficulty = persisted.best_difficulty;
        inner.previous_mining_seconds = persisted.total_mining_seconds;
        inner.start_hashes = persisted.total_hashes;
        inner.share_history = persisted.share_history.into();
        inner.block_history = persisted.block_history.into();
        inner.session_history = persisted.session_history.into();
        Ok(true)
    }

    /// Persist the current snapshot. A no-op when a malformed file disabled
    /// persistence.
    pub fn save(&self) -> crate::Result<()> {
        if !self.persist_ok.load(Ordering::SeqCst) {
            return Ok(());
        }

        let data = {
            let inner = self.inner.lock().unwrap();
            PersistedStats {
                total_hashes: inner.total_hashes,
                total_shares: inner.total_shares,
                accepted_shares: inner.accepted_shares,
                rejected_shares: inner.rejected_shares,
                best_difficulty: inner.best_difficulty,
                total_mining_seconds: inner.previous_mining_seconds
                    + inner.session_start.elapsed().as_secs_f64(),
                share_history: inner.share_history.iter().cloned().collect(),
                block_history: inner.block_history.iter().cloned().collect(),
                session_history: inner.session_history.iter().cloned().collect(),
                last_saved: Some(Utc::now()),
            }
        };

        if let Some(dir) = self.data_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_vec_pretty(&data)
            .map_err(|e| crate::Error::Internal(format!("failed to encode stats: {}", e)))?;
        std::fs::write(&self.data_path, json)?;
        Ok(())
    }

    /// Record a new share and fold it into the counters.
    pub fn add_share(
        &self,
        worker_id: u32,
        worker_name: &str,
        job_id: &str,
        nonce: &str,
        difficulty: f64,
        accepted: bool,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner.share_history.push_back(ShareEntry {
            timestamp: Utc::now(),
            worker_id,
            worker_name: worker_name.to_string(),
            job_id: job_id.to_string(),
            nonce: nonce.to_string(),
            difficulty,
            accepted,
        });
        if inner.share_history.len() > self.max_history {
            inner.share_history.pop_front();
        }

        inner.total_shares += 1;
        if accepted {
            inner.accepted_shares += 1;
        } else {
            inner.rejected_shares += 1;
        }
        if difficulty > inner.best_difficulty {
            inner.best_difficulty = difficulty;
        }
    }

    /// Flip a provisionally accepted share to rejected once the pool's
    /// verdict arrives. Matches the most recent accepted entry for the
    /// (job_id, nonce) pair.
    pub fn mark_share_rejected(&self, job_id: &str, nonce: &str) {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let entry = inner
            .share_history
            .iter_mut()
            .rev()
            .find(|e| e.accepted && e.job_id == job_id && e.nonce == nonce);
        if let Some(entry) = entry {
            entry.accepted = false;
            inner.accepted_shares = inner.accepted_shares.saturating_sub(1);
            inner.rejected_shares += 1;
        }
    }

    /// Record a block-detection event.
    pub fn add_block(&self, height: u64, prev_hash: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.block_history.push_back(BlockEntry {
            timestamp: Utc::now(),
            height,
            prev_hash: prev_hash.to_string(),
        });
        if inner.block_history.len() > self.max_history {
            inner.block_history.pop_front();
        }
    }

    /// Fold a fresh worker-pool hash count into the lifetime total. The pool
    /// count shrinks when workers are removed, so only forward progress
    /// since the previous snapshot is added.
    pub fn update_hashes(&self, count: u64) {
        let mut inner = self.inner.lock().unwrap();
        let delta = count.saturating_sub(inner.last_pool_count);
        inner.total_hashes += delta;
        inner.last_pool_count = count;
    }

    /// Mark the start of a mining session.
    pub fn begin_session(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.previous_mining_seconds += inner.session_start.elapsed().as_secs_f64();
        inner.session_started_at = Utc::now();
        inner.session_start = Instant::now();
        inner.start_hashes = inner.total_hashes;
    }

    /// Record the current session to history and roll the session window.
    pub fn end_session(&self) {
        let mut inner = self.inner.lock().unwrap();
        let end_time = Utc::now();
        let session_hashes = inner.total_hashes - inner.start_hashes;

        let record = SessionRecord {
            id: end_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            start_time: inner.session_started_at,
            end_time,
            duration_seconds: inner.session_start.elapsed().as_secs_f64(),
            total_hashes: session_hashes,
            best_difficulty: inner.best_difficulty,
        };
        inner.session_history.push_back(record);
        if inner.session_history.len() > SESSION_HISTORY_SIZE {
            inner.session_history.pop_front();
        }

        inner.previous_mining_seconds += inner.session_start.elapsed().as_secs_f64();
        inner.session_started_at = end_time;
        inner.session_start = Instant::now();
        inner.start_hashes = inner.total_hashes;
    }

    /// Current counters plus uptime.
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock().unwrap();
        let session_uptime = inner.session_start.elapsed().as_secs_f64();
        StatsSnapshot {
            total_hashes: inner.total_hashes,
            total_shares: inner.total_shares,
            accepted_shares: inner.accepted_shares,
            rejected_shares: inner.rejected_shares,
            best_difficulty: inner.best_difficulty,
            uptime_seconds: inner.previous_mining_seconds + session_uptime,
            session_uptime,
        }
    }

    /// Most recent shares, newest first.
    pub fn share_history(&self, limit: usize) -> Vec<ShareEntry> {
        let inner = self.inner.lock().unwrap();
        newest_first(&inner.share_history, limit)
    }

    /// Most recent block detections, newest first.
    pub fn block_history(&self, limit: usize) -> Vec<BlockEntry> {
        let inner = self.inner.lock().unwrap();
        newest_first(&inner.block_history, limit)
    }

    /// Most recent sessions, newest first.
    pub fn session_history(&self, limit: usize) -> Vec<SessionRecord> {
        let inner = self.inner.lock().unwrap();
        newest_first(&inner.session_history, limit)
    }

    pub fn best_difficulty(&self) -> f64 {
        self.inner.lock().unwrap().best_difficulty
    }

    /// Clear all statistics, including accumulated mining time.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.total_hashes = 0;
        inner.total_shares = 0;
        inner.accepted_shares = 0;
        inner.rejected_shares = 0;
        inner.best_difficulty = 0.0;
        inner.previous_mining_seconds = 0.0;
        inner.start_hashes = 0;
        inner.share_history.clear();
        inner.block_history.clear();
        inner.session_started_at = Utc::now();
        inner.session_start = Instant::now();
    }
}

fn newest_first<T: Clone>(history: &VecDeque<T>, limit: usize) -> Vec<T> {
    let limit = if limit == 0 { history.len() } else { limit };
    history.iter().rev().take(limit).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_data_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "soloforge-stats-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_share_accounting() {
        let collector = Collector::new(&temp_data_dir("shares"), 10);
        collector.add_share(1, "Worker A", "job1", "0000abcd", 42.0, true);
        collector.add_share(2, "Worker B", "job1", "0000ef01", 7.0, false);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.total_shares, 2);
        assert_eq!(snapshot.accepted_shares, 1);
        assert_eq!(snapshot.rejected_shares, 1);
        assert_eq!(snapshot.best_difficulty, 42.0);
    }

    #[test]
    fn test_history_bounded_and_newest_first() {
        let collector = Collector::new(&temp_data_dir("bounded"), 5);
        for i in 0..20 {
            collector.add_share(1, "Worker A", &format!("job{}", i), "00", i as f64, true);
        }
        let history = collector.share_history(100);
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].job_id, "job19");
        assert_eq!(history[4].job_id, "job15");

        let limited = collector.share_history(2);
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].job_id, "job19");
    }

    #[test]
    fn test_mark_share_rejected() {
        let collector = Collector::new(&temp_data_dir("rejected"), 10);
        collector.add_share(1, "Worker A", "job1", "0000abcd", 42.0, true);
        collector.mark_share_rejected("job1", "0000abcd");

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.accepted_shares, 0);
        assert_eq!(snapshot.rejected_shares, 1);
        assert!(!collector.share_history(1)[0].accepted);

        // Unknown pairs change nothing
        collector.mark_share_rejected("job9", "ffffffff");
        assert_eq!(collector.snapshot().rejected_shares, 1);
    }

    #[test]
    fn test_session_history_records_hashes() {
        let collector = Collector::new(&temp_data_dir("sessions"), 10);
        collector.begin_session();
        collector.update_hashes(5000);
        collector.end_session();

        let sessions = collector.session_history(10);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].total_hashes, 5000);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = temp_data_dir("persist");
        {
            let collector = Collector::new(&dir, 10);
            collector.add_share(1, "Worker A", "job1", "0000abcd", 42.0, true);
            collector.add_block(850_000, "00".repeat(32).as_str());
            collector.update_hashes(12345);
            collector.save().unwrap();
        }
        let restored = Collector::new(&dir, 10);
        let snapshot = restored.snapshot();
        assert_eq!(snapshot.total_hashes, 12345);
        assert_eq!(snapshot.total_shares, 1);
        assert_eq!(snapshot.best_difficulty, 42.0);
        assert_eq!(restored.block_history(10).len(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_malformed_file_disables_persistence() {
        let dir = temp_data_dir("malformed");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(STATS_FILE), b"{broken json").unwrap();

        let collector = Collector::new(&dir, 10);
        collector.add_share(1, "Worker A", "job1", "00", 1.0, true);
        collector.save().unwrap();

        // The broken file must survive untouched
        let on_disk = std::fs::read(dir.join(STATS_FILE)).unwrap();
        assert_eq!(on_disk, b"{broken json");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_update_hashes_never_goes_backwards() {
        let collector = Collector::new(&temp_data_dir("monotonic"), 10);
        collector.update_hashes(1000);
        collector.update_hashes(400);
        assert_eq!(collector.snapshot().total_hashes, 1000);
        collector.update_hashes(500);
        assert_eq!(collector.snapshot().total_hashes, 1100);
    }
}
