// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: tests/integration_test.rs
// Version: 1.0.0
//
// This file contains integration tests for the SoloForge mining engine,
// located in the tests directory. It verifies the end-to-end behavior of the
// worker pool: share emission against an easy target, job fan-out, the
// lossy-latest job mailbox and counter invariants.
//
// Tree Location:
// - tests/integration_test.rs (mining engine integration tests)
// - Depends on: soloforge, hex

use soloforge::core::difficulty::{decode_compact_target, hash_difficulty, U256};
use soloforge::core::header::build_header;
use soloforge::core::sha256::{reverse_bytes, sha256d};
use soloforge::core::types::{Job, Share};
use soloforge::miner::{Worker, WorkerManager};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const EXTRANONCE1: &str = "81000001";
const EXTRANONCE2_SIZE: usize = 4;

/// A regtest-like job whose maximum target makes roughly every second hash a
/// share, so a single batch always finds one.
fn easy_job(job_id: &str) -> Job {
    Job {
        job_id: job_id.to_string(),
        prev_hash: "00".repeat(32),
        coinbase1: "0100000001".to_string(),
        coinbase2: "ffffffff00".to_string(),
        merkle_branch: vec![],
        version: "20000000".to_string(),
        nbits: "207fffff".to_string(),
        ntime: "663d93a1".to_string(),
        clean_jobs: false,
    }
}

fn share_channel() -> (Arc<dyn Fn(Share) + Send + Sync>, mpsc::Receiver<Share>) {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    let callback = Arc::new(move |share: Share| {
        let _ = tx.lock().unwrap().send(share);
    });
    (callback, rx)
}

#[test]
fn test_worker_emits_valid_share_on_easy_target() {
    let manager = WorkerManager::new();
    let (callback, shares) = share_channel();
    manager.set_share_callback(callback);
    manager.set_stratum_data(EXTRANONCE1, EXTRANONCE2_SIZE);
    manager.add_worker("");

    let job = easy_job("regtest1");
    manager.broadcast_job(&job);

    let share = shares
        .recv_timeout(Duration::from_secs(10))
        .expect("worker should find a share within one batch on a maximum target");
    manager.stop_all();

    assert_eq!(share.job_id, "regtest1");
    assert_eq!(share.ntime, job.ntime);
    assert_eq!(
        share.extranonce2.len(),
        2 * EXTRANONCE2_SIZE,
        "extranonce2 hex length must be twice its byte size"
    );
    assert_eq!(share.nonce.len(), 8, "nonce is 8 lowercase hex digits");
    assert_eq!(share.nonce, share.nonce.to_lowercase());

    // Recompute the hash and check it against the network target and the
    // difficulty rule.
    let mut header = build_header(&job, EXTRANONCE1, &share.extranonce2).unwrap();
    let nonce = u32::from_str_radix(&share.nonce, 16).unwrap();
    header.set_nonce(nonce);
    let digest = sha256d(header.as_bytes());

    let hash_value = U256::from_big_endian(&reverse_bytes(&digest));
    let target = decode_compact_target(&job.nbits);
    assert!(hash_value <= target, "submitted share must meet the target");
    assert_eq!(
        share.difficulty,
        hash_difficulty(&digest),
        "reported difficulty must follow the difficulty-1 quotient rule"
    );
}

#[test]
fn test_broadcast_reaches_every_worker() {
    let manager = WorkerManager::new();
    let (callback, shares) = share_channel();
    manager.set_share_callback(callback);
    manager.set_stratum_data(EXTRANONCE1, EXTRANONCE2_SIZE);
    manager.add_worker("");
    manager.add_worker("");
    manager.add_worker("");

    manager.broadcast_job(&easy_job("fanout"));

    // With a ~50% per-hash share probability each worker reports quickly
    let mut seen = std::collections::HashSet::new();
    let deadline = std::time::Instant::now() + Duration::from_secs(15);
    while seen.len() < 3 && std::time::Instant::now() < deadline {
        if let Ok(share) = shares.recv_timeout(Duration::from_secs(5)) {
            assert_eq!(share.job_id, "fanout");
            seen.insert(share.worker_id);
        }
    }
    manager.stop_all();
    assert_eq!(seen.len(), 3, "every worker should observe the broadcast job");
}

#[test]
fn test_lossy_latest_mailbox_under_burst() {
    let worker = Arc::new(Worker::new(1, "Worker A", 100));
    let (callback, shares) = share_channel();
    worker.set_share_callback(callback);

    // Flood the mailbox before the worker starts draining; only the newest
    // jobs survive and the last one enqueued wins.
    for i in 0..1000 {
        worker.update_job(easy_job(&format!("job{}", i)));
    }
    worker.start(EXTRANONCE1, EXTRANONCE2_SIZE);

    let share = shares
        .recv_timeout(Duration::from_secs(10))
        .expect("worker should mine the drained job");
    worker.stop();
    assert_eq!(
        share.job_id, "job999",
        "the next observed job must be the last one enqueued"
    );
}

#[test]
fn test_hash_count_is_monotonic() {
    let worker = Arc::new(Worker::new(1, "Worker A", 100));
    worker.start(EXTRANONCE1, EXTRANONCE2_SIZE);
    worker.update_job(easy_job("count"));

    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while worker.hash_count() == 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    let first = worker.hash_count();
    assert!(first > 0, "worker should be hashing");

    std::thread::sleep(Duration::from_millis(200));
    let second = worker.hash_count();
    worker.stop();
    assert!(second >= first, "hash count never decreases");
    assert!(worker.hashrate() >= 0.0);
    assert!(worker.hashrate().is_finite());
}

#[test]
fn test_ids_survive_pool_stop_start() {
    let manager = WorkerManager::new();
    manager.set_stratum_data(EXTRANONCE1, EXTRANONCE2_SIZE);
    let a = manager.add_worker("");
    let b = manager.add_worker("");

    manager.stop_all();
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while std::time::Instant::now() < deadline
        && manager.workers().iter().any(|w| w.is_running())
    {
        std::thread::sleep(Duration::from_millis(20));
    }

    manager.start_all();
    let ids: Vec<u32> = manager.workers().iter().map(|w| w.id).collect();
    manager.stop_all();
    assert_eq!(ids, vec![a, b], "ids are stable across pool stop/start");
}

#[test]
fn test_stopped_worker_stays_stopped() {
    let worker = Arc::new(Worker::new(7, "Worker G", 100));
    worker.start(EXTRANONCE1, EXTRANONCE2_SIZE);
    assert!(worker.is_running());
    worker.stop();
    assert!(!worker.is_running());
    // Jobs delivered after stop sit in the mailbox without reviving it
    worker.update_job(easy_job("late"));
    assert!(!worker.is_running());
}
