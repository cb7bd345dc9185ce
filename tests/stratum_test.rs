// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: tests/stratum_test.rs
// Version: 1.0.0
//
// This file contains integration tests for the Stratum V1 client, located in
// the tests directory. A loopback TCP listener plays the pool side of the
// protocol and the tests drive the full subscribe/authorize/notify/submit
// dialogue against it.
//
// Tree Location:
// - tests/stratum_test.rs (Stratum client integration tests)
// - Depends on: soloforge, tokio, serde_json

use serde_json::Value;
use soloforge::core::types::Job;
use soloforge::error::Error;
use soloforge::stratum::{ConnectionState, StratumClient, StratumObserver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingObserver {
    jobs: Mutex<Vec<Job>>,
    submit_results: Mutex<Vec<(u64, bool)>>,
    disconnects: AtomicUsize,
}

impl StratumObserver for RecordingObserver {
    fn on_disconnected(&self, _cause: &Error) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    fn on_job(&self, job: &Job) {
        self.jobs.lock().unwrap().push(job.clone());
    }

    fn on_submit_result(&self, id: u64, accepted: bool) {
        self.submit_results.lock().unwrap().push((id, accepted));
    }
}

fn notify_line(job_id: &str) -> String {
    let params = serde_json::json!([
        job_id,
        "00".repeat(32),
        "0100000001",
        "ffffffff00",
        [],
        "20000000",
        "1d00ffff",
        "663d93a1",
        false
    ]);
    format!(
        "{}\n",
        serde_json::json!({ "id": null, "method": "mining.notify", "params": params })
    )
}

async fn wait_until<F: Fn() -> bool>(condition: F, what: &str) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_full_pool_dialogue() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let pool = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let line = lines.next_line().await.unwrap().unwrap();
        let req: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(req["method"], "mining.subscribe");
        assert_eq!(req["id"], 1);
        write_half
            .write_all(
                b"{\"id\":1,\"result\":[[[\"mining.notify\",\"abc\"]],\"81000001\",4],\"error\":null}\n",
            )
            .await
            .unwrap();

        let line = lines.next_line().await.unwrap().unwrap();
        let req: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(req["method"], "mining.authorize");
        assert_eq!(req["id"], 2);
        assert_eq!(req["params"][0], "bc1qwallet");
        assert_eq!(req["params"][1], "x", "empty password becomes x");
        write_half
            .write_all(b"{\"id\":2,\"result\":true,\"error\":null}\n")
            .await
            .unwrap();

        write_half
            .write_all(notify_line("jobA").as_bytes())
            .await
            .unwrap();

        let line = lines.next_line().await.unwrap().unwrap();
        let req: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(req["method"], "mining.submit");
        assert_eq!(req["id"], 3, "first submit uses id 3");
        assert_eq!(
            req["params"],
            serde_json::json!(["bc1qwallet", "jobA", "00000000", "663d93a1", "deadbeef"])
        );
        write_half
            .write_all(b"{\"id\":3,\"result\":true,\"error\":null}\n")
            .await
            .unwrap();

        // Hold the connection until the client hangs up
        let _ = lines.next_line().await;
    });

    let client = Arc::new(StratumClient::new("127.0.0.1", addr.port()));
    let observer = Arc::new(RecordingObserver::default());
    client.set_observer(observer.clone());

    client.connect().await.unwrap();
    assert!(client.is_connected());

    client.subscribe().await.unwrap();
    assert!(
        client
            .wait_for_state(ConnectionState::Subscribed, WAIT)
            .await
    );
    assert_eq!(client.extranonce1(), "81000001");
    assert_eq!(client.extranonce2_size(), 4);

    client.authorize("bc1qwallet", "").await.unwrap();
    assert!(
        client
            .wait_for_state(ConnectionState::Authorized, WAIT)
            .await
    );
    assert!(client.is_authorized());

    wait_until(|| client.current_job().is_some(), "job dispatch").await;
    assert_eq!(client.current_job().unwrap().job_id, "jobA");
    assert_eq!(observer.jobs.lock().unwrap()[0].job_id, "jobA");

    let id = client
        .submit("bc1qwallet", "jobA", "00000000", "663d93a1", "deadbeef")
        .await
        .unwrap();
    assert_eq!(id, 3);
    wait_until(
        || observer.submit_results.lock().unwrap().contains(&(3, true)),
        "submit acknowledgement",
    )
    .await;

    client.close().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.is_connected());
    assert!(!client.is_authorized());

    // Submit after close fails immediately rather than blocking
    let err = client
        .submit("bc1qwallet", "jobA", "00000000", "663d93a1", "deadbeef")
        .await;
    assert!(err.is_err());

    // Close is idempotent
    client.close().await.unwrap();

    pool.await.unwrap();
}

#[tokio::test]
async fn test_job_delivered_before_subscribe_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let pool = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let _subscribe = lines.next_line().await.unwrap().unwrap();
        // The pool pushes work during the handshake
        write_half
            .write_all(notify_line("early").as_bytes())
            .await
            .unwrap();
        write_half
            .write_all(
                b"{\"id\":1,\"result\":[[[\"mining.notify\",\"abc\"]],\"81000001\",4],\"error\":null}\n",
            )
            .await
            .unwrap();
        let _ = lines.next_line().await;
    });

    let client = Arc::new(StratumClient::new("127.0.0.1", addr.port()));
    let observer = Arc::new(RecordingObserver::default());
    client.set_observer(observer.clone());

    client.connect().await.unwrap();
    client.subscribe().await.unwrap();

    wait_until(|| client.current_job().is_some(), "pre-subscribe job").await;
    assert_eq!(client.current_job().unwrap().job_id, "early");
    assert!(
        client
            .wait_for_state(ConnectionState::Subscribed, WAIT)
            .await
    );

    client.close().await.unwrap();
    pool.await.unwrap();
}

#[tokio::test]
async fn test_pool_hangup_disconnects_client() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let pool = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);
    });

    let client = Arc::new(StratumClient::new("127.0.0.1", addr.port()));
    let observer = Arc::new(RecordingObserver::default());
    client.set_observer(observer.clone());

    client.connect().await.unwrap();
    wait_until(
        || observer.disconnects.load(Ordering::SeqCst) > 0,
        "disconnect callback",
    )
    .await;
    assert!(!client.is_connected());
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.is_subscribed());
    assert!(!client.is_authorized());

    pool.await.unwrap();
}

#[tokio::test]
async fn test_connect_refused_is_transport_error() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = Arc::new(StratumClient::new("127.0.0.1", addr.port()));
    let result = client.connect().await;
    assert!(matches!(result, Err(Error::Transport(_))));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_malformed_lines_keep_connection_alive() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let pool = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut lines = BufReader::new(read_half).lines();

        // Garbage and short notifications are dropped without killing the
        // read loop; a good job afterwards still arrives.
        write_half.write_all(b"this is not json\n").await.unwrap();
        write_half
            .write_all(b"{\"id\":null,\"method\":\"mining.notify\",\"params\":[\"short\"]}\n")
            .await
            .unwrap();
        write_half
            .write_all(b"{\"id\":null,\"method\":\"mining.set_difficulty\",\"params\":[4096]}\n")
            .await
            .unwrap();
        write_half
            .write_all(notify_line("survivor").as_bytes())
            .await
            .unwrap();
        let _ = lines.next_line().await;
    });

    let client = Arc::new(StratumClient::new("127.0.0.1", addr.port()));
    let observer = Arc::new(RecordingObserver::default());
    client.set_observer(observer.clone());

    client.connect().await.unwrap();
    wait_until(|| client.current_job().is_some(), "job after garbage").await;
    assert_eq!(client.current_job().unwrap().job_id, "survivor");
    assert!(client.is_connected());

    client.close().await.unwrap();
    pool.await.unwrap();
}
