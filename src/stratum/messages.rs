// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/stratum/messages.rs
// Version: 1.0.0
//
// This file implements the Stratum V1 JSON-RPC message shapes and parsing
// for SoloForge, located in the stratum subdirectory. It classifies incoming
// lines into responses and notifications, decodes the subscribe result and
// turns mining.notify parameters into jobs.
//
// Tree Location:
// - src/stratum/messages.rs (Stratum protocol messages)
// - Depends on: serde, serde_json, core::types

use crate::core::types::Job;
use serde::Serialize;
use serde_json::Value;

/// A client-to-pool JSON-RPC request: `{"id": n, "method": m, "params": [...]}`.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

impl Request {
    pub fn subscribe(id: u64) -> Self {
        Request {
            id,
            method: "mining.subscribe".to_string(),
            params: vec![],
        }
    }

    pub fn authorize(id: u64, user: &str, password: &str) -> Self {
        // Pools expect a non-empty password; "x" is the conventional filler
        let password = if password.is_empty() { "x" } else { password };
        Request {
            id,
            method: "mining.authorize".to_string(),
            params: vec![user.into(), password.into()],
        }
    }

    pub fn submit(
        id: u64,
        user: &str,
        job_id: &str,
        extranonce2: &str,
        ntime: &str,
        nonce: &str,
    ) -> Self {
        Request {
            id,
            method: "mining.submit".to_string(),
            params: vec![
                user.into(),
                job_id.into(),
                extranonce2.into(),
                ntime.into(),
                nonce.into(),
            ],
        }
    }
}

/// A pool-to-client response keyed by request id.
#[derive(Debug, Clone)]
pub struct Response {
    pub id: u64,
    pub result: Value,
    pub error: Value,
}

impl Response {
    pub fn is_error(&self) -> bool {
        !self.error.is_null()
    }
}

/// A pool-to-client notification (no meaningful id).
#[derive(Debug, Clone)]
pub struct Notification {
    pub method: String,
    pub params: Value,
}

/// A classified incoming Stratum message.
#[derive(Debug, Clone)]
pub enum StratumMessage {
    Response(Response),
    Notification(Notification),
}

/// Classify one line of pool output.
///
/// A message is a notification iff its `method` is a non-empty string, and a
/// response iff its `id` is a nonzero integer. Anything else (including
/// malformed JSON) yields None and is dropped by the caller.
pub fn parse_message(line: &str) -> Option<StratumMessage> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;

    if let Some(method) = value.get("method").and_then(|m| m.as_str()) {
        if !method.is_empty() {
            return Some(StratumMessage::Notification(Notification {
                method: method.to_string(),
                params: value.get("params").cloned().unwrap_or(Value::Null),
            }));
        }
    }

    let id = value.get("id").and_then(|id| id.as_u64())?;
    if id == 0 {
        return None;
    }
    Some(StratumMessage::Response(Response {
        id,
        result: value.get("result").cloned().unwrap_or(Value::Null),
        error: value.get("error").cloned().unwrap_or(Value::Null),
    }))
}

/// Decode the result of a `mining.subscribe` response.
///
/// The result is a 3-element array; element 0 (the subscription tuple) is
/// ignored, element 1 is extranonce1 and element 2 the extranonce2 size.
pub fn parse_subscribe_result(result: &Value) -> Option<(String, usize)> {
    let array = result.as_array()?;
    if array.len() < 3 {
        return None;
    }
    let extranonce1 = array[1].as_str()?.to_string();
    let extranonce2_size = array[2].as_u64()? as usize;
    Some((extranonce1, extranonce2_size))
}

/// Construct a Job from the 9-element `mining.notify` parameter array.
///
/// Short arrays yield None and the notification is dropped silently.
pub fn parse_notify_params(params: &Value) -> Option<Job> {
    let p = params.as_array()?;
    if p.len() < 9 {
        return None;
    }
    Some(Job {
        job_id: p[0].as_str()?.to_string(),
        prev_hash: p[1].as_str()?.to_string(),
        coinbase1: p[2].as_str()?.to_string(),
        coinbase2: p[3].as_str()?.to_string(),
        merkle_branch: p[4]
            .as_array()?
            .iter()
            .filter_map(|b| b.as_str().map(str::to_string))
            .collect(),
        version: p[5].as_str()?.to_string(),
        nbits: p[6].as_str()?.to_string(),
        ntime: p[7].as_str()?.to_string(),
        clean_jobs: p[8].as_bool().unwrap_or(false),
    })
}
