// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/config.rs
// Version: 1.0.0
//
// This file implements runtime configuration for SoloForge. The
// configuration is a JSON key/value blob loaded at startup and written back
// on every mutation through the REST surface.
//
// Tree Location:
// - src/config.rs (runtime configuration)
// - Depends on: serde, serde_json

use crate::error::{Error, Result};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

const LOG_TARGET: &str = "soloforge::config";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pool hostname
    pub pool_url: String,

    /// Pool port
    pub pool_port: u16,

    /// Payout wallet address; mining cannot start while empty
    pub wallet_address: String,

    /// CPU throttle applied to every worker, percent in [1, 100]
    pub max_cpu_percent: u32,

    /// Number of workers created on first mining start; 0 = one per core
    pub num_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pool_url: "solo.ckpool.org".to_string(),
            pool_port: 3333,
            wallet_address: String::new(),
            max_cpu_percent: 80,
            num_workers: 4,
        }
    }
}

/// Shared handle over the configuration, saved to disk on mutation.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Config>>,
    path: Arc<PathBuf>,
}

impl ConfigHandle {
    /// Load configuration from a JSON file. A missing file yields defaults;
    /// a malformed file is a ConfigError.
    pub fn load(path: &Path) -> Result<Self> {
        let config = match std::fs::read(path) {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|e| Error::Config(format!("malformed config file {:?}: {}", path, e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(Error::Config(format!("cannot read {:?}: {}", path, e))),
        };
        Ok(ConfigHandle {
            inner: Arc::new(RwLock::new(config)),
            path: Arc::new(path.to_path_buf()),
        })
    }

    /// Write the current configuration back to disk.
    pub fn save(&self) -> Result<()> {
        let json = {
            let config = self.inner.read().unwrap();
            serde_json::to_vec_pretty(&*config)
                .map_err(|e| Error::Internal(format!("failed to encode config: {}", e)))?
        };
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .map_err(|e| Error::Config(format!("cannot create {:?}: {}", dir, e)))?;
            }
        }
        std::fs::write(&*self.path, json)
            .map_err(|e| Error::Config(format!("cannot write {:?}: {}", self.path, e)))
    }

    pub fn snapshot(&self) -> Config {
        self.inner.read().unwrap().clone()
    }

    pub fn pool_url(&self) -> String {
        self.inner.read().unwrap().pool_url.clone()
    }

    pub fn pool_port(&self) -> u16 {
        self.inner.read().unwrap().pool_port
    }

    pub fn wallet_address(&self) -> String {
        self.inner.read().unwrap().wallet_address.clone()
    }

    pub fn max_cpu_percent(&self) -> u32 {
        self.inner.read().unwrap().max_cpu_percent
    }

    pub fn num_workers(&self) -> usize {
        self.inner.read().unwrap().num_workers
    }

    /// Apply a partial update from a JSON object and persist it. Unknown
    /// keys are ignored.
    pub fn update(&self, updates: &Value) -> Result<()> {
        {
            let mut config = self.inner.write().unwrap();
            if let Some(v) = updates.get("pool_url").and_then(Value::as_str) {
                config.pool_url = v.to_string();
            }
            if let Some(v) = updates.get("pool_port").and_then(Value::as_u64) {
                config.pool_port = v as u16;
            }
            if let Some(v) = updates.get("wallet_address").and_then(Value::as_str) {
                config.wallet_address = v.to_string();
            }
            if let Some(v) = updates.get("max_cpu_percent").and_then(Value::as_u64) {
                config.max_cpu_percent = (v as u32).clamp(1, 100);
            }
            if let Some(v) = updates.get("num_workers").and_then(Value::as_u64) {
                config.num_workers = v as usize;
            }
        }
        info!(target: LOG_TARGET, "⚙️ Configuration updated");
        self.save()
    }
}
