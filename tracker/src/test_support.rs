//! Test-only helpers for building activities, requests, and scratch directories.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::core::activity::Activity;
use crate::core::duration::IsoDuration;
use crate::io::config::{TrackerConfig, write_config};

/// Deterministic activity ending at `timestamp` (RFC 3339).
pub fn activity(timestamp: &str, minutes: u64, task: &str) -> Activity {
    Activity {
        timestamp: timestamp.parse().expect("valid RFC 3339 timestamp"),
        duration: IsoDuration::from_minutes(minutes),
        client: "ACME Ltd.".to_string(),
        project: "Tracker".to_string(),
        task: task.to_string(),
        notes: None,
    }
}

/// Well-formed `LogActivity` request body.
pub fn log_request(timestamp: &str, duration: &str, task: &str) -> Value {
    json!({
        "timestamp": timestamp,
        "duration": duration,
        "client": "ACME Ltd.",
        "project": "Tracker",
        "task": task,
    })
}

/// Temporary working directory with a tracker config pointing into it.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create tempdir")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("tracker.toml")
    }

    /// Config whose activity file lives inside this directory.
    pub fn config(&self) -> TrackerConfig {
        TrackerConfig {
            activities_path: self.path().join("data").join("activities.jsonl"),
            ..TrackerConfig::default()
        }
    }

    /// Write [`TestDir::config`] to [`TestDir::config_path`].
    pub fn write_config(&self) -> Result<TrackerConfig> {
        let cfg = self.config();
        write_config(&self.config_path(), &cfg)?;
        Ok(cfg)
    }
}
