//! Tracker configuration stored in `tracker.toml`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::duration::IsoDuration;

/// Tracker configuration (TOML).
///
/// Missing fields fall back to defaults, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrackerConfig {
    /// JSON-lines file holding logged activities.
    pub activities_path: PathBuf,

    pub countdown: CountdownConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CountdownConfig {
    /// Check-in period, as an ISO-8601 duration.
    pub period: IsoDuration,

    /// Interval between countdown ticks in milliseconds.
    pub tick_millis: u64,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            period: IsoDuration::from_minutes(20),
            tick_millis: 1_000,
        }
    }
}

impl CountdownConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            activities_path: PathBuf::from("data/activities.jsonl"),
            countdown: CountdownConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.activities_path.as_os_str().is_empty() {
            return Err(anyhow!("activities_path must not be empty"));
        }
        if self.countdown.period.is_zero() {
            return Err(anyhow!("countdown.period must be > 0"));
        }
        if self.countdown.tick_millis == 0 {
            return Err(anyhow!("countdown.tick_millis must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file, falling back to defaults when it is missing.
///
/// A relative `activities_path` is resolved against the config file's
/// directory, so `tracker --config ~/work/tracker.toml` finds
/// `~/work/data/activities.jsonl` from any working directory.
pub fn load_config(path: &Path) -> Result<TrackerConfig> {
    let mut cfg = if path.exists() {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        toml::from_str::<TrackerConfig>(&contents)
            .with_context(|| format!("parse {}", path.display()))?
    } else {
        debug!(path = %path.display(), "no config file, using defaults");
        TrackerConfig::default()
    };
    cfg.activities_path = relative_to_config(path, &cfg.activities_path);
    cfg.validate()?;
    Ok(cfg)
}

fn relative_to_config(config_path: &Path, target: &Path) -> PathBuf {
    if target.is_absolute() {
        return target.to_path_buf();
    }
    match config_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        Some(dir) => dir.join(target),
        None => target.to_path_buf(),
    }
}

/// Validate and write config next to its final location, then rename over it.
pub fn write_config(path: &Path, cfg: &TrackerConfig) -> Result<()> {
    cfg.validate()?;
    let body = toml::to_string_pretty(cfg).context("serialize config toml")?;

    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;

    let file_name = path
        .file_name()
        .with_context(|| format!("config path has no file name: {}", path.display()))?;
    let staging = dir.join(format!(".{}.tmp", file_name.to_string_lossy()));
    {
        let mut file = fs::File::create(&staging)
            .with_context(|| format!("create {}", staging.display()))?;
        writeln!(file, "{}", body.trim_end())
            .and_then(|()| file.sync_all())
            .with_context(|| format!("write {}", staging.display()))?;
    }
    fs::rename(&staging, path).with_context(|| format!("replace config {}", path.display()))?;
    debug!(path = %path.display(), "config written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults_beside_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg.countdown, CountdownConfig::default());
        assert_eq!(
            cfg.activities_path,
            temp.path().join("data").join("activities.jsonl")
        );
    }

    #[test]
    fn bare_file_name_keeps_relative_path() {
        assert_eq!(
            relative_to_config(Path::new("tracker.toml"), Path::new("data/a.jsonl")),
            PathBuf::from("data/a.jsonl")
        );
        assert_eq!(
            relative_to_config(Path::new("/etc/tracker.toml"), Path::new("/srv/a.jsonl")),
            PathBuf::from("/srv/a.jsonl")
        );
    }

    #[test]
    fn written_config_loads_back_without_staging_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tracker.toml");
        let cfg = TrackerConfig {
            activities_path: PathBuf::from("/var/lib/tracker/activities.jsonl"),
            countdown: CountdownConfig {
                period: IsoDuration::from_minutes(45),
                tick_millis: 500,
            },
        };
        write_config(&path, &cfg).expect("write");

        assert_eq!(load_config(&path).expect("load"), cfg);
        assert!(!temp.path().join(".tracker.toml.tmp").exists());
        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.contains("period = \"PT45M\""));
    }

    #[test]
    fn relative_activities_path_follows_config_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("tracker.toml");
        write_config(&path, &TrackerConfig::default()).expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(
            cfg.activities_path,
            temp.path().join("nested").join("data").join("activities.jsonl")
        );
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tracker.toml");
        fs::write(&path, "[countdown]\nperiod = \"PT30M\"\n").expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.countdown.period, IsoDuration::from_minutes(30));
        assert_eq!(cfg.countdown.tick_millis, 1_000);
        assert_eq!(
            cfg.activities_path,
            temp.path().join("data").join("activities.jsonl")
        );
    }

    #[test]
    fn rejects_invalid_values() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tracker.toml");

        fs::write(&path, "[countdown]\ntick_millis = 0\n").expect("write");
        let err = load_config(&path).expect_err("zero tick");
        assert!(err.to_string().contains("tick_millis must be > 0"));

        fs::write(&path, "[countdown]\nperiod = \"twenty minutes\"\n").expect("write");
        let err = load_config(&path).expect_err("bad period");
        assert!(format!("{err:#}").contains("invalid ISO-8601 duration"));
    }
}
