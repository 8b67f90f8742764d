//! Activity storage as a JSON-lines file.
//!
//! [`ActivityRepository::create`] reads and appends `activities.jsonl`.
//! [`ActivityRepository::create_null`] answers `find_all` from scripted
//! responses and writes nothing. Both emit [`RECORDED_EVENT`] for every
//! added activity.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::activity::Activity;
use crate::core::events::{Emitter, EventBus, EventRecorder};
use crate::core::scripted::ScriptedResponses;

/// Emitted with each activity passed to [`ActivityRepository::add`].
pub const RECORDED_EVENT: &str = "activity-recorded";

enum Storage {
    File(PathBuf),
    Scripted(ScriptedResponses<Vec<Activity>>),
}

pub struct ActivityRepository {
    storage: Storage,
    events: EventBus<Activity>,
}

impl ActivityRepository {
    /// Repository backed by the JSON-lines file at `path`.
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self {
            storage: Storage::File(path.into()),
            events: EventBus::new(),
        }
    }

    /// Repository whose `find_all` answers come from `responses`.
    ///
    /// Without responses, every `find_all` returns an empty list.
    pub fn create_null(responses: Option<ScriptedResponses<Vec<Activity>>>) -> Self {
        let responses =
            responses.unwrap_or_else(|| ScriptedResponses::always("find_all", Ok(Vec::new())));
        Self {
            storage: Storage::Scripted(responses),
            events: EventBus::new(),
        }
    }

    /// Load every stored activity in insertion order.
    pub fn find_all(&self) -> Result<Vec<Activity>> {
        match &self.storage {
            Storage::File(path) => load_activities(path),
            Storage::Scripted(responses) => Ok(responses.next()?),
        }
    }

    /// Append one activity.
    pub fn add(&self, activity: &Activity) -> Result<()> {
        if let Storage::File(path) = &self.storage {
            append_activity(path, activity)?;
        }
        self.events.emit(RECORDED_EVENT, activity.clone());
        Ok(())
    }

    pub fn events(&self) -> &EventBus<Activity> {
        &self.events
    }

    pub fn track_recorded(&self) -> EventRecorder<Activity> {
        EventRecorder::create(&self.events, RECORDED_EVENT)
    }
}

#[instrument(skip_all, fields(path = %path.display()))]
fn load_activities(path: &Path) -> Result<Vec<Activity>> {
    if !path.exists() {
        debug!("no activity file yet");
        return Ok(Vec::new());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read activities {}", path.display()))?;
    let activities = contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("parse {} line {}", path.display(), index + 1))
        })
        .collect::<Result<Vec<Activity>>>()?;
    debug!(count = activities.len(), "activities loaded");
    Ok(activities)
}

#[instrument(skip_all, fields(path = %path.display()))]
fn append_activity(path: &Path, activity: &Activity) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut line = serde_json::to_string(activity).context("serialize activity")?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open activities {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("append activity to {}", path.display()))?;
    debug!(timestamp = %activity.timestamp, "activity appended");
    Ok(())
}
