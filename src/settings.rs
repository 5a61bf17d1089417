use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::audio::RecorderConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StudySettings {
    pub sampling_hz: f64,
    pub clicks_per_point: u32,
    pub audio_liveness_ms: u64,
    pub audio_flush_timeout_ms: u64,
    pub export_dir: PathBuf,
}

impl Default for StudySettings {
    fn default() -> Self {
        Self {
            sampling_hz: 30.0,
            clicks_per_point: 6,
            audio_liveness_ms: 50,
            audio_flush_timeout_ms: 2000,
            export_dir: PathBuf::from("exports"),
        }
    }
}

impl StudySettings {
    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            liveness_interval: Duration::from_millis(self.audio_liveness_ms.max(1)),
            flush_timeout: Duration::from_millis(self.audio_flush_timeout_ms),
        }
    }
}

/// `GAZETRACE_DEBUG=1|true` turns on per-sample progress events.
pub fn debug_mode() -> bool {
    std::env::var("GAZETRACE_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Study settings backed by a JSON file.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<StudySettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!(
                    "Ignoring malformed settings in {}: {err}",
                    path.display()
                );
                StudySettings::default()
            })
        } else {
            StudySettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> StudySettings {
        self.read().clone()
    }

    pub fn update(&self, settings: StudySettings) -> Result<()> {
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: StudySettings = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed settings in {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &StudySettings) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, StudySettings> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, StudySettings> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
