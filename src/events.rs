use log::debug;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::audio::AudioStatus;
use crate::calibration::CalibrationProgress;
use crate::session::StudyStatus;

const EVENT_CAPACITY: usize = 256;

/// Notifications pushed to the UI layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "event", content = "payload")]
pub enum StudyEvent {
    StatusChanged(StudyStatus),
    #[serde(rename_all = "camelCase")]
    RecordingStarted { session_id: String },
    #[serde(rename_all = "camelCase")]
    RecordingStopped {
        session_id: String,
        sample_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    SampleProgress {
        session_id: String,
        sample_count: usize,
    },
    CalibrationProgress(CalibrationProgress),
    CalibrationComplete,
    AudioStatusChanged(AudioStatus),
    #[serde(rename_all = "camelCase")]
    AudioError { message: String },
    SessionReset,
}

/// Fan-out of study events. Publishing never blocks and never fails when
/// nobody listens.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StudyEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudyEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: StudyEvent) {
        if self.tx.send(event).is_err() {
            debug!("study event dropped: no subscribers");
        }
    }
}
