use serde::{Deserialize, Serialize};

use crate::audio::{AudioSegmentRecorder, AudioStatus};
use crate::calibration::{CalibrationPhase, CalibrationProgress, CalibrationState};
use crate::gaze::AdapterStatus;
use crate::models::Session;
use crate::responses::ResponseStore;
use crate::sampling::{SampleBuffer, SamplerController, SessionClock};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum StudyStatus {
    NotReady { reason: Option<String> },
    Ready,
    Calibrating,
    Recording,
}

impl StudyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyStatus::NotReady { .. } => "not ready",
            StudyStatus::Ready => "ready",
            StudyStatus::Calibrating => "calibrating",
            StudyStatus::Recording => "recording",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySnapshot {
    pub status: StudyStatus,
    pub session_id: Option<String>,
    pub sample_count: usize,
    pub calibration: CalibrationProgress,
    pub audio: AudioStatus,
    pub response_count: usize,
}

/// Everything one study run mutates, owned by the controller.
pub struct SessionState {
    pub session: Option<Session>,
    pub clock: Option<SessionClock>,
    pub sampler: SamplerController,
    pub buffer: SampleBuffer,
    pub recorder: AudioSegmentRecorder,
    pub calibration: CalibrationState,
    pub responses: ResponseStore,
}

impl SessionState {
    pub fn new(recorder: AudioSegmentRecorder) -> Self {
        Self {
            session: None,
            clock: None,
            sampler: SamplerController::new(),
            buffer: SampleBuffer::new(),
            recorder,
            calibration: CalibrationState::new(),
            responses: ResponseStore::new(),
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.as_ref().map(|session| session.id.clone())
    }

    pub fn status(&self, adapter: &AdapterStatus) -> StudyStatus {
        if self.sampler.is_active() {
            return StudyStatus::Recording;
        }
        if self.calibration.phase == CalibrationPhase::Calibrating {
            return StudyStatus::Calibrating;
        }
        match adapter {
            AdapterStatus::Ready => StudyStatus::Ready,
            AdapterStatus::Uninitialized => StudyStatus::NotReady { reason: None },
            AdapterStatus::Failed(reason) => StudyStatus::NotReady {
                reason: Some(reason.clone()),
            },
        }
    }
}
