use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tokio::time::Duration;

use crate::{
    audio::{AudioBackend, AudioSegmentRecorder},
    calibration::{CalibrationProgress, ClickOutcome},
    error::{Result, TrackerError},
    events::{EventBus, StudyEvent},
    export::Exporter,
    gaze::{GazeEngine, GazeSourceAdapter, HitTester},
    models::{AnswerEvent, AudioSegment, SegmentMetadata, Session, SessionStatus},
    sampling::{SampleSources, SamplingJob, SessionClock},
    settings::{debug_mode, StudySettings},
    ui::{QuestionSource, SharedViewport},
};
use crate::{log_error, log_info, log_warn};

use super::state::{SessionState, StudySnapshot, StudyStatus};

const ENABLE_LOGS: bool = true;

/// External systems the controller reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub engine: Arc<dyn GazeEngine>,
    pub hit_tester: Arc<dyn HitTester>,
    pub viewport: SharedViewport,
    pub questions: Arc<dyn QuestionSource>,
    pub audio_backend: Arc<dyn AudioBackend>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub gaze: Option<PathBuf>,
    pub audio_log: Option<PathBuf>,
    pub audio_payloads: Vec<PathBuf>,
    pub responses: Option<PathBuf>,
    pub demographics: Option<PathBuf>,
}

impl ExportSummary {
    pub fn written(&self) -> usize {
        [&self.gaze, &self.audio_log, &self.responses, &self.demographics]
            .iter()
            .filter(|path| path.is_some())
            .count()
            + self.audio_payloads.len()
    }
}

/// Owns one study run: gaze adapter, calibration, sampler, audio recorder
/// and collected answers, with an explicit start/stop/reset lifecycle.
#[derive(Clone)]
pub struct StudyController {
    state: Arc<Mutex<SessionState>>,
    gaze: GazeSourceAdapter,
    hit_tester: Arc<dyn HitTester>,
    viewport: SharedViewport,
    questions: Arc<dyn QuestionSource>,
    events: EventBus,
    settings: StudySettings,
    progress_every: usize,
}

impl StudyController {
    pub fn new(collaborators: Collaborators, settings: StudySettings) -> Self {
        let events = EventBus::new();
        let recorder = AudioSegmentRecorder::new(
            collaborators.audio_backend,
            settings.recorder_config(),
            events.clone(),
        );

        Self {
            state: Arc::new(Mutex::new(SessionState::new(recorder))),
            gaze: GazeSourceAdapter::new(collaborators.engine),
            hit_tester: collaborators.hit_tester,
            viewport: collaborators.viewport,
            questions: collaborators.questions,
            events,
            settings,
            progress_every: if debug_mode() { 1 } else { 10 },
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudyEvent> {
        self.events.subscribe()
    }

    pub fn gaze(&self) -> &GazeSourceAdapter {
        &self.gaze
    }

    pub fn settings(&self) -> &StudySettings {
        &self.settings
    }

    /// Start the gaze engine. Failure leaves the controller usable with
    /// recording and calibration refused.
    pub async fn initialize(&self) -> Result<()> {
        let result = self.gaze.initialize();
        let state = self.state.lock().await;
        self.emit_status(&state);
        result
    }

    pub async fn snapshot(&self) -> StudySnapshot {
        let state = self.state.lock().await;
        StudySnapshot {
            status: state.status(&self.gaze.status()),
            session_id: state.session_id(),
            sample_count: state.buffer.len().await,
            calibration: state.calibration.progress(),
            audio: state.recorder.status(),
            response_count: state.responses.len(),
        }
    }

    pub async fn status(&self) -> StudyStatus {
        let state = self.state.lock().await;
        state.status(&self.gaze.status())
    }

    /// Begin a new session and start sampling. While recording, returns the
    /// current session id.
    pub async fn start_recording(&self) -> Result<String> {
        if !self.gaze.is_ready() {
            return Err(TrackerError::NotReady);
        }

        let mut state = self.state.lock().await;
        if state.sampler.is_active() {
            if let Some(id) = state.session_id() {
                return Ok(id);
            }
        }

        let clock = SessionClock::start();
        let session_id = clock.session_id().to_string();

        state.recorder.clear().await;
        state.recorder.attach_clock(clock.clone());

        let job = SamplingJob {
            sources: SampleSources {
                gaze: self.gaze.clone(),
                hit_tester: self.hit_tester.clone(),
                viewport: self.viewport.clone(),
                questions: self.questions.clone(),
                audio: state.recorder.subscribe(),
            },
            clock: clock.clone(),
            buffer: state.buffer.clone(),
            period: Duration::ZERO,
            events: self.events.clone(),
            progress_every: self.progress_every,
        };
        state.sampler.start(self.settings.sampling_hz, job).await?;

        state.session = Some(Session {
            id: session_id.clone(),
            started_at: clock.started_at(),
            stopped_at: None,
            status: SessionStatus::Recording,
        });
        state.clock = Some(clock);

        log_info!("recording session {session_id} started");
        self.events.publish(StudyEvent::RecordingStarted {
            session_id: session_id.clone(),
        });
        self.emit_status(&state);
        Ok(session_id)
    }

    /// Stop sampling (and any audio segment). Returns the session id, or
    /// `None` when nothing was recording.
    pub async fn stop_recording(&self) -> Result<Option<String>> {
        let mut state = self.state.lock().await;
        if !state.sampler.is_active() {
            return Ok(None);
        }

        if state.recorder.is_recording() {
            if let Err(err) = state.recorder.stop().await {
                log_warn!("audio segment lost while stopping recording: {err}");
            }
        }
        state.sampler.stop().await;

        let sample_count = state.buffer.len().await;
        let session_id = match state.session.as_mut() {
            Some(session) => {
                session.status = SessionStatus::Stopped;
                session.stopped_at = Some(Utc::now());
                session.id.clone()
            }
            None => {
                self.emit_status(&state);
                return Ok(None);
            }
        };

        log_info!("recording session {session_id} stopped with {sample_count} samples");
        self.events.publish(StudyEvent::RecordingStopped {
            session_id: session_id.clone(),
            sample_count,
        });
        self.emit_status(&state);
        Ok(Some(session_id))
    }

    /// Tear down the sampler, audio capture, buffers and calibration in one
    /// step. Questionnaire answers survive. The audio input stays open for
    /// the next session; `shutdown` releases it.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.sampler.stop().await;
        state.recorder.clear().await;
        state.buffer.clear().await;
        state.calibration.reset();
        state.session = None;
        state.clock = None;

        log_info!("study session reset");
        self.events.publish(StudyEvent::SessionReset);
        self.emit_status(&state);
    }

    pub async fn start_calibration(&self) -> Result<CalibrationProgress> {
        if !self.gaze.is_ready() {
            return Err(TrackerError::NotReady);
        }

        let mut state = self.state.lock().await;
        let viewport = self.viewport.get();
        state
            .calibration
            .begin(&viewport, self.settings.clicks_per_point);
        self.gaze.set_debug_overlay(false);

        let progress = state.calibration.progress();
        log_info!(
            "calibration started: {} points x {} clicks on {}x{} viewport",
            progress.total_points, progress.clicks_per_point, viewport.width, viewport.height
        );
        self.events
            .publish(StudyEvent::CalibrationProgress(progress.clone()));
        self.emit_status(&state);
        Ok(progress)
    }

    /// Count a click on the current calibration target. `None` when not
    /// calibrating.
    pub async fn calibration_click(&self, x: f64, y: f64) -> Option<CalibrationProgress> {
        let mut state = self.state.lock().await;
        let outcome = state.calibration.click()?;
        self.gaze.record_calibration_click(x, y);

        let progress = state.calibration.progress();
        self.events
            .publish(StudyEvent::CalibrationProgress(progress.clone()));
        if outcome == ClickOutcome::Completed {
            log_info!("calibration complete");
            self.events.publish(StudyEvent::CalibrationComplete);
            self.emit_status(&state);
        }
        Some(progress)
    }

    pub async fn cancel_calibration(&self) {
        let mut state = self.state.lock().await;
        state.calibration.reset();
        self.events
            .publish(StudyEvent::CalibrationProgress(state.calibration.progress()));
        self.emit_status(&state);
    }

    /// Start an audio segment tagged with the question on screen. Only
    /// allowed while recording gaze.
    pub async fn start_audio(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        if !state.sampler.is_active() {
            return Err(TrackerError::NotRecording);
        }
        let session_id = state.session_id().ok_or(TrackerError::NotRecording)?;
        let metadata = SegmentMetadata {
            question_id: self.questions.current_question_id(),
            session_id,
        };
        state.recorder.start(metadata).await
    }

    pub async fn stop_audio(&self) -> Result<Option<AudioSegment>> {
        let mut state = self.state.lock().await;
        state.recorder.stop().await
    }

    pub async fn audio_segments(&self) -> Vec<AudioSegment> {
        let state = self.state.lock().await;
        state.recorder.segments().to_vec()
    }

    pub async fn record_answer(&self, answer: AnswerEvent) {
        let mut state = self.state.lock().await;
        let session_id = state.session_id();
        let t_ms = state.clock.as_ref().map(SessionClock::elapsed_ms);
        state.responses.record(answer, session_id, t_ms);
    }

    pub async fn set_demographics<I, K, V>(&self, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut state = self.state.lock().await;
        state.responses.set_demographics(fields);
    }

    pub async fn export_gaze(&self) -> Result<Option<PathBuf>> {
        let (session_id, rows) = {
            let state = self.state.lock().await;
            let Some(session_id) = state.session_id() else {
                return Ok(None);
            };
            (session_id, state.buffer.snapshot().await)
        };
        let exporter = self.exporter();
        blocking(move || exporter.gaze_samples(&session_id, &rows)).await
    }

    /// Segment log plus one payload file per sealed segment.
    pub async fn export_audio(&self) -> Result<(Option<PathBuf>, Vec<PathBuf>)> {
        let (session_id, segments, handles) = {
            let state = self.state.lock().await;
            let Some(session_id) = state.session_id() else {
                return Ok((None, Vec::new()));
            };
            let segments = state.recorder.segments().to_vec();
            let handles: Vec<_> = state.recorder.download_handles().cloned().collect();
            (session_id, segments, handles)
        };

        let exporter = self.exporter();
        blocking(move || {
            let log = exporter.audio_segment_log(&session_id, &segments)?;
            let mut payloads = Vec::with_capacity(handles.len());
            for handle in &handles {
                if let Some(path) = exporter.audio_payload(handle)? {
                    payloads.push(path);
                }
            }
            Ok((log, payloads))
        })
        .await
    }

    pub async fn export_responses(&self) -> Result<Option<PathBuf>> {
        let rows = self.state.lock().await.responses.ordered();
        let exporter = self.exporter();
        blocking(move || exporter.responses(&rows)).await
    }

    pub async fn export_demographics(&self) -> Result<Option<PathBuf>> {
        let record = {
            let state = self.state.lock().await;
            state
                .responses
                .demographics_record(state.session_id().as_deref())
        };
        let exporter = self.exporter();
        blocking(move || exporter.demographics(&record)).await
    }

    pub async fn export_all(&self) -> Result<ExportSummary> {
        let gaze = self.export_gaze().await?;
        let (audio_log, audio_payloads) = self.export_audio().await?;
        let responses = self.export_responses().await?;
        let demographics = self.export_demographics().await?;
        Ok(ExportSummary {
            gaze,
            audio_log,
            audio_payloads,
            responses,
            demographics,
        })
    }

    /// Stop everything and release the audio device.
    pub async fn shutdown(&self) {
        if let Err(err) = self.stop_recording().await {
            log_error!("failed to stop recording during shutdown: {err}");
        }
        let mut state = self.state.lock().await;
        state.recorder.dispose().await;
    }

    fn exporter(&self) -> Exporter {
        Exporter::new(self.settings.export_dir.clone())
    }

    fn emit_status(&self, state: &SessionState) {
        self.events
            .publish(StudyEvent::StatusChanged(state.status(&self.gaze.status())));
    }
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|err| {
        TrackerError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("export worker failed: {err}"),
        ))
    })?
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tokio::time::{self, Duration};

    use super::*;
    use crate::audio::{SyntheticBackend, UnsupportedBackend};
    use crate::calibration::CalibrationPhase;
    use crate::gaze::source::test_support::ManualEngine;
    use crate::gaze::BlankHitTester;
    use crate::models::Viewport;
    use crate::ui::ActiveQuestion;

    struct Rig {
        controller: StudyController,
        engine: Arc<ManualEngine>,
        question: ActiveQuestion,
        _dir: tempfile::TempDir,
    }

    fn rig_with(engine: ManualEngine, audio_backend: Arc<dyn AudioBackend>) -> Rig {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(engine);
        let question = ActiveQuestion::new();
        let settings = StudySettings {
            sampling_hz: 20.0,
            clicks_per_point: 2,
            export_dir: dir.path().join("exports"),
            ..StudySettings::default()
        };
        let controller = StudyController::new(
            Collaborators {
                engine: engine.clone(),
                hit_tester: Arc::new(BlankHitTester),
                viewport: SharedViewport::new(Viewport::new(1000.0, 500.0)),
                questions: Arc::new(question.clone()),
                audio_backend,
            },
            settings,
        );
        Rig {
            controller,
            engine,
            question,
            _dir: dir,
        }
    }

    fn rig() -> Rig {
        rig_with(ManualEngine::default(), Arc::new(SyntheticBackend::new()))
    }

    #[tokio::test]
    async fn nothing_starts_until_the_engine_is_ready() {
        let rig = rig_with(
            ManualEngine::failing("no webcam"),
            Arc::new(SyntheticBackend::new()),
        );
        assert!(matches!(
            rig.controller.start_recording().await,
            Err(TrackerError::NotReady)
        ));

        let err = rig.controller.initialize().await.unwrap_err();
        assert!(matches!(err, TrackerError::EstimatorUnavailable(_)));
        assert_eq!(
            rig.controller.status().await,
            StudyStatus::NotReady {
                reason: Some("no webcam".into())
            }
        );
        assert!(matches!(
            rig.controller.start_calibration().await,
            Err(TrackerError::NotReady)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn recording_collects_rows_and_start_is_idempotent() {
        let rig = rig();
        rig.controller.initialize().await.unwrap();
        rig.controller.gaze().feed().push(250.0, 125.0);

        let first = rig.controller.start_recording().await.unwrap();
        let second = rig.controller.start_recording().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(rig.controller.status().await, StudyStatus::Recording);

        time::sleep(Duration::from_millis(520)).await;
        assert_eq!(rig.controller.stop_recording().await.unwrap(), Some(first.clone()));
        assert_eq!(rig.controller.stop_recording().await.unwrap(), None);

        let snapshot = rig.controller.snapshot().await;
        assert_eq!(snapshot.status, StudyStatus::Ready);
        assert_eq!(snapshot.session_id.as_deref(), Some(first.as_str()));
        assert!(snapshot.sample_count >= 10, "got {}", snapshot.sample_count);

        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(rig.controller.snapshot().await.sample_count, snapshot.sample_count);
    }

    #[tokio::test(start_paused = true)]
    async fn audio_is_tagged_with_the_question_on_screen() {
        let rig = rig();
        rig.controller.initialize().await.unwrap();
        assert!(matches!(
            rig.controller.start_audio().await,
            Err(TrackerError::NotRecording)
        ));

        let session_id = rig.controller.start_recording().await.unwrap();
        rig.question.set(Some("q4".into()));
        let first = rig.controller.start_audio().await.unwrap();
        let again = rig.controller.start_audio().await.unwrap();
        assert_eq!(first, again);

        time::sleep(Duration::from_millis(300)).await;
        let segment = rig.controller.stop_audio().await.unwrap().unwrap();
        assert_eq!(segment.id, first);
        assert_eq!(segment.metadata.question_id.as_deref(), Some("q4"));
        assert_eq!(segment.metadata.session_id, session_id);
        assert_eq!(rig.controller.audio_segments().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_microphone_does_not_block_gaze_recording() {
        let rig = rig_with(ManualEngine::default(), Arc::new(UnsupportedBackend));
        rig.controller.initialize().await.unwrap();
        rig.controller.start_recording().await.unwrap();

        let err = rig.controller.start_audio().await.unwrap_err();
        assert!(err.is_audio());
        let snapshot = rig.controller.snapshot().await;
        assert_eq!(snapshot.status, StudyStatus::Recording);
        assert!(snapshot.audio.unsupported);
    }

    #[tokio::test]
    async fn calibration_completes_after_every_point_is_confirmed() {
        let rig = rig();
        rig.controller.initialize().await.unwrap();
        assert!(rig.controller.calibration_click(1.0, 1.0).await.is_none());

        let mut events = rig.controller.subscribe();
        let progress = rig.controller.start_calibration().await.unwrap();
        assert_eq!(progress.total_points, 9);
        assert_eq!(*rig.engine.overlay.lock().unwrap(), Some(false));
        assert_eq!(rig.controller.status().await, StudyStatus::Calibrating);

        for _ in 0..18 {
            rig.controller.calibration_click(10.0, 20.0).await.unwrap();
        }
        assert_eq!(rig.engine.clicks.lock().unwrap().len(), 18);
        assert_eq!(
            rig.controller.snapshot().await.calibration.phase,
            CalibrationPhase::Done
        );
        assert!(rig.controller.calibration_click(10.0, 20.0).await.is_none());

        let mut completions = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, StudyEvent::CalibrationComplete) {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_rows_segments_and_calibration_together() {
        let rig = rig();
        rig.controller.initialize().await.unwrap();
        rig.controller.gaze().feed().push(10.0, 10.0);
        rig.controller.start_calibration().await.unwrap();
        rig.controller.calibration_click(0.0, 0.0).await;

        rig.controller.start_recording().await.unwrap();
        rig.controller.start_audio().await.unwrap();
        time::sleep(Duration::from_millis(200)).await;
        rig.controller.stop_audio().await.unwrap();
        rig.controller.start_audio().await.unwrap();
        rig.controller
            .record_answer(AnswerEvent {
                question_id: "q1".into(),
                option_index: Some(1),
                option_text: None,
                free_text: None,
            })
            .await;

        rig.controller.reset().await;

        let snapshot = rig.controller.snapshot().await;
        assert_eq!(snapshot.status, StudyStatus::Ready);
        assert_eq!(snapshot.session_id, None);
        assert_eq!(snapshot.sample_count, 0);
        assert_eq!(snapshot.calibration.phase, CalibrationPhase::Idle);
        assert!(!snapshot.audio.recording);
        assert_eq!(snapshot.audio.segment_count, 0);
        assert!(rig.controller.audio_segments().await.is_empty());
        assert_eq!(snapshot.response_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn export_all_writes_one_file_per_kind() {
        let rig = rig();
        rig.controller.initialize().await.unwrap();

        let empty = rig.controller.export_all().await.unwrap();
        assert_eq!(empty.written(), 0);
        assert!(!rig.controller.settings().export_dir.exists());

        rig.controller.gaze().feed().push(500.0, 250.0);
        let session_id = rig.controller.start_recording().await.unwrap();
        rig.question.set(Some("q1".into()));
        rig.controller.start_audio().await.unwrap();
        time::sleep(Duration::from_millis(400)).await;
        rig.controller.stop_audio().await.unwrap();
        rig.controller
            .record_answer(AnswerEvent {
                question_id: "q1".into(),
                option_index: Some(2),
                option_text: Some("agree".into()),
                free_text: None,
            })
            .await;
        rig.controller.stop_recording().await.unwrap();
        rig.controller.set_demographics([("age", "40")]).await;

        let summary = rig.controller.export_all().await.unwrap();
        assert_eq!(summary.written(), 5);

        let gaze = fs::read_to_string(summary.gaze.unwrap()).unwrap();
        let mut lines = gaze.lines();
        assert!(lines.next().unwrap().starts_with("session_id,t_ms,x,y,x_norm,y_norm"));
        let first_row = lines.next().unwrap();
        assert!(first_row.starts_with(&format!("{session_id},")));
        assert!(first_row.contains(",500.0,250.0,0.5,0.5,"));

        let responses = fs::read_to_string(summary.responses.unwrap()).unwrap();
        assert!(responses.contains(",q1,2,agree,"));
        let demographics = fs::read_to_string(summary.demographics.unwrap()).unwrap();
        assert_eq!(demographics, format!("session_id,age\n{session_id},40"));
        assert_eq!(&fs::read(&summary.audio_payloads[0]).unwrap()[0..4], b"RIFF");
    }
}
