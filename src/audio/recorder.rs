use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Result, TrackerError};
use crate::events::{EventBus, StudyEvent};
use crate::models::{AudioSegment, SegmentMetadata};
use crate::sampling::SessionClock;

use super::device::{AudioBackend, AudioEvent, AudioInput, CaptureFormat, Container};
use super::wav;

/// Audio state published to the sampler and the UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStatus {
    pub recording: bool,
    pub segment_id: Option<String>,
    /// Session-relative ms of the last liveness tick while recording.
    pub last_activity_ms: Option<u64>,
    pub error: Option<String>,
    pub unsupported: bool,
    pub segment_count: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RecorderConfig {
    pub liveness_interval: Duration,
    pub flush_timeout: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            liveness_interval: Duration::from_millis(50),
            flush_timeout: Duration::from_secs(2),
        }
    }
}

/// Exportable payload of a sealed segment. Released when the recorder is
/// cleared or disposed.
#[derive(Debug, Clone)]
pub struct DownloadHandle {
    pub segment_id: String,
    pub filename: String,
    pub payload: Arc<[u8]>,
}

type Collected = std::result::Result<Vec<Vec<u8>>, String>;

struct ActiveSegment {
    id: String,
    metadata: SegmentMetadata,
    start_ms: u64,
    format: CaptureFormat,
    collector: JoinHandle<Collected>,
    liveness_token: CancellationToken,
    liveness: JoinHandle<()>,
}

impl ActiveSegment {
    fn abort(self) {
        self.liveness_token.cancel();
        self.liveness.abort();
        self.collector.abort();
    }
}

/// Records audio segments against the current session clock.
pub struct AudioSegmentRecorder {
    backend: Arc<dyn AudioBackend>,
    config: RecorderConfig,
    events: EventBus,
    status: Arc<watch::Sender<AudioStatus>>,
    input: Option<Box<dyn AudioInput>>,
    clock: Option<SessionClock>,
    active: Option<ActiveSegment>,
    segments: Vec<AudioSegment>,
    handles: HashMap<String, DownloadHandle>,
}

impl AudioSegmentRecorder {
    pub fn new(backend: Arc<dyn AudioBackend>, config: RecorderConfig, events: EventBus) -> Self {
        let (status, _) = watch::channel(AudioStatus::default());
        Self {
            backend,
            config,
            events,
            status: Arc::new(status),
            input: None,
            clock: None,
            active: None,
            segments: Vec::new(),
            handles: HashMap::new(),
        }
    }

    /// Timestamps of later segments are relative to `clock`.
    pub fn attach_clock(&mut self, clock: SessionClock) {
        self.clock = Some(clock);
    }

    pub fn subscribe(&self) -> watch::Receiver<AudioStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> AudioStatus {
        self.status.borrow().clone()
    }

    pub fn is_recording(&self) -> bool {
        self.status.borrow().recording
    }

    pub fn last_activity_ms(&self) -> Option<u64> {
        self.status.borrow().last_activity_ms
    }

    pub fn segments(&self) -> &[AudioSegment] {
        &self.segments
    }

    pub fn download_handle(&self, segment_id: &str) -> Option<&DownloadHandle> {
        self.handles.get(segment_id)
    }

    pub fn download_handles(&self) -> impl Iterator<Item = &DownloadHandle> {
        self.segments
            .iter()
            .filter_map(|segment| self.handles.get(&segment.id))
    }

    pub fn open_handle_count(&self) -> usize {
        self.handles.len()
    }

    /// Begin a segment. While one is in progress its id is returned again.
    pub async fn start(&mut self, metadata: SegmentMetadata) -> Result<String> {
        if let Some(active) = &self.active {
            if self.is_recording() {
                return Ok(active.id.clone());
            }
        }
        // A segment interrupted by a device error is still parked here.
        self.reap_failed().await;

        let clock = self.clock.clone().ok_or(TrackerError::NotRecording)?;

        if self.input.is_none() {
            match self.backend.open() {
                Ok(input) => self.input = Some(input),
                Err(err) => {
                    self.report_error(&err);
                    return Err(err);
                }
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let begun = match self.input.as_mut() {
            Some(input) => input.begin(tx).map(|_| input.format()),
            None => Err(TrackerError::DeviceUnsupported),
        };
        let format = match begun {
            Ok(format) => format,
            Err(err) => {
                self.release_input();
                self.report_error(&err);
                return Err(err);
            }
        };

        let id = Uuid::new_v4().to_string();
        let start_ms = clock.elapsed_ms();
        let liveness_token = CancellationToken::new();

        let collector = tokio::spawn(collect_chunks(
            rx,
            self.status.clone(),
            self.events.clone(),
            id.clone(),
            liveness_token.clone(),
        ));
        let liveness = tokio::spawn(liveness_loop(
            clock,
            self.status.clone(),
            self.config.liveness_interval,
            liveness_token.clone(),
        ));

        self.status.send_modify(|status| {
            status.recording = true;
            status.segment_id = Some(id.clone());
            status.last_activity_ms = Some(start_ms);
            status.error = None;
            status.unsupported = false;
        });
        self.publish_status();

        info!(
            "audio segment {} started at {}ms (question {:?})",
            id, start_ms, metadata.question_id
        );

        self.active = Some(ActiveSegment {
            id: id.clone(),
            metadata,
            start_ms,
            format,
            collector,
            liveness_token,
            liveness,
        });
        Ok(id)
    }

    /// Flush and seal the current segment. `Ok(None)` when nothing was
    /// recording.
    pub async fn stop(&mut self) -> Result<Option<AudioSegment>> {
        let Some(mut active) = self.active.take() else {
            return Ok(None);
        };

        let stop_ms = self
            .clock
            .as_ref()
            .map(SessionClock::elapsed_ms)
            .unwrap_or(active.start_ms);

        if let Some(input) = self.input.as_mut() {
            input.end();
        }

        let collected = time::timeout(self.config.flush_timeout, &mut active.collector).await;
        active.liveness_token.cancel();
        let _ = (&mut active.liveness).await;

        let chunks = match collected {
            Ok(Ok(Ok(chunks))) => chunks,
            Ok(Ok(Err(message))) => {
                // Already reported by the collector.
                self.release_input();
                return Err(TrackerError::DeviceError(message));
            }
            Ok(Err(join_err)) => {
                let err = TrackerError::DeviceError(format!("audio collector failed: {join_err}"));
                self.release_input();
                self.report_error(&err);
                return Err(err);
            }
            Err(_) => {
                active.collector.abort();
                let err = TrackerError::DeviceError(format!(
                    "audio flush timed out after {}ms",
                    self.config.flush_timeout.as_millis()
                ));
                self.release_input();
                self.report_error(&err);
                return Err(err);
            }
        };

        let pcm: Vec<u8> = chunks.concat();
        let payload = match active.format.container {
            Container::Passthrough => pcm,
            Container::WavPcm16 => {
                match wav::encode_pcm16(&pcm, active.format.sample_rate, active.format.channels) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        self.report_error(&err);
                        return Err(err);
                    }
                }
            }
        };

        let segment = AudioSegment {
            id: active.id.clone(),
            start_ms: active.start_ms,
            stop_ms,
            duration_ms: stop_ms.saturating_sub(active.start_ms),
            mime_type: active.format.mime_type.clone(),
            payload: Arc::from(payload),
            metadata: active.metadata,
        };

        self.handles.insert(
            segment.id.clone(),
            DownloadHandle {
                segment_id: segment.id.clone(),
                filename: segment.filename(),
                payload: segment.payload.clone(),
            },
        );
        self.segments.push(segment.clone());

        let segment_count = self.segments.len();
        self.status.send_modify(|status| {
            status.recording = false;
            status.segment_id = None;
            status.last_activity_ms = Some(stop_ms);
            status.segment_count = segment_count;
        });
        self.publish_status();

        info!(
            "audio segment {} sealed: {}ms, {} bytes",
            segment.id,
            segment.duration_ms,
            segment.payload.len()
        );
        Ok(Some(segment))
    }

    /// Drop any capture in progress, all segments and their handles.
    pub async fn clear(&mut self) {
        if let Some(active) = self.active.take() {
            if let Some(input) = self.input.as_mut() {
                input.end();
            }
            debug!("discarding in-progress audio segment {}", active.id);
            active.abort();
        }

        self.segments.clear();
        let released = self.handles.len();
        self.handles.clear();
        if released > 0 {
            debug!("released {released} audio download handle(s)");
        }

        let unsupported = self.status.borrow().unsupported;
        self.status.send_replace(AudioStatus {
            unsupported,
            ..AudioStatus::default()
        });
        self.publish_status();
    }

    /// `clear()` plus giving the input device back.
    pub async fn dispose(&mut self) {
        self.clear().await;
        self.release_input();
        self.clock = None;
    }

    async fn reap_failed(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.liveness_token.cancel();
        match active.collector.await {
            Ok(Ok(_)) => debug!("reaped audio segment {} without sealing", active.id),
            Ok(Err(message)) => debug!("dropped failed audio segment {}: {}", active.id, message),
            Err(err) => debug!("audio collector for {} did not join: {}", active.id, err),
        }
        active.liveness.abort();
        self.release_input();
    }

    fn release_input(&mut self) {
        if let Some(mut input) = self.input.take() {
            input.release();
        }
    }

    fn report_error(&self, err: &TrackerError) {
        warn!("audio recorder error: {err}");
        let unsupported = matches!(err, TrackerError::DeviceUnsupported);
        let message = err.to_string();
        self.status.send_modify(|status| {
            status.recording = false;
            status.segment_id = None;
            status.error = Some(message.clone());
            status.unsupported = unsupported;
        });
        self.events.publish(StudyEvent::AudioError { message });
        self.publish_status();
    }

    fn publish_status(&self) {
        self.events
            .publish(StudyEvent::AudioStatusChanged(self.status.borrow().clone()));
    }
}

impl Drop for AudioSegmentRecorder {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.abort();
        }
        self.release_input();
    }
}

async fn collect_chunks(
    mut rx: mpsc::UnboundedReceiver<AudioEvent>,
    status: Arc<watch::Sender<AudioStatus>>,
    events: EventBus,
    segment_id: String,
    liveness_token: CancellationToken,
) -> Collected {
    let mut chunks = Vec::new();

    let failure = loop {
        match rx.recv().await {
            Some(AudioEvent::Chunk(bytes)) => chunks.push(bytes),
            Some(AudioEvent::Flushed) => return Ok(chunks),
            Some(AudioEvent::Error(message)) => break message,
            None => break "audio input closed without flushing".to_string(),
        }
    };

    liveness_token.cancel();
    warn!("audio segment {segment_id} interrupted: {failure}");
    let message = TrackerError::DeviceError(failure.clone()).to_string();
    status.send_modify(|status| {
        if status.segment_id.as_deref() == Some(segment_id.as_str()) {
            status.recording = false;
            status.segment_id = None;
        }
        status.error = Some(message.clone());
    });
    events.publish(StudyEvent::AudioError { message });
    events.publish(StudyEvent::AudioStatusChanged(status.borrow().clone()));
    Err(failure)
}

async fn liveness_loop(
    clock: SessionClock,
    status: Arc<watch::Sender<AudioStatus>>,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let now_ms = clock.elapsed_ms();
                status.send_modify(|status| {
                    if status.recording {
                        status.last_activity_ms = Some(now_ms);
                    }
                });
            }
        }
    }
}
