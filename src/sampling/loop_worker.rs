use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    audio::AudioStatus,
    events::{EventBus, StudyEvent},
    gaze::{GazeSourceAdapter, HitTester},
    models::GazeSample,
    ui::{QuestionSource, SharedViewport},
};

use super::clock::SessionClock;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// In-memory rows of the current session. The sampler task is the only
/// writer while recording.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    rows: Arc<Mutex<Vec<GazeSample>>>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append and return the new length.
    pub async fn push(&self, sample: GazeSample) -> usize {
        let mut rows = self.rows.lock().await;
        rows.push(sample);
        rows.len()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<GazeSample> {
        self.rows.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.rows.lock().await.clear();
    }
}

/// Everything a tick reads. None of it is owned by the sampler.
#[derive(Clone)]
pub struct SampleSources {
    pub gaze: GazeSourceAdapter,
    pub hit_tester: Arc<dyn HitTester>,
    pub viewport: SharedViewport,
    pub questions: Arc<dyn QuestionSource>,
    pub audio: watch::Receiver<AudioStatus>,
}

impl SampleSources {
    /// Assemble one row, or `None` when the engine has not produced a point.
    pub fn sample(&self, clock: &SessionClock) -> Option<GazeSample> {
        let point = self.gaze.latest()?;

        let viewport = self.viewport.get();
        let (x, y) = viewport.clamp(point.x, point.y);
        let (x_norm, y_norm) = viewport.normalize(x, y);
        let context = self.hit_tester.resolve(x, y);
        let question_id = self.questions.current_question_id();
        let t_ms = clock.elapsed_ms();

        let audio = self.audio.borrow().clone();
        let (audio_segment_id, audio_t_ms) = if audio.recording {
            (audio.segment_id, audio.last_activity_ms)
        } else {
            (None, None)
        };

        Some(GazeSample {
            session_id: clock.session_id().to_string(),
            t_ms,
            x,
            y,
            x_norm,
            y_norm,
            scroll_x: viewport.scroll_x,
            scroll_y: viewport.scroll_y,
            question_id,
            audio_recording: audio.recording,
            audio_segment_id,
            audio_t_ms,
            content_id: context.content_id,
            content_type: context.content_type,
            element_tag: context.element_tag,
            element_id: context.element_id,
            element_class: context.element_class,
            bbox_x: context.bounds.map(|b| b.x),
            bbox_y: context.bounds.map(|b| b.y),
            bbox_w: context.bounds.map(|b| b.width),
            bbox_h: context.bounds.map(|b| b.height),
        })
    }
}

pub struct SamplingJob {
    pub sources: SampleSources,
    pub clock: SessionClock,
    pub buffer: SampleBuffer,
    pub period: Duration,
    pub events: EventBus,
    pub progress_every: usize,
}

pub async fn sampling_loop(job: SamplingJob, cancel_token: CancellationToken) {
    let SamplingJob {
        sources,
        clock,
        buffer,
        period,
        events,
        progress_every,
    } = job;

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut skipped: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!(
                    "sampling loop for session {} shutting down ({} ticks without gaze)",
                    clock.session_id(),
                    skipped
                );
                break;
            }
            _ = ticker.tick() => {
                let Some(sample) = sources.sample(&clock) else {
                    skipped += 1;
                    if skipped == 1 {
                        log_warn!("no gaze point yet for session {}; skipping ticks", clock.session_id());
                    }
                    continue;
                };

                let count = buffer.push(sample).await;
                if progress_every > 0 && count % progress_every == 0 {
                    events.publish(StudyEvent::SampleProgress {
                        session_id: clock.session_id().to_string(),
                        sample_count: count,
                    });
                }
            }
        }
    }
}
