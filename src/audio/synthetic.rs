use log::debug;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TrackerError};

use super::brown_noise::BrownNoise;
use super::device::{AudioBackend, AudioEvent, AudioEventSender, AudioInput, CaptureFormat};

const SYNTHETIC_SAMPLE_RATE: u32 = 16_000;

/// Brown-noise "microphone" delivering chunks at jittered intervals, the
/// way a real encoder hands out data irregularly.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    sample_rate: u32,
    min_chunk_ms: u64,
    max_chunk_ms: u64,
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self {
            sample_rate: SYNTHETIC_SAMPLE_RATE,
            min_chunk_ms: 40,
            max_chunk_ms: 160,
        }
    }
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioBackend for SyntheticBackend {
    fn open(&self) -> Result<Box<dyn AudioInput>> {
        debug!("opening synthetic audio input at {} Hz", self.sample_rate);
        Ok(Box::new(SyntheticInput {
            config: self.clone(),
            flush_token: None,
            task: None,
        }))
    }
}

pub struct SyntheticInput {
    config: SyntheticBackend,
    flush_token: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl AudioInput for SyntheticInput {
    fn format(&self) -> CaptureFormat {
        CaptureFormat::pcm16_wav(self.config.sample_rate, 1)
    }

    fn begin(&mut self, events: AudioEventSender) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| TrackerError::DeviceError("no async runtime for capture".into()))?;

        self.end();

        let token = CancellationToken::new();
        let flush = token.clone();
        let config = self.config.clone();

        let task = runtime.spawn(async move {
            let mut noise = BrownNoise::new();
            let mut last = Instant::now();

            loop {
                let wait = rand::thread_rng().gen_range(config.min_chunk_ms..=config.max_chunk_ms);
                let flushing = tokio::select! {
                    biased;
                    _ = flush.cancelled() => true,
                    _ = time::sleep(Duration::from_millis(wait)) => false,
                };

                let now = Instant::now();
                let elapsed = now.saturating_duration_since(last);
                last = now;
                let count = (elapsed.as_secs_f64() * config.sample_rate as f64).round() as usize;
                if count > 0 && events.send(AudioEvent::Chunk(noise.pcm16(count))).is_err() {
                    break;
                }

                if flushing {
                    let _ = events.send(AudioEvent::Flushed);
                    break;
                }
            }
        });

        self.flush_token = Some(token);
        self.task = Some(task);
        Ok(())
    }

    fn end(&mut self) {
        if let Some(token) = self.flush_token.take() {
            token.cancel();
        }
        // The task finishes on its own once it has flushed.
        self.task.take();
    }

    fn release(&mut self) {
        self.end();
        debug!("synthetic audio input released");
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn delivers_chunks_then_flush_marker() {
        let mut input = SyntheticBackend::new().open().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        input.begin(tx).unwrap();

        time::sleep(Duration::from_millis(500)).await;
        input.end();

        let mut bytes = 0;
        let mut flushed = false;
        while let Some(event) = rx.recv().await {
            match event {
                AudioEvent::Chunk(chunk) => bytes += chunk.len(),
                AudioEvent::Flushed => {
                    flushed = true;
                    break;
                }
                AudioEvent::Error(message) => panic!("unexpected error {message}"),
            }
        }

        assert!(flushed);
        // 500ms of 16kHz mono 16-bit audio
        assert_eq!(bytes, 16_000);
    }
}
