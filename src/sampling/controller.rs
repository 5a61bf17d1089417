use log::{error, info};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, TrackerError};

use super::loop_worker::{sampling_loop, SamplingJob};

/// Shortest tick period regardless of requested frequency.
pub const MIN_TICK_PERIOD_MS: u64 = 10;

/// `max(10ms, round(1000 / hz))`.
pub fn tick_period(frequency_hz: f64) -> Result<Duration> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return Err(TrackerError::InvalidFrequency(frequency_hz));
    }
    let period_ms = (1000.0 / frequency_hz).round() as u64;
    Ok(Duration::from_millis(period_ms.max(MIN_TICK_PERIOD_MS)))
}

/// Owns the sampler task. At most one task runs at a time.
#[derive(Default)]
pub struct SamplerController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    period: Option<Duration>,
}

impl SamplerController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Start ticking at `frequency_hz`. Starting while active keeps the
    /// running task and returns its period; a new frequency needs
    /// stop + start. The job's buffer is cleared before the first tick.
    pub async fn start(&mut self, frequency_hz: f64, job: SamplingJob) -> Result<Duration> {
        if let Some(period) = self.period.filter(|_| self.handle.is_some()) {
            return Ok(period);
        }

        let period = tick_period(frequency_hz)?;
        let job = SamplingJob { period, ..job };
        job.buffer.clear().await;

        info!(
            "sampler starting for session {} at {:.1} Hz ({}ms period)",
            job.clock.session_id(),
            frequency_hz,
            period.as_millis()
        );

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sampling_loop(job, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.period = Some(period);
        Ok(period)
    }

    /// Cancel the task and wait for it, so no row lands after this returns.
    pub async fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.period = None;

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                error!("sampler task failed to join: {err}");
            }
        }
    }
}
