use std::sync::Mutex;

use log::{debug, info};
use rand::Rng;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::Viewport;

use super::source::{GazeEngine, GazeFeed};

/// Synthetic engine tracing a slow Lissajous path with a little jitter.
/// Stands in for a webcam estimator during development and in the demo.
pub struct SimulatedEngine {
    viewport: Viewport,
    update_interval: Duration,
    cancel_token: Mutex<Option<CancellationToken>>,
}

impl SimulatedEngine {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            update_interval: Duration::from_millis(33),
            cancel_token: Mutex::new(None),
        }
    }

    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    pub fn shutdown(&self) {
        if let Some(token) = self.lock_token().take() {
            token.cancel();
        }
    }

    fn lock_token(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        match self.cancel_token.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl GazeEngine for SimulatedEngine {
    fn name(&self) -> &str {
        "simulated"
    }

    fn start(&self, feed: GazeFeed) -> Result<(), String> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| "simulated engine needs a running tokio runtime".to_string())?;

        let mut slot = self.lock_token();
        if slot.is_some() {
            return Ok(());
        }

        let token = CancellationToken::new();
        let token_clone = token.clone();
        let viewport = self.viewport;
        let interval = self.update_interval;

        runtime.spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut phase: f64 = 0.0;
            loop {
                tokio::select! {
                    _ = token_clone.cancelled() => break,
                    _ = ticker.tick() => {
                        phase += 0.05;
                        let (jx, jy) = {
                            let mut rng = rand::thread_rng();
                            (rng.gen_range(-4.0..4.0), rng.gen_range(-4.0..4.0))
                        };
                        let x = viewport.width * (0.5 + 0.4 * (phase * 0.7).sin()) + jx;
                        let y = viewport.height * (0.5 + 0.4 * (phase * 1.1).cos()) + jy;
                        feed.push(x, y);
                    }
                }
            }
            debug!("simulated gaze feed stopped");
        });

        info!(
            "simulated gaze engine pushing every {}ms",
            interval.as_millis()
        );
        *slot = Some(token);
        Ok(())
    }

    fn record_calibration_click(&self, x: f64, y: f64) {
        debug!("simulated engine calibration click at ({x:.1}, {y:.1})");
    }

    fn set_debug_overlay(&self, visible: bool) {
        debug!("simulated engine overlay visible={visible}");
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
