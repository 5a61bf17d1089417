use std::sync::{Arc, RwLock};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{Result, TrackerError};
use crate::models::GazePoint;

/// External gaze estimation engine. Once started it pushes estimates through
/// the given feed at its own, possibly irregular, rate.
pub trait GazeEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Start estimating. Errors are reported as the unavailability reason.
    fn start(&self, feed: GazeFeed) -> std::result::Result<(), String>;

    /// A known screen target the participant is looking at and clicked.
    fn record_calibration_click(&self, x: f64, y: f64);

    fn set_debug_overlay(&self, visible: bool);
}

/// Write side of the single-slot gaze mailbox. Cloned into engine callbacks.
#[derive(Clone)]
pub struct GazeFeed {
    tx: Arc<watch::Sender<Option<GazePoint>>>,
}

impl GazeFeed {
    /// Overwrite the slot; earlier unread points are dropped.
    pub fn push(&self, x: f64, y: f64) {
        self.push_point(GazePoint::new(x, y));
    }

    pub fn push_point(&self, point: GazePoint) {
        self.tx.send_replace(Some(point));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "reason")]
pub enum AdapterStatus {
    Uninitialized,
    Ready,
    Failed(String),
}

/// Wraps a gaze engine and retains only its most recent estimate.
#[derive(Clone)]
pub struct GazeSourceAdapter {
    engine: Arc<dyn GazeEngine>,
    feed: GazeFeed,
    latest: watch::Receiver<Option<GazePoint>>,
    status: Arc<RwLock<AdapterStatus>>,
}

impl GazeSourceAdapter {
    pub fn new(engine: Arc<dyn GazeEngine>) -> Self {
        let (tx, rx) = watch::channel(None);
        Self {
            engine,
            feed: GazeFeed { tx: Arc::new(tx) },
            latest: rx,
            status: Arc::new(RwLock::new(AdapterStatus::Uninitialized)),
        }
    }

    /// Start the engine. A failure is kept as the adapter status and returned;
    /// calling again retries.
    pub fn initialize(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        match self.engine.start(self.feed.clone()) {
            Ok(()) => {
                info!("gaze engine '{}' ready", self.engine.name());
                self.set_status(AdapterStatus::Ready);
                Ok(())
            }
            Err(reason) => {
                warn!(
                    "gaze engine '{}' unavailable: {}",
                    self.engine.name(),
                    reason
                );
                self.set_status(AdapterStatus::Failed(reason.clone()));
                Err(TrackerError::EstimatorUnavailable(reason))
            }
        }
    }

    pub fn status(&self) -> AdapterStatus {
        match self.status.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status() == AdapterStatus::Ready
    }

    pub fn latest(&self) -> Option<GazePoint> {
        *self.latest.borrow()
    }

    pub fn feed(&self) -> GazeFeed {
        self.feed.clone()
    }

    pub fn record_calibration_click(&self, x: f64, y: f64) {
        self.engine.record_calibration_click(x, y);
    }

    pub fn set_debug_overlay(&self, visible: bool) {
        self.engine.set_debug_overlay(visible);
    }

    fn set_status(&self, status: AdapterStatus) {
        match self.status.write() {
            Ok(mut guard) => *guard = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::*;

    /// Engine stand-in that records calls and never pushes on its own.
    #[derive(Default)]
    pub struct ManualEngine {
        pub fail_with: Mutex<Option<String>>,
        pub clicks: Mutex<Vec<(f64, f64)>>,
        pub overlay: Mutex<Option<bool>>,
        pub feed: Mutex<Option<GazeFeed>>,
    }

    impl ManualEngine {
        pub fn failing(reason: &str) -> Self {
            let engine = Self::default();
            *engine.fail_with.lock().unwrap() = Some(reason.to_string());
            engine
        }
    }

    impl GazeEngine for ManualEngine {
        fn name(&self) -> &str {
            "manual"
        }

        fn start(&self, feed: GazeFeed) -> std::result::Result<(), String> {
            if let Some(reason) = self.fail_with.lock().unwrap().clone() {
                return Err(reason);
            }
            *self.feed.lock().unwrap() = Some(feed);
            Ok(())
        }

        fn record_calibration_click(&self, x: f64, y: f64) {
            self.clicks.lock().unwrap().push((x, y));
        }

        fn set_debug_overlay(&self, visible: bool) {
            *self.overlay.lock().unwrap() = Some(visible);
        }
    }
}
