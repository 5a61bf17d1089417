use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Most recent gaze estimate pushed by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazePoint {
    pub x: f64,
    pub y: f64,
    pub ts: Instant,
}

impl GazePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ts: Instant::now(),
        }
    }
}

/// Geometry of the rendered surface the participant looks at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Clamp a point into `[0, width] x [0, height]`.
    pub fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        let max_x = self.width.max(0.0);
        let max_y = self.height.max(0.0);
        (clamp_axis(x, max_x), clamp_axis(y, max_y))
    }

    /// Normalized position in `[0, 1]`, `None` for a degenerate axis.
    pub fn normalize(&self, x: f64, y: f64) -> (Option<f64>, Option<f64>) {
        let nx = (self.width > 0.0).then(|| x / self.width);
        let ny = (self.height > 0.0).then(|| y / self.height);
        (nx, ny)
    }
}

fn clamp_axis(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, max)
}

/// One exported gaze row. Field order is the CSV column order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GazeSample {
    pub session_id: String,
    pub t_ms: u64,
    pub x: f64,
    pub y: f64,
    pub x_norm: Option<f64>,
    pub y_norm: Option<f64>,
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub question_id: Option<String>,
    pub audio_recording: bool,
    pub audio_segment_id: Option<String>,
    pub audio_t_ms: Option<u64>,
    pub content_id: Option<String>,
    pub content_type: Option<String>,
    pub element_tag: Option<String>,
    pub element_id: Option<String>,
    pub element_class: Option<String>,
    pub bbox_x: Option<f64>,
    pub bbox_y: Option<f64>,
    pub bbox_w: Option<f64>,
    pub bbox_h: Option<f64>,
}
