use serde::{Deserialize, Serialize};

use crate::models::Viewport;

/// Grid fractions of width and height, visited row-major.
const GRID_FRACTIONS: [f64; 3] = [0.1, 0.5, 0.9];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CalibrationPhase {
    #[default]
    Idle,
    Calibrating,
    Done,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationTarget {
    pub x: f64,
    pub y: f64,
    pub confirm_clicks: u32,
}

/// What a click did to the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClickOutcome {
    /// Counted against the current target.
    Counted { point_index: usize, click_count: u32 },
    /// The target was satisfied; `point_index` is the new current target.
    Advanced { point_index: usize },
    /// The last target was satisfied.
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationProgress {
    pub phase: CalibrationPhase,
    pub point_index: usize,
    pub click_count: u32,
    pub clicks_per_point: u32,
    pub total_points: usize,
    pub current_target: Option<CalibrationTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationState {
    pub phase: CalibrationPhase,
    pub targets: Vec<CalibrationTarget>,
    pub point_index: usize,
    pub click_count: u32,
    pub clicks_per_point: u32,
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self {
            phase: CalibrationPhase::Idle,
            targets: Vec::new(),
            point_index: 0,
            click_count: 0,
            clicks_per_point: 1,
        }
    }
}

impl CalibrationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter calibration with a fresh grid. Any earlier progress is dropped.
    pub fn begin(&mut self, viewport: &Viewport, clicks_per_point: u32) {
        *self = Self {
            phase: CalibrationPhase::Calibrating,
            targets: grid_targets(viewport),
            point_index: 0,
            click_count: 0,
            clicks_per_point: clicks_per_point.max(1),
        };
    }

    /// Count one confirmation click on the current target. Ignored unless
    /// calibrating.
    pub fn click(&mut self) -> Option<ClickOutcome> {
        if self.phase != CalibrationPhase::Calibrating {
            return None;
        }
        let target = self.targets.get_mut(self.point_index)?;

        target.confirm_clicks += 1;
        self.click_count += 1;

        if self.click_count < self.clicks_per_point {
            return Some(ClickOutcome::Counted {
                point_index: self.point_index,
                click_count: self.click_count,
            });
        }

        self.click_count = 0;
        self.point_index += 1;

        if self.point_index >= self.targets.len() {
            self.phase = CalibrationPhase::Done;
            Some(ClickOutcome::Completed)
        } else {
            Some(ClickOutcome::Advanced {
                point_index: self.point_index,
            })
        }
    }

    pub fn current_target(&self) -> Option<CalibrationTarget> {
        match self.phase {
            CalibrationPhase::Calibrating => self.targets.get(self.point_index).copied(),
            _ => None,
        }
    }

    pub fn progress(&self) -> CalibrationProgress {
        CalibrationProgress {
            phase: self.phase,
            point_index: self.point_index,
            click_count: self.click_count,
            clicks_per_point: self.clicks_per_point,
            total_points: self.targets.len(),
            current_target: self.current_target(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 3x3 grid at 10%/50%/90% of each axis, row-major.
pub fn grid_targets(viewport: &Viewport) -> Vec<CalibrationTarget> {
    GRID_FRACTIONS
        .iter()
        .flat_map(|fy| {
            GRID_FRACTIONS.iter().map(move |fx| CalibrationTarget {
                x: (viewport.width * fx).round(),
                y: (viewport.height * fy).round(),
                confirm_clicks: 0,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_is_row_major_three_by_three() {
        let targets = grid_targets(&Viewport::new(1000.0, 500.0));
        let coords: Vec<(f64, f64)> = targets.iter().map(|t| (t.x, t.y)).collect();
        assert_eq!(
            coords,
            vec![
                (100.0, 50.0),
                (500.0, 50.0),
                (900.0, 50.0),
                (100.0, 250.0),
                (500.0, 250.0),
                (900.0, 250.0),
                (100.0, 450.0),
                (500.0, 450.0),
                (900.0, 450.0),
            ]
        );
    }

    #[test]
    fn nine_points_at_six_clicks_need_fifty_four_clicks() {
        let mut state = CalibrationState::new();
        state.begin(&Viewport::new(1280.0, 800.0), 6);

        let mut clicks = 0;
        for point in 0..9 {
            for click in 1..=6 {
                let outcome = state.click().expect("calibrating");
                clicks += 1;
                match (point, click) {
                    (8, 6) => assert_eq!(outcome, ClickOutcome::Completed),
                    (_, 6) => {
                        assert_eq!(
                            outcome,
                            ClickOutcome::Advanced {
                                point_index: point + 1
                            }
                        );
                        assert_eq!(state.point_index, point + 1);
                        assert_eq!(state.click_count, 0);
                    }
                    _ => assert_eq!(
                        outcome,
                        ClickOutcome::Counted {
                            point_index: point,
                            click_count: click
                        }
                    ),
                }
            }
        }

        assert_eq!(clicks, 54);
        assert_eq!(state.phase, CalibrationPhase::Done);
        assert!(state.targets.iter().all(|t| t.confirm_clicks == 6));
        assert_eq!(state.click(), None);
    }

    #[test]
    fn clicks_while_idle_are_ignored() {
        let mut state = CalibrationState::new();
        assert_eq!(state.click(), None);
        assert_eq!(state.progress().phase, CalibrationPhase::Idle);
    }

    #[test]
    fn restarting_recomputes_grid_and_resets_progress() {
        let mut state = CalibrationState::new();
        state.begin(&Viewport::new(1000.0, 500.0), 2);
        state.click();
        state.click();
        state.click();
        assert_eq!((state.point_index, state.click_count), (1, 1));

        state.begin(&Viewport::new(2000.0, 1000.0), 2);
        assert_eq!((state.point_index, state.click_count), (0, 0));
        assert_eq!(state.current_target().map(|t| (t.x, t.y)), Some((200.0, 100.0)));
        assert!(state.targets.iter().all(|t| t.confirm_clicks == 0));
    }
}
