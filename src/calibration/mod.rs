pub mod state;

pub use state::{
    grid_targets, CalibrationPhase, CalibrationProgress, CalibrationState, CalibrationTarget,
    ClickOutcome,
};
