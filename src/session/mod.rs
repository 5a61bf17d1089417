pub mod controller;
pub mod state;

pub use controller::{Collaborators, ExportSummary, StudyController};
pub use state::{SessionState, StudySnapshot, StudyStatus};
