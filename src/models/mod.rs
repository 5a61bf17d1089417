pub mod audio;
pub mod content;
pub mod gaze;
pub mod response;
pub mod session;

pub use audio::{extension_for_mime, AudioSegment, AudioSegmentRow, SegmentMetadata};
pub use content::{ContentContext, Rect};
pub use gaze::{GazePoint, GazeSample, Viewport};
pub use response::{AnswerEvent, QuestionResponse};
pub use session::{Session, SessionStatus};
