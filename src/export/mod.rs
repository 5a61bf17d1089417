pub mod csv;
pub mod exporter;

pub use self::csv::{encode, encode_records, escape_field, Record};
pub use exporter::{audio_log_filename, gaze_filename, Exporter, DEMOGRAPHICS_FILE, RESPONSES_FILE};
