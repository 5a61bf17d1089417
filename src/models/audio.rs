use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Tags attached to a segment at start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMetadata {
    pub question_id: Option<String>,
    pub session_id: String,
}

/// A sealed audio recording interval. Times are session-relative ms.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub id: String,
    pub start_ms: u64,
    pub stop_ms: u64,
    pub duration_ms: u64,
    pub mime_type: String,
    pub payload: Arc<[u8]>,
    pub metadata: SegmentMetadata,
}

impl AudioSegment {
    pub fn file_extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }

    pub fn filename(&self) -> String {
        format!("audio_segment_{}.{}", self.id, self.file_extension())
    }

    pub fn log_row(&self) -> AudioSegmentRow {
        AudioSegmentRow {
            session_id: self.metadata.session_id.clone(),
            segment_id: self.id.clone(),
            question_id: self.metadata.question_id.clone(),
            start_ms: self.start_ms,
            stop_ms: self.stop_ms,
            duration_ms: self.duration_ms,
            mime_type: self.mime_type.clone(),
            filename: self.filename(),
        }
    }
}

/// Row of the per-session audio segment log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioSegmentRow {
    pub session_id: String,
    pub segment_id: String,
    pub question_id: Option<String>,
    pub start_ms: u64,
    pub stop_ms: u64,
    pub duration_ms: u64,
    pub mime_type: String,
    pub filename: String,
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let mime = mime_type.to_ascii_lowercase();
    if mime.contains("ogg") {
        "ogg"
    } else if mime.contains("wav") {
        "wav"
    } else {
        "webm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_follows_mime_type() {
        assert_eq!(extension_for_mime("audio/ogg; codecs=opus"), "ogg");
        assert_eq!(extension_for_mime("audio/wav"), "wav");
        assert_eq!(extension_for_mime("audio/x-WAV"), "wav");
        assert_eq!(extension_for_mime("audio/webm;codecs=opus"), "webm");
        assert_eq!(extension_for_mime(""), "webm");
    }
}
