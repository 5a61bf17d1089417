use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;

use crate::audio::DownloadHandle;
use crate::error::Result;
use crate::models::{AudioSegment, GazeSample, QuestionResponse};

use super::csv::{self, Record};

pub const RESPONSES_FILE: &str = "psychometric_responses.csv";
pub const DEMOGRAPHICS_FILE: &str = "demographics.csv";

pub fn gaze_filename(session_id: &str) -> String {
    format!("gaze_session_{session_id}.csv")
}

pub fn audio_log_filename(session_id: &str) -> String {
    format!("audio_segments_{session_id}.csv")
}

/// Writes export files into one directory. Empty exports write nothing and
/// return `Ok(None)`.
#[derive(Debug, Clone)]
pub struct Exporter {
    dir: PathBuf,
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn gaze_samples(&self, session_id: &str, rows: &[GazeSample]) -> Result<Option<PathBuf>> {
        self.write_rows(&gaze_filename(session_id), rows)
    }

    pub fn audio_segment_log(
        &self,
        session_id: &str,
        segments: &[AudioSegment],
    ) -> Result<Option<PathBuf>> {
        let rows: Vec<_> = segments.iter().map(AudioSegment::log_row).collect();
        self.write_rows(&audio_log_filename(session_id), &rows)
    }

    pub fn audio_payload(&self, handle: &DownloadHandle) -> Result<Option<PathBuf>> {
        if handle.payload.is_empty() {
            debug!("skipping empty audio payload {}", handle.filename);
            return Ok(None);
        }
        self.write_bytes(&handle.filename, &handle.payload).map(Some)
    }

    pub fn responses(&self, rows: &[QuestionResponse]) -> Result<Option<PathBuf>> {
        self.write_rows(RESPONSES_FILE, rows)
    }

    pub fn demographics(&self, record: &Record) -> Result<Option<PathBuf>> {
        if record.is_empty() {
            debug!("skipping empty export {DEMOGRAPHICS_FILE}");
            return Ok(None);
        }
        self.write_encoded(DEMOGRAPHICS_FILE, csv::encode_records(std::slice::from_ref(record))?)
    }

    pub fn write_rows<T: Serialize>(&self, filename: &str, rows: &[T]) -> Result<Option<PathBuf>> {
        self.write_encoded(filename, csv::encode(rows)?)
    }

    fn write_encoded(&self, filename: &str, encoded: Option<String>) -> Result<Option<PathBuf>> {
        let Some(text) = encoded else {
            debug!("skipping empty export {filename}");
            return Ok(None);
        };
        self.write_bytes(filename, text.as_bytes()).map(Some)
    }

    fn write_bytes(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        fs::write(&path, bytes)?;
        info!("exported {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}
