use tokio::sync::mpsc;

use crate::error::{Result, TrackerError};

/// Delivered by an input while capturing, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    Chunk(Vec<u8>),
    /// Runtime device failure; capture is over.
    Error(String),
    /// All buffered audio has been delivered after `end()`.
    Flushed,
}

pub type AudioEventSender = mpsc::UnboundedSender<AudioEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// Chunks are already container bytes and are concatenated as-is.
    Passthrough,
    /// Chunks are little-endian 16-bit PCM; sealing wraps them in WAV.
    WavPcm16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFormat {
    pub mime_type: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub container: Container,
}

impl CaptureFormat {
    pub fn pcm16_wav(sample_rate: u32, channels: u16) -> Self {
        Self {
            mime_type: "audio/wav".into(),
            sample_rate,
            channels,
            container: Container::WavPcm16,
        }
    }
}

/// An opened audio input. Reused for every segment of a session.
pub trait AudioInput: Send {
    fn format(&self) -> CaptureFormat;

    /// Start delivering chunks to `events`.
    fn begin(&mut self, events: AudioEventSender) -> Result<()>;

    /// Stop capturing. Remaining audio must be delivered, followed by
    /// `AudioEvent::Flushed`.
    fn end(&mut self);

    /// Give the device back to the OS.
    fn release(&mut self);
}

/// Opens audio inputs.
pub trait AudioBackend: Send + Sync {
    fn open(&self) -> Result<Box<dyn AudioInput>>;
}

/// Backend for environments without audio capture.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

impl AudioBackend for UnsupportedBackend {
    fn open(&self) -> Result<Box<dyn AudioInput>> {
        Err(TrackerError::DeviceUnsupported)
    }
}
