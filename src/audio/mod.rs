pub mod brown_noise;
pub mod device;
#[cfg(feature = "device-audio")]
pub mod microphone;
pub mod recorder;
pub mod synthetic;
pub mod wav;

pub use device::{
    AudioBackend, AudioEvent, AudioEventSender, AudioInput, CaptureFormat, Container,
    UnsupportedBackend,
};
#[cfg(feature = "device-audio")]
pub use microphone::MicrophoneBackend;
pub use recorder::{AudioSegmentRecorder, AudioStatus, DownloadHandle, RecorderConfig};
pub use synthetic::SyntheticBackend;
