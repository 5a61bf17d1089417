//! Default system microphone through cpal. The cpal stream is not `Send`,
//! so it lives on a dedicated thread driven by commands.

use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use log::{error, info, warn};
use rodio::cpal::{
    self,
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, SizedSample,
};

use crate::error::{Result, TrackerError};

use super::device::{AudioBackend, AudioEvent, AudioEventSender, AudioInput, CaptureFormat};

type SharedSink = Arc<Mutex<Option<AudioEventSender>>>;

enum CaptureCommand {
    Begin(AudioEventSender),
    End,
    Release,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MicrophoneBackend;

impl AudioBackend for MicrophoneBackend {
    fn open(&self) -> Result<Box<dyn AudioInput>> {
        let (command_tx, command_rx) = mpsc::channel::<CaptureCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<CaptureFormat>>();

        thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || capture_thread(command_rx, ready_tx))
            .map_err(|e| TrackerError::DeviceError(e.to_string()))?;

        let format = ready_rx
            .recv()
            .map_err(|_| TrackerError::DeviceError("capture thread exited early".into()))??;

        info!(
            "microphone opened: {} Hz, {} channel(s)",
            format.sample_rate, format.channels
        );
        Ok(Box::new(MicrophoneInput {
            format,
            commands: command_tx,
        }))
    }
}

pub struct MicrophoneInput {
    format: CaptureFormat,
    commands: mpsc::Sender<CaptureCommand>,
}

impl AudioInput for MicrophoneInput {
    fn format(&self) -> CaptureFormat {
        self.format.clone()
    }

    fn begin(&mut self, events: AudioEventSender) -> Result<()> {
        self.commands
            .send(CaptureCommand::Begin(events))
            .map_err(|_| TrackerError::DeviceError("capture thread is gone".into()))
    }

    fn end(&mut self) {
        let _ = self.commands.send(CaptureCommand::End);
    }

    fn release(&mut self) {
        let _ = self.commands.send(CaptureCommand::Release);
    }
}

fn capture_thread(
    commands: mpsc::Receiver<CaptureCommand>,
    ready: mpsc::Sender<Result<CaptureFormat>>,
) {
    let sink: SharedSink = Arc::new(Mutex::new(None));

    let opened = (|| -> Result<(cpal::Stream, CaptureFormat)> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(TrackerError::DeviceUnsupported)?;
        let config = device
            .default_input_config()
            .map_err(|e| TrackerError::DeviceError(e.to_string()))?;

        let format = CaptureFormat::pcm16_wav(config.sample_rate().0, config.channels());
        let stream_config: cpal::StreamConfig = config.config();
        let stream = match config.sample_format() {
            SampleFormat::F32 => build_stream::<f32, _>(&device, &stream_config, &sink, |s| {
                (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
            }),
            SampleFormat::I16 => build_stream::<i16, _>(&device, &stream_config, &sink, |s| s),
            SampleFormat::U16 => {
                build_stream::<u16, _>(&device, &stream_config, &sink, |s| (s as i32 - 32768) as i16)
            }
            other => Err(TrackerError::DeviceError(format!(
                "unsupported sample format {other:?}"
            ))),
        }?;
        stream
            .pause()
            .map_err(|e| TrackerError::DeviceError(e.to_string()))?;
        Ok((stream, format))
    })();

    let stream = match opened {
        Ok((stream, format)) => {
            if ready.send(Ok(format)).is_err() {
                return;
            }
            stream
        }
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    while let Ok(command) = commands.recv() {
        match command {
            CaptureCommand::Begin(events) => {
                *lock_sink(&sink) = Some(events.clone());
                if let Err(err) = stream.play() {
                    let _ = events.send(AudioEvent::Error(err.to_string()));
                    lock_sink(&sink).take();
                }
            }
            CaptureCommand::End => {
                if let Err(err) = stream.pause() {
                    warn!("failed to pause microphone stream: {err}");
                }
                // Callbacks after pause see no sink, so Flushed is the last event.
                if let Some(events) = lock_sink(&sink).take() {
                    let _ = events.send(AudioEvent::Flushed);
                }
            }
            CaptureCommand::Release => break,
        }
    }

    lock_sink(&sink).take();
    drop(stream);
    info!("microphone released");
}

fn build_stream<T, F>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sink: &SharedSink,
    convert: F,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    F: Fn(T) -> i16 + Send + 'static,
{
    let data_sink = sink.clone();
    let error_sink = sink.clone();

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let guard = lock_sink(&data_sink);
                let Some(events) = guard.as_ref() else {
                    return;
                };
                let mut bytes = Vec::with_capacity(data.len() * 2);
                for sample in data {
                    bytes.extend_from_slice(&convert(*sample).to_le_bytes());
                }
                let _ = events.send(AudioEvent::Chunk(bytes));
            },
            move |err| {
                error!("microphone stream error: {err}");
                if let Some(events) = lock_sink(&error_sink).take() {
                    let _ = events.send(AudioEvent::Error(err.to_string()));
                }
            },
            None,
        )
        .map_err(|e| TrackerError::DeviceError(e.to_string()))
}

fn lock_sink(sink: &SharedSink) -> std::sync::MutexGuard<'_, Option<AudioEventSender>> {
    match sink.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
