use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::{Result, TrackerError};

/// Wrap little-endian 16-bit PCM in a WAV container. A trailing partial
/// frame is dropped.
pub fn encode_pcm16(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let channels = channels.max(1);
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let frame_bytes = 2 * channels as usize;
    let usable = pcm.len() - pcm.len() % frame_bytes;

    let mut cursor = Cursor::new(Vec::with_capacity(usable + 44));
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(wav_error)?;
        for sample in pcm[..usable].chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([sample[0], sample[1]]))
                .map_err(wav_error)?;
        }
        writer.finalize().map_err(wav_error)?;
    }
    Ok(cursor.into_inner())
}

fn wav_error(err: hound::Error) -> TrackerError {
    TrackerError::Encode(format!("wav: {err}"))
}
