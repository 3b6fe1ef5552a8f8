/// Audio frame decoding
///
/// Converts raw little-endian 16-bit PCM wire frames into normalized
/// floating-point samples.

use thiserror::Error;
use tracing::trace;

/// Normalized audio sample (-1.0 to 1.0)
pub type AudioSample = f32;

/// Sample rate expected on the wire (16kHz mono)
pub const SAMPLE_RATE: usize = 16000;

/// Samples scored per round: 80ms at 16kHz
pub const CHUNK_SIZE: usize = 1280;

/// Divisor mapping i16 onto [-1.0, 1.0)
const PCM16_SCALE: f32 = 32768.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty audio frame")]
    Empty,

    #[error("frame length {0} is not a multiple of 2 bytes")]
    OddLength(usize),
}

/// Decode a PCM16 little-endian payload into normalized samples
pub fn decode_pcm16(payload: &[u8]) -> Result<Vec<AudioSample>, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::Empty);
    }

    if payload.len() % 2 != 0 {
        return Err(DecodeError::OddLength(payload.len()));
    }

    let samples: Vec<AudioSample> = payload
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM16_SCALE)
        .collect();

    trace!("Decoded {} bytes into {} samples", payload.len(), samples.len());
    Ok(samples)
}

/// Encode i16 samples as little-endian bytes (the wire format clients send)
pub fn encode_pcm16(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
