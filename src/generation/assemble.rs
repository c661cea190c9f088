use thiserror::Error;

use crate::audio::AudioBuffer;

/// Default crossfade between consecutive chunks.
pub const DEFAULT_CROSSFADE_SECONDS: f32 = 2.0;

/// One synthesized mono segment, consumed by [`assemble`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAudioChunk {
    pub samples: Vec<f32>,
    pub duration_seconds: f32,
}

impl GeneratedAudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        let duration_seconds = if sample_rate == 0 {
            0.0
        } else {
            samples.len() as f32 / sample_rate as f32
        };
        Self {
            samples,
            duration_seconds,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssembleError {
    #[error("No chunks to assemble")]
    InsufficientChunks,
    #[error("Sample rate must be positive")]
    InvalidSampleRate,
}

/// Stitch chunks into one mono buffer, linearly crossfading each splice.
///
/// A single chunk is returned unchanged. Each splice overlaps
/// `min(crossfade_seconds * sample_rate, accumulated_len, next_len)` samples.
pub fn assemble(
    chunks: Vec<GeneratedAudioChunk>,
    sample_rate: u32,
    crossfade_seconds: f32,
) -> Result<AudioBuffer, AssembleError> {
    if sample_rate == 0 {
        return Err(AssembleError::InvalidSampleRate);
    }
    let mut chunks = chunks.into_iter();
    let mut accumulated = chunks
        .next()
        .ok_or(AssembleError::InsufficientChunks)?
        .samples;
    let fade_samples = crossfade_samples(sample_rate, crossfade_seconds);
    for chunk in chunks {
        crossfade_into(&mut accumulated, &chunk.samples, fade_samples);
    }
    Ok(AudioBuffer::mono(accumulated, sample_rate))
}

fn crossfade_samples(sample_rate: u32, seconds: f32) -> usize {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds as f64 * sample_rate as f64).round() as usize
}

/// Fold `next` onto the tail of `accumulated`.
fn crossfade_into(accumulated: &mut Vec<f32>, next: &[f32], fade_samples: usize) {
    let overlap = fade_samples.min(accumulated.len()).min(next.len());
    let start = accumulated.len() - overlap;
    for (i, (tail, &head)) in accumulated[start..].iter_mut().zip(next).enumerate() {
        let fade_in = i as f32 / overlap as f32;
        *tail = *tail * (1.0 - fade_in) + head * fade_in;
    }
    accumulated.extend_from_slice(&next[overlap..]);
}
