mod decode;
mod resample;
mod wav_writer;

pub use decode::{DecodeError, decode_bytes, decode_file};
pub use resample::resample_linear;
pub use wav_writer::{WavWriteError, write_wav_f32};

/// Interleaved PCM audio decoded from a file or produced by a synthesizer.
///
/// Samples are `f32` in `[-1.0, 1.0]` for float sources and integer PCM scaled by
/// `2^(bits - 1)`. `samples.len()` is a multiple of `channels`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Interleaved samples, one frame after another.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

impl AudioBuffer {
    /// Build a mono buffer from raw samples.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
        }
    }

    /// Return the effective channel count (minimum 1).
    pub fn channel_count(&self) -> usize {
        self.channels.max(1) as usize
    }

    /// Number of complete frames held by the buffer.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channel_count()
    }

    /// Duration in seconds, or zero for an invalid sample rate.
    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f32 / self.sample_rate as f32
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Average the channels of every frame into a mono sequence.
    pub fn to_mono(&self) -> Vec<f32> {
        let mut out = Vec::new();
        downmix_to_mono_into(&mut out, &self.samples, self.channels);
        out
    }
}

/// Downmix interleaved samples by averaging channel values at each frame.
///
/// A trailing partial frame is dropped.
pub fn downmix_to_mono_into(out: &mut Vec<f32>, samples: &[f32], channels: u16) {
    let channels = channels.max(1) as usize;
    out.clear();
    if channels == 1 {
        out.extend(samples.iter().copied().map(sanitize_sample));
        return;
    }
    let frames = samples.len() / channels;
    out.reserve(frames);
    for frame in samples.chunks_exact(channels) {
        let sum: f32 = frame.iter().copied().map(sanitize_sample).sum();
        out.push(sum / channels as f32);
    }
}

fn sanitize_sample(sample: f32) -> f32 {
    if sample.is_finite() { sample } else { 0.0 }
}
