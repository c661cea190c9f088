mod error;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::{AudioBuffer, decode_file};

pub use error::WaveformError;

/// Number of peaks stored for the catalog waveform preview.
pub const DEFAULT_PEAK_COUNT: usize = 200;

/// Ordered peak magnitudes in `[0.0, 1.0]`, rounded to 4 decimal places.
///
/// Position in the series maps monotonically to position in time. The series holds at most
/// the requested number of peaks and fewer when the source has fewer samples than that.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeakSeries(Vec<f64>);

impl PeakSeries {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    /// Persisted JSON representation: a plain array of numbers.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.0
                .iter()
                .map(|&peak| serde_json::Value::from(peak))
                .collect(),
        )
    }
}

/// Downmix, normalize and downsample `audio` into at most `peak_count` window peaks.
///
/// Windows are `max(1, frames / peak_count)` frames long and laid out back to back from the
/// start; the trailing partial window is dropped when it would exceed `peak_count`. Output is
/// deterministic for identical input.
pub fn extract_peaks(audio: &AudioBuffer, peak_count: usize) -> Result<PeakSeries, WaveformError> {
    if peak_count == 0 {
        return Err(WaveformError::InvalidPeakCount);
    }
    if audio.sample_rate == 0 {
        return Err(WaveformError::InvalidSampleRate);
    }
    let mut mono = audio.to_mono();
    if mono.is_empty() {
        return Err(WaveformError::EmptyAudio);
    }
    normalize_peak_in_place(&mut mono);

    let chunk_size = (mono.len() / peak_count).max(1);
    let peaks = mono
        .chunks(chunk_size)
        .take(peak_count)
        .map(|window| round_peak(max_abs(window)))
        .collect();
    Ok(PeakSeries(peaks))
}

/// Decode `path` and extract its peak series.
pub fn peaks_for_file(path: &Path, peak_count: usize) -> Result<PeakSeries, WaveformError> {
    let audio = decode_file(path)?;
    extract_peaks(&audio, peak_count)
}

/// Scale so the loudest sample reaches 1.0. Silent input stays silent.
fn normalize_peak_in_place(samples: &mut [f32]) {
    let peak = max_abs(samples);
    if !peak.is_finite() || peak <= 0.0 {
        return;
    }
    let gain = 1.0 / peak;
    for sample in samples.iter_mut() {
        *sample = (*sample * gain).clamp(-1.0, 1.0);
    }
}

fn max_abs(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0_f32, |m, &s| m.max(s.abs()))
}

fn round_peak(peak: f32) -> f64 {
    (peak as f64 * 10_000.0).round() / 10_000.0
}
