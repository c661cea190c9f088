//! Tempo estimation glue and the BPM merge policy.
//!
//! The estimator itself sits behind [`TempoEstimator`]; this module only prepares audio for it
//! (mono, fixed analysis rate), rounds its answer, and decides how a detected tempo relates to
//! the author-declared one. A detected tempo is never written over the declared value.

mod onset;

use thiserror::Error;

use crate::audio::{AudioBuffer, resample_linear};

pub use onset::OnsetTempoEstimator;

/// Analysis rate used when the caller has no preference.
pub const DEFAULT_ANALYSIS_SAMPLE_RATE: u32 = 22_050;
/// Detected and declared tempos further apart than this are flagged for review.
pub const DEFAULT_BPM_DISCREPANCY_THRESHOLD: u32 = 20;

#[derive(Debug, Error)]
pub enum TempoError {
    #[error("Audio is too short for tempo analysis ({frames} analysis frames)")]
    TooShort { frames: usize },
    #[error("No onsets found in audio")]
    NoOnsets,
    #[error("Estimator returned an invalid tempo: {0}")]
    InvalidTempo(f32),
    #[error("Audio has no samples")]
    EmptyAudio,
}

impl TempoError {
    /// The audio simply has no measurable beat (too short, silent or steady). Callers keep the
    /// rest of their analysis and record no tempo.
    pub fn is_no_tempo(&self) -> bool {
        matches!(self, Self::TooShort { .. } | Self::NoOnsets)
    }
}

/// A tempo-tracking routine operating on mono samples.
pub trait TempoEstimator: Send + Sync {
    /// Estimate the tempo of `mono` in beats per minute.
    fn estimate_tempo(&self, mono: &[f32], sample_rate: u32) -> Result<f32, TempoError>;
}

/// Convert `audio` to mono at `analysis_rate`, run the estimator and round to whole BPM.
pub fn estimate_bpm(
    audio: &AudioBuffer,
    estimator: &dyn TempoEstimator,
    analysis_rate: u32,
) -> Result<u32, TempoError> {
    let mono = audio.to_mono();
    if mono.is_empty() {
        return Err(TempoError::EmptyAudio);
    }
    let analysis_rate = analysis_rate.max(1);
    let prepared = resample_linear(&mono, audio.sample_rate, analysis_rate);
    let tempo = estimator.estimate_tempo(&prepared, analysis_rate)?;
    if !tempo.is_finite() || tempo < 0.5 {
        return Err(TempoError::InvalidTempo(tempo));
    }
    Ok(tempo.round() as u32)
}

/// A detected tempo that disagrees with the declared one by more than the threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BpmDiscrepancy {
    pub title: String,
    pub declared: u32,
    pub detected: u32,
}

/// Compare a detected tempo against the declared one.
///
/// Records without a declared tempo never produce a discrepancy.
pub fn check_discrepancy(
    title: &str,
    declared: Option<u32>,
    detected: u32,
    threshold: u32,
) -> Option<BpmDiscrepancy> {
    let declared = declared?;
    if declared.abs_diff(detected) > threshold {
        Some(BpmDiscrepancy {
            title: title.to_string(),
            declared,
            detected,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTempo(f32);

    impl TempoEstimator for FixedTempo {
        fn estimate_tempo(&self, mono: &[f32], sample_rate: u32) -> Result<f32, TempoError> {
            assert_eq!(sample_rate, DEFAULT_ANALYSIS_SAMPLE_RATE);
            assert!(!mono.is_empty());
            Ok(self.0)
        }
    }

    #[test]
    fn estimate_rounds_to_nearest_integer() {
        let audio = AudioBuffer {
            samples: vec![0.1; 44_100 * 2],
            sample_rate: 44_100,
            channels: 2,
        };
        let bpm = estimate_bpm(&audio, &FixedTempo(127.6), DEFAULT_ANALYSIS_SAMPLE_RATE).unwrap();
        assert_eq!(bpm, 128);
    }

    #[test]
    fn invalid_estimator_output_is_an_error() {
        let audio = AudioBuffer::mono(vec![0.1; 100], 22_050);
        let err = estimate_bpm(&audio, &FixedTempo(f32::NAN), DEFAULT_ANALYSIS_SAMPLE_RATE);
        assert!(matches!(err, Err(TempoError::InvalidTempo(_))));
    }

    #[test]
    fn discrepancy_requires_declared_and_threshold() {
        assert_eq!(check_discrepancy("a", None, 140, 20), None);
        assert_eq!(check_discrepancy("a", Some(120), 140, 20), None);
        assert_eq!(
            check_discrepancy("a", Some(120), 141, 20),
            Some(BpmDiscrepancy {
                title: "a".into(),
                declared: 120,
                detected: 141
            })
        );
        assert!(check_discrepancy("a", Some(90), 60, 20).is_some());
    }
}
