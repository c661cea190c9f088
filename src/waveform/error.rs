use thiserror::Error;

use crate::audio::DecodeError;

#[derive(Debug, Error)]
pub enum WaveformError {
    #[error("Peak count must be at least 1")]
    InvalidPeakCount,
    #[error("Sample rate must be positive")]
    InvalidSampleRate,
    #[error("Audio has no samples")]
    EmptyAudio,
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl WaveformError {
    /// Whether the failure means "nothing usable in this file" rather than a processing error.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::EmptyAudio
                | Self::Decode(DecodeError::EmptyAudio)
                | Self::Decode(DecodeError::UnsupportedFormat { .. })
        )
    }
}
