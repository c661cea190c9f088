use std::path::{Path, PathBuf};

use thiserror::Error;

use super::AudioBuffer;

#[derive(Debug, Error)]
pub enum WavWriteError {
    #[error("Unable to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write wav {path}: {source}")]
    Write { path: PathBuf, source: hound::Error },
}

/// Write a buffer as a 32-bit float WAV, creating parent directories as needed.
pub fn write_wav_f32(path: &Path, buffer: &AudioBuffer) -> Result<(), WavWriteError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| WavWriteError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let write_err = |source| WavWriteError::Write {
        path: path.to_path_buf(),
        source,
    };
    let spec = hound::WavSpec {
        channels: buffer.channels.max(1),
        sample_rate: buffer.sample_rate.max(1),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(write_err)?;
    for &sample in &buffer.samples {
        writer.write_sample(sample).map_err(write_err)?;
    }
    writer.finalize().map_err(write_err)
}
