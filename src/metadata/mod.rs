//! Metadata batch files: a JSON array of flat track objects next to the audio they describe.

mod record;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::atomic_file::atomic_write;

pub use record::{
    FIELD_ARTIST_NAME, FIELD_BPM, FIELD_DETECTED_BPM, FIELD_DURATION, FIELD_FILENAME,
    FIELD_GENRE, FIELD_LANGUAGE, FIELD_LYRICS, FIELD_MOOD, FIELD_PROMPT, FIELD_TITLE,
    FIELD_WAVEFORM, TrackMetadataRecord,
};

/// File name of the batch collection inside a batch directory.
pub const METADATA_FILE_NAME: &str = "metadata.json";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Metadata file not found: {path}")]
    Missing { path: PathBuf },
    #[error("Failed to read metadata {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid metadata {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to serialize metadata for {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to write metadata {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The ordered record list of one batch file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataCollection {
    pub records: Vec<TrackMetadataRecord>,
}

impl MetadataCollection {
    pub fn new(records: Vec<TrackMetadataRecord>) -> Self {
        Self { records }
    }

    /// Read a batch file. A missing file is an error: there is nothing to process.
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                MetadataError::Missing {
                    path: path.to_path_buf(),
                }
            } else {
                MetadataError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        let records = serde_json::from_str(&text).map_err(|source| MetadataError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { records })
    }

    /// Like [`load`](Self::load), but an absent file yields an empty collection.
    pub fn load_or_empty(path: &Path) -> Result<Self, MetadataError> {
        match Self::load(path) {
            Err(MetadataError::Missing { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Replace the file with the whole collection in one atomic write.
    pub fn save_atomic(&self, path: &Path) -> Result<(), MetadataError> {
        let text =
            serde_json::to_string_pretty(&self.records).map_err(|source| MetadataError::Serialize {
                path: path.to_path_buf(),
                source,
            })?;
        atomic_write(path, text.as_bytes()).map_err(|source| MetadataError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn find_by_title(&self, title: &str) -> Option<&TrackMetadataRecord> {
        self.records
            .iter()
            .find(|record| record.title() == Some(title))
    }

    pub fn contains_title(&self, title: &str) -> bool {
        self.find_by_title(title).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
