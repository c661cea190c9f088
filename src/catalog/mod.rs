//! SQLite catalog of published tracks, genres and moods.
//!
//! The catalog is the long-lived home of enriched metadata: batches are imported into it by
//! title, stored tracks get their waveform previews regenerated here, and the listing queries
//! behind the public API read from it.

mod import;
mod query;
mod schema;
mod tracks;
mod waveforms;

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::blob_store::BlobStoreError;
use crate::metadata::MetadataError;
use crate::waveform::PeakSeries;

pub use import::{ImportOptions, ImportReport, import_batch};
pub use query::{
    CategoryCount, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, OrderField, TrackOrdering, TrackPage,
    TrackQuery,
};
pub use tracks::NewTrack;
pub use waveforms::{WaveformRegenReport, regenerate_waveforms};

/// File name of the catalog database in the application data directory.
pub const CATALOG_DB_FILE_NAME: &str = "catalog.db";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Could not create catalog directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Catalog query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("Stored waveform data is invalid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid stored value in column {column}: {value}")]
    InvalidValue { column: &'static str, value: String },
    #[error("A track titled \"{0}\" already exists")]
    DuplicateTitle(String),
    #[error("Track {0} not found")]
    TrackNotFound(Uuid),
    #[error("Unknown ordering field \"{0}\"")]
    InvalidOrdering(String),
    #[error(transparent)]
    Blob(#[from] BlobStoreError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("Failed to read audio file {path}: {source}")]
    ReadAudio {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A genre or mood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// A published track row.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub genre: Option<Category>,
    pub mood: Option<Category>,
    pub tags: String,
    pub artist_name: String,
    pub language: String,
    pub lyrics: String,
    /// Blob store key of the audio file.
    pub audio_key: String,
    pub duration_seconds: u32,
    /// Tempo declared by the author.
    pub bpm: Option<u32>,
    pub detected_bpm: Option<u32>,
    pub waveform: Option<PeakSeries>,
    pub download_count: u64,
    pub play_count: u64,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Connection to a catalog database with schema applied.
pub struct CatalogStore {
    connection: Connection,
}

impl CatalogStore {
    /// Open (or create) the catalog at `path`.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CatalogError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let connection = Connection::open(path)?;
        let store = Self { connection };
        store.apply_pragmas()?;
        store.apply_schema()?;
        Ok(store)
    }

    /// A private in-memory catalog, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let store = Self {
            connection: Connection::open_in_memory()?,
        };
        store.apply_schema()?;
        Ok(store)
    }
}

/// Display name of a genre slug: dashes become spaces, then words are title-cased.
pub fn genre_name(slug: &str) -> String {
    title_case(&slug.replace('-', " "))
}

/// Display name of a mood slug: title-cased with dashes kept (`feel-good` is `Feel-Good`).
pub fn mood_name(slug: &str) -> String {
    title_case(slug)
}

/// Uppercase the first letter of every run of letters and lowercase the rest of the run.
fn title_case(text: &str) -> String {
    let mut in_word = false;
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if in_word {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(ch);
            in_word = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genre_names_replace_dashes() {
        assert_eq!(genre_name("lo-fi"), "Lo Fi");
        assert_eq!(genre_name("hip-hop"), "Hip Hop");
        assert_eq!(genre_name("EDM"), "Edm");
        assert_eq!(genre_name("pop"), "Pop");
    }

    #[test]
    fn mood_names_keep_dashes() {
        assert_eq!(mood_name("feel-good"), "Feel-Good");
        assert_eq!(mood_name("chill"), "Chill");
        assert_eq!(mood_name("bitter-SWEET"), "Bitter-Sweet");
    }

    #[test]
    fn open_creates_file_and_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join(CATALOG_DB_FILE_NAME);
        CatalogStore::open(&path).unwrap();
        assert!(path.is_file());
        // Reopening applies the schema idempotently.
        CatalogStore::open(&path).unwrap();
    }
}
