use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::blob_store::{BlobStore, dated_key};
use crate::enrichment::BatchDirectory;
use crate::generation::{DEFAULT_LANGUAGE, PromptCatalog};
use crate::metadata::{
    FIELD_ARTIST_NAME, FIELD_GENRE, FIELD_LANGUAGE, FIELD_LYRICS, FIELD_MOOD, FIELD_PROMPT,
    TrackMetadataRecord,
};

use super::{CatalogError, CatalogStore, NewTrack};

const MEDIA_PREFIX: &str = "tracks";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Every n-th imported track is featured, starting with the first; 0 features none.
    pub featured_every: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self { featured_every: 5 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped_existing: usize,
    pub missing_file: usize,
}

impl ImportReport {
    pub fn summary(&self) -> String {
        format!(
            "{} imported, {} skipped (existing), {} missing audio",
            self.imported, self.skipped_existing, self.missing_file
        )
    }
}

/// Import every record of `batch` into `store`, copying its audio into `blobs`.
///
/// Titles already in the catalog are skipped, so rerunning an import is harmless. Lyrics,
/// artist and language missing from a record are taken from the prompt with the same title.
pub fn import_batch(
    store: &mut CatalogStore,
    batch: &BatchDirectory,
    blobs: &dyn BlobStore,
    prompts: Option<&PromptCatalog>,
    options: &ImportOptions,
) -> Result<ImportReport, CatalogError> {
    let collection = batch.load()?;
    info!(
        dir = %batch.root().display(),
        records = collection.len(),
        "Importing batch"
    );
    let mut report = ImportReport::default();
    for mut record in collection.records {
        let Some(title) = record.title().map(str::to_string) else {
            warn!("Skipping record without a title");
            continue;
        };
        if store.find_by_title(&title)?.is_some() {
            debug!(title = %title, "Skipped (exists)");
            report.skipped_existing += 1;
            continue;
        }
        let Some(source) = record.filename().and_then(|name| locate_audio(batch, name)) else {
            warn!(title = %title, file = record.filename().unwrap_or(""), "Audio file not found");
            report.missing_file += 1;
            continue;
        };
        if let Some(prompt) = prompts.and_then(|catalog| catalog.find_by_title(&title)) {
            let filled = record.fill_missing_from(prompt);
            if !filled.is_empty() {
                debug!(title = %title, fields = ?filled, "Filled fields from prompt catalog");
            }
        }

        let audio_key = store_audio(blobs, &title, &source)?;
        let featured = options.featured_every > 0 && report.imported % options.featured_every == 0;
        store.insert_track(&new_track(&record, title.clone(), audio_key, featured))?;
        report.imported += 1;
        info!(title = %title, featured, "Imported");
    }
    info!("Import complete: {}", report.summary());
    Ok(report)
}

/// The record's file, or the `.mp3` sibling of a missing `.wav`. Filenames that leave the
/// batch directory are never resolved.
fn locate_audio(batch: &BatchDirectory, filename: &str) -> Option<PathBuf> {
    let path = batch.audio_path(filename)?;
    if path.is_file() {
        return Some(path);
    }
    let is_wav = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
    if !is_wav {
        return None;
    }
    let mp3 = path.with_extension("mp3");
    mp3.is_file().then_some(mp3)
}

fn store_audio(blobs: &dyn BlobStore, title: &str, source: &Path) -> Result<String, CatalogError> {
    let extension = source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default();
    let file_name = format!("{}{extension}", media_stem(title));
    let key = dated_key(MEDIA_PREFIX, &file_name, OffsetDateTime::now_utc());
    let mut file = std::fs::File::open(source).map_err(|source_err| CatalogError::ReadAudio {
        path: source.to_path_buf(),
        source: source_err,
    })?;
    Ok(blobs.save(&key, &mut file)?)
}

/// Lowercased title with spaces (and path separators) replaced by `_`.
fn media_stem(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|ch| match ch {
            ' ' | '/' | '\\' => '_',
            other => other,
        })
        .collect()
}

fn new_track(
    record: &TrackMetadataRecord,
    title: String,
    audio_key: String,
    is_featured: bool,
) -> NewTrack {
    let genre = record.get_str(FIELD_GENRE);
    let mood = record.get_str(FIELD_MOOD);
    let text = |field| record.get_str(field).unwrap_or_default().to_string();
    NewTrack {
        description: format!(
            "AI-generated {} track. {}",
            genre.unwrap_or_default(),
            record.get_str(FIELD_PROMPT).unwrap_or_default()
        ),
        tags: format!(
            "{}, {}, ai generated, royalty free",
            genre.unwrap_or_default(),
            mood.unwrap_or_default()
        ),
        genre_slug: genre.map(str::to_string),
        mood_slug: mood.map(str::to_string),
        artist_name: text(FIELD_ARTIST_NAME),
        language: record
            .get_str(FIELD_LANGUAGE)
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_string(),
        lyrics: text(FIELD_LYRICS),
        audio_key,
        duration_seconds: record.duration_seconds().unwrap_or(0),
        bpm: record.declared_bpm(),
        detected_bpm: record.detected_bpm(),
        waveform: record.waveform(),
        is_active: true,
        is_featured,
        title,
    }
}
