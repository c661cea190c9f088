use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::audio::decode_bytes;
use crate::blob_store::{BlobStore, BlobStoreError};
use crate::waveform::{PeakSeries, WaveformError, extract_peaks};

use super::{CatalogError, CatalogStore, Track};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaveformRegenReport {
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
}

impl WaveformRegenReport {
    pub fn summary(&self) -> String {
        format!(
            "{} generated, {} skipped, {} failed of {} tracks",
            self.generated, self.skipped, self.failed, self.total
        )
    }
}

#[derive(Debug, Error)]
enum RegenError {
    #[error(transparent)]
    Blob(#[from] BlobStoreError),
    #[error("failed to read stored audio: {0}")]
    Read(std::io::Error),
    #[error(transparent)]
    Waveform(#[from] WaveformError),
}

impl RegenError {
    fn is_skippable(&self) -> bool {
        matches!(self, Self::Waveform(err) if err.is_skippable())
    }
}

/// Compute and store peaks for every active track without waveform data.
///
/// Unsupported or empty audio counts as skipped, any other per-track problem as failed; the
/// run always continues with the next track. Only catalog errors abort it.
pub fn regenerate_waveforms(
    store: &CatalogStore,
    blobs: &dyn BlobStore,
    peak_count: usize,
) -> Result<WaveformRegenReport, CatalogError> {
    let tracks = store.tracks_missing_waveform()?;
    let mut report = WaveformRegenReport {
        total: tracks.len(),
        ..WaveformRegenReport::default()
    };
    info!(tracks = report.total, "Regenerating waveforms");
    for track in &tracks {
        match peaks_for_track(blobs, track, peak_count) {
            Ok(peaks) => {
                store.set_waveform(track.id, &peaks)?;
                report.generated += 1;
            }
            Err(err) if err.is_skippable() => {
                warn!(title = %track.title, key = %track.audio_key, "Skipped: {err}");
                report.skipped += 1;
            }
            Err(err) => {
                warn!(title = %track.title, key = %track.audio_key, "Failed: {err}");
                report.failed += 1;
            }
        }
    }
    info!("Waveform regeneration complete: {}", report.summary());
    Ok(report)
}

fn peaks_for_track(
    blobs: &dyn BlobStore,
    track: &Track,
    peak_count: usize,
) -> Result<PeakSeries, RegenError> {
    let mut bytes = Vec::new();
    blobs
        .open_for_read(&track.audio_key)?
        .read_to_end(&mut bytes)
        .map_err(RegenError::Read)?;
    let hint = Path::new(&track.audio_key)
        .extension()
        .and_then(|ext| ext.to_str());
    let audio = decode_bytes(bytes, hint).map_err(WaveformError::from)?;
    Ok(extract_peaks(&audio, peak_count)?)
}
