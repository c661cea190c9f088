use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_dirs;
use crate::catalog::CATALOG_DB_FILE_NAME;
use crate::generation::{DEFAULT_CHUNK_SECONDS, DEFAULT_CROSSFADE_SECONDS};
use crate::tempo::{DEFAULT_ANALYSIS_SAMPLE_RATE, DEFAULT_BPM_DISCREPANCY_THRESHOLD};
use crate::waveform::DEFAULT_PEAK_COUNT;

use super::{ConfigError, map_app_dir_error};

/// Upper bound on enrichment workers.
const MAX_WORKERS: usize = 64;
/// Media directory name below the application data directory.
const MEDIA_DIR_NAME: &str = "media";

/// Tunables for enrichment, generation and the catalog.
///
/// Missing keys take their defaults, and out-of-range values are pulled back to usable ones
/// by [`normalized`](Self::normalized).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Peaks stored per waveform preview.
    pub peak_count: usize,
    /// BPM difference above which detected and declared tempos are flagged.
    pub bpm_discrepancy_threshold: u32,
    /// Rate audio is resampled to before tempo estimation.
    pub analysis_sample_rate: u32,
    pub crossfade_seconds: f32,
    pub chunk_seconds: u32,
    /// Tracks analysed concurrently during enrichment.
    pub workers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_db: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_root: Option<PathBuf>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            peak_count: DEFAULT_PEAK_COUNT,
            bpm_discrepancy_threshold: DEFAULT_BPM_DISCREPANCY_THRESHOLD,
            analysis_sample_rate: DEFAULT_ANALYSIS_SAMPLE_RATE,
            crossfade_seconds: DEFAULT_CROSSFADE_SECONDS,
            chunk_seconds: DEFAULT_CHUNK_SECONDS,
            workers: 1,
            catalog_db: None,
            media_root: None,
        }
    }
}

impl PipelineSettings {
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if self.peak_count == 0 {
            self.peak_count = defaults.peak_count;
        }
        if self.analysis_sample_rate == 0 {
            self.analysis_sample_rate = defaults.analysis_sample_rate;
        }
        if !self.crossfade_seconds.is_finite() || self.crossfade_seconds < 0.0 {
            self.crossfade_seconds = defaults.crossfade_seconds;
        }
        if self.chunk_seconds == 0 {
            self.chunk_seconds = defaults.chunk_seconds;
        }
        self.workers = self.workers.clamp(1, MAX_WORKERS);
        self
    }

    /// Catalog database: the configured path, else `catalog.db` in the data directory.
    pub fn catalog_db_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.catalog_db {
            Some(path) => Ok(path.clone()),
            None => Ok(self.catalog_db_in(&app_dirs::data_dir().map_err(map_app_dir_error)?)),
        }
    }

    /// Media root: the configured path, else `media/` in the data directory.
    pub fn media_root_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.media_root {
            Some(path) => Ok(path.clone()),
            None => Ok(self.media_root_in(&app_dirs::data_dir().map_err(map_app_dir_error)?)),
        }
    }

    pub(crate) fn catalog_db_in(&self, data_dir: &Path) -> PathBuf {
        self.catalog_db
            .clone()
            .unwrap_or_else(|| data_dir.join(CATALOG_DB_FILE_NAME))
    }

    pub(crate) fn media_root_in(&self, data_dir: &Path) -> PathBuf {
        self.media_root
            .clone()
            .unwrap_or_else(|| data_dir.join(MEDIA_DIR_NAME))
    }
}
