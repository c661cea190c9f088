//! Waveform and BPM enrichment of a metadata batch directory.
//!
//! Each record is analysed independently: the referenced audio is decoded once, then tempo
//! and peaks are computed from the same buffer. Results are merged into the in-memory
//! collection by a single writer and the whole collection is written back once, atomically,
//! after the pass. A missing or broken file only affects its own record.

mod report;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audio::{DecodeError, decode_file};
use crate::blob_store::is_plain_relative;
use crate::config::PipelineSettings;
use crate::metadata::{METADATA_FILE_NAME, MetadataCollection, MetadataError, TrackMetadataRecord};
use crate::tempo::{self, TempoError, TempoEstimator};
use crate::waveform::{self, PeakSeries, WaveformError};

pub use report::{EnrichmentReport, RecordOutcome, RecordState};

/// A directory holding `metadata.json` and the audio files it names.
#[derive(Debug, Clone)]
pub struct BatchDirectory {
    root: PathBuf,
}

impl BatchDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE_NAME)
    }

    /// Path of an audio file referenced by a record, or `None` when `filename` is absolute
    /// or climbs out of the batch directory.
    pub fn audio_path(&self, filename: &str) -> Option<PathBuf> {
        let relative = Path::new(filename);
        is_plain_relative(relative).then(|| self.root.join(relative))
    }

    pub fn load(&self) -> Result<MetadataCollection, MetadataError> {
        MetadataCollection::load(&self.metadata_path())
    }

    pub fn store(&self, collection: &MetadataCollection) -> Result<(), MetadataError> {
        collection.save_atomic(&self.metadata_path())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentOptions {
    pub peak_count: usize,
    pub bpm_discrepancy_threshold: u32,
    pub analysis_sample_rate: u32,
    /// Records analysed concurrently; 1 keeps the pass on the calling thread.
    pub workers: usize,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        Self::from(&PipelineSettings::default())
    }
}

impl From<&PipelineSettings> for EnrichmentOptions {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            peak_count: settings.peak_count,
            bpm_discrepancy_threshold: settings.bpm_discrepancy_threshold,
            analysis_sample_rate: settings.analysis_sample_rate,
            workers: settings.workers,
        }
    }
}

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("Failed to start analysis workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Enrichment canceled; metadata left unchanged")]
    Canceled,
}

/// Why one record could not be analysed.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("record has no filename")]
    MissingFilename,
    #[error("filename \"{0}\" points outside the batch directory")]
    InvalidFilename(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("tempo estimation failed: {0}")]
    Tempo(#[from] TempoError),
    #[error("peak extraction failed: {0}")]
    Waveform(#[from] WaveformError),
}

enum Analysis {
    /// `bpm` is `None` when the audio has no measurable beat.
    Enriched { bpm: Option<u32>, peaks: PeakSeries },
    MissingFile,
    Failed(AnalysisError),
}

/// Analyse every record of `batch` and write the updated collection back once.
///
/// The declared `bpm` is never modified; the estimate goes to `detected_bpm`. Audio too short
/// or too flat for tempo analysis still gets its peaks, and keeps any previous `detected_bpm`.
/// Records that fail or whose file is missing keep all of their previous values. When `cancel` is set the
/// pass stops between records and nothing is written.
pub fn enrich_batch(
    batch: &BatchDirectory,
    options: &EnrichmentOptions,
    estimator: &dyn TempoEstimator,
    cancel: Option<&AtomicBool>,
) -> Result<EnrichmentReport, EnrichmentError> {
    let mut collection = batch.load()?;
    let total = collection.len();
    info!(
        dir = %batch.root().display(),
        records = total,
        workers = options.workers,
        "Starting enrichment"
    );

    let analyses = if options.workers > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .build()?;
        pool.install(|| {
            collection
                .records
                .par_iter()
                .map(|record| analyze_unless_canceled(batch, record, options, estimator, cancel))
                .collect::<Option<Vec<_>>>()
        })
    } else {
        collection
            .records
            .iter()
            .map(|record| analyze_unless_canceled(batch, record, options, estimator, cancel))
            .collect::<Option<Vec<_>>>()
    };
    let Some(analyses) = analyses else {
        warn!("Enrichment canceled before completion; no changes written");
        return Err(EnrichmentError::Canceled);
    };

    let mut report = EnrichmentReport {
        total_count: total,
        ..EnrichmentReport::default()
    };
    for (record, analysis) in collection.records.iter_mut().zip(analyses) {
        let outcome = merge(record, analysis, options, &mut report);
        report.record(outcome);
    }

    batch.store(&collection)?;
    info!("Enrichment finished: {}", report.summary());
    Ok(report)
}

fn analyze_unless_canceled(
    batch: &BatchDirectory,
    record: &TrackMetadataRecord,
    options: &EnrichmentOptions,
    estimator: &dyn TempoEstimator,
    cancel: Option<&AtomicBool>,
) -> Option<Analysis> {
    if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
        return None;
    }
    Some(analyze_record(batch, record, options, estimator))
}

fn analyze_record(
    batch: &BatchDirectory,
    record: &TrackMetadataRecord,
    options: &EnrichmentOptions,
    estimator: &dyn TempoEstimator,
) -> Analysis {
    let Some(filename) = record.filename() else {
        return Analysis::Failed(AnalysisError::MissingFilename);
    };
    let Some(path) = batch.audio_path(filename) else {
        return Analysis::Failed(AnalysisError::InvalidFilename(filename.to_string()));
    };
    if !path.is_file() {
        return Analysis::MissingFile;
    }
    debug!(
        title = record.title().unwrap_or_default(),
        filename,
        state = RecordState::Analyzing.as_str(),
        "Analyzing record"
    );
    let audio = match decode_file(&path) {
        Ok(audio) => audio,
        Err(DecodeError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            return Analysis::MissingFile;
        }
        Err(err) => return Analysis::Failed(err.into()),
    };
    let peaks = match waveform::extract_peaks(&audio, options.peak_count) {
        Ok(peaks) => peaks,
        Err(err) => return Analysis::Failed(err.into()),
    };
    let bpm = match tempo::estimate_bpm(&audio, estimator, options.analysis_sample_rate) {
        Ok(bpm) => Some(bpm),
        Err(err) if err.is_no_tempo() => {
            debug!(filename, "No tempo detected: {err}");
            None
        }
        Err(err) => return Analysis::Failed(err.into()),
    };
    Analysis::Enriched { bpm, peaks }
}

/// Apply one analysis to its record. Failed and skipped analyses leave the record untouched.
fn merge(
    record: &mut TrackMetadataRecord,
    analysis: Analysis,
    options: &EnrichmentOptions,
    report: &mut EnrichmentReport,
) -> RecordOutcome {
    let title = record.title().map(str::to_string);
    let filename = record.filename().map(str::to_string);
    let label = title.as_deref().or(filename.as_deref()).unwrap_or("<untitled>");
    let (state, error) = match analysis {
        Analysis::Enriched { bpm, peaks } => {
            if let Some(bpm) = bpm {
                record.set_detected_bpm(bpm);
            }
            record.set_waveform(&peaks);
            if let Some(discrepancy) = bpm.and_then(|bpm| {
                tempo::check_discrepancy(
                    label,
                    record.declared_bpm(),
                    bpm,
                    options.bpm_discrepancy_threshold,
                )
            }) {
                warn!(
                    title = label,
                    declared = discrepancy.declared,
                    detected = discrepancy.detected,
                    "BPM discrepancy"
                );
                report.discrepancies.push(discrepancy);
            }
            info!(title = label, bpm = ?bpm, peaks = peaks.len(), "Enriched");
            (RecordState::Enriched, None)
        }
        Analysis::MissingFile => {
            warn!(title = label, "Audio file missing; skipped");
            (RecordState::SkippedMissingFile, None)
        }
        Analysis::Failed(err) => {
            warn!(title = label, "Analysis failed: {err}");
            (RecordState::Failed, Some(err.to_string()))
        }
    };
    RecordOutcome {
        title,
        filename,
        state,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::f32::consts::PI;
    use std::sync::atomic::AtomicUsize;

    struct FixedTempo {
        bpm: f32,
        calls: AtomicUsize,
    }

    impl FixedTempo {
        fn new(bpm: f32) -> Self {
            Self {
                bpm,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TempoEstimator for FixedTempo {
        fn estimate_tempo(&self, _mono: &[f32], _rate: u32) -> Result<f32, TempoError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.bpm)
        }
    }

    fn write_sine(path: &Path, seconds: f32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..(22_050.0 * seconds) as usize {
            let value = (2.0 * PI * 440.0 * i as f32 / 22_050.0).sin();
            writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn batch_with(records: serde_json::Value) -> (tempfile::TempDir, BatchDirectory) {
        let dir = tempfile::tempdir().unwrap();
        let batch = BatchDirectory::new(dir.path());
        std::fs::write(
            batch.metadata_path(),
            serde_json::to_string_pretty(&records).unwrap(),
        )
        .unwrap();
        (dir, batch)
    }

    fn options(peak_count: usize) -> EnrichmentOptions {
        EnrichmentOptions {
            peak_count,
            ..EnrichmentOptions::default()
        }
    }

    #[test]
    fn sine_record_gets_fifty_peaks_and_detected_bpm() {
        let (_dir, batch) = batch_with(json!([{"title": "Test", "filename": "test.wav", "bpm": 120}]));
        write_sine(&batch.root().join("test.wav"), 10.0);

        let report = enrich_batch(&batch, &options(50), &FixedTempo::new(121.4), None).unwrap();

        assert_eq!(report.enriched_count, 1);
        let collection = batch.load().unwrap();
        let record = &collection.records[0];
        let peaks = record.waveform().unwrap();
        assert_eq!(peaks.len(), 50);
        assert!(peaks.as_slice().iter().all(|p| (0.95..=1.0).contains(p)));
        assert_eq!(record.detected_bpm(), Some(121));
        assert_eq!(record.declared_bpm(), Some(120));
        assert!(report.discrepancies.is_empty());
    }

    #[test]
    fn missing_file_is_skipped_and_left_untouched() {
        let (_dir, batch) = batch_with(json!([
            {"title": "One", "filename": "one.wav"},
            {"title": "Two", "filename": "two.wav"},
            {"title": "Three", "filename": "three.wav", "waveform_data": [0.25, 0.5]}
        ]));
        write_sine(&batch.root().join("one.wav"), 1.0);
        write_sine(&batch.root().join("two.wav"), 1.0);

        let report = enrich_batch(&batch, &options(20), &FixedTempo::new(100.0), None).unwrap();

        assert_eq!(report.enriched_count, 2);
        assert_eq!(report.total_count, 3);
        assert_eq!(report.skipped_missing_count, 1);
        assert_eq!(report.outcomes[2].state, RecordState::SkippedMissingFile);
        let collection = batch.load().unwrap();
        assert_eq!(
            collection.records[2].get("waveform_data"),
            Some(&json!([0.25, 0.5]))
        );
        assert_eq!(collection.records[2].detected_bpm(), None);
    }

    #[test]
    fn undecodable_file_fails_without_stopping_batch() {
        let (_dir, batch) = batch_with(json!([
            {"title": "Broken", "filename": "broken.wav"},
            {"title": "Fine", "filename": "fine.wav"},
            {"title": "Nameless"}
        ]));
        std::fs::write(batch.root().join("broken.wav"), b"not audio at all").unwrap();
        write_sine(&batch.root().join("fine.wav"), 1.0);

        let report = enrich_batch(&batch, &options(10), &FixedTempo::new(90.0), None).unwrap();

        assert_eq!(report.enriched_count, 1);
        assert_eq!(report.failed_count, 2);
        assert_eq!(report.outcomes[0].state, RecordState::Failed);
        assert!(report.outcomes[0].error.is_some());
        assert!(report.outcomes.iter().all(|outcome| outcome.state.is_terminal()));
        let collection = batch.load().unwrap();
        assert!(collection.records[0].get("waveform_data").is_none());
    }

    #[test]
    fn discrepancy_is_reported_without_overwriting_declared_bpm() {
        let (_dir, batch) = batch_with(json!([{"title": "Fast", "filename": "fast.wav", "bpm": 90}]));
        write_sine(&batch.root().join("fast.wav"), 1.0);

        let report = enrich_batch(&batch, &options(10), &FixedTempo::new(140.0), None).unwrap();

        assert_eq!(report.discrepancies.len(), 1);
        assert_eq!(report.discrepancies[0].title, "Fast");
        let collection = batch.load().unwrap();
        assert_eq!(collection.records[0].declared_bpm(), Some(90));
        assert_eq!(collection.records[0].detected_bpm(), Some(140));
    }

    #[test]
    fn rerun_is_idempotent_and_preserves_field_order() {
        let (_dir, batch) = batch_with(json!([
            {"filename": "a.wav", "title": "A", "genre": "pop", "custom": {"keep": [1, 2]}},
            {"filename": "b.wav", "title": "B", "lyrics": "la"}
        ]));
        write_sine(&batch.root().join("a.wav"), 2.0);
        write_sine(&batch.root().join("b.wav"), 1.5);
        let estimator = FixedTempo::new(100.0);

        enrich_batch(&batch, &options(30), &estimator, None).unwrap();
        let first = std::fs::read_to_string(batch.metadata_path()).unwrap();
        enrich_batch(&batch, &options(30), &estimator, None).unwrap();
        let second = std::fs::read_to_string(batch.metadata_path()).unwrap();

        assert_eq!(first, second);
        let collection = batch.load().unwrap();
        let keys: Vec<&str> = collection.records[0]
            .fields()
            .map(|(key, _)| key.as_str())
            .collect();
        assert_eq!(
            keys,
            ["filename", "title", "genre", "custom", "detected_bpm", "waveform_data"]
        );
    }

    #[test]
    fn worker_pool_matches_sequential_result() {
        let records: Vec<_> = (0..6)
            .map(|i| json!({"title": format!("T{i}"), "filename": format!("t{i}.wav")}))
            .collect();
        let (_dir, batch) = batch_with(serde_json::Value::Array(records));
        for i in 0..6 {
            if i != 3 {
                write_sine(&batch.root().join(&format!("t{i}.wav")), 0.5 + i as f32 * 0.1);
            }
        }
        let estimator = FixedTempo::new(128.0);

        enrich_batch(&batch, &options(16), &estimator, None).unwrap();
        let sequential = std::fs::read_to_string(batch.metadata_path()).unwrap();
        let parallel_options = EnrichmentOptions {
            workers: 3,
            ..options(16)
        };
        let report = enrich_batch(&batch, &parallel_options, &estimator, None).unwrap();

        assert_eq!(report.enriched_count, 5);
        assert_eq!(report.outcomes[3].state, RecordState::SkippedMissingFile);
        let titles: Vec<_> = report
            .outcomes
            .iter()
            .map(|outcome| outcome.title.clone().unwrap())
            .collect();
        assert_eq!(titles, ["T0", "T1", "T2", "T3", "T4", "T5"]);
        assert_eq!(
            std::fs::read_to_string(batch.metadata_path()).unwrap(),
            sequential
        );
    }

    #[test]
    fn cancel_leaves_metadata_unchanged() {
        let (_dir, batch) = batch_with(json!([{"title": "A", "filename": "a.wav"}]));
        write_sine(&batch.root().join("a.wav"), 1.0);
        let before = std::fs::read_to_string(batch.metadata_path()).unwrap();
        let cancel = AtomicBool::new(true);
        let estimator = FixedTempo::new(100.0);

        let result = enrich_batch(&batch, &options(10), &estimator, Some(&cancel));

        assert!(matches!(result, Err(EnrichmentError::Canceled)));
        assert_eq!(estimator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            std::fs::read_to_string(batch.metadata_path()).unwrap(),
            before
        );
    }

    fn write_silence(path: &Path, seconds: f32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..(22_050.0 * seconds) as usize {
            writer.write_sample(0_i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn short_and_silent_audio_get_peaks_without_tempo() {
        let (_dir, batch) = batch_with(json!([
            {"title": "Sting", "filename": "sting.wav", "bpm": 120},
            {"title": "Room Tone", "filename": "silence.wav", "detected_bpm": 95}
        ]));
        write_sine(&batch.root().join("sting.wav"), 1.0);
        write_silence(&batch.root().join("silence.wav"), 5.0);

        let report = enrich_batch(
            &batch,
            &options(40),
            &tempo::OnsetTempoEstimator::default(),
            None,
        )
        .unwrap();

        assert_eq!(report.enriched_count, 2);
        assert_eq!(report.failed_count, 0);
        assert!(report.discrepancies.is_empty());
        let collection = batch.load().unwrap();
        let sting = &collection.records[0];
        assert_eq!(sting.waveform().unwrap().len(), 40);
        assert_eq!(sting.detected_bpm(), None);
        assert_eq!(sting.declared_bpm(), Some(120));
        let silence = &collection.records[1];
        let peaks = silence.waveform().unwrap();
        assert_eq!(peaks.len(), 40);
        assert!(peaks.as_slice().iter().all(|&peak| peak == 0.0));
        assert_eq!(silence.detected_bpm(), Some(95));
    }

    #[test]
    fn filenames_outside_the_batch_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let batch_root = dir.path().join("batch");
        std::fs::create_dir(&batch_root).unwrap();
        let outside = dir.path().join("outside.wav");
        write_sine(&outside, 1.0);
        let batch = BatchDirectory::new(&batch_root);
        std::fs::write(
            batch.metadata_path(),
            serde_json::to_string(&json!([
                {"title": "Climb", "filename": "../outside.wav"},
                {"title": "Absolute", "filename": outside.to_str().unwrap()}
            ]))
            .unwrap(),
        )
        .unwrap();
        let estimator = FixedTempo::new(100.0);

        let report = enrich_batch(&batch, &options(10), &estimator, None).unwrap();

        assert_eq!(report.failed_count, 2);
        assert!(report.outcomes.iter().all(|outcome| outcome.state == RecordState::Failed));
        assert_eq!(estimator.calls.load(Ordering::SeqCst), 0);
        let collection = batch.load().unwrap();
        assert!(collection.records.iter().all(|record| record.waveform().is_none()));
    }

    #[test]
    fn audio_path_stays_inside_the_batch() {
        let batch = BatchDirectory::new("/batches/one");
        assert_eq!(
            batch.audio_path("take.wav"),
            Some(PathBuf::from("/batches/one/take.wav"))
        );
        assert_eq!(
            batch.audio_path("stems/take.wav"),
            Some(PathBuf::from("/batches/one/stems/take.wav"))
        );
        assert_eq!(batch.audio_path("../take.wav"), None);
        assert_eq!(batch.audio_path("stems/../../take.wav"), None);
        assert_eq!(batch.audio_path("/etc/passwd"), None);
        assert_eq!(batch.audio_path(""), None);
    }

    #[test]
    fn missing_metadata_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let batch = BatchDirectory::new(dir.path());
        assert!(matches!(
            enrich_batch(&batch, &options(10), &FixedTempo::new(100.0), None),
            Err(EnrichmentError::Metadata(MetadataError::Missing { .. }))
        ));
    }
}
