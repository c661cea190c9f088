use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{info, warn};

use crate::audio::{WavWriteError, resample_linear, write_wav_f32};
use crate::metadata::{METADATA_FILE_NAME, MetadataCollection, MetadataError, TrackMetadataRecord};

use super::assemble::{AssembleError, DEFAULT_CROSSFADE_SECONDS, GeneratedAudioChunk, assemble};
use super::prompts::{PromptCatalog, TrackPrompt};
use super::synth::{ChunkSynthesizer, SynthesisError};

/// Longest segment requested from a synthesizer in one call.
pub const DEFAULT_CHUNK_SECONDS: u32 = 25;
pub const DEFAULT_TRACK_SECONDS: u32 = 60;

#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Target length of every generated track.
    pub duration_seconds: u32,
    pub chunk_seconds: u32,
    pub crossfade_seconds: f32,
    /// Only the first `count` prompts are considered.
    pub count: Option<usize>,
    /// Keep the existing batch file and skip titles already in it.
    pub resume: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            duration_seconds: DEFAULT_TRACK_SECONDS,
            chunk_seconds: DEFAULT_CHUNK_SECONDS,
            crossfade_seconds: DEFAULT_CROSSFADE_SECONDS,
            count: None,
            resume: false,
        }
    }
}

impl GenerationOptions {
    /// Chunks needed to cover the target length: `max(1, ceil(duration / chunk))`.
    pub fn chunk_count(&self) -> u32 {
        self.duration_seconds
            .div_ceil(self.chunk_seconds.max(1))
            .max(1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub generated: usize,
    pub skipped_existing: usize,
    pub failed: usize,
    /// Records in the batch file after the run.
    pub total_records: usize,
    pub canceled: bool,
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Unable to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Why one track could not be produced. Never aborts the batch.
#[derive(Debug, Error)]
pub enum TrackGenerationError {
    #[error("chunk {index}: {source}")]
    Synthesis {
        index: u32,
        source: SynthesisError,
    },
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error(transparent)]
    Write(#[from] WavWriteError),
}

/// Synthesize every prompt into `output_dir`, keeping `metadata.json` current after each track.
///
/// Failed tracks are logged and counted; the batch moves on. Cancellation stops before the
/// next track and keeps everything already written.
pub fn generate_batch(
    catalog: &PromptCatalog,
    synthesizer: &dyn ChunkSynthesizer,
    output_dir: &Path,
    options: &GenerationOptions,
    cancel: Option<&AtomicBool>,
) -> Result<GenerationReport, GenerationError> {
    std::fs::create_dir_all(output_dir).map_err(|source| GenerationError::CreateDir {
        path: output_dir.to_path_buf(),
        source,
    })?;
    let meta_path = output_dir.join(METADATA_FILE_NAME);
    let mut collection = if options.resume {
        let existing = MetadataCollection::load_or_empty(&meta_path)?;
        info!(existing = existing.len(), "Resuming generation");
        existing
    } else {
        MetadataCollection::default()
    };

    let prompts = match options.count {
        Some(count) => &catalog.prompts()[..count.min(catalog.len())],
        None => catalog.prompts(),
    };
    let chunk_count = options.chunk_count();
    let mut report = GenerationReport::default();
    info!(
        tracks = prompts.len(),
        chunk_count,
        chunk_seconds = options.chunk_seconds,
        "Starting generation"
    );

    for prompt in prompts {
        if collection.contains_title(&prompt.title) {
            report.skipped_existing += 1;
            continue;
        }
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            report.canceled = true;
            break;
        }
        let filename = prompt.wav_file_name();
        match generate_track(prompt, synthesizer, &output_dir.join(&filename), options, chunk_count)
        {
            Ok(duration) => {
                collection
                    .records
                    .push(TrackMetadataRecord::from_prompt(prompt, &filename, duration));
                collection.save_atomic(&meta_path)?;
                report.generated += 1;
                info!(title = %prompt.title, %filename, duration, "Generated track");
            }
            Err(err) => {
                report.failed += 1;
                warn!(title = %prompt.title, "Track generation failed: {err}");
            }
        }
    }

    report.total_records = collection.len();
    info!(
        generated = report.generated,
        skipped = report.skipped_existing,
        failed = report.failed,
        total = report.total_records,
        "Generation finished"
    );
    Ok(report)
}

/// Render, stitch and write one track. Returns its whole-second duration.
fn generate_track(
    prompt: &TrackPrompt,
    synthesizer: &dyn ChunkSynthesizer,
    path: &Path,
    options: &GenerationOptions,
    chunk_count: u32,
) -> Result<u32, TrackGenerationError> {
    let mut sample_rate = 0;
    let mut chunks = Vec::with_capacity(chunk_count as usize);
    for index in 0..chunk_count {
        let audio = synthesizer
            .synthesize(prompt, options.chunk_seconds as f32)
            .map_err(|source| TrackGenerationError::Synthesis { index, source })?;
        let mono = audio.to_mono();
        if sample_rate == 0 {
            sample_rate = audio.sample_rate;
        }
        let mono = if audio.sample_rate == sample_rate {
            mono
        } else {
            resample_linear(&mono, audio.sample_rate, sample_rate)
        };
        tracing::debug!(index, seconds = mono.len() as f32 / sample_rate.max(1) as f32, "Chunk ready");
        chunks.push(GeneratedAudioChunk::new(mono, sample_rate));
    }
    let track = assemble(chunks, sample_rate, options.crossfade_seconds)?;
    write_wav_f32(path, &track)?;
    Ok(track.duration_seconds() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioBuffer;
    use std::sync::atomic::AtomicUsize;

    struct SineSynth {
        sample_rate: u32,
        calls: AtomicUsize,
        fail_title: Option<&'static str>,
    }

    impl SineSynth {
        fn new(sample_rate: u32) -> Self {
            Self {
                sample_rate,
                calls: AtomicUsize::new(0),
                fail_title: None,
            }
        }
    }

    impl ChunkSynthesizer for SineSynth {
        fn synthesize(
            &self,
            prompt: &TrackPrompt,
            duration_seconds: f32,
        ) -> Result<AudioBuffer, SynthesisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_title == Some(prompt.title.as_str()) {
                return Err(SynthesisError::Backend("model crashed".into()));
            }
            let frames = (duration_seconds * self.sample_rate as f32) as usize;
            let samples = (0..frames)
                .map(|i| (i as f32 * 0.05).sin() * 0.5)
                .collect();
            Ok(AudioBuffer::mono(samples, self.sample_rate))
        }
    }

    fn catalog() -> PromptCatalog {
        let prompts = ["Paper Moon", "Neon Highway", "Glass Houses"]
            .iter()
            .map(|title| TrackPrompt {
                title: title.to_string(),
                prompt: format!("{title} prompt"),
                genre: "pop".into(),
                mood: "happy".into(),
                bpm: Some(100),
                artist_name: Some("Aria Vale".into()),
                language: None,
                lyrics: None,
            })
            .collect();
        PromptCatalog::from_prompts(prompts).unwrap()
    }

    fn options() -> GenerationOptions {
        GenerationOptions {
            duration_seconds: 5,
            chunk_seconds: 2,
            crossfade_seconds: 0.5,
            count: None,
            resume: false,
        }
    }

    #[test]
    fn chunk_count_rounds_up_and_is_at_least_one() {
        let mut options = GenerationOptions::default();
        assert_eq!(options.chunk_count(), 3);
        options.duration_seconds = 25;
        assert_eq!(options.chunk_count(), 1);
        options.duration_seconds = 0;
        assert_eq!(options.chunk_count(), 1);
    }

    #[test]
    fn generates_tracks_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let synth = SineSynth::new(8_000);

        let report = generate_batch(&catalog(), &synth, dir.path(), &options(), None).unwrap();

        assert_eq!(report.generated, 3);
        assert_eq!(report.total_records, 3);
        assert_eq!(synth.calls.load(Ordering::SeqCst), 9);
        let wav = dir.path().join("pop_paper_moon.wav");
        let audio = crate::audio::decode_file(&wav).unwrap();
        // Three 2 s chunks with two 0.5 s crossfades.
        assert_eq!(audio.samples.len(), 8_000 * 5);

        let collection =
            MetadataCollection::load(&dir.path().join(METADATA_FILE_NAME)).unwrap();
        let record = collection.find_by_title("Paper Moon").unwrap();
        assert_eq!(record.filename(), Some("pop_paper_moon.wav"));
        assert_eq!(record.duration_seconds(), Some(5));
        assert_eq!(record.get_str("language"), Some("English"));
    }

    #[test]
    fn resume_skips_existing_titles() {
        let dir = tempfile::tempdir().unwrap();
        let first = GenerationOptions {
            count: Some(1),
            ..options()
        };
        generate_batch(&catalog(), &SineSynth::new(8_000), dir.path(), &first, None).unwrap();

        let synth = SineSynth::new(8_000);
        let resumed = GenerationOptions {
            resume: true,
            ..options()
        };
        let report = generate_batch(&catalog(), &synth, dir.path(), &resumed, None).unwrap();

        assert_eq!(report.skipped_existing, 1);
        assert_eq!(report.generated, 2);
        assert_eq!(report.total_records, 3);
        assert_eq!(synth.calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn failed_track_does_not_stop_batch() {
        let dir = tempfile::tempdir().unwrap();
        let synth = SineSynth {
            fail_title: Some("Neon Highway"),
            ..SineSynth::new(8_000)
        };

        let report = generate_batch(&catalog(), &synth, dir.path(), &options(), None).unwrap();

        assert_eq!(report.generated, 2);
        assert_eq!(report.failed, 1);
        assert!(!dir.path().join("pop_neon_highway.wav").exists());
        let collection =
            MetadataCollection::load(&dir.path().join(METADATA_FILE_NAME)).unwrap();
        assert!(!collection.contains_title("Neon Highway"));
    }

    #[test]
    fn cancel_stops_before_next_track() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = AtomicBool::new(true);
        let report = generate_batch(
            &catalog(),
            &SineSynth::new(8_000),
            dir.path(),
            &options(),
            Some(&cancel),
        )
        .unwrap();
        assert!(report.canceled);
        assert_eq!(report.generated, 0);
    }
}
