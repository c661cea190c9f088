//! Catalog and enrichment pipeline for a library of generated music tracks.
/// Per-user application directories.
pub mod app_dirs;
mod atomic_file;
/// Decoded PCM buffers, decoding, resampling and WAV output.
pub mod audio;
/// Filesystem blob storage for track audio.
pub mod blob_store;
/// SQLite catalog of tracks, genres and moods.
pub mod catalog;
/// Pipeline settings stored as TOML.
pub mod config;
/// Waveform and BPM enrichment of metadata batches.
pub mod enrichment;
/// Chunked synthesis and crossfade assembly of long tracks.
pub mod generation;
pub(crate) mod http_client;
/// Tracing subscriber setup.
pub mod logging;
/// Order-preserving metadata batch files.
pub mod metadata;
/// Tempo estimation and BPM merge policy.
pub mod tempo;
/// Waveform peak extraction.
pub mod waveform;
