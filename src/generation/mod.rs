//! Long-track synthesis: prompt catalog, chunk synthesizers and the crossfade assembler.
//!
//! Synthesis models cap the length of a single call, so a track is rendered as successive
//! chunks and stitched with a linear crossfade at each splice.

mod assemble;
mod batch;
mod prompts;
mod synth;

pub use assemble::{AssembleError, DEFAULT_CROSSFADE_SECONDS, GeneratedAudioChunk, assemble};
pub use batch::{
    DEFAULT_CHUNK_SECONDS, DEFAULT_TRACK_SECONDS, GenerationError, GenerationOptions,
    GenerationReport, TrackGenerationError, generate_batch,
};
pub use prompts::{DEFAULT_LANGUAGE, PromptCatalog, PromptError, TrackPrompt};
pub use synth::{ChunkSynthesizer, HttpChunkSynthesizer, SynthesisError};
