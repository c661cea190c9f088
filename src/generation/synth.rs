use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::audio::{AudioBuffer, DecodeError, decode_bytes};
use crate::http_client::{self, RetryConfig};

use super::TrackPrompt;

const DEFAULT_MAX_RESPONSE_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Synthesis request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        source: Box<ureq::Error>,
    },
    #[error("Failed to read synthesis response from {endpoint}: {source}")]
    Response {
        endpoint: String,
        source: std::io::Error,
    },
    #[error("Synthesized audio could not be decoded: {0}")]
    Decode(#[from] DecodeError),
    #[error("Synthesizer failed: {0}")]
    Backend(String),
}

/// A model that renders at most one chunk of audio per call.
pub trait ChunkSynthesizer: Send + Sync {
    /// Render about `duration_seconds` of audio for `prompt`.
    fn synthesize(
        &self,
        prompt: &TrackPrompt,
        duration_seconds: f32,
    ) -> Result<AudioBuffer, SynthesisError>;
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    prompt: &'a str,
    duration_seconds: f32,
    genre: &'a str,
    mood: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    bpm: Option<u32>,
}

/// Synthesizer served over HTTP: POST a JSON request, receive WAV bytes.
#[derive(Debug, Clone)]
pub struct HttpChunkSynthesizer {
    endpoint: String,
    max_response_bytes: usize,
    retry: RetryConfig,
}

impl HttpChunkSynthesizer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_max_response_bytes(mut self, max_bytes: usize) -> Self {
        self.max_response_bytes = max_bytes;
        self
    }

    pub fn with_retry(mut self, max_attempts: usize, base_delay: Duration) -> Self {
        self.retry.max_attempts = max_attempts.max(1);
        self.retry.base_delay = base_delay;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ChunkSynthesizer for HttpChunkSynthesizer {
    fn synthesize(
        &self,
        prompt: &TrackPrompt,
        duration_seconds: f32,
    ) -> Result<AudioBuffer, SynthesisError> {
        let request = SynthesisRequest {
            prompt: &prompt.prompt,
            duration_seconds,
            genre: &prompt.genre,
            mood: &prompt.mood,
            bpm: prompt.bpm,
        };
        let response = http_client::retry_with_backoff(
            self.retry,
            || {
                http_client::agent()
                    .post(&self.endpoint)
                    .set("Accept", "audio/wav")
                    .send_json(&request)
            },
            http_client::is_retryable,
        )
        .map_err(|source| SynthesisError::Request {
            endpoint: self.endpoint.clone(),
            source: Box::new(source),
        })?;
        let bytes = http_client::read_response_bytes(response, self.max_response_bytes).map_err(
            |source| SynthesisError::Response {
                endpoint: self.endpoint.clone(),
                source,
            },
        )?;
        let audio = decode_bytes(bytes, Some("wav"))?;
        Ok(AudioBuffer::mono(audio.to_mono(), audio.sample_rate))
    }
}
