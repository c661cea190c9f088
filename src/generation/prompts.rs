use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Language stored when neither the metadata nor the prompt names one.
pub const DEFAULT_LANGUAGE: &str = "English";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Failed to read prompt catalog {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid prompt catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Prompt catalog lists \"{0}\" more than once")]
    DuplicateTitle(String),
}

/// One track to synthesize, as listed in the prompt catalog file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPrompt {
    pub title: String,
    pub prompt: String,
    pub genre: String,
    pub mood: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
}

impl TrackPrompt {
    /// Audio file name written for this prompt: `<genre>_<title lowercased, spaces to _>.wav`.
    pub fn wav_file_name(&self) -> String {
        format!("{}_{}.wav", self.genre, self.title.to_lowercase().replace(' ', "_"))
    }

    pub fn language_or_default(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }
}

/// Ordered list of prompts loaded from a JSON array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptCatalog {
    prompts: Vec<TrackPrompt>,
}

impl PromptCatalog {
    pub fn load(path: &Path) -> Result<Self, PromptError> {
        let text = std::fs::read_to_string(path).map_err(|source| PromptError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let prompts: Vec<TrackPrompt> =
            serde_json::from_str(&text).map_err(|source| PromptError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_prompts(prompts)
    }

    /// Build a catalog, rejecting duplicate titles since titles key every later lookup.
    pub fn from_prompts(prompts: Vec<TrackPrompt>) -> Result<Self, PromptError> {
        let mut seen = HashSet::new();
        for prompt in &prompts {
            if !seen.insert(prompt.title.as_str()) {
                return Err(PromptError::DuplicateTitle(prompt.title.clone()));
            }
        }
        Ok(Self { prompts })
    }

    pub fn find_by_title(&self, title: &str) -> Option<&TrackPrompt> {
        self.prompts.iter().find(|prompt| prompt.title == title)
    }

    pub fn prompts(&self) -> &[TrackPrompt] {
        &self.prompts
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}
