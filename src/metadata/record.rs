use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::generation::TrackPrompt;
use crate::waveform::PeakSeries;

pub const FIELD_FILENAME: &str = "filename";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_GENRE: &str = "genre";
pub const FIELD_MOOD: &str = "mood";
pub const FIELD_BPM: &str = "bpm";
pub const FIELD_DETECTED_BPM: &str = "detected_bpm";
pub const FIELD_DURATION: &str = "duration";
pub const FIELD_PROMPT: &str = "prompt";
pub const FIELD_LYRICS: &str = "lyrics";
pub const FIELD_ARTIST_NAME: &str = "artist_name";
pub const FIELD_LANGUAGE: &str = "language";
pub const FIELD_WAVEFORM: &str = "waveform_data";

/// One flat metadata object from a batch file.
///
/// Fields keep their original order and values; only the enrichment fields are ever
/// written, and new fields are appended after the existing ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackMetadataRecord(Map<String, Value>);

impl TrackMetadataRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Record written after synthesizing `prompt` into `filename`.
    pub fn from_prompt(prompt: &TrackPrompt, filename: &str, duration_seconds: u32) -> Self {
        let mut record = Self::new();
        record.set(FIELD_FILENAME, filename);
        record.set(FIELD_TITLE, prompt.title.as_str());
        record.set(FIELD_GENRE, prompt.genre.as_str());
        record.set(FIELD_MOOD, prompt.mood.as_str());
        record.set(FIELD_BPM, prompt.bpm.map_or(Value::Null, Value::from));
        record.set(FIELD_DURATION, duration_seconds);
        record.set(FIELD_PROMPT, prompt.prompt.as_str());
        record.set(FIELD_LYRICS, prompt.lyrics.as_deref().unwrap_or_default());
        record.set(FIELD_ARTIST_NAME, prompt.artist_name.as_deref().unwrap_or_default());
        record.set(FIELD_LANGUAGE, prompt.language_or_default());
        record
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Non-empty string value of `field`.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Replace `field` in place, or append it when absent.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.0.insert(field.to_string(), value.into());
    }

    pub fn title(&self) -> Option<&str> {
        self.get_str(FIELD_TITLE)
    }

    pub fn filename(&self) -> Option<&str> {
        self.get_str(FIELD_FILENAME)
    }

    /// Author-declared tempo; never modified by enrichment.
    pub fn declared_bpm(&self) -> Option<u32> {
        self.get(FIELD_BPM).and_then(value_as_u32)
    }

    pub fn detected_bpm(&self) -> Option<u32> {
        self.get(FIELD_DETECTED_BPM).and_then(value_as_u32)
    }

    pub fn set_detected_bpm(&mut self, bpm: u32) {
        self.set(FIELD_DETECTED_BPM, bpm);
    }

    pub fn duration_seconds(&self) -> Option<u32> {
        self.get(FIELD_DURATION).and_then(value_as_u32)
    }

    /// Stored peak series, when present and well formed.
    pub fn waveform(&self) -> Option<PeakSeries> {
        match self.get(FIELD_WAVEFORM)? {
            Value::Null => None,
            value => serde_json::from_value(value.clone()).ok(),
        }
    }

    pub fn set_waveform(&mut self, peaks: &PeakSeries) {
        self.set(FIELD_WAVEFORM, peaks.to_json());
    }

    /// Fill lyrics, artist and language from the matching prompt where the record has none.
    ///
    /// Values already present in the record always win. Returns the names of filled fields.
    pub fn fill_missing_from(&mut self, prompt: &TrackPrompt) -> Vec<&'static str> {
        let fallbacks = [
            (FIELD_LYRICS, prompt.lyrics.as_deref()),
            (FIELD_ARTIST_NAME, prompt.artist_name.as_deref()),
            (FIELD_LANGUAGE, prompt.language.as_deref()),
        ];
        let mut filled = Vec::new();
        for (field, fallback) in fallbacks {
            let Some(value) = fallback.filter(|value| !value.is_empty()) else {
                continue;
            };
            if self.get_str(field).is_none() {
                self.set(field, value);
                filled.push(field);
            }
        }
        filled
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for TrackMetadataRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn value_as_u32(value: &Value) -> Option<u32> {
    if let Some(int) = value.as_u64() {
        return u32::try_from(int).ok();
    }
    let float = value.as_f64()?;
    (float.is_finite() && float >= 0.0 && float <= u32::MAX as f64).then(|| float.round() as u32)
}
