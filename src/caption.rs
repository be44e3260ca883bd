use crate::error::{OverlayError, Result};

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The named text slots a caption entry may fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Text,
    Phonetic,
    Translation,
}

impl TextField {
    pub const ALL: [TextField; 3] = [TextField::Text, TextField::Phonetic, TextField::Translation];

    pub fn name(self) -> &'static str {
        match self {
            TextField::Text => "text",
            TextField::Phonetic => "phonetic",
            TextField::Translation => "translation",
        }
    }
}

impl fmt::Display for TextField {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.name())
    }
}

/// A single cue. Times are in seconds; `start > end` is tolerated and simply never matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionEntry {
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonetic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

impl CaptionEntry {
    #[cfg(test)]
    pub fn new(start: f64, end: f64, text: &str) -> Self {
        Self {
            start,
            end,
            text: Some(text.to_string()),
            phonetic: None,
            translation: None,
        }
    }

    /// Text of the given slot, empty when the entry does not carry it.
    pub fn field(&self, field: TextField) -> &str {
        let value = match field {
            TextField::Text => &self.text,
            TextField::Phonetic => &self.phonetic,
            TextField::Translation => &self.translation,
        };
        value.as_deref().unwrap_or("")
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Entries in the order they were supplied. Never sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptionSet {
    entries: Vec<CaptionEntry>,
}

impl CaptionSet {
    pub fn new(entries: Vec<CaptionEntry>) -> Self {
        Self { entries }
    }

    /// Validates a load request of the shape `{ "captions": [ {start, end, ...}, ... ] }`.
    ///
    /// Either the whole payload is accepted or an error is returned; nothing is
    /// partially loaded.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let captions = payload
            .get("captions")
            .ok_or_else(|| OverlayError::InvalidPayload("missing `captions` field".to_string()))?;
        let items = captions.as_array().ok_or_else(|| {
            OverlayError::InvalidPayload("`captions` is not a sequence".to_string())
        })?;

        let entries = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                CaptionEntry::deserialize(item)
                    .map_err(|err| OverlayError::InvalidPayload(format!("caption {}: {}", i, err)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(entries))
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(data)?;
        Self::from_payload(&payload)
    }

    pub fn to_payload(&self) -> Value {
        serde_json::json!({ "captions": self.entries })
    }

    pub fn entries(&self) -> &[CaptionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn resolve(&self, t: f64) -> Option<&CaptionEntry> {
        crate::index::resolve(t, &self.entries)
    }
}
