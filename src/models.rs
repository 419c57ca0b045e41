//! Data models and structures
//!
//! Value types for one generation call: the conversation turns supplied by
//! the caller, an optional image attachment, an optional output schema, and
//! the reconciled result handed back to the transport.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// Temperatures outside this range are rejected before any backend call.
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=2.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "assistant")]
    Model,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "model" | "assistant" => Ok(Role::Model),
            "system" => Ok(Role::System),
            other => Err(Error::InvalidRequest(format!(
                "Unknown history role '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Where the attached image comes from. Paths are read lazily during assembly.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    Path(PathBuf),
    Inline(Vec<u8>),
}

/// Image attachment as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRef {
    pub source: MediaSource,
    /// Explicit MIME type; sniffed from the bytes when absent.
    pub mime_type: Option<String>,
}

impl MediaRef {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: MediaSource::Path(path.into()),
            mime_type: None,
        }
    }

    pub fn inline(bytes: Vec<u8>) -> Self {
        Self {
            source: MediaSource::Inline(bytes),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Resolved image bytes ready to be sent inline. Never empty.
#[derive(Clone, PartialEq)]
pub struct MediaPart {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for MediaPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPart")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Caller-supplied output shape: field name to type descriptor.
///
/// An empty schema is the same as no schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct OutputSchema(pub Map<String, Value>);

impl OutputSchema {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for OutputSchema {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for OutputSchema {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// One generation call. Built once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model_id: String,
    pub temperature: f32,
    pub new_prompt: String,
    pub history: Vec<Turn>,
    pub media: Option<MediaRef>,
    pub schema: Option<OutputSchema>,
}

impl GenerationRequest {
    pub fn builder(
        model_id: impl Into<String>,
        new_prompt: impl Into<String>,
    ) -> GenerationRequestBuilder {
        GenerationRequestBuilder {
            request: GenerationRequest {
                model_id: model_id.into(),
                temperature: 0.7,
                new_prompt: new_prompt.into(),
                history: Vec::new(),
                media: None,
                schema: None,
            },
        }
    }

    /// True when a non-empty schema was supplied.
    pub fn is_structured(&self) -> bool {
        self.schema.as_ref().is_some_and(|s| !s.is_empty())
    }

    /// Checks caller input before any work is done.
    pub fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(Error::InvalidRequest("model id must not be empty".to_string()));
        }
        if self.new_prompt.trim().is_empty() {
            return Err(Error::InvalidRequest("prompt must not be empty".to_string()));
        }
        if !self.temperature.is_finite() || !TEMPERATURE_RANGE.contains(&self.temperature) {
            return Err(Error::InvalidRequest(format!(
                "temperature {} outside {:?}",
                self.temperature, TEMPERATURE_RANGE
            )));
        }
        Ok(())
    }
}

pub struct GenerationRequestBuilder {
    request: GenerationRequest,
}

impl GenerationRequestBuilder {
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.request.temperature = temperature;
        self
    }

    pub fn history(mut self, history: Vec<Turn>) -> Self {
        self.request.history = history;
        self
    }

    pub fn turn(mut self, role: Role, text: impl Into<String>) -> Self {
        self.request.history.push(Turn::new(role, text));
        self
    }

    pub fn media(mut self, media: MediaRef) -> Self {
        self.request.media = Some(media);
        self
    }

    pub fn schema(mut self, schema: OutputSchema) -> Self {
        self.request.schema = Some(schema);
        self
    }

    pub fn build(self) -> GenerationRequest {
        self.request
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationResult {
    /// Raw backend output; always authoritative.
    pub text: String,
    /// Parsed payload, only in structured mode and only when the text parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<Map<String, Value>>,
}

impl GenerationResult {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            structured: None,
        }
    }

    /// Legacy view of the structured payload keeping only string values.
    pub fn string_fields(&self) -> Option<Map<String, Value>> {
        self.structured.as_ref().map(|map| {
            map.iter()
                .filter(|(_, v)| v.is_string())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }
}
