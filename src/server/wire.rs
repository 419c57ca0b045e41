//! JSON shapes exchanged with callers.

use crate::config::StructuredOutputMode;
use crate::models::{GenerationRequest, GenerationResult, MediaRef, OutputSchema, Role, Turn};
use crate::{Error, Result};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextGenerationRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Field name → type hint.
    #[serde(default)]
    pub structure_output: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageGenerationRequest {
    #[serde(flatten)]
    pub base: TextGenerationRequest,
    #[serde(default)]
    pub image_path: Option<String>,
    /// Raw base64 or a `data:image/...;base64,` URL.
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub image_mime_type: Option<String>,
}

/// Values filled in when a call leaves model or temperature unset.
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub model: String,
    pub temperature: f32,
}

impl TextGenerationRequest {
    pub fn into_generation_request(self, defaults: &RequestDefaults) -> Result<GenerationRequest> {
        let history = self
            .history
            .into_iter()
            .map(|entry| Ok(Turn::new(entry.role.parse::<Role>()?, entry.content)))
            .collect::<Result<Vec<_>>>()?;

        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| defaults.model.clone());

        let mut builder = GenerationRequest::builder(model, self.prompt)
            .temperature(self.temperature.unwrap_or(defaults.temperature))
            .history(history);
        if let Some(schema) = self.structure_output.filter(|s| !s.is_empty()) {
            builder = builder.schema(OutputSchema(schema));
        }
        Ok(builder.build())
    }
}

impl ImageGenerationRequest {
    pub fn into_generation_request(self, defaults: &RequestDefaults) -> Result<GenerationRequest> {
        let media = match (self.image_path, self.image_base64) {
            (Some(path), None) if !path.trim().is_empty() => MediaRef::path(path),
            (None, Some(encoded)) => decode_inline(&encoded)?,
            (Some(_), Some(_)) => {
                return Err(Error::InvalidRequest(
                    "set either image_path or image_base64, not both".to_string(),
                ))
            }
            _ => {
                return Err(Error::InvalidRequest(
                    "image_path or image_base64 is required".to_string(),
                ))
            }
        };
        let media = match self.image_mime_type {
            Some(mime) => media.with_mime_type(mime),
            None => media,
        };

        let mut request = self.base.into_generation_request(defaults)?;
        request.media = Some(media);
        Ok(request)
    }
}

fn decode_inline(encoded: &str) -> Result<MediaRef> {
    let (mime, payload) = match encoded.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or_else(|| {
                Error::InvalidRequest("malformed data URL in image_base64".to_string())
            })?;
            let mime = header.strip_suffix(";base64").unwrap_or(header);
            (Some(mime.to_string()), payload)
        }
        None => (None, encoded),
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::InvalidRequest(format!("image_base64 is not valid base64: {}", e)))?;

    let media = MediaRef::inline(bytes);
    Ok(match mime.filter(|m| !m.is_empty()) {
        Some(mime) => media.with_mime_type(mime),
        None => media,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Map<String, Value>>,
}

impl GenerationResponse {
    pub fn from_result(result: GenerationResult, mode: StructuredOutputMode) -> Self {
        let json = match mode {
            StructuredOutputMode::Full => result.structured.clone(),
            StructuredOutputMode::Strings => result.string_fields(),
        };
        Self {
            text: result.text,
            json,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub category: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaSource;
    use serde_json::json;

    fn defaults() -> RequestDefaults {
        RequestDefaults {
            model: "gemini-3-flash-preview".to_string(),
            temperature: 0.7,
        }
    }

    #[test]
    fn test_defaults_fill_missing_model_and_temperature() {
        let wire: TextGenerationRequest =
            serde_json::from_value(json!({ "prompt": "Summarize", "model": "" })).unwrap();
        let request = wire.into_generation_request(&defaults()).unwrap();

        assert_eq!(request.model_id, "gemini-3-flash-preview");
        assert_eq!(request.temperature, 0.7);
        assert!(request.schema.is_none());
    }

    #[test]
    fn test_history_roles_are_parsed() {
        let wire: TextGenerationRequest = serde_json::from_value(json!({
            "prompt": "next",
            "temperature": 0.1,
            "history": [
                { "role": "user", "content": "Context A" },
                { "role": "assistant", "content": "Ack" }
            ],
            "structure_output": { "name": "string" }
        }))
        .unwrap();
        let request = wire.into_generation_request(&defaults()).unwrap();

        assert_eq!(request.history[1], Turn::new(Role::Model, "Ack"));
        assert!(request.is_structured());
    }

    #[test]
    fn test_unknown_history_role_is_invalid() {
        let wire: TextGenerationRequest = serde_json::from_value(json!({
            "prompt": "p",
            "history": [{ "role": "narrator", "content": "x" }]
        }))
        .unwrap();
        let err = wire.into_generation_request(&defaults()).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn test_image_request_needs_exactly_one_source() {
        let neither: ImageGenerationRequest =
            serde_json::from_value(json!({ "prompt": "p" })).unwrap();
        assert!(neither.into_generation_request(&defaults()).is_err());

        let both: ImageGenerationRequest = serde_json::from_value(json!({
            "prompt": "p",
            "image_path": "/tmp/a.png",
            "image_base64": "iVBORw=="
        }))
        .unwrap();
        assert!(both.into_generation_request(&defaults()).is_err());
    }

    #[test]
    fn test_image_data_url_carries_mime_type() {
        let wire: ImageGenerationRequest = serde_json::from_value(json!({
            "prompt": "p",
            "image_base64": "data:image/png;base64,iVBORw=="
        }))
        .unwrap();
        let request = wire.into_generation_request(&defaults()).unwrap();
        let media = request.media.unwrap();

        assert_eq!(media.mime_type.as_deref(), Some("image/png"));
        assert_eq!(media.source, MediaSource::Inline(vec![0x89, 0x50, 0x4E, 0x47]));
    }

    #[test]
    fn test_bad_base64_is_invalid_request() {
        let wire: ImageGenerationRequest = serde_json::from_value(json!({
            "prompt": "p",
            "image_base64": "***"
        }))
        .unwrap();
        let err = wire.into_generation_request(&defaults()).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn test_strings_mode_flattens_payload() {
        let result = GenerationResult {
            text: "raw".to_string(),
            structured: json!({ "name": "Alice", "age": 30 }).as_object().cloned(),
        };

        let full = GenerationResponse::from_result(result.clone(), StructuredOutputMode::Full);
        assert_eq!(full.json.as_ref().unwrap().len(), 2);

        let legacy = GenerationResponse::from_result(result, StructuredOutputMode::Strings);
        assert_eq!(legacy.json, json!({ "name": "Alice" }).as_object().cloned());
        assert_eq!(legacy.text, "raw");
    }
}
