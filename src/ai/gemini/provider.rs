use super::client::GeminiHttpClient;
use super::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, InlineData, Part,
};
use crate::ai::GenerationProvider;
use crate::assembler::{ContentPart, ContentTurn};
use crate::contract::OutputShape;
use crate::models::Role;
use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine as _;
use std::time::Duration;

/// Upper bound on a single HTTP exchange; per-call deadlines are tighter.
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// [`GenerationProvider`] bound to the Gemini `generateContent` API.
#[derive(Clone)]
pub struct GeminiProvider {
    http: GeminiHttpClient,
}

impl GeminiProvider {
    pub fn new(api_key: String) -> Self {
        Self::new_with_client(api_key, reqwest::Client::new())
    }

    pub fn new_with_client(api_key: String, client: reqwest::Client) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(api_key, HTTP_TIMEOUT, client),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    fn build_request(
        temperature: f32,
        turns: &[ContentTurn],
        output_shape: Option<&OutputShape>,
    ) -> GenerateContentRequest {
        let mut system_parts = Vec::new();
        let mut contents = Vec::with_capacity(turns.len());

        for turn in turns {
            let parts: Vec<Part> = turn.parts.iter().map(to_part).collect();
            match turn.role {
                // generateContent only accepts user/model roles in `contents`.
                Role::System => system_parts.extend(parts),
                role => contents.push(Content {
                    role: Some(role.as_str().to_string()),
                    parts,
                }),
            }
        }

        GenerateContentRequest {
            system_instruction: (!system_parts.is_empty()).then(|| Content {
                role: None,
                parts: system_parts,
            }),
            contents,
            generation_config: GenerationConfig {
                temperature,
                response_mime_type: output_shape.map(|shape| shape.mime_type.to_string()),
                response_json_schema: output_shape.map(|shape| shape.json_schema.clone()),
            },
        }
    }

    /// Concatenates the text parts of the first candidate.
    fn extract_text(response: GenerateContentResponse) -> Result<String> {
        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
                .map(|reason| format!("prompt blocked: {}", reason))
                .unwrap_or_else(|| "no candidates in Gemini response".to_string());
            return Err(Error::rejected(None, reason));
        };

        let texts: Vec<String> = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text),
                _ => None,
            })
            .collect();

        if texts.is_empty() {
            return Err(Error::rejected(
                None,
                format!(
                    "no text in Gemini response (finish reason: {})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ),
            ));
        }
        Ok(texts.concat())
    }

    async fn generate(
        &self,
        model_id: &str,
        temperature: f32,
        turns: &[ContentTurn],
        output_shape: Option<&OutputShape>,
    ) -> Result<String> {
        let request = Self::build_request(temperature, turns, output_shape);

        tracing::debug!(
            model = model_id,
            contents = request.contents.len(),
            structured = output_shape.is_some(),
            "Sending generateContent request to Gemini"
        );

        let response: GenerateContentResponse =
            self.http.generate_content(model_id, &request).await?;
        Self::extract_text(response)
    }
}

fn to_part(part: &ContentPart) -> Part {
    match part {
        ContentPart::Text(text) => Part::Text { text: text.clone() },
        ContentPart::Media(media) => Part::InlineData {
            inline_data: InlineData {
                mime_type: media.mime_type.clone(),
                data: base64::engine::general_purpose::STANDARD.encode(&media.bytes),
            },
        },
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    async fn generate_from_text(
        &self,
        model_id: &str,
        temperature: f32,
        turns: &[ContentTurn],
        output_shape: Option<&OutputShape>,
    ) -> Result<String> {
        if turns.iter().any(ContentTurn::has_media) {
            return Err(Error::InvalidRequest(
                "text-only generation received media parts".to_string(),
            ));
        }
        self.generate(model_id, temperature, turns, output_shape)
            .await
    }

    async fn generate_from_text_and_media(
        &self,
        model_id: &str,
        temperature: f32,
        turns: &[ContentTurn],
        output_shape: Option<&OutputShape>,
    ) -> Result<String> {
        self.generate(model_id, temperature, turns, output_shape)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::gemini::test_support;
    use crate::contract::shape_output;
    use crate::models::{MediaPart, OutputSchema};
    use serde_json::json;
    use wiremock::matchers::{body_json, body_partial_json, path};
    use wiremock::{MockServer, ResponseTemplate};

    const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

    fn make_provider(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new("test-key".to_string()).with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_generate_from_text_parses_response() {
        let server = MockServer::start().await;

        test_support::post_path_regex(test_support::GENERATE_CONTENT_PATH_REGEX)
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(test_support::text_response("A brief summary.")),
            )
            .mount(&server)
            .await;

        let turns = vec![ContentTurn::text(Role::User, "Summarize")];
        let text = make_provider(&server)
            .generate_from_text(DEFAULT_MODEL, 0.7, &turns, None)
            .await
            .unwrap();
        assert_eq!(text, "A brief summary.");
    }

    #[tokio::test]
    async fn test_request_body_carries_history_and_temperature() {
        let server = MockServer::start().await;

        test_support::post_path_regex(test_support::GENERATE_CONTENT_PATH_REGEX)
            .and(path(format!("/v1beta/models/{}:generateContent", DEFAULT_MODEL)))
            .and(body_json(json!({
                "systemInstruction": { "parts": [{ "text": "be terse" }] },
                "contents": [
                    { "role": "user", "parts": [{ "text": "Context A" }] },
                    { "role": "model", "parts": [{ "text": "Ack" }] },
                    { "role": "user", "parts": [{ "text": "Go on" }] }
                ],
                "generationConfig": { "temperature": 0.5 }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(test_support::text_response("ok")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let turns = vec![
            ContentTurn::text(Role::System, "be terse"),
            ContentTurn::text(Role::User, "Context A"),
            ContentTurn::text(Role::Model, "Ack"),
            ContentTurn::text(Role::User, "Go on"),
        ];
        make_provider(&server)
            .generate_from_text(DEFAULT_MODEL, 0.5, &turns, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_structured_mode_requests_json_output() {
        let server = MockServer::start().await;

        test_support::post_path_regex(test_support::GENERATE_CONTENT_PATH_REGEX)
            .and(body_partial_json(json!({
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseJsonSchema": {
                        "type": "object",
                        "properties": { "name": { "type": "string" } }
                    }
                }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(test_support::text_response(r#"{"name":"Alice"}"#)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let schema: OutputSchema = [("name", "string")].into_iter().collect();
        let shape = shape_output(Some(&schema));
        let turns = vec![ContentTurn::text(Role::User, "Extract fields")];

        let text = make_provider(&server)
            .generate_from_text(DEFAULT_MODEL, 0.2, &turns, shape.as_ref())
            .await
            .unwrap();
        assert_eq!(text, r#"{"name":"Alice"}"#);
    }

    #[tokio::test]
    async fn test_media_is_sent_inline_in_the_user_turn() {
        let server = MockServer::start().await;

        test_support::post_path_regex(test_support::GENERATE_CONTENT_PATH_REGEX)
            .and(body_partial_json(json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": "What is this?" },
                        { "inlineData": { "mimeType": "image/png", "data": "iVBORw==" } }
                    ]
                }]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(test_support::text_response("A cat")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let turns = vec![ContentTurn {
            role: Role::User,
            parts: vec![
                ContentPart::Text("What is this?".to_string()),
                ContentPart::Media(MediaPart {
                    mime_type: "image/png".to_string(),
                    bytes: vec![0x89, 0x50, 0x4E, 0x47],
                }),
            ],
        }];

        let text = make_provider(&server)
            .generate_from_text_and_media(DEFAULT_MODEL, 0.7, &turns, None)
            .await
            .unwrap();
        assert_eq!(text, "A cat");
    }

    #[tokio::test]
    async fn test_text_parts_are_concatenated() {
        let server = MockServer::start().await;

        test_support::post_path_regex(test_support::GENERATE_CONTENT_PATH_REGEX)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {
                        "parts": [
                            { "text": "Hello, " },
                            { "functionCall": { "name": "noop", "args": {} } },
                            { "text": "world" }
                        ]
                    }
                }]
            })))
            .mount(&server)
            .await;

        let turns = vec![ContentTurn::text(Role::User, "hi")];
        let text = make_provider(&server)
            .generate_from_text(DEFAULT_MODEL, 0.7, &turns, None)
            .await
            .unwrap();
        assert_eq!(text, "Hello, world");
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_backend_rejected() {
        let server = MockServer::start().await;

        test_support::post_path_regex(test_support::GENERATE_CONTENT_PATH_REGEX)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let turns = vec![ContentTurn::text(Role::User, "hi")];
        let err = make_provider(&server)
            .generate_from_text(DEFAULT_MODEL, 0.7, &turns, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("prompt blocked: SAFETY"));
    }

    #[tokio::test]
    async fn test_candidate_without_text_is_backend_rejected() {
        let server = MockServer::start().await;

        test_support::post_path_regex(test_support::GENERATE_CONTENT_PATH_REGEX)
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "finishReason": "SAFETY" }]
            })))
            .mount(&server)
            .await;

        let turns = vec![ContentTurn::text(Role::User, "hi")];
        let err = make_provider(&server)
            .generate_from_text(DEFAULT_MODEL, 0.7, &turns, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BackendRejected { .. }));
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn test_text_call_refuses_media_parts() {
        let provider = GeminiProvider::new("k".to_string()).with_base_url("http://127.0.0.1:9");
        let turns = vec![ContentTurn {
            role: Role::User,
            parts: vec![ContentPart::Media(MediaPart {
                mime_type: "image/png".to_string(),
                bytes: vec![1],
            })],
        }];

        let err = provider
            .generate_from_text(DEFAULT_MODEL, 0.7, &turns, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
