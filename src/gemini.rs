//! Gemini REST client for the single image-edit call.
//!
//! One request per user-initiated edit: the encoded original image plus
//! the prompt, asking for image and text response modalities back. No
//! retries, no cancellation; the caller serializes submissions.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encode::{self, CodecError};
use crate::session::EditedImage;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Error)]
pub enum EditError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("the model did not return an image. Response: {}", .text.as_deref().unwrap_or("(nothing usable)"))]
    NoImage { text: Option<String> },
    #[error("edit request failed: {0}")]
    Transport(String),
    #[error("unexpected response from the edit service: {0}")]
    Unexpected(String),
}

#[derive(Debug)]
pub struct EditOutcome {
    pub image: EditedImage,
    pub caption: Option<String>,
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Reads the API key from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self, String> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(format!("{API_KEY_ENV} is not set")),
        }
    }

    #[allow(dead_code)]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Issues one edit request: encodes the image, sends it with the
    /// prompt, and extracts the first inline-image part plus any
    /// caption text from the response.
    pub async fn request_edit(
        &self,
        image_bytes: &[u8],
        prompt: &str,
    ) -> Result<EditOutcome, EditError> {
        let encoded = encode::encode_image(image_bytes)?;
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: encoded.media_type.to_string(),
                            data: encoded.data,
                        },
                    },
                    Part::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE", "TEXT"],
            },
        };

        let url = format!(
            "{BASE_URL}/{model}:generateContent?key={key}",
            model = self.model,
            key = self.api_key
        );

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|err| EditError::Transport(format!("could not reach the edit service: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(EditError::Transport(http_error_message(status, &body)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| EditError::Unexpected(format!("failed to parse response: {err}")))?;

        extract_outcome(parsed)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<ResponseInlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseInlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// First inline-image part wins; the first text part becomes the
/// caption. A response with no image at all is the `NoImage` failure,
/// carrying whatever text came back so the UI can show it.
fn extract_outcome(response: GenerateContentResponse) -> Result<EditOutcome, EditError> {
    let parts = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts)
        .unwrap_or_default();

    let mut image = None;
    let mut caption = None;
    for part in parts {
        if let Some(inline) = part.inline_data {
            if image.is_none() {
                let bytes = BASE64_STANDARD.decode(&inline.data).map_err(|err| {
                    EditError::Unexpected(format!("inline image data is not valid base64: {err}"))
                })?;
                image = Some(EditedImage {
                    bytes: Arc::from(bytes.into_boxed_slice()),
                    media_type: inline.mime_type,
                });
            }
        } else if let Some(text) = part.text {
            if caption.is_none() {
                caption = Some(text);
            }
        }
    }

    match image {
        Some(image) => Ok(EditOutcome { image, caption }),
        None => Err(EditError::NoImage { text: caption }),
    }
}

fn http_error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let message = wrapper
                .error
                .message
                .unwrap_or_else(|| body.to_string());
            if status_text.is_empty() {
                format!("{status}: {message}")
            } else {
                format!("{status_text}: {message}")
            }
        })
        .unwrap_or_else(|_| format!("{status}: {body}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn request_serializes_with_camel_case_wire_names() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png".to_string(),
                            data: "QUJD".to_string(),
                        },
                    },
                    Part::Text {
                        text: "make it sepia".to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE", "TEXT"],
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["contents"][0]["parts"][1]["text"], "make it sepia");
        assert_eq!(json["generationConfig"]["responseModalities"][0], "IMAGE");
    }

    #[test]
    fn extracts_image_and_caption() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"warm tones applied"},
                {"inlineData":{"mimeType":"image/png","data":"QUJD"}}
            ]}}]}"#,
        );
        let outcome = extract_outcome(response).unwrap();
        assert_eq!(outcome.image.media_type, "image/png");
        assert_eq!(outcome.image.bytes.as_ref(), b"ABC");
        assert_eq!(outcome.caption.as_deref(), Some("warm tones applied"));
    }

    #[test]
    fn first_inline_image_wins() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[
                {"inlineData":{"mimeType":"image/png","data":"QUJD"}},
                {"inlineData":{"mimeType":"image/webp","data":"WFla"}}
            ]}}]}"#,
        );
        let outcome = extract_outcome(response).unwrap();
        assert_eq!(outcome.image.media_type, "image/png");
    }

    #[test]
    fn text_only_response_fails_with_the_text_attached() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"I cannot edit this"}]}}]}"#,
        );
        let err = extract_outcome(response).unwrap_err();
        match &err {
            EditError::NoImage { text } => assert_eq!(text.as_deref(), Some("I cannot edit this")),
            other => panic!("expected NoImage, got {other:?}"),
        }
        assert!(err.to_string().contains("I cannot edit this"));
    }

    #[test]
    fn empty_response_fails_without_text() {
        let err = extract_outcome(parse(r#"{"candidates":[]}"#)).unwrap_err();
        assert!(matches!(err, EditError::NoImage { text: None }));
        let err = extract_outcome(parse("{}")).unwrap_err();
        assert!(matches!(err, EditError::NoImage { text: None }));
    }

    #[test]
    fn invalid_inline_base64_is_unexpected() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[
                {"inlineData":{"mimeType":"image/png","data":"%%%"}}
            ]}}]}"#,
        );
        assert!(matches!(
            extract_outcome(response).unwrap_err(),
            EditError::Unexpected(_)
        ));
    }

    #[test]
    fn http_error_prefers_the_service_message() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        let message = http_error_message(StatusCode::BAD_REQUEST, body);
        assert_eq!(message, "INVALID_ARGUMENT: API key not valid");
    }

    #[test]
    fn http_error_falls_back_to_the_raw_body() {
        let message = http_error_message(StatusCode::BAD_GATEWAY, "upstream exploded");
        assert!(message.contains("502"));
        assert!(message.contains("upstream exploded"));
    }
}
