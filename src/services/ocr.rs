// src/services/ocr.rs

//! Text recognition for notice images.

use std::collections::BTreeSet;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::OcrConfig;

/// Recognizes text lines in an image.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Distinct lines of text found in `image`.
    async fn recognize(&self, image: &[u8]) -> Result<BTreeSet<String>>;
}

/// Google Cloud Vision `images:annotate` with `DOCUMENT_TEXT_DETECTION`.
pub struct VisionRecognizer {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl VisionRecognizer {
    pub fn new(client: Client, config: &OcrConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResult {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

#[async_trait]
impl TextRecognizer for VisionRecognizer {
    async fn recognize(&self, image: &[u8]) -> Result<BTreeSet<String>> {
        let request = json!({
            "requests": [{
                "image": { "content": STANDARD.encode(image) },
                "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }]
            }]
        });

        let body = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_annotate_response(&body)
    }
}

/// Extract text lines from an `images:annotate` response.
///
/// The first text annotation holds the full recognized text.
fn parse_annotate_response(body: &str) -> Result<BTreeSet<String>> {
    let response: AnnotateResponse = serde_json::from_str(body)?;
    let Some(result) = response.responses.into_iter().next() else {
        return Err(AppError::ocr("empty annotate response"));
    };

    if let Some(status) = result.error.filter(|s| !s.message.is_empty()) {
        return Err(AppError::ocr(status.message));
    }

    Ok(split_lines(
        result
            .text_annotations
            .first()
            .map(|a| a.description.as_str())
            .unwrap_or(""),
    ))
}

/// Split recognized text into distinct, trimmed, non-empty lines.
pub fn split_lines(text: &str) -> BTreeSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_annotations() {
        let body = r#"{
            "responses": [{
                "textAnnotations": [
                    {"description": "우회 노선\n7016\n163\n7016\n"},
                    {"description": "우회"}
                ]
            }]
        }"#;

        let lines = parse_annotate_response(body).unwrap();
        assert_eq!(
            lines.into_iter().collect::<Vec<_>>(),
            vec!["163", "7016", "우회 노선"]
        );
    }

    #[test]
    fn test_no_text_is_empty_set() {
        let lines = parse_annotate_response(r#"{"responses": [{}]}"#).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_error_status() {
        let body = r#"{"responses": [{"error": {"code": 7, "message": "billing disabled"}}]}"#;
        let err = parse_annotate_response(body).unwrap_err();
        assert!(matches!(err, AppError::Ocr(ref m) if m == "billing disabled"));
    }
}
