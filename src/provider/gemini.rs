//! Google Gemini `generateContent` backend with JSON-mode structured output

use super::{CompletionService, ServiceFactory};
use crate::error::ServiceError;
use crate::model::Credential;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Schema keywords the Gemini response-schema dialect accepts
const SCHEMA_KEYWORDS: &[&str] = &[
    "type",
    "description",
    "nullable",
    "enum",
    "properties",
    "required",
    "items",
    "minItems",
    "maxItems",
    "anyOf",
];

/// Creates one `GeminiService` per API key, sharing the HTTP connection pool
pub struct GeminiFactory {
    endpoint: String,
    http: Client,
}

impl GeminiFactory {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
        })
    }
}

impl ServiceFactory for GeminiFactory {
    fn connect(&self, credential: &Credential) -> Arc<dyn CompletionService> {
        Arc::new(GeminiService {
            endpoint: self.endpoint.clone(),
            api_key: credential.secret.clone(),
            http: self.http.clone(),
        })
    }
}

pub struct GeminiService {
    endpoint: String,
    api_key: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[async_trait]
impl CompletionService for GeminiService {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, model: &str, prompt: &str, schema: &Value) -> Result<String, ServiceError> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": to_gemini_schema(schema),
            },
        });

        debug!("POST {} ({} byte prompt)", url, prompt.len());

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| ServiceError::EmptyResponse(format!("unreadable body: {}", e)))?;
        extract_text(parsed)
    }
}

fn extract_text(response: GenerateResponse) -> Result<String, ServiceError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ServiceError::EmptyResponse(format!("prompt blocked: {}", reason)));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::EmptyResponse("no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ServiceError::EmptyResponse(format!(
            "no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text)
}

/// Render `{"error": {"status", "message"}}` bodies as "STATUS: message"
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        #[serde(default)]
        status: String,
        #[serde(default)]
        message: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error }) if !error.status.is_empty() => {
            format!("{}: {}", error.status, error.message)
        }
        Ok(ErrorBody { error }) => error.message,
        Err(_) => body.chars().take(500).collect(),
    }
}

/// Reduce a JSON Schema to the subset Gemini accepts
pub(crate) fn to_gemini_schema(schema: &Value) -> Value {
    let Value::Object(object) = schema else {
        return schema.clone();
    };

    let mut out = Map::new();

    // Single-element allOf wraps an inlined subschema next to a description
    if let Some(Value::Array(all_of)) = object.get("allOf") {
        if let [inner] = all_of.as_slice() {
            if let Value::Object(inner) = to_gemini_schema(inner) {
                out.extend(inner);
            }
        }
    }

    for (key, value) in object {
        if !SCHEMA_KEYWORDS.contains(&key.as_str()) {
            continue;
        }
        let converted = match key.as_str() {
            "properties" => match value {
                Value::Object(props) => Value::Object(
                    props
                        .iter()
                        .map(|(name, prop)| (name.clone(), to_gemini_schema(prop)))
                        .collect(),
                ),
                other => other.clone(),
            },
            "items" => to_gemini_schema(value),
            "anyOf" => match value {
                Value::Array(variants) => {
                    Value::Array(variants.iter().map(to_gemini_schema).collect())
                }
                other => other.clone(),
            },
            "type" => match value {
                // ["string", "null"] becomes type + nullable
                Value::Array(types) => {
                    if types.iter().any(|t| t == "null") {
                        out.insert("nullable".to_string(), Value::Bool(true));
                    }
                    types
                        .iter()
                        .find(|t| *t != "null")
                        .cloned()
                        .unwrap_or(Value::String("string".to_string()))
                }
                other => other.clone(),
            },
            _ => value.clone(),
        };
        out.insert(key.clone(), converted);
    }

    Value::Object(out)
}
