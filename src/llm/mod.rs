pub mod agents;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Model used for creative classification and report narratives.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-6";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Minimal Anthropic Messages API client. The API key is request data, read
/// from settings at each call site, so the client holds none.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
}

impl LlmClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: ANTHROPIC_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different base URL (for tests).
    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Submit a single-turn prompt and return the first text block of the
    /// response. Failures are never retried; they surface to the caller.
    pub async fn complete(
        &self,
        api_key: &str,
        model: &str,
        max_tokens: u32,
        prompt: &str,
    ) -> Result<String> {
        let request = MessagesRequest {
            model,
            max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        log::debug!("Calling messages API (model: {model}, prompt: {} chars)", prompt.len());

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or(body);
            return Err(Error::Llm(format!("messages API returned {status}: {message}")));
        }

        let parsed: MessagesResponse = response.json().await?;
        parsed
            .content
            .iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text.clone())
            .ok_or_else(|| Error::Llm("empty response from messages API".into()))
    }
}

/// Extract the first balanced-brace JSON object substring from free-form
/// text. Brace depth is tracked outside string literals, with `\`-escapes
/// honored inside them. Returns `None` when no complete object is present.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_object() {
        assert_eq!(
            extract_json_object(r#"{"key": "value"}"#),
            Some(r#"{"key": "value"}"#)
        );
    }

    #[test]
    fn test_extract_from_surrounding_text() {
        let text = "Here is the analysis:\n{\"a\": 1}\nHope that helps!";
        assert_eq!(extract_json_object(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_from_code_fence() {
        let text = "```json\n{\"a\": {\"b\": 2}}\n```";
        assert_eq!(extract_json_object(text), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn test_extract_nested_braces() {
        let text = r#"{"outer": {"inner": [1, 2, {"deep": true}]}}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let text = r#"{"note": "use {curly} braces", "done": "}"}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let text = r#"{"quote": "she said \"}\" loudly"}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn test_no_object_returns_none() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("{\"unterminated\": true"), None);
        assert_eq!(extract_json_object(""), None);
    }
}
