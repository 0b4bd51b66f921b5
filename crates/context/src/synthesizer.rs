//! Answer synthesis
//!
//! Provides:
//! - The grounded synthesis prompt
//! - A streaming client for OpenAI-compatible chat completion APIs
//! - The chunk types relayed to callers while an answer streams

use async_stream::stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use graphrag_common::config::LlmConfig;
use graphrag_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Notice preceding raw evidence when no model can synthesize an answer
pub const NO_LLM_NOTICE: &str =
    "No LLM available to synthesize answer. Here are the retrieved docs:\n";

/// One unit of output relayed to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "text", rename_all = "lowercase")]
pub enum AnswerChunk {
    /// Fragment of the generated answer
    Token(String),
    /// Non-answer output, e.g. the raw-evidence fallback
    Notice(String),
    /// Terminal synthesis failure
    Error(String),
}

impl AnswerChunk {
    pub fn text(&self) -> &str {
        match self {
            AnswerChunk::Token(t) | AnswerChunk::Notice(t) | AnswerChunk::Error(t) => t,
        }
    }
}

/// Streaming text generation
pub trait LanguageModel: Send + Sync {
    /// One generation per call. Dropping the stream cancels the request.
    fn stream(&self, prompt: String) -> BoxStream<'static, Result<String>>;

    fn model_name(&self) -> &str;
}

/// Prompt grounding the answer in ranked evidence and recent history
pub fn build_prompt(conversation_context: &str, evidence: &[String], query: &str) -> String {
    format!(
        r#"You are an intelligent assistant. Answer the user's question based on the following context and conversation history.

{conversation_context}

Retrieved Context:
{context}

Current Question: {query}

Instructions:
- If the user asks a follow-up question (like "tell me more", "explain that", "what about X"), refer to the conversation history
- Provide a comprehensive answer based on the retrieved context
- If information is not available in the context, say so clearly

Answer:"#,
        context = evidence.join("\n"),
    )
}

/// Raw-evidence answer used when no model is configured
pub fn fallback_notice(evidence: &[String]) -> String {
    format!("{}{}", NO_LLM_NOTICE, evidence.join("\n"))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage; 1],
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Chat completion client for OpenAI-compatible endpoints (OpenAI, Gemini, Ollama, vLLM)
pub struct OpenAiCompatibleLlm {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiCompatibleLlm {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

/// Parse one server-sent line; `None` for lines carrying no data
fn parse_event(line: &str) -> Option<Result<SseEvent>> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(SseEvent::Done));
    }

    Some(
        serde_json::from_str::<StreamChunk>(data)
            .map(|chunk| {
                SseEvent::Content(
                    chunk
                        .choices
                        .into_iter()
                        .filter_map(|c| c.delta.and_then(|d| d.content))
                        .collect(),
                )
            })
            .map_err(|e| AppError::Llm {
                message: format!("Malformed stream event: {}", e),
            }),
    )
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Content(String),
    Done,
}

impl LanguageModel for OpenAiCompatibleLlm {
    fn stream(&self, prompt: String) -> BoxStream<'static, Result<String>> {
        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages: [ChatMessage {
                    role: "user",
                    content: prompt,
                }],
                temperature: self.temperature,
                stream: true,
            });

        Box::pin(stream! {
            let response = match request.send().await {
                Ok(res) if res.status().is_success() => res,
                Ok(res) => {
                    let status = res.status();
                    let body = res.text().await.unwrap_or_default();
                    yield Err(AppError::Llm {
                        message: format!("LLM returned {}: {}", status, body),
                    });
                    return;
                }
                Err(e) => {
                    yield Err(AppError::Llm {
                        message: format!("Request failed: {}", e),
                    });
                    return;
                }
            };

            let mut bytes = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            loop {
                let chunk = bytes.next().await;
                let finished = chunk.is_none();

                match chunk {
                    Some(Ok(data)) => buffer.extend_from_slice(&data),
                    Some(Err(e)) => {
                        yield Err(AppError::Llm {
                            message: format!("Stream interrupted: {}", e),
                        });
                        return;
                    }
                    // flush a final line sent without its newline
                    None if !buffer.is_empty() => buffer.push(b'\n'),
                    None => {}
                }

                // split on raw newlines so multi-byte characters never straddle a decode
                while let Some(end) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=end).collect();
                    let line = String::from_utf8_lossy(&line);

                    match parse_event(line.trim()) {
                        None => continue,
                        Some(Ok(SseEvent::Done)) => return,
                        Some(Ok(SseEvent::Content(text))) => {
                            if !text.is_empty() {
                                yield Ok(text);
                            }
                        }
                        Some(Err(e)) => {
                            yield Err(e);
                            return;
                        }
                    }
                }

                if finished {
                    yield Err(AppError::Llm {
                        message: "stream ended before [DONE]".to_string(),
                    });
                    return;
                }
            }
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Create the synthesis model, or `None` when no credential is configured
pub fn create_language_model(config: &LlmConfig) -> Result<Option<Arc<dyn LanguageModel>>> {
    let Some(api_key) = config.api_key.clone().filter(|k| !k.trim().is_empty()) else {
        warn!("No LLM API key configured, answers will list retrieved evidence only");
        return Ok(None);
    };

    let llm = OpenAiCompatibleLlm::new(config, api_key)?;
    info!(model = %llm.model, endpoint = %llm.endpoint, "Synthesis model configured");
    Ok(Some(Arc::new(llm)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: String) -> LlmConfig {
        LlmConfig {
            api_key: Some("test-key".to_string()),
            endpoint,
            timeout_secs: 5,
            ..LlmConfig::default()
        }
    }

    fn sse(fragments: &[&str]) -> String {
        let mut body = String::new();
        for f in fragments {
            body.push_str(&format!(
                "data: {}\n\n",
                serde_json::json!({ "choices": [{ "delta": { "content": f } }] })
            ));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt(
            "Previous conversation:\nUser: hi\nAssistant: hello\n",
            &["doc one".to_string(), "doc two".to_string()],
            "What is Hanoi?",
        );
        assert!(prompt.starts_with("You are an intelligent assistant."));
        assert!(prompt.contains("Retrieved Context:\ndoc one\ndoc two\n"));
        assert!(prompt.contains("Current Question: What is Hanoi?"));
        assert!(prompt.contains("User: hi"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn test_fallback_notice() {
        let notice = fallback_notice(&["a".to_string(), "b".to_string()]);
        assert_eq!(notice, format!("{}a\nb", NO_LLM_NOTICE));
    }

    #[test]
    fn test_parse_event() {
        assert!(parse_event(": keep-alive").is_none());
        assert!(parse_event("data:").is_none());
        assert_eq!(parse_event("data: [DONE]").map(|r| r.ok()), Some(Some(SseEvent::Done)));
        assert!(matches!(parse_event("data: {oops"), Some(Err(AppError::Llm { .. }))));
        let event = parse_event(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#);
        assert_eq!(event.map(|r| r.ok()), Some(Some(SseEvent::Content(String::new()))));
    }

    #[test]
    fn test_missing_key_means_no_model() {
        let config = LlmConfig {
            api_key: Some("  ".to_string()),
            ..LlmConfig::default()
        };
        assert!(create_language_model(&config).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_streams_fragments_until_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({ "stream": true })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse(&["Hà ", "Nội", " is the capital."])),
            )
            .mount(&server)
            .await;

        let llm = OpenAiCompatibleLlm::new(&config(server.uri()), "test-key".to_string()).unwrap();
        let fragments: Vec<String> = llm
            .stream("prompt".to_string())
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(fragments, vec!["Hà ", "Nội", " is the capital."]);
    }

    #[tokio::test]
    async fn test_error_status_is_single_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let llm = OpenAiCompatibleLlm::new(&config(server.uri()), "test-key".to_string()).unwrap();
        let items: Vec<Result<String>> = llm.stream("prompt".to_string()).collect().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Err(AppError::Llm { message }) if message.contains("401")));
    }

    #[tokio::test]
    async fn test_truncated_stream_ends_with_error() {
        let server = MockServer::start().await;
        let body = format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "delta": { "content": "Hanoi is the" } }] })
        );
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let llm = OpenAiCompatibleLlm::new(&config(server.uri()), "test-key".to_string()).unwrap();
        let items: Vec<Result<String>> = llm.stream("prompt".to_string()).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().ok(), Some("Hanoi is the"));
        assert!(matches!(&items[1], Err(AppError::Llm { message }) if message.contains("[DONE]")));
    }

    #[tokio::test]
    async fn test_done_without_trailing_newline() {
        let server = MockServer::start().await;
        let body = format!(
            "data: {}\ndata: [DONE]",
            serde_json::json!({ "choices": [{ "delta": { "content": "Hanoi." } }] })
        );
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let llm = OpenAiCompatibleLlm::new(&config(server.uri()), "test-key".to_string()).unwrap();
        let items: Vec<Result<String>> = llm.stream("prompt".to_string()).collect().await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_deref().ok(), Some("Hanoi."));
    }
}
