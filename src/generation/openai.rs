//! OpenAI-compatible chat-completions backend.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use super::{ChunkStream, GenerationClient, GenerationError, GenerationResult};

/// Connection settings for an OpenAI-compatible backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationBackendConfig {
    /// Base URL without the `/v1/chat/completions` suffix
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for GenerationBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Chat-completions client over reqwest.
pub struct OpenAiClient {
    config: GenerationBackendConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: GenerationBackendConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn request(&self, system: &str, user: &str, stream: bool) -> reqwest::RequestBuilder {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "stream": stream,
        });
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut req = self.http.post(&url).json(&payload);
        if let Some(key) = &self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }
        if stream {
            req = req.header("Accept", "text/event-stream");
        }
        req
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

async fn upstream_failure(resp: reqwest::Response) -> GenerationError {
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    GenerationError::Upstream { status, message }
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> GenerationResult<String> {
        let resp = self.request(system, user, false).send().await?;
        if !resp.status().is_success() {
            return Err(upstream_failure(resp).await);
        }
        let parsed: ChatCompletionResponse =
            resp.json()
                .await
                .map_err(|e| GenerationError::MalformedResponse {
                    message: e.to_string(),
                })?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::MalformedResponse {
                message: "no choices in response".to_string(),
            })
    }

    async fn stream(&self, system: &str, user: &str) -> GenerationResult<ChunkStream> {
        let resp = self.request(system, user, true).send().await?;
        if !resp.status().is_success() {
            return Err(upstream_failure(resp).await);
        }

        let mut upstream = resp.bytes_stream();
        let (tx, rx) = mpsc::unbounded_channel::<GenerationResult<String>>();

        // Relay task ends when the upstream closes, `[DONE]` arrives,
        // or the receiver is dropped; dropping `upstream` aborts the
        // in-flight request.
        tokio::spawn(async move {
            let mut decoder = SseDecoder::default();
            while let Some(chunk) = upstream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx.send(Err(e.into()));
                        return;
                    }
                };
                for data in decoder.feed(&bytes) {
                    if data == "[DONE]" {
                        debug!("upstream stream finished");
                        return;
                    }
                    let parsed: ChatCompletionChunk = match serde_json::from_str(&data) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            let _ = tx.send(Err(GenerationError::MalformedResponse {
                                message: e.to_string(),
                            }));
                            return;
                        }
                    };
                    let content = parsed
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|c| c.delta.content)
                        .unwrap_or_default();
                    if !content.is_empty() && tx.send(Ok(content)).is_err() {
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

/// Incremental decoder for an upstream `text/event-stream` body.
///
/// Buffers partial frames across network chunks and yields the payload
/// of every complete `data:` line. Decoding happens per complete
/// frame, so multi-byte characters split across chunks survive.
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&block);
            for line in text.lines() {
                if let Some(data) = line.strip_prefix("data:") {
                    frames.push(data.trim_start().to_string());
                }
            }
        }
        frames
    }
}
