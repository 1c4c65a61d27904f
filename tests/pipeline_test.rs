//! Integration tests for the pipeline engine and its event stream.

use std::{
    io,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use email_agent_gateway::{
    generation::{ChunkStream, GenerationClient, GenerationError, GenerationResult},
    pipeline::{EmailState, EventEmitter, PipelineError, PipelineGraph},
};
use futures::stream;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};

/// Backend stub returning one scripted output per call, optionally
/// failing a specific call instead.
struct ScriptedClient {
    outputs: Vec<&'static str>,
    fail_on: Option<usize>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    fn new(outputs: Vec<&'static str>) -> Self {
        Self {
            outputs,
            fail_on: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_at(outputs: Vec<&'static str>, index: usize) -> Self {
        Self {
            outputs,
            fail_on: Some(index),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn output_for(&self, call: usize) -> GenerationResult<&'static str> {
        if self.fail_on == Some(call) {
            return Err(GenerationError::Upstream {
                status: 502,
                message: "backend unavailable".to_string(),
            });
        }
        Ok(self.outputs[call])
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn complete(&self, _system: &str, _user: &str) -> GenerationResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.output_for(call).map(str::to_string)
    }

    async fn stream(&self, _system: &str, _user: &str) -> GenerationResult<ChunkStream> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let output = self.output_for(call)?;
        // word-level chunks to exercise interleaving
        let chunks: Vec<GenerationResult<String>> = output
            .split_inclusive(' ')
            .map(|part| Ok(part.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

const WRITER_OUT: &str = "Review Q3 report by Friday, Bob.";
const EDITOR_OUT: &str = "Bob, please review the Q3 report by Friday.";
const TRANSLATOR_OUT: &str = "Bob, vui lòng xem báo cáo Q3 trước thứ Sáu.";

fn scripted() -> ScriptedClient {
    ScriptedClient::new(vec![WRITER_OUT, EDITOR_OUT, TRANSLATOR_OUT])
}

/// Run the pipeline against `client` and return the decoded frames.
async fn collect_frames(
    client: &dyn GenerationClient,
    instruction: &str,
) -> (Vec<String>, Result<EmailState, PipelineError>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<Bytes, io::Error>>();
    let emitter = EventEmitter::new(tx);
    let graph = PipelineGraph::email();

    let result = graph
        .run(EmailState::new(instruction), client, &emitter)
        .await;
    drop(emitter);

    let mut frames = Vec::new();
    while let Some(frame) = rx.recv().await {
        let bytes = frame.unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        let data = text
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .unwrap();
        frames.push(data.to_string());
    }
    (frames, result)
}

/// Collapse consecutive `stream` frames into one `(type, agent, content)`
/// entry so comparisons ignore chunk granularity.
fn normalize(frames: &[String]) -> Vec<(String, String, String)> {
    let mut normalized: Vec<(String, String, String)> = Vec::new();
    for frame in frames {
        if frame == "[DONE]" {
            normalized.push(("done".to_string(), String::new(), String::new()));
            continue;
        }
        let json: Value = serde_json::from_str(frame).unwrap();
        let kind = json["type"].as_str().unwrap().to_string();
        let agent = json["agent"].as_str().unwrap_or_default().to_string();
        let content = json["content"]
            .as_str()
            .or(json["output"].as_str())
            .or(json["message"].as_str())
            .unwrap_or_default()
            .to_string();
        if kind == "stream" {
            if let Some(last) = normalized.last_mut() {
                if last.0 == "stream" && last.1 == agent {
                    last.2.push_str(&content);
                    continue;
                }
            }
        }
        normalized.push((kind, agent, content));
    }
    normalized
}

#[tokio::test]
async fn test_event_sequence_matches_grammar() {
    let client = scripted();
    let (frames, result) =
        collect_frames(&client, "Ask Bob to review the Q3 report by Friday").await;

    let final_state = result.unwrap();
    assert_eq!(final_state.draft, WRITER_OUT);
    assert_eq!(final_state.edited_draft, EDITOR_OUT);
    assert_eq!(final_state.vietnamese_translation, TRANSLATOR_OUT);

    let normalized = normalize(&frames);
    let expected = vec![
        ("agent_start", "writer", ""),
        ("stream", "writer", WRITER_OUT),
        ("agent_end", "writer", WRITER_OUT),
        ("agent_start", "editor", ""),
        ("stream", "editor", EDITOR_OUT),
        ("agent_end", "editor", EDITOR_OUT),
        ("agent_start", "translator", ""),
        ("stream", "translator", TRANSLATOR_OUT),
        ("agent_end", "translator", TRANSLATOR_OUT),
        ("done", "", ""),
    ];
    let expected: Vec<(String, String, String)> = expected
        .into_iter()
        .map(|(a, b, c)| (a.to_string(), b.to_string(), c.to_string()))
        .collect();
    assert_eq!(normalized, expected);
}

#[tokio::test]
async fn test_chunks_precede_agent_end_and_carry_agent_name() {
    let client = scripted();
    let (frames, _) = collect_frames(&client, "write to Bob").await;

    let mut current_agent = String::new();
    for frame in &frames {
        if frame == "[DONE]" {
            continue;
        }
        let json: Value = serde_json::from_str(frame).unwrap();
        match json["type"].as_str().unwrap() {
            "agent_start" => current_agent = json["agent"].as_str().unwrap().to_string(),
            "stream" | "agent_end" => {
                assert_eq!(json["agent"].as_str().unwrap(), current_agent)
            }
            other => panic!("unexpected event type {other}"),
        }
    }
    assert_eq!(frames.last().map(String::as_str), Some("[DONE]"));
}

#[tokio::test]
async fn test_repeat_runs_are_structurally_identical() {
    let first = {
        let client = scripted();
        let (frames, _) = collect_frames(&client, "same instruction").await;
        normalize(&frames)
    };
    let second = {
        let client = scripted();
        let (frames, _) = collect_frames(&client, "same instruction").await;
        normalize(&frames)
    };
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_editor_failure_short_circuits() {
    let client = ScriptedClient::failing_at(vec![WRITER_OUT, "", ""], 1);
    let (frames, result) = collect_frames(&client, "write to Bob").await;

    assert!(matches!(
        result,
        Err(PipelineError::Generation { ref agent, .. }) if agent == "editor"
    ));
    // writer + editor invoked, translator never reached
    assert_eq!(client.calls(), 2);

    let error_frames: Vec<&String> = frames
        .iter()
        .filter(|f| *f != "[DONE]")
        .filter(|f| {
            let json: Value = serde_json::from_str(f).unwrap();
            json["type"] == "error"
        })
        .collect();
    assert_eq!(error_frames.len(), 1);
    let error_json: Value = serde_json::from_str(error_frames[0]).unwrap();
    assert_eq!(error_json["agent"], "editor");

    for frame in &frames {
        if frame == "[DONE]" {
            continue;
        }
        let json: Value = serde_json::from_str(frame).unwrap();
        assert!(
            !(json["type"] == "agent_start" && json["agent"] == "translator"),
            "translator must not start after editor failure"
        );
        assert!(
            !(json["type"] == "agent_end" && json["agent"] == "editor"),
            "failed stage must not emit agent_end"
        );
    }

    // error event is second to last, sentinel is last
    assert_eq!(frames.last().map(String::as_str), Some("[DONE]"));
    let last_json: Value = serde_json::from_str(&frames[frames.len() - 2]).unwrap();
    assert_eq!(last_json["type"], "error");
}

/// Backend whose first stream yields one chunk, then waits for the
/// test before yielding the next. Lets the test disconnect the client
/// at a known point inside the writer stage.
struct GatedClient {
    calls: AtomicUsize,
    release: Arc<Notify>,
}

#[async_trait]
impl GenerationClient for GatedClient {
    async fn complete(&self, _system: &str, _user: &str) -> GenerationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(String::new())
    }

    async fn stream(&self, _system: &str, _user: &str) -> GenerationResult<ChunkStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let release = Arc::clone(&self.release);
        let chunks = stream::unfold(0u32, move |step| {
            let release = Arc::clone(&release);
            async move {
                let item: Option<(GenerationResult<String>, u32)> = match step {
                    0 => Some((Ok("Review ".to_string()), 1)),
                    1 => {
                        release.notified().await;
                        Some((Ok("Q3".to_string()), 2))
                    }
                    _ => None,
                };
                item
            }
        });
        Ok(Box::pin(chunks))
    }
}

#[tokio::test]
async fn test_disconnect_mid_stream_stops_generation() {
    let client = Arc::new(GatedClient {
        calls: AtomicUsize::new(0),
        release: Arc::new(Notify::new()),
    });

    let (tx, mut rx) = mpsc::unbounded_channel::<Result<Bytes, io::Error>>();
    let emitter = EventEmitter::new(tx);
    let graph = PipelineGraph::email();

    let run_client = Arc::clone(&client);
    let run = tokio::spawn(async move {
        graph
            .run(EmailState::new("write to Bob"), run_client.as_ref(), &emitter)
            .await
    });

    // agent_start(writer) then the first chunk
    assert!(rx.recv().await.is_some());
    assert!(rx.recv().await.is_some());

    // disconnect, then let the writer stream resume
    drop(rx);
    client.release.notify_one();

    let result = run.await.unwrap();
    assert!(matches!(result, Err(PipelineError::ClientDisconnected)));
    // only the writer's generation call was ever issued
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_disconnect_before_first_event_issues_no_calls() {
    let client = scripted();
    let (tx, rx) = mpsc::unbounded_channel::<Result<Bytes, io::Error>>();
    drop(rx);
    let emitter = EventEmitter::new(tx);
    let graph = PipelineGraph::email();

    let result = graph
        .run(EmailState::new("write to Bob"), &client, &emitter)
        .await;
    assert!(matches!(result, Err(PipelineError::ClientDisconnected)));
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_state_threads_between_stages() {
    // editor and translator prompts read the previous stage's output;
    // scripted outputs land in the right fields in order
    let client = scripted();
    let (_, result) = collect_frames(&client, "Ask Bob to review the Q3 report").await;
    let state = result.unwrap();
    assert_eq!(state.instruction, "Ask Bob to review the Q3 report");
    assert_eq!(state.draft, WRITER_OUT);
    assert_eq!(state.edited_draft, EDITOR_OUT);
    assert_eq!(state.vietnamese_translation, TRANSLATOR_OUT);
}
