//! Wire events and their SSE framing.

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;

/// A discrete unit pushed to the client over the streaming transport.
///
/// The set is closed and the encoder matches exhaustively, so an
/// unrecognized event kind cannot be silently dropped. `Done` is the
/// stream sentinel and is framed as the literal `[DONE]` block rather
/// than JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    AgentStart {
        agent: String,
    },
    Stream {
        content: String,
        agent: String,
    },
    AgentEnd {
        agent: String,
        output: String,
    },
    Error {
        agent: String,
        message: String,
    },
    Done,
}

/// Encode one wire event as a Server-Sent-Events block.
pub fn encode(event: &WireEvent) -> Bytes {
    match event {
        WireEvent::Done => Bytes::from_static(b"data: [DONE]\n\n"),
        other => {
            // A closed data-only enum always serializes
            let payload = serde_json::to_string(other).expect("wire event serializes");
            Bytes::from(format!("data: {}\n\n", payload))
        }
    }
}

/// Sending half of the SSE response channel.
pub type SseSender = mpsc::UnboundedSender<Result<Bytes, std::io::Error>>;

/// The receiving end of the stream was dropped mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("client disconnected")]
pub struct ClientDisconnected;

/// Pushes encoded wire events into the SSE response channel.
///
/// A failed send means the response body backing the channel is gone,
/// i.e. the client disconnected; callers must abandon the run without
/// issuing further generation calls.
pub struct EventEmitter {
    tx: SseSender,
}

impl EventEmitter {
    pub fn new(tx: SseSender) -> Self {
        Self { tx }
    }

    pub fn agent_start(&self, agent: &str) -> Result<(), ClientDisconnected> {
        self.send(WireEvent::AgentStart {
            agent: agent.to_string(),
        })
    }

    pub fn chunk(&self, agent: &str, content: &str) -> Result<(), ClientDisconnected> {
        self.send(WireEvent::Stream {
            content: content.to_string(),
            agent: agent.to_string(),
        })
    }

    pub fn agent_end(&self, agent: &str, output: &str) -> Result<(), ClientDisconnected> {
        self.send(WireEvent::AgentEnd {
            agent: agent.to_string(),
            output: output.to_string(),
        })
    }

    pub fn error(&self, agent: &str, message: &str) -> Result<(), ClientDisconnected> {
        self.send(WireEvent::Error {
            agent: agent.to_string(),
            message: message.to_string(),
        })
    }

    pub fn done(&self) -> Result<(), ClientDisconnected> {
        self.send(WireEvent::Done)
    }

    fn send(&self, event: WireEvent) -> Result<(), ClientDisconnected> {
        self.tx
            .send(Ok(encode(&event)))
            .map_err(|_| ClientDisconnected)
    }
}
