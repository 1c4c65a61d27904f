//! Pipeline execution and event streaming.
//!
//! A [`PipelineGraph`] runs an ordered sequence of stages, each of
//! which calls the generation backend and writes one field of the
//! shared [`EmailState`]. Progress is surfaced as [`WireEvent`]s
//! pushed through an [`EventEmitter`] into the SSE response channel.

mod event;
mod graph;
mod stage;
mod state;

pub use event::{encode, ClientDisconnected, EventEmitter, SseSender, WireEvent};
pub use graph::{GraphValidationError, PipelineError, PipelineGraph, PipelineResult};
pub use stage::{email_stages, StageDescriptor};
pub use state::{EmailState, Field, RunStatus};
