//! Streaming email pipeline gateway.
//!
//! Accepts a natural-language instruction and produces a final
//! translated email via a fixed writer → editor → translator pipeline,
//! relaying stage lifecycle and token-level progress to the caller as
//! a Server-Sent-Events stream terminated by `[DONE]`.

pub mod config;
pub mod generation;
pub mod logging;
pub mod pipeline;
pub mod routers;
pub mod server;
