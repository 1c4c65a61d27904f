//! Email generation endpoint.

use std::{io, sync::Arc};

use axum::{
    body::Body,
    extract::State,
    http::{
        header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::Response,
    Json,
};
use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    pipeline::{EmailState, EventEmitter, PipelineError},
    routers::error as error_response,
    server::AppState,
};

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub instruction: String,
}

/// POST /generate_email
///
/// Validates the instruction, then runs the writer/editor/translator
/// pipeline on a background task, returning its progress as an SSE
/// stream terminated by `[DONE]`. Validation failures are plain HTTP
/// errors; no stream is opened for them.
pub async fn generate_email(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EmailRequest>,
) -> Response {
    let instruction = request.instruction.trim();
    if instruction.is_empty() {
        return error_response::bad_request("missing_instruction", "Instruction is required");
    }

    let run_id = Uuid::new_v4();
    info!(%run_id, instruction_len = instruction.len(), "starting email pipeline run");

    let (tx, rx) = mpsc::unbounded_channel::<Result<Bytes, io::Error>>();
    let emitter = EventEmitter::new(tx);
    let graph = Arc::clone(&state.graph);
    let client = Arc::clone(&state.client);
    let initial = EmailState::new(instruction);
    let deadline = state.config.request_timeout();

    tokio::spawn(async move {
        let run = graph.run(initial, client.as_ref(), &emitter);
        let outcome = match deadline {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(%run_id, timeout_secs = limit.as_secs(), "pipeline run timed out");
                    let _ = emitter.error("pipeline", "generation timed out");
                    let _ = emitter.done();
                    return;
                }
            },
            None => run.await,
        };
        match outcome {
            Ok(final_state) => {
                info!(
                    %run_id,
                    translation_len = final_state.vietnamese_translation.len(),
                    "pipeline run completed"
                );
            }
            Err(PipelineError::ClientDisconnected) => {
                debug!(%run_id, "client disconnected, run abandoned");
            }
            Err(PipelineError::Generation { agent, source }) => {
                error!(%run_id, agent, error = %source, "pipeline run failed");
            }
        }
    });

    build_sse_response(rx)
}

pub(crate) fn build_sse_response(rx: mpsc::UnboundedReceiver<Result<Bytes, io::Error>>) -> Response {
    let stream = UnboundedReceiverStream::new(rx);
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"))
        .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
        .header(CONNECTION, HeaderValue::from_static("keep-alive"))
        .body(Body::from_stream(stream))
        .unwrap()
}
