//! Linear pipeline construction and execution.

use futures::StreamExt;
use tracing::{debug, error, info};

use crate::generation::{GenerationClient, GenerationError};

use super::{
    event::{ClientDisconnected, EventEmitter},
    stage::{email_stages, StageDescriptor},
    state::{EmailState, Field, RunStatus},
};

/// Topology errors rejected when a graph is built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphValidationError {
    #[error("pipeline has no stages")]
    Empty,

    #[error("duplicate stage name '{0}'")]
    DuplicateStageName(String),

    #[error("field '{field}' is written by both '{first}' and '{second}'")]
    DuplicateWrite {
        field: &'static str,
        first: String,
        second: String,
    },

    #[error("stage '{stage}' reads '{field}' before any stage writes it")]
    ReadBeforeWrite {
        stage: String,
        field: &'static str,
    },

    #[error("stage '{stage}' writes the reserved field 'instruction'")]
    WritesInstruction { stage: String },
}

/// A failed pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("stage '{agent}' failed: {source}")]
    Generation {
        agent: String,
        #[source]
        source: GenerationError,
    },

    #[error("client disconnected mid-stream")]
    ClientDisconnected,
}

impl From<ClientDisconnected> for PipelineError {
    fn from(_: ClientDisconnected) -> Self {
        PipelineError::ClientDisconnected
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// An ordered, strictly linear sequence of stages.
///
/// Field ownership is checked once at construction: every field is
/// written by exactly one stage, and a stage may only read the
/// instruction or fields written by stages declared before it. The
/// representation is an ordered `Vec`, so branching cannot be
/// expressed at all.
#[derive(Debug)]
pub struct PipelineGraph {
    stages: Vec<StageDescriptor>,
}

impl PipelineGraph {
    pub fn new(stages: Vec<StageDescriptor>) -> Result<Self, GraphValidationError> {
        if stages.is_empty() {
            return Err(GraphValidationError::Empty);
        }
        let mut written: Vec<Field> = Vec::new();
        for (index, stage) in stages.iter().enumerate() {
            if stages[..index].iter().any(|s| s.name == stage.name) {
                return Err(GraphValidationError::DuplicateStageName(
                    stage.name.to_string(),
                ));
            }
            if stage.writes == Field::Instruction {
                return Err(GraphValidationError::WritesInstruction {
                    stage: stage.name.to_string(),
                });
            }
            for &field in stage.reads {
                if field != Field::Instruction && !written.contains(&field) {
                    return Err(GraphValidationError::ReadBeforeWrite {
                        stage: stage.name.to_string(),
                        field: field.as_str(),
                    });
                }
            }
            if written.contains(&stage.writes) {
                let first = stages[..index]
                    .iter()
                    .find(|s| s.writes == stage.writes)
                    .map(|s| s.name.to_string())
                    .unwrap_or_default();
                return Err(GraphValidationError::DuplicateWrite {
                    field: stage.writes.as_str(),
                    first,
                    second: stage.name.to_string(),
                });
            }
            written.push(stage.writes);
        }
        Ok(Self { stages })
    }

    /// The production email pipeline: writer, editor, translator.
    pub fn email() -> Self {
        // the static topology is covered by tests
        Self::new(email_stages()).expect("email pipeline topology is valid")
    }

    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Run every stage in declared order, streaming progress through
    /// `emitter`. Short-circuits on the first failure; no stage is
    /// retried.
    pub async fn execute(
        &self,
        mut state: EmailState,
        client: &dyn GenerationClient,
        emitter: &EventEmitter,
    ) -> PipelineResult<EmailState> {
        let mut status = RunStatus::NotStarted;
        debug!(stages = self.stages.len(), ?status, "pipeline run starting");
        for (index, stage) in self.stages.iter().enumerate() {
            status = RunStatus::Running(index);
            debug!(stage = stage.name, ?status, "stage starting");
            emitter.agent_start(stage.name)?;

            let output = match self.run_stage(stage, &state, client, emitter).await {
                Ok(output) => output,
                Err(err) => {
                    status = RunStatus::Failed;
                    error!(stage = stage.name, ?status, error = %err, "stage failed");
                    return Err(err);
                }
            };

            emitter.agent_end(stage.name, &output)?;
            debug!(
                stage = stage.name,
                output_len = output.len(),
                "stage finished"
            );
            state.set(stage.writes, output);
        }
        status = RunStatus::Completed;
        info!(stages = self.stages.len(), ?status, "pipeline run finished");
        Ok(state)
    }

    /// Run the pipeline and deliver the full wire-event sequence,
    /// including the terminal error event and the `[DONE]` sentinel.
    pub async fn run(
        &self,
        state: EmailState,
        client: &dyn GenerationClient,
        emitter: &EventEmitter,
    ) -> PipelineResult<EmailState> {
        match self.execute(state, client, emitter).await {
            Ok(state) => {
                emitter.done()?;
                Ok(state)
            }
            Err(PipelineError::ClientDisconnected) => Err(PipelineError::ClientDisconnected),
            Err(PipelineError::Generation { agent, source }) => {
                emitter.error(&agent, &source.to_string())?;
                emitter.done()?;
                Err(PipelineError::Generation { agent, source })
            }
        }
    }

    async fn run_stage(
        &self,
        stage: &StageDescriptor,
        state: &EmailState,
        client: &dyn GenerationClient,
        emitter: &EventEmitter,
    ) -> PipelineResult<String> {
        let user_content = (stage.user_content)(state);
        let mut chunks = client
            .stream(stage.system_prompt, &user_content)
            .await
            .map_err(|source| PipelineError::Generation {
                agent: stage.name.to_string(),
                source,
            })?;

        let mut output = String::new();
        while let Some(next) = chunks.next().await {
            let content = next.map_err(|source| PipelineError::Generation {
                agent: stage.name.to_string(),
                source,
            })?;
            if content.is_empty() {
                continue;
            }
            emitter.chunk(stage.name, &content)?;
            output.push_str(&content);
        }
        Ok(output)
    }
}
