//! Pipeline state shared across stages.

use serde::Serialize;

/// The artifact slots a stage may read or write.
///
/// Keeping the set closed lets stage descriptors declare their reads
/// and writes as plain data, so the graph can check field ownership
/// once at construction instead of at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Instruction,
    Draft,
    EditedDraft,
    VietnameseTranslation,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Instruction => "instruction",
            Field::Draft => "draft",
            Field::EditedDraft => "edited_draft",
            Field::VietnameseTranslation => "vietnamese_translation",
        }
    }
}

/// Mutable state for one pipeline run.
///
/// Created at request start with the instruction populated, mutated in
/// place by successive stages, and dropped when the run ends. Each
/// non-instruction field is written exactly once, by the single stage
/// that declares it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmailState {
    pub instruction: String,
    pub draft: String,
    pub edited_draft: String,
    pub vietnamese_translation: String,
}

impl EmailState {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            ..Default::default()
        }
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Instruction => &self.instruction,
            Field::Draft => &self.draft,
            Field::EditedDraft => &self.edited_draft,
            Field::VietnameseTranslation => &self.vietnamese_translation,
        }
    }

    pub(crate) fn set(&mut self, field: Field, value: String) {
        match field {
            Field::Instruction => self.instruction = value,
            Field::Draft => self.draft = value,
            Field::EditedDraft => self.edited_draft = value,
            Field::VietnameseTranslation => self.vietnamese_translation = value,
        }
    }
}

/// Execution status of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    NotStarted,
    Running(usize),
    Completed,
    Failed,
}
