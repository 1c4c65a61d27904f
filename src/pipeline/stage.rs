//! Stage descriptors and the production stage set.

use super::state::{EmailState, Field};

/// One unit of sequential pipeline work.
///
/// Descriptors are immutable and shared read-only across runs; the
/// graph owns execution. `reads` declares every field the
/// `user_content` builder touches, so the graph can verify at
/// construction that each read happens after the field is written.
#[derive(Debug, Clone, Copy)]
pub struct StageDescriptor {
    pub name: &'static str,
    pub system_prompt: &'static str,
    pub reads: &'static [Field],
    pub writes: Field,
    pub user_content: fn(&EmailState) -> String,
}

fn writer_content(state: &EmailState) -> String {
    state.instruction.clone()
}

fn editor_content(state: &EmailState) -> String {
    format!(
        "Please review and improve this email draft:\n\n{}",
        state.draft
    )
}

fn translator_content(state: &EmailState) -> String {
    format!(
        "Please translate this email into Vietnamese:\n\n{}",
        state.edited_draft
    )
}

/// The production topology: draft, edit, translate.
pub fn email_stages() -> Vec<StageDescriptor> {
    vec![
        StageDescriptor {
            name: "writer",
            system_prompt: "You are an email writer. Write an email based on the given \
                            instructions. Make sure it is less than 10 words",
            reads: &[Field::Instruction],
            writes: Field::Draft,
            user_content: writer_content,
        },
        StageDescriptor {
            name: "editor",
            system_prompt: "You are an email editor. Review and improve the given email \
                            draft. Start in a new line. Make sure it is less than 10 words",
            reads: &[Field::Draft],
            writes: Field::EditedDraft,
            user_content: editor_content,
        },
        StageDescriptor {
            name: "translator",
            system_prompt: "You are a professional translator. Translate the given English \
                            email into Vietnamese. Start in a new line. Make sure it is \
                            less than 10 words",
            reads: &[Field::EditedDraft],
            writes: Field::VietnameseTranslation,
            user_content: translator_content,
        },
    ]
}
