//! Error taxonomy for the engine.
//!
//! Selection and undo errors are recoverable and carry the offending choice
//! id; prerequisite failures on multiclass adoption are expected outcomes,
//! not faults. Callers get a field-level error map where one applies.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::choice::ChoiceIdError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("character {0} not found")]
    CharacterNotFound(u64),

    #[error("unknown class: {0}")]
    UnknownClass(String),

    #[error("unknown race: {0}")]
    UnknownRace(String),

    #[error("unknown background: {0}")]
    UnknownBackground(String),

    #[error("unknown choice: {0}")]
    UnknownChoice(String),

    #[error("invalid selection for {choice_id}: {reason}")]
    InvalidSelection {
        choice_id: String,
        selection: String,
        reason: String,
    },

    #[error("choice {choice_id} cannot be undone: {reason}")]
    ChoiceNotUndoable { choice_id: String, reason: String },

    #[error("character is not complete: {0} required choice(s) unresolved")]
    IncompleteCharacter(usize),

    #[error("maximum level {0} reached")]
    MaxLevelReached(u8),

    #[error("character does not have class: {0}")]
    ClassNotHeld(String),

    #[error("character already has class: {0}")]
    DuplicateClass(String),

    #[error("multiclass prerequisites not met for {class_slug}: requires {requirement}")]
    PrerequisiteNotMet {
        class_slug: String,
        requirement: String,
    },

    #[error("unsupported options endpoint: {0}")]
    BadEndpoint(String),

    #[error(transparent)]
    BadChoiceId(#[from] ChoiceIdError),
}

impl EngineError {
    pub fn invalid_selection(
        choice_id: impl Into<String>,
        selection: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        EngineError::InvalidSelection {
            choice_id: choice_id.into(),
            selection: selection.into(),
            reason: reason.into(),
        }
    }

    pub fn not_undoable(choice_id: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::ChoiceNotUndoable {
            choice_id: choice_id.into(),
            reason: reason.into(),
        }
    }

    /// Field-level error map, where the error shape provides one.
    #[must_use]
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        match self {
            EngineError::InvalidSelection {
                selection, reason, ..
            } => {
                fields.insert("selected".to_string(), format!("{selection}: {reason}"));
            }
            EngineError::PrerequisiteNotMet { requirement, .. } => {
                fields.insert("class_slug".to_string(), requirement.clone());
            }
            EngineError::IncompleteCharacter(count) => {
                fields.insert(
                    "pending_choices".to_string(),
                    format!("{count} required choice(s) unresolved"),
                );
            }
            _ => {}
        }
        fields
    }

    /// Expected-outcome errors (multiclass prerequisite failures) rather than
    /// faults in the caller or the engine.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(self, EngineError::PrerequisiteNotMet { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_selection_exposes_field_errors() {
        let err = EngineError::invalid_selection(
            "spell:class:wizard:1:cantrips",
            "not-a-spell",
            "not in option set",
        );
        let fields = err.field_errors();
        assert_eq!(
            fields.get("selected").map(String::as_str),
            Some("not-a-spell: not in option set")
        );
    }

    #[test]
    fn prerequisite_failures_are_expected() {
        let err = EngineError::PrerequisiteNotMet {
            class_slug: "wizard".to_string(),
            requirement: "INT 13".to_string(),
        };
        assert!(err.is_expected());
        assert!(!EngineError::MaxLevelReached(20).is_expected());
    }
}
