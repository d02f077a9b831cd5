//! Choice handlers.
//!
//! One handler per choice type, each implementing the resolve / undo / can-undo
//! protocol against character state. Resolving the same choice group twice
//! replaces the prior resolution instead of duplicating it: every grant is
//! tagged with the deterministic choice id, and handlers strip grants for that
//! id before applying a new selection.

mod asi;
mod equipment;
mod features;
mod hit_points;
mod proficiency;
mod spells;
mod subclass;

use std::collections::BTreeMap;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::character::Character;
use crate::choice::{ChoiceOption, ChoiceType, PendingChoice};
use crate::data::Ruleset;
use crate::error::EngineError;

pub use asi::{AbilityScoreHandler, AsiOrFeatHandler, FeatHandler};
pub use equipment::{EquipmentHandler, EquipmentModeHandler};
pub use features::FeatureChoiceHandler;
pub use hit_points::HitPointsHandler;
pub use proficiency::{ExpertiseHandler, LanguageHandler, ProficiencyHandler};
pub use spells::SpellHandler;
pub use subclass::SubclassHandler;

/// ASI-or-feat resolutions carry a payload of their own instead of a plain
/// selection list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AsiSelection {
    Asi { increases: BTreeMap<String, i32> },
    Feat { feat_slug: String },
}

/// Input submitted to resolve a choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionInput {
    #[serde(default)]
    pub selected: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gold_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_result: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asi: Option<AsiSelection>,
}

impl ResolutionInput {
    #[must_use]
    pub fn select<I, S>(picks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selected: picks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn one(pick: impl Into<String>) -> Self {
        Self::select([pick.into()])
    }

    #[must_use]
    pub fn asi(increases: BTreeMap<String, i32>) -> Self {
        Self {
            asi: Some(AsiSelection::Asi { increases }),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn feat(feat_slug: impl Into<String>) -> Self {
        Self {
            asi: Some(AsiSelection::Feat {
                feat_slug: feat_slug.into(),
            }),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_roll(mut self, roll: i32) -> Self {
        self.roll_result = Some(roll);
        self
    }

    #[must_use]
    pub fn with_gold(mut self, amount: i64) -> Self {
        self.gold_amount = Some(amount);
        self
    }
}

/// The resolve / undo protocol every choice type implements.
pub trait ChoiceHandler {
    fn choice_type(&self) -> ChoiceType;

    /// Compute this type's choices from current character state. Resolved
    /// groups appear with `remaining == 0` so callers can see prior picks.
    fn pending(&self, character: &Character, rules: &Ruleset) -> Vec<PendingChoice>;

    /// Apply a selection. Resolving an already-resolved group replaces the
    /// prior grant.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidSelection`] when the input does not match the
    /// choice's option set or count.
    fn resolve(
        &self,
        character: &mut Character,
        rules: &Ruleset,
        choice: &PendingChoice,
        input: &ResolutionInput,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), EngineError>;

    fn can_undo(&self, character: &Character, choice: &PendingChoice) -> bool;

    /// Reverse a prior resolution.
    ///
    /// # Errors
    ///
    /// [`EngineError::ChoiceNotUndoable`] when the grant is no longer
    /// reversible at the character's current level.
    fn undo(
        &self,
        character: &mut Character,
        rules: &Ruleset,
        choice: &PendingChoice,
    ) -> Result<(), EngineError>;
}

/// Validate a plain selection list against an option set.
///
/// `limit` is the number of picks still allowed for the group. Single-slot
/// choices therefore require exactly one pick; countable choices accept up to
/// the group's remaining count.
pub(crate) fn validate_selection(
    choice_id: &str,
    selected: &[String],
    options: &[ChoiceOption],
    limit: u32,
) -> Result<(), EngineError> {
    if selected.is_empty() {
        return Err(EngineError::invalid_selection(
            choice_id,
            "empty",
            "selection cannot be empty",
        ));
    }
    if selected.len() as u32 > limit {
        return Err(EngineError::invalid_selection(
            choice_id,
            "exceeds_limit",
            format!("selection of {} exceeds limit of {limit}", selected.len()),
        ));
    }
    for (index, pick) in selected.iter().enumerate() {
        if selected[..index].contains(pick) {
            return Err(EngineError::invalid_selection(
                choice_id,
                pick.clone(),
                "duplicate selection",
            ));
        }
        if !options
            .iter()
            .any(|option| option.pick_key() == Some(pick.as_str()))
        {
            return Err(EngineError::invalid_selection(
                choice_id,
                pick.clone(),
                "not in option set",
            ));
        }
    }
    Ok(())
}

/// Registry of handler implementations keyed by choice type.
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn ChoiceHandler + Send + Sync>>,
}

impl HandlerRegistry {
    /// The full set of standard handlers.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            handlers: vec![
                Box::new(EquipmentModeHandler),
                Box::new(EquipmentHandler),
                Box::new(ProficiencyHandler),
                Box::new(LanguageHandler),
                Box::new(ExpertiseHandler),
                Box::new(FeatureChoiceHandler::new(ChoiceType::FightingStyle)),
                Box::new(FeatureChoiceHandler::new(ChoiceType::OptionalFeature)),
                Box::new(SubclassHandler),
                Box::new(SpellHandler),
                Box::new(HitPointsHandler),
                Box::new(AsiOrFeatHandler),
                Box::new(AbilityScoreHandler),
                Box::new(FeatHandler),
            ],
        }
    }

    #[must_use]
    pub fn for_type(&self, choice_type: ChoiceType) -> Option<&(dyn ChoiceHandler + Send + Sync)> {
        self.handlers
            .iter()
            .find(|handler| handler.choice_type() == choice_type)
            .map(Box::as_ref)
    }

    /// All choices currently derivable from the character's state.
    #[must_use]
    pub fn pending_choices(&self, character: &Character, rules: &Ruleset) -> Vec<PendingChoice> {
        self.handlers
            .iter()
            .flat_map(|handler| handler.pending(character, rules))
            .collect()
    }
}
