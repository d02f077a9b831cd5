//! Point-in-time character snapshots and their level-up derived fields.
//!
//! The executor brackets every level-up with a before and an after snapshot;
//! the validator only ever looks at the derived fields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use quintain_engine::{CharacterSummary, ChoiceType, EngineError, FeatureRef, PendingChoice};

use crate::api::CharacterApi;

/// Immutable capture of everything observable about a character.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub character: CharacterSummary,
    pub features: Vec<FeatureRef>,
    pub pending_choices: Vec<PendingChoice>,
    pub derived: DerivedFields,
}

/// Level-up-specific fields derived from a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedFields {
    pub total_level: u8,
    pub max_hp: i32,
    pub class_levels: BTreeMap<String, u8>,
    pub subclasses: BTreeMap<String, String>,
    pub ability_score_totals: BTreeMap<String, i32>,
    pub required_pending_count: usize,
    pub feat_slugs: Vec<String>,
    pub has_pending_hp_choice: bool,
}

/// Capture a snapshot through the collaborator interface.
pub fn capture(api: &dyn CharacterApi, character_id: u64) -> Result<Snapshot, EngineError> {
    let character = api.get_character(character_id)?;
    let features = api.features(character_id)?;
    let pending_choices = api.pending_choices(character_id)?;
    let derived = derive(&character, &features, &pending_choices);
    Ok(Snapshot {
        character,
        features,
        pending_choices,
        derived,
    })
}

fn derive(
    character: &CharacterSummary,
    features: &[FeatureRef],
    pending: &[PendingChoice],
) -> DerivedFields {
    let class_levels: BTreeMap<String, u8> = character
        .classes
        .iter()
        .map(|class| (class.class_slug.clone(), class.level))
        .collect();
    let subclasses: BTreeMap<String, String> = character
        .classes
        .iter()
        .filter_map(|class| {
            class
                .subclass
                .clone()
                .map(|subclass| (class.class_slug.clone(), subclass))
        })
        .collect();

    let required_pending_count = pending
        .iter()
        .filter(|choice| choice.required && choice.remaining > 0)
        .count();
    let has_pending_hp_choice = pending.iter().any(|choice| {
        choice.choice_type == ChoiceType::HitPoints && choice.required && choice.remaining > 0
    });

    let feat_slugs: Vec<String> = features
        .iter()
        .filter(|feature| feature.source == "feat")
        .map(|feature| feature.slug.clone())
        .collect();

    DerivedFields {
        total_level: character.total_level,
        max_hp: character.max_hit_points,
        class_levels,
        subclasses,
        ability_score_totals: character.ability_scores.clone(),
        required_pending_count,
        feat_slugs,
        has_pending_hp_choice,
    }
}
