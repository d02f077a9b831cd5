//! Ability score improvements, feats, and racial ability bonuses.
//!
//! ASI-or-feat is the one choice type with a structured payload: either a map
//! of score increases (capped at 20) or a feat slug. It is also the one
//! optional choice the automated harness still resolves eagerly.

use std::collections::BTreeMap;

use rand_chacha::ChaCha8Rng;

use crate::character::{
    Ability, AbilityResolution, Character, FeatureEntry, ABILITY_SCORE_CAP,
};
use crate::choice::{
    AbilityScoreState, ChoiceKey, ChoiceMetadata, ChoiceOption, ChoiceOptions, ChoiceSource,
    ChoiceType, PendingChoice,
};
use crate::data::Ruleset;
use crate::error::EngineError;

use super::{validate_selection, AsiSelection, ChoiceHandler, ResolutionInput};

const ASI_POINTS: u32 = 2;

fn revert_resolution(character: &mut Character, choice_id: &str) {
    if let Some(pos) = character
        .ability_resolutions
        .iter()
        .position(|resolution| resolution.choice_id == choice_id)
    {
        let prior = character.ability_resolutions.remove(pos);
        for (code, amount) in &prior.increases {
            if let Some(ability) = Ability::parse(code) {
                character.abilities.adjust(ability, -amount);
            }
        }
        if prior.feat_slug.is_some() {
            character.remove_features_from_choice(choice_id);
        }
    }
}

fn ability_scores_metadata(character: &Character) -> Vec<AbilityScoreState> {
    Ability::ALL
        .iter()
        .map(|ability| AbilityScoreState {
            code: ability.code().to_string(),
            current_value: character.abilities.get(*ability),
        })
        .collect()
}

pub struct AsiOrFeatHandler;

impl ChoiceHandler for AsiOrFeatHandler {
    fn choice_type(&self) -> ChoiceType {
        ChoiceType::AsiOrFeat
    }

    fn pending(&self, character: &Character, rules: &Ruleset) -> Vec<PendingChoice> {
        let mut choices = Vec::new();
        for entry in &character.classes {
            let Some(class) = rules.class(&entry.class_slug) else {
                continue;
            };
            for asi_level in class.asi_levels.iter().filter(|level| **level <= entry.level) {
                let key = ChoiceKey::new(
                    ChoiceType::AsiOrFeat,
                    ChoiceSource::Class,
                    class.slug.clone(),
                    *asi_level,
                    "asi",
                );
                let id = key.id();

                let resolution = character
                    .ability_resolutions
                    .iter()
                    .find(|resolution| resolution.choice_id == id);
                let selected: Vec<String> = match resolution {
                    Some(resolution) => match &resolution.feat_slug {
                        Some(slug) => vec![slug.clone()],
                        None => vec!["asi".to_string()],
                    },
                    None => Vec::new(),
                };
                let remaining = u32::from(selected.is_empty());

                choices.push(PendingChoice {
                    id,
                    choice_type: ChoiceType::AsiOrFeat,
                    subtype: None,
                    source: ChoiceSource::Class,
                    source_name: class.name.clone(),
                    level_granted: *asi_level,
                    // Players may delay ASI choices indefinitely.
                    required: false,
                    quantity: 1,
                    remaining,
                    selected,
                    options: ChoiceOptions::Remote {
                        endpoint: "available-feats".to_string(),
                        params: Vec::new(),
                    },
                    metadata: ChoiceMetadata {
                        class_slug: Some(class.slug.clone()),
                        ability_scores: ability_scores_metadata(character),
                        asi_points: Some(ASI_POINTS),
                        ..ChoiceMetadata::default()
                    },
                });
            }
        }
        choices
    }

    fn resolve(
        &self,
        character: &mut Character,
        rules: &Ruleset,
        choice: &PendingChoice,
        input: &ResolutionInput,
        _rng: &mut ChaCha8Rng,
    ) -> Result<(), EngineError> {
        let selection = input.asi.as_ref().ok_or_else(|| {
            EngineError::invalid_selection(&choice.id, "empty", "asi payload is required")
        })?;

        match selection {
            AsiSelection::Asi { increases } => {
                let total: i32 = increases.values().sum();
                if increases.is_empty() || total <= 0 {
                    return Err(EngineError::invalid_selection(
                        &choice.id,
                        "asi",
                        "increases cannot be empty",
                    ));
                }
                if total as u32 > ASI_POINTS {
                    return Err(EngineError::invalid_selection(
                        &choice.id,
                        "asi",
                        format!("total increase of {total} exceeds {ASI_POINTS} points"),
                    ));
                }
                for (code, amount) in increases {
                    let ability = Ability::parse(code).ok_or_else(|| {
                        EngineError::invalid_selection(
                            &choice.id,
                            code.clone(),
                            "unknown ability code",
                        )
                    })?;
                    if *amount <= 0 {
                        return Err(EngineError::invalid_selection(
                            &choice.id,
                            code.clone(),
                            "increase must be positive",
                        ));
                    }
                    if character.abilities.get(ability) + amount > ABILITY_SCORE_CAP {
                        return Err(EngineError::invalid_selection(
                            &choice.id,
                            code.clone(),
                            format!("score would exceed {ABILITY_SCORE_CAP}"),
                        ));
                    }
                }

                revert_resolution(character, &choice.id);
                for (code, amount) in increases {
                    if let Some(ability) = Ability::parse(code) {
                        character.abilities.adjust(ability, *amount);
                    }
                }
                character.ability_resolutions.push(AbilityResolution {
                    choice_id: choice.id.clone(),
                    increases: increases.clone(),
                    feat_slug: None,
                });
            }
            AsiSelection::Feat { feat_slug } => {
                let feat = rules.feat(feat_slug).ok_or_else(|| {
                    EngineError::invalid_selection(
                        &choice.id,
                        feat_slug.clone(),
                        "feat does not exist",
                    )
                })?;
                let already_held = character.features.iter().any(|feature| {
                    feature.slug == *feat_slug
                        && feature.choice_id.as_deref() != Some(choice.id.as_str())
                });
                if already_held {
                    return Err(EngineError::invalid_selection(
                        &choice.id,
                        feat_slug.clone(),
                        "feat already taken",
                    ));
                }

                revert_resolution(character, &choice.id);
                character.features.push(FeatureEntry {
                    slug: feat.slug.clone(),
                    name: feat.name.clone(),
                    source: ChoiceSource::Feat,
                    source_slug: feat.slug.clone(),
                    level_acquired: choice.level_granted,
                    choice_id: Some(choice.id.clone()),
                });
                character.ability_resolutions.push(AbilityResolution {
                    choice_id: choice.id.clone(),
                    increases: BTreeMap::new(),
                    feat_slug: Some(feat.slug.clone()),
                });
            }
        }
        Ok(())
    }

    fn can_undo(&self, character: &Character, choice: &PendingChoice) -> bool {
        character
            .ability_resolutions
            .iter()
            .any(|resolution| resolution.choice_id == choice.id)
    }

    fn undo(
        &self,
        character: &mut Character,
        _rules: &Ruleset,
        choice: &PendingChoice,
    ) -> Result<(), EngineError> {
        if !self.can_undo(character, choice) {
            return Err(EngineError::not_undoable(&choice.id, "not resolved"));
        }
        revert_resolution(character, &choice.id);
        Ok(())
    }
}

/// Racial pick-N ability bonuses (half-elf style).
pub struct AbilityScoreHandler;

impl ChoiceHandler for AbilityScoreHandler {
    fn choice_type(&self) -> ChoiceType {
        ChoiceType::AbilityScore
    }

    fn pending(&self, character: &Character, rules: &Ruleset) -> Vec<PendingChoice> {
        let Some(race) = rules.race(&character.race_slug) else {
            return Vec::new();
        };
        let Some(ability_choice) = &race.ability_choice else {
            return Vec::new();
        };

        let key = ChoiceKey::new(
            ChoiceType::AbilityScore,
            ChoiceSource::Race,
            race.slug.clone(),
            1,
            "bonus",
        );
        let id = key.id();

        let resolution = character
            .ability_resolutions
            .iter()
            .find(|resolution| resolution.choice_id == id);
        let selected: Vec<String> = resolution
            .map(|resolution| resolution.increases.keys().cloned().collect())
            .unwrap_or_default();
        let remaining = ability_choice.choose.saturating_sub(selected.len() as u32);

        let fixed: Vec<&str> = race
            .fixed_bonuses
            .iter()
            .map(|(ability, _)| ability.code())
            .collect();
        let options: Vec<ChoiceOption> = Ability::ALL
            .iter()
            .filter(|ability| !fixed.contains(&ability.code()))
            .map(|ability| ChoiceOption::slug(ability.code(), ability.code()))
            .collect();

        vec![PendingChoice {
            id,
            choice_type: ChoiceType::AbilityScore,
            subtype: None,
            source: ChoiceSource::Race,
            source_name: race.name.clone(),
            level_granted: 1,
            required: true,
            quantity: ability_choice.choose,
            remaining,
            selected,
            options: ChoiceOptions::Inline(options),
            metadata: ChoiceMetadata {
                ability_scores: ability_scores_metadata(character),
                asi_points: Some(ability_choice.choose),
                ..ChoiceMetadata::default()
            },
        }]
    }

    fn resolve(
        &self,
        character: &mut Character,
        rules: &Ruleset,
        choice: &PendingChoice,
        input: &ResolutionInput,
        _rng: &mut ChaCha8Rng,
    ) -> Result<(), EngineError> {
        let options = choice.options.inline().unwrap_or_default();
        validate_selection(&choice.id, &input.selected, options, choice.quantity)?;

        let amount = rules
            .race(&character.race_slug)
            .and_then(|race| race.ability_choice.as_ref())
            .map_or(1, |ability_choice| ability_choice.amount);

        revert_resolution(character, &choice.id);
        let mut increases = BTreeMap::new();
        for code in &input.selected {
            if let Some(ability) = Ability::parse(code) {
                character.abilities.adjust(ability, amount);
                increases.insert(code.clone(), amount);
            }
        }
        character.ability_resolutions.push(AbilityResolution {
            choice_id: choice.id.clone(),
            increases,
            feat_slug: None,
        });
        Ok(())
    }

    fn can_undo(&self, character: &Character, choice: &PendingChoice) -> bool {
        character
            .ability_resolutions
            .iter()
            .any(|resolution| resolution.choice_id == choice.id)
    }

    fn undo(
        &self,
        character: &mut Character,
        _rules: &Ruleset,
        choice: &PendingChoice,
    ) -> Result<(), EngineError> {
        if !self.can_undo(character, choice) {
            return Err(EngineError::not_undoable(&choice.id, "not resolved"));
        }
        revert_resolution(character, &choice.id);
        Ok(())
    }
}

/// Standalone racial feat choice (variant human).
pub struct FeatHandler;

impl ChoiceHandler for FeatHandler {
    fn choice_type(&self) -> ChoiceType {
        ChoiceType::Feat
    }

    fn pending(&self, character: &Character, rules: &Ruleset) -> Vec<PendingChoice> {
        let Some(race) = rules.race(&character.race_slug) else {
            return Vec::new();
        };
        if !race.feat_choice {
            return Vec::new();
        }

        let key = ChoiceKey::new(ChoiceType::Feat, ChoiceSource::Race, race.slug.clone(), 1, "bonus");
        let id = key.id();

        let selected: Vec<String> = character
            .features
            .iter()
            .filter(|feature| feature.choice_id.as_deref() == Some(id.as_str()))
            .map(|feature| feature.slug.clone())
            .collect();
        let remaining = u32::from(selected.is_empty());

        vec![PendingChoice {
            id,
            choice_type: ChoiceType::Feat,
            subtype: None,
            source: ChoiceSource::Race,
            source_name: race.name.clone(),
            level_granted: 1,
            required: true,
            quantity: 1,
            remaining,
            selected,
            options: ChoiceOptions::Remote {
                endpoint: "available-feats".to_string(),
                params: Vec::new(),
            },
            metadata: ChoiceMetadata::default(),
        }]
    }

    fn resolve(
        &self,
        character: &mut Character,
        rules: &Ruleset,
        choice: &PendingChoice,
        input: &ResolutionInput,
        _rng: &mut ChaCha8Rng,
    ) -> Result<(), EngineError> {
        let picked = input.selected.first().ok_or_else(|| {
            EngineError::invalid_selection(&choice.id, "empty", "selection cannot be empty")
        })?;
        let feat = rules.feat(picked).ok_or_else(|| {
            EngineError::invalid_selection(&choice.id, picked.clone(), "feat does not exist")
        })?;
        let already_held = character.features.iter().any(|feature| {
            feature.slug == *picked && feature.choice_id.as_deref() != Some(choice.id.as_str())
        });
        if already_held {
            return Err(EngineError::invalid_selection(
                &choice.id,
                picked.clone(),
                "feat already taken",
            ));
        }

        character.remove_features_from_choice(&choice.id);
        character.features.push(FeatureEntry {
            slug: feat.slug.clone(),
            name: feat.name.clone(),
            source: ChoiceSource::Feat,
            source_slug: feat.slug.clone(),
            level_acquired: 1,
            choice_id: Some(choice.id.clone()),
        });
        Ok(())
    }

    fn can_undo(&self, _character: &Character, _choice: &PendingChoice) -> bool {
        true
    }

    fn undo(
        &self,
        character: &mut Character,
        _rules: &Ruleset,
        choice: &PendingChoice,
    ) -> Result<(), EngineError> {
        character.remove_features_from_choice(&choice.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::service::test_support::{fighter_with_level, half_elf_wizard};

    use super::*;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(17)
    }

    #[test]
    fn fighter_has_extra_asi_levels() {
        let (rules, character) = fighter_with_level(6);
        let handler = AsiOrFeatHandler;
        let choices = handler.pending(&character, &rules);
        // Levels 4 and 6.
        assert_eq!(choices.len(), 2);
        assert!(choices.iter().all(|choice| !choice.required));
    }

    #[test]
    fn asi_increase_applies_and_replaces() {
        let (rules, mut character) = fighter_with_level(4);
        let handler = AsiOrFeatHandler;
        let choice = handler.pending(&character, &rules).remove(0);
        let str_before = character.abilities.strength;

        let mut increases = BTreeMap::new();
        increases.insert("STR".to_string(), 2);
        handler
            .resolve(
                &mut character,
                &rules,
                &choice,
                &ResolutionInput::asi(increases),
                &mut rng(),
            )
            .unwrap();
        assert_eq!(character.abilities.strength, str_before + 2);

        // Re-resolving as a feat reverts the score bump.
        handler
            .resolve(
                &mut character,
                &rules,
                &choice,
                &ResolutionInput::feat("alert"),
                &mut rng(),
            )
            .unwrap();
        assert_eq!(character.abilities.strength, str_before);
        assert!(character.has_feature("alert"));
        assert_eq!(character.ability_resolutions.len(), 1);
    }

    #[test]
    fn asi_cannot_push_scores_past_twenty() {
        let (rules, mut character) = fighter_with_level(4);
        character.abilities.strength = 19;
        let handler = AsiOrFeatHandler;
        let choice = handler.pending(&character, &rules).remove(0);

        let mut increases = BTreeMap::new();
        increases.insert("STR".to_string(), 2);
        let err = handler
            .resolve(
                &mut character,
                &rules,
                &choice,
                &ResolutionInput::asi(increases),
                &mut rng(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSelection { .. }));
    }

    #[test]
    fn racial_bonus_excludes_fixed_abilities() {
        let (rules, mut character) = half_elf_wizard(1);
        let handler = AbilityScoreHandler;
        let choice = handler.pending(&character, &rules).remove(0);
        let options = choice.options.inline().unwrap();
        // Half-elf CHA bonus is fixed; CHA is not offered again.
        assert!(options.iter().all(|option| option.slug.as_deref() != Some("CHA")));
        assert_eq!(choice.quantity, 2);

        let int_before = character.abilities.intelligence;
        handler
            .resolve(
                &mut character,
                &rules,
                &choice,
                &ResolutionInput::select(["INT", "DEX"]),
                &mut rng(),
            )
            .unwrap();
        assert_eq!(character.abilities.intelligence, int_before + 1);
    }

    #[test]
    fn feat_duplicates_are_rejected() {
        let (rules, mut character) = fighter_with_level(6);
        let handler = AsiOrFeatHandler;
        let choices = handler.pending(&character, &rules);
        let four = choices.iter().find(|c| c.level_granted == 4).unwrap().clone();
        let six = choices.iter().find(|c| c.level_granted == 6).unwrap().clone();

        handler
            .resolve(&mut character, &rules, &four, &ResolutionInput::feat("lucky"), &mut rng())
            .unwrap();
        let err = handler
            .resolve(&mut character, &rules, &six, &ResolutionInput::feat("lucky"), &mut rng())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSelection { .. }));
    }
}
