//! Hit-point roll choices.
//!
//! Level 1 HP is automatic (max hit die + CON modifier) and never produces a
//! choice; every later character level must be resolved as `roll`, `average`,
//! or `manual` before the gain lands on the sheet.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::character::{Character, HpRoll};
use crate::choice::{
    ChoiceKey, ChoiceMetadata, ChoiceOption, ChoiceOptions, ChoiceSource, ChoiceType, PendingChoice,
};
use crate::data::Ruleset;
use crate::error::EngineError;

use super::{ChoiceHandler, ResolutionInput};

pub struct HitPointsHandler;

impl HitPointsHandler {
    fn build_choice(character: &Character, rules: &Ruleset, level: u8) -> Option<PendingChoice> {
        let class_slug = character
            .class_for_level(level)
            .or_else(|| character.primary_class().map(|entry| entry.class_slug.as_str()))?
            .to_string();
        let class = rules.class(&class_slug)?;
        let hit_die = class.hit_die;
        let con_modifier = character
            .abilities
            .modifier(crate::character::Ability::Con);

        let average = i32::from(hit_die / 2) + 1;
        let average_result = (average + con_modifier).max(1);
        let min_roll = (1 + con_modifier).max(1);
        let max_roll = (i32::from(hit_die) + con_modifier).max(1);

        let key = ChoiceKey::new(
            ChoiceType::HitPoints,
            ChoiceSource::LevelUp,
            class_slug.clone(),
            level,
            "hp",
        );

        let sign = if con_modifier >= 0 { '+' } else { '-' };
        let con_abs = con_modifier.abs();

        Some(PendingChoice {
            id: key.id(),
            choice_type: ChoiceType::HitPoints,
            subtype: None,
            source: ChoiceSource::LevelUp,
            source_name: format!("Level {level}"),
            level_granted: level,
            required: true,
            quantity: 1,
            remaining: 1,
            selected: Vec::new(),
            options: ChoiceOptions::Inline(vec![
                ChoiceOption {
                    id: Some("roll".to_string()),
                    label: "Roll".to_string(),
                    description: Some(format!(
                        "Roll 1d{hit_die} {sign} {con_abs} (CON mod), result {min_roll}-{max_roll}"
                    )),
                    ..ChoiceOption::default()
                },
                ChoiceOption {
                    id: Some("average".to_string()),
                    label: "Average".to_string(),
                    description: Some(format!(
                        "Take {average} {sign} {con_abs} (CON mod) = {average_result} HP"
                    )),
                    ..ChoiceOption::default()
                },
                ChoiceOption {
                    id: Some("manual".to_string()),
                    label: "Manual Roll".to_string(),
                    description: Some(format!("Enter your own d{hit_die} roll result")),
                    ..ChoiceOption::default()
                },
            ]),
            metadata: ChoiceMetadata {
                class_slug: Some(class_slug),
                hit_die: Some(hit_die),
                con_modifier: Some(con_modifier),
                ..ChoiceMetadata::default()
            },
        })
    }

    fn revert(character: &mut Character, choice_id: &str) {
        if let Some(pos) = character
            .hp_rolls
            .iter()
            .position(|roll| roll.choice_id == choice_id)
        {
            let prior = character.hp_rolls.remove(pos);
            character.max_hit_points -= prior.gained;
            character.current_hit_points -= prior.gained;
            character.hp_levels_resolved.retain(|lvl| *lvl != prior.level);
        }
    }
}

impl ChoiceHandler for HitPointsHandler {
    fn choice_type(&self) -> ChoiceType {
        ChoiceType::HitPoints
    }

    fn pending(&self, character: &Character, rules: &Ruleset) -> Vec<PendingChoice> {
        character
            .pending_hp_levels()
            .into_iter()
            .filter_map(|level| Self::build_choice(character, rules, level))
            .collect()
    }

    fn resolve(
        &self,
        character: &mut Character,
        _rules: &Ruleset,
        choice: &PendingChoice,
        input: &ResolutionInput,
        rng: &mut ChaCha8Rng,
    ) -> Result<(), EngineError> {
        let selected = input.selected.first().ok_or_else(|| {
            EngineError::invalid_selection(&choice.id, "empty", "selection is required")
        })?;

        let hit_die = i32::from(choice.metadata.hit_die.unwrap_or(8));
        let con_modifier = choice.metadata.con_modifier.unwrap_or(0);

        let gained = match selected.as_str() {
            "manual" => {
                let roll = input.roll_result.ok_or_else(|| {
                    EngineError::invalid_selection(
                        &choice.id,
                        "manual",
                        "roll_result is required for manual selection",
                    )
                })?;
                if roll < 1 || roll > hit_die {
                    return Err(EngineError::invalid_selection(
                        &choice.id,
                        "manual",
                        format!("roll_result must be between 1 and {hit_die}"),
                    ));
                }
                (roll + con_modifier).max(1)
            }
            // Server-side roll; client-supplied results only via "manual".
            "roll" => (rng.gen_range(1..=hit_die) + con_modifier).max(1),
            "average" => ((hit_die / 2) + 1 + con_modifier).max(1),
            other => {
                return Err(EngineError::invalid_selection(
                    &choice.id,
                    other,
                    "selection must be \"roll\", \"average\", or \"manual\"",
                ));
            }
        };

        Self::revert(character, &choice.id);

        character.max_hit_points += gained;
        character.current_hit_points += gained;
        character.hp_rolls.push(HpRoll {
            level: choice.level_granted,
            gained,
            choice_id: choice.id.clone(),
        });
        if !character.hp_levels_resolved.contains(&choice.level_granted) {
            character.hp_levels_resolved.push(choice.level_granted);
        }
        Ok(())
    }

    fn can_undo(&self, character: &Character, choice: &PendingChoice) -> bool {
        character
            .hp_rolls
            .iter()
            .any(|roll| roll.choice_id == choice.id)
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
        Self::revert(character, &choice.id);
        Ok(())
    }
}
