//! Starting equipment and the equipment-vs-gold gate.
//!
//! Both choices exist only at total level 1. The gate is a two-state choice:
//! picking `gold` adds the class's starting wealth as a currency row tagged
//! `starting_wealth`, so switching back removes exactly that contribution and
//! never touches background gold.

use rand_chacha::ChaCha8Rng;

use crate::character::{
    Character, EquipmentEntry, EquipmentMode, ItemProvenance, GOLD_ITEM_SLUG,
};
use crate::choice::{
    ChoiceKey, ChoiceMetadata, ChoiceOption, ChoiceOptions, ChoiceSource, ChoiceType, PendingChoice,
};
use crate::data::Ruleset;
use crate::error::EngineError;

use super::{validate_selection, ChoiceHandler, ResolutionInput};

pub struct EquipmentModeHandler;

impl EquipmentModeHandler {
    /// Strip whatever the current mode selection granted.
    fn clear_existing(character: &mut Character) {
        match character.equipment_mode {
            Some(EquipmentMode::Gold) => {
                character.equipment.retain(|entry| {
                    !(entry.item_slug == GOLD_ITEM_SLUG
                        && entry.provenance == ItemProvenance::StartingWealth)
                });
            }
            Some(EquipmentMode::Equipment) => {
                character.equipment.retain(|entry| {
                    !matches!(
                        &entry.provenance,
                        ItemProvenance::Choice { choice_id, .. }
                            if choice_id.starts_with("equipment:")
                    )
                });
            }
            None => {}
        }
    }
}

impl ChoiceHandler for EquipmentModeHandler {
    fn choice_type(&self) -> ChoiceType {
        ChoiceType::EquipmentMode
    }

    fn pending(&self, character: &Character, rules: &Ruleset) -> Vec<PendingChoice> {
        if character.total_level() != 1 {
            return Vec::new();
        }
        let Some(primary) = character.primary_class() else {
            return Vec::new();
        };
        let Some(class) = rules.class(&primary.class_slug) else {
            return Vec::new();
        };
        let Some(wealth) = class.starting_wealth else {
            return Vec::new();
        };
        // No point offering the gold alternative without equipment choices.
        if class.equipment_groups.is_empty() {
            return Vec::new();
        }

        let key = ChoiceKey::new(
            ChoiceType::EquipmentMode,
            ChoiceSource::Class,
            class.slug.clone(),
            1,
            "starting_equipment",
        );

        let selected: Vec<String> = character
            .equipment_mode
            .map(|mode| vec![mode.key().to_string()])
            .unwrap_or_default();
        let remaining = u32::from(selected.is_empty());

        let mut metadata = ChoiceMetadata {
            starting_wealth: Some(wealth),
            ..ChoiceMetadata::default()
        };
        if character.equipment_mode == Some(EquipmentMode::Gold) {
            metadata.gold_amount = Some(character.gold_from(&ItemProvenance::StartingWealth));
        }

        vec![PendingChoice {
            id: key.id(),
            choice_type: ChoiceType::EquipmentMode,
            subtype: None,
            source: ChoiceSource::Class,
            source_name: class.name.clone(),
            level_granted: 1,
            required: true,
            quantity: 1,
            remaining,
            selected,
            options: ChoiceOptions::Inline(vec![
                ChoiceOption {
                    value: Some("equipment".to_string()),
                    label: "Take Starting Equipment".to_string(),
                    description: Some(
                        "Receive your class's standard starting equipment".to_string(),
                    ),
                    ..ChoiceOption::default()
                },
                ChoiceOption {
                    value: Some("gold".to_string()),
                    label: "Take Starting Gold".to_string(),
                    description: Some(format!(
                        "Receive {} (avg. {} gp) instead of equipment",
                        wealth.formula(),
                        wealth.average()
                    )),
                    ..ChoiceOption::default()
                },
            ]),
            metadata,
        }]
    }

    fn resolve(
        &self,
        character: &mut Character,
        _rules: &Ruleset,
        choice: &PendingChoice,
        input: &ResolutionInput,
        _rng: &mut ChaCha8Rng,
    ) -> Result<(), EngineError> {
        let selected = input.selected.first().ok_or_else(|| {
            EngineError::invalid_selection(&choice.id, "empty", "selection cannot be empty")
        })?;

        let mode = match selected.as_str() {
            "equipment" => EquipmentMode::Equipment,
            "gold" => EquipmentMode::Gold,
            other => {
                return Err(EngineError::invalid_selection(
                    &choice.id,
                    other,
                    "must be \"equipment\" or \"gold\"",
                ));
            }
        };

        Self::clear_existing(character);

        if mode == EquipmentMode::Gold {
            let amount = input.gold_amount.unwrap_or_else(|| {
                choice
                    .metadata
                    .starting_wealth
                    .map(|wealth| wealth.average())
                    .unwrap_or(0)
            });
            if amount <= 0 {
                return Err(EngineError::invalid_selection(
                    &choice.id,
                    "gold",
                    "gold amount must be greater than zero",
                ));
            }
            character.equipment.push(EquipmentEntry {
                item_slug: GOLD_ITEM_SLUG.to_string(),
                quantity: amount,
                provenance: ItemProvenance::StartingWealth,
            });
        }

        character.equipment_mode = Some(mode);
        Ok(())
    }

    fn can_undo(&self, character: &Character, _choice: &PendingChoice) -> bool {
        character.total_level() == 1
    }

    fn undo(
        &self,
        character: &mut Character,
        _rules: &Ruleset,
        choice: &PendingChoice,
    ) -> Result<(), EngineError> {
        if !self.can_undo(character, choice) {
            return Err(EngineError::not_undoable(
                &choice.id,
                "equipment mode is fixed above level 1",
            ));
        }
        Self::clear_existing(character);
        character.equipment_mode = None;
        Ok(())
    }
}

pub struct EquipmentHandler;

impl ChoiceHandler for EquipmentHandler {
    fn choice_type(&self) -> ChoiceType {
        ChoiceType::Equipment
    }

    fn pending(&self, character: &Character, rules: &Ruleset) -> Vec<PendingChoice> {
        if character.total_level() != 1 {
            return Vec::new();
        }
        // Gold mode replaces the equipment bundles entirely.
        if character.equipment_mode == Some(EquipmentMode::Gold) {
            return Vec::new();
        }
        let Some(primary) = character.primary_class() else {
            return Vec::new();
        };
        let Some(class) = rules.class(&primary.class_slug) else {
            return Vec::new();
        };

        class
            .equipment_groups
            .iter()
            .map(|group| {
                let key = ChoiceKey::new(
                    ChoiceType::Equipment,
                    ChoiceSource::Class,
                    class.slug.clone(),
                    1,
                    group.group.clone(),
                );
                let id = key.id();

                let selected: Vec<String> = character
                    .equipment
                    .iter()
                    .filter_map(|entry| match &entry.provenance {
                        ItemProvenance::Choice { choice_id, option } if *choice_id == id => {
                            Some(option.clone())
                        }
                        _ => None,
                    })
                    .collect::<std::collections::BTreeSet<_>>()
                    .into_iter()
                    .collect();
                let remaining = u32::from(selected.is_empty());

                PendingChoice {
                    id,
                    choice_type: ChoiceType::Equipment,
                    subtype: None,
                    source: ChoiceSource::Class,
                    source_name: class.name.clone(),
                    level_granted: 1,
                    required: true,
                    quantity: 1,
                    remaining,
                    selected,
                    options: ChoiceOptions::Inline(
                        group
                            .options
                            .iter()
                            .map(|option| ChoiceOption {
                                value: Some(option.option.clone()),
                                label: option.label.clone(),
                                items: option.items.clone(),
                                ..ChoiceOption::default()
                            })
                            .collect(),
                    ),
                    metadata: ChoiceMetadata {
                        choice_group: Some(group.group.clone()),
                        ..ChoiceMetadata::default()
                    },
                }
            })
            .collect()
    }

    fn resolve(
        &self,
        character: &mut Character,
        _rules: &Ruleset,
        choice: &PendingChoice,
        input: &ResolutionInput,
        _rng: &mut ChaCha8Rng,
    ) -> Result<(), EngineError> {
        let options = choice.options.inline().unwrap_or_default();
        validate_selection(&choice.id, &input.selected, options, 1)?;
        let picked = &input.selected[0];

        let option = options
            .iter()
            .find(|option| option.pick_key() == Some(picked.as_str()))
            .ok_or_else(|| {
                EngineError::invalid_selection(&choice.id, picked.clone(), "not in option set")
            })?;

        // Replace, never accumulate: clear the prior option's items first.
        character.remove_equipment_from_choice(&choice.id);
        for grant in &option.items {
            character.equipment.push(EquipmentEntry {
                item_slug: grant.item_slug.clone(),
                quantity: grant.quantity,
                provenance: ItemProvenance::Choice {
                    choice_id: choice.id.clone(),
                    option: picked.clone(),
                },
            });
        }
        Ok(())
    }

    fn can_undo(&self, character: &Character, _choice: &PendingChoice) -> bool {
        character.total_level() == 1
    }

    fn undo(
        &self,
        character: &mut Character,
        _rules: &Ruleset,
        choice: &PendingChoice,
    ) -> Result<(), EngineError> {
        if !self.can_undo(character, choice) {
            return Err(EngineError::not_undoable(
                &choice.id,
                "starting equipment is fixed above level 1",
            ));
        }
        character.remove_equipment_from_choice(&choice.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::service::test_support::fighter_with_level;

    use super::*;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(99)
    }

    #[test]
    fn equipment_replaces_rather_than_accumulates() {
        let (rules, mut character) = fighter_with_level(1);
        let handler = EquipmentHandler;
        let choices = handler.pending(&character, &rules);
        let weapons = choices
            .iter()
            .find(|choice| choice.metadata.choice_group.as_deref() == Some("weapons"))
            .unwrap()
            .clone();

        handler
            .resolve(&mut character, &rules, &weapons, &ResolutionInput::one("a"), &mut rng())
            .unwrap();
        let after_a: Vec<String> = character
            .equipment
            .iter()
            .map(|entry| entry.item_slug.clone())
            .collect();
        assert!(after_a.contains(&"shield".to_string()));

        handler
            .resolve(&mut character, &rules, &weapons, &ResolutionInput::one("b"), &mut rng())
            .unwrap();
        let after_b: Vec<String> = character
            .equipment
            .iter()
            .map(|entry| entry.item_slug.clone())
            .collect();
        assert!(!after_b.contains(&"shield".to_string()));
        assert!(after_b.contains(&"battleaxe".to_string()));
        // Exactly option b's two items, never the union of both options.
        assert_eq!(after_b.len(), 2);
    }

    #[test]
    fn gold_mode_switch_reverses_fully() {
        let (rules, mut character) = fighter_with_level(1);
        // Background gold must survive mode flapping.
        character.equipment.push(EquipmentEntry {
            item_slug: GOLD_ITEM_SLUG.to_string(),
            quantity: 10,
            provenance: ItemProvenance::Background,
        });

        let mode_handler = EquipmentModeHandler;
        let mode_choice = mode_handler.pending(&character, &rules).remove(0);

        mode_handler
            .resolve(
                &mut character,
                &rules,
                &mode_choice,
                &ResolutionInput::one("gold"),
                &mut rng(),
            )
            .unwrap();
        // Fighter wealth is 5d4 x 10, average 125.
        assert_eq!(character.gold_from(&ItemProvenance::StartingWealth), 125);
        assert_eq!(character.gold_total(), 135);
        assert!(EquipmentHandler.pending(&character, &rules).is_empty());

        mode_handler
            .resolve(
                &mut character,
                &rules,
                &mode_choice,
                &ResolutionInput::one("equipment"),
                &mut rng(),
            )
            .unwrap();
        assert_eq!(character.gold_from(&ItemProvenance::StartingWealth), 0);
        assert_eq!(character.gold_total(), 10);
        assert!(!EquipmentHandler.pending(&character, &rules).is_empty());
    }

    #[test]
    fn switching_to_gold_removes_chosen_equipment() {
        let (rules, mut character) = fighter_with_level(1);
        let mode_handler = EquipmentModeHandler;
        let mode_choice = mode_handler.pending(&character, &rules).remove(0);
        mode_handler
            .resolve(
                &mut character,
                &rules,
                &mode_choice,
                &ResolutionInput::one("equipment"),
                &mut rng(),
            )
            .unwrap();

        let handler = EquipmentHandler;
        let group = handler.pending(&character, &rules).remove(0);
        handler
            .resolve(&mut character, &rules, &group, &ResolutionInput::one("a"), &mut rng())
            .unwrap();
        assert!(!character.equipment.is_empty());

        mode_handler
            .resolve(
                &mut character,
                &rules,
                &mode_choice,
                &ResolutionInput::one("gold").with_gold(50),
                &mut rng(),
            )
            .unwrap();
        assert_eq!(character.gold_from(&ItemProvenance::StartingWealth), 50);
        assert!(character
            .equipment
            .iter()
            .all(|entry| entry.item_slug == GOLD_ITEM_SLUG));
    }

    #[test]
    fn mode_is_locked_above_level_one() {
        let (rules, mut character) = fighter_with_level(2);
        let mode_handler = EquipmentModeHandler;
        assert!(mode_handler.pending(&character, &rules).is_empty());

        let synthetic = ChoiceKey::new(
            ChoiceType::EquipmentMode,
            ChoiceSource::Class,
            "fighter",
            1,
            "starting_equipment",
        );
        let choice = PendingChoice {
            id: synthetic.id(),
            choice_type: ChoiceType::EquipmentMode,
            subtype: None,
            source: ChoiceSource::Class,
            source_name: "Fighter".to_string(),
            level_granted: 1,
            required: true,
            quantity: 1,
            remaining: 0,
            selected: vec!["equipment".to_string()],
            options: ChoiceOptions::Inline(Vec::new()),
            metadata: ChoiceMetadata::default(),
        };
        assert!(!mode_handler.can_undo(&character, &choice));
        assert!(matches!(
            mode_handler.undo(&mut character, &rules, &choice),
            Err(EngineError::ChoiceNotUndoable { .. })
        ));
    }
}
