//! Spell choices.
//!
//! Groups are scoped by (class, level-acquired, cantrip vs leveled), so picks
//! made at different levels are independent and additive, and cantrip picks
//! never interfere with leveled-spell picks. Known-spell targets are
//! cumulative per class level.

use rand_chacha::ChaCha8Rng;

use crate::character::{Character, ClassEntry, SpellEntry};
use crate::choice::{
    ChoiceKey, ChoiceMetadata, ChoiceOptions, ChoiceSource, ChoiceType, PendingChoice,
};
use crate::data::{ClassDef, Ruleset, SpellcastingDef};
use crate::error::EngineError;

use super::{ChoiceHandler, ResolutionInput};

pub const CANTRIPS_GROUP: &str = "cantrips";
pub const SPELLS_KNOWN_GROUP: &str = "spells_known";

pub struct SpellHandler;

impl SpellHandler {
    /// Spell slugs the class already knows, filtered by cantrip-ness.
    fn known_for_class(
        character: &Character,
        rules: &Ruleset,
        class_slug: &str,
        cantrips: bool,
    ) -> Vec<String> {
        character
            .spells
            .iter()
            .filter(|entry| entry.class_slug == class_slug)
            .filter(|entry| {
                rules
                    .spell(&entry.spell_slug)
                    .is_some_and(|spell| (spell.level == 0) == cantrips)
            })
            .map(|entry| entry.spell_slug.clone())
            .collect()
    }

    fn group_choice(
        character: &Character,
        rules: &Ruleset,
        entry: &ClassEntry,
        class: &ClassDef,
        casting: &SpellcastingDef,
        cantrips: bool,
    ) -> Option<PendingChoice> {
        let row = casting.row(entry.level)?;
        let target = if cantrips {
            row.cantrips_known
        } else {
            row.spells_known
        };
        if target == 0 {
            return None;
        }

        let (group, subtype) = if cantrips {
            (CANTRIPS_GROUP, "cantrip")
        } else {
            (SPELLS_KNOWN_GROUP, "spells_known")
        };
        let key = ChoiceKey::new(
            ChoiceType::Spell,
            ChoiceSource::Class,
            class.slug.clone(),
            entry.level,
            group,
        );

        let known = Self::known_for_class(character, rules, &class.slug, cantrips);
        let remaining = target.saturating_sub(known.len() as u32);

        let (min_level, max_level) = if cantrips {
            (0, 0)
        } else {
            (1, casting.max_spell_level(entry.level))
        };

        Some(PendingChoice {
            id: key.id(),
            choice_type: ChoiceType::Spell,
            subtype: Some(subtype.to_string()),
            source: ChoiceSource::Class,
            source_name: class.name.clone(),
            level_granted: entry.level,
            required: true,
            quantity: target,
            remaining,
            selected: known,
            options: ChoiceOptions::Remote {
                endpoint: "available-spells".to_string(),
                params: vec![
                    ("min_level".to_string(), min_level.to_string()),
                    ("max_level".to_string(), max_level.to_string()),
                ],
            },
            metadata: ChoiceMetadata {
                class_slug: Some(class.slug.clone()),
                spell_level: Some(max_level),
                ..ChoiceMetadata::default()
            },
        })
    }
}

impl ChoiceHandler for SpellHandler {
    fn choice_type(&self) -> ChoiceType {
        ChoiceType::Spell
    }

    fn pending(&self, character: &Character, rules: &Ruleset) -> Vec<PendingChoice> {
        let mut choices = Vec::new();
        for entry in &character.classes {
            let Some(class) = rules.class(&entry.class_slug) else {
                continue;
            };
            let Some(casting) = &class.spellcasting else {
                continue;
            };
            if let Some(choice) = Self::group_choice(character, rules, entry, class, casting, true)
            {
                choices.push(choice);
            }
            if let Some(choice) = Self::group_choice(character, rules, entry, class, casting, false)
            {
                choices.push(choice);
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
        if input.selected.is_empty() {
            return Err(EngineError::invalid_selection(
                &choice.id,
                "empty",
                "selection cannot be empty",
            ));
        }
        if input.selected.len() as u32 > choice.quantity {
            return Err(EngineError::invalid_selection(
                &choice.id,
                "exceeds_limit",
                format!(
                    "selection of {} exceeds limit of {}",
                    input.selected.len(),
                    choice.quantity
                ),
            ));
        }

        let key = choice.key()?;
        let cantrips = key.group == CANTRIPS_GROUP;
        let class_slug = choice
            .metadata
            .class_slug
            .clone()
            .unwrap_or_else(|| key.source_slug.clone());
        let max_level = choice.metadata.spell_level.unwrap_or(9);

        for pick in &input.selected {
            let spell = rules.spell(pick).ok_or_else(|| {
                EngineError::invalid_selection(&choice.id, pick.clone(), "spell does not exist")
            })?;
            if !spell.classes.iter().any(|slug| *slug == class_slug) {
                return Err(EngineError::invalid_selection(
                    &choice.id,
                    pick.clone(),
                    format!("not on the {class_slug} spell list"),
                ));
            }
            let level_ok = if cantrips {
                spell.level == 0
            } else {
                spell.level >= 1 && spell.level <= max_level
            };
            if !level_ok {
                return Err(EngineError::invalid_selection(
                    &choice.id,
                    pick.clone(),
                    "spell level outside this choice's range",
                ));
            }
            let duplicate = character.spells.iter().any(|entry| {
                entry.spell_slug == *pick
                    && entry.class_slug == class_slug
                    && entry.choice_id != choice.id
            });
            if duplicate {
                return Err(EngineError::invalid_selection(
                    &choice.id,
                    pick.clone(),
                    "already known from another selection",
                ));
            }
        }

        // Replace this exact group (class + level + cantrip-ness) only;
        // selections from other levels stay untouched.
        character.remove_spells_from_choice(&choice.id);
        for pick in &input.selected {
            character.spells.push(SpellEntry {
                spell_slug: pick.clone(),
                choice_id: choice.id.clone(),
                class_slug: class_slug.clone(),
                level_acquired: key.level,
            });
        }
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
        character.remove_spells_from_choice(&choice.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::service::test_support::wizard_with_level;

    use super::*;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(3)
    }

    fn choice_for_group(choices: &[PendingChoice], group: &str) -> PendingChoice {
        choices
            .iter()
            .find(|choice| choice.id.ends_with(group))
            .unwrap_or_else(|| panic!("no {group} choice emitted"))
            .clone()
    }

    #[test]
    fn wizard_gets_cantrip_and_spell_groups() {
        let (rules, character) = wizard_with_level(1);
        let choices = SpellHandler.pending(&character, &rules);
        assert_eq!(choices.len(), 2);
        let cantrips = choice_for_group(&choices, CANTRIPS_GROUP);
        assert_eq!(cantrips.quantity, 3);
        assert_eq!(cantrips.remaining, 3);
        let spells = choice_for_group(&choices, SPELLS_KNOWN_GROUP);
        assert_eq!(spells.quantity, 6);
    }

    #[test]
    fn spell_groups_replace_within_their_level_only() {
        let (rules, mut character) = wizard_with_level(1);
        let handler = SpellHandler;
        let spells = choice_for_group(&handler.pending(&character, &rules), SPELLS_KNOWN_GROUP);

        handler
            .resolve(
                &mut character,
                &rules,
                &spells,
                &ResolutionInput::select(["magic-missile", "shield"]),
                &mut rng(),
            )
            .unwrap();

        // Pretend a later level granted more spells in a different group.
        character.spells.push(SpellEntry {
            spell_slug: "misty-step".to_string(),
            choice_id: "spell:class:wizard:3:spells_known".to_string(),
            class_slug: "wizard".to_string(),
            level_acquired: 3,
        });

        handler
            .resolve(
                &mut character,
                &rules,
                &spells,
                &ResolutionInput::select(["sleep", "mage-armor"]),
                &mut rng(),
            )
            .unwrap();

        let slugs: Vec<&str> = character
            .spells
            .iter()
            .map(|entry| entry.spell_slug.as_str())
            .collect();
        assert!(slugs.contains(&"sleep"));
        assert!(slugs.contains(&"mage-armor"));
        assert!(!slugs.contains(&"magic-missile"));
        // The level-3 group is untouched.
        assert!(slugs.contains(&"misty-step"));
    }

    #[test]
    fn cantrip_picks_reject_leveled_spells() {
        let (rules, mut character) = wizard_with_level(1);
        let handler = SpellHandler;
        let cantrips = choice_for_group(&handler.pending(&character, &rules), CANTRIPS_GROUP);

        let err = handler
            .resolve(
                &mut character,
                &rules,
                &cantrips,
                &ResolutionInput::select(["magic-missile"]),
                &mut rng(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSelection { .. }));
    }

    #[test]
    fn off_list_spells_are_rejected() {
        let (rules, mut character) = wizard_with_level(1);
        let handler = SpellHandler;
        let cantrips = choice_for_group(&handler.pending(&character, &rules), CANTRIPS_GROUP);

        let err = handler
            .resolve(
                &mut character,
                &rules,
                &cantrips,
                &ResolutionInput::select(["sacred-flame"]),
                &mut rng(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSelection { .. }));
    }

    #[test]
    fn remaining_tracks_cumulative_known() {
        let (rules, mut character) = wizard_with_level(1);
        let handler = SpellHandler;
        let cantrips = choice_for_group(&handler.pending(&character, &rules), CANTRIPS_GROUP);
        handler
            .resolve(
                &mut character,
                &rules,
                &cantrips,
                &ResolutionInput::select(["fire-bolt", "mage-hand", "light"]),
                &mut rng(),
            )
            .unwrap();

        let refreshed = choice_for_group(&handler.pending(&character, &rules), CANTRIPS_GROUP);
        assert_eq!(refreshed.remaining, 0);
        assert_eq!(refreshed.selected.len(), 3);
        assert!(refreshed.is_complete());
    }
}
