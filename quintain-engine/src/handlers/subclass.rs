//! Subclass selection.
//!
//! Offered once a class reaches its subclass level. Resolving grants every
//! subclass feature the class has already qualified for; switching subclasses
//! swaps those features out wholesale.

use rand_chacha::ChaCha8Rng;

use crate::character::{Character, FeatureEntry};
use crate::choice::{
    ChoiceKey, ChoiceMetadata, ChoiceOption, ChoiceOptions, ChoiceSource, ChoiceType, PendingChoice,
};
use crate::data::{Ruleset, SubclassDef};
use crate::error::EngineError;

use super::{validate_selection, ChoiceHandler, ResolutionInput};

pub struct SubclassHandler;

impl SubclassHandler {
    fn grant_features(
        character: &mut Character,
        subclass: &SubclassDef,
        class_level: u8,
        choice_id: &str,
    ) {
        for feature in &subclass.features {
            if feature.level <= class_level && !feature.optional {
                character.features.push(FeatureEntry {
                    slug: feature.slug.clone(),
                    name: feature.name.clone(),
                    source: ChoiceSource::Subclass,
                    source_slug: subclass.slug.clone(),
                    level_acquired: feature.level,
                    choice_id: Some(choice_id.to_string()),
                });
            }
        }
    }
}

impl ChoiceHandler for SubclassHandler {
    fn choice_type(&self) -> ChoiceType {
        ChoiceType::Subclass
    }

    fn pending(&self, character: &Character, rules: &Ruleset) -> Vec<PendingChoice> {
        let mut choices = Vec::new();
        for entry in &character.classes {
            let Some(class) = rules.class(&entry.class_slug) else {
                continue;
            };
            if class.subclasses.is_empty() || entry.level < class.subclass_level {
                continue;
            }

            let key = ChoiceKey::new(
                ChoiceType::Subclass,
                ChoiceSource::Class,
                class.slug.clone(),
                class.subclass_level,
                "subclass",
            );
            let selected: Vec<String> = entry.subclass.clone().into_iter().collect();
            let remaining = u32::from(selected.is_empty());

            choices.push(PendingChoice {
                id: key.id(),
                choice_type: ChoiceType::Subclass,
                subtype: None,
                source: ChoiceSource::Class,
                source_name: class.name.clone(),
                level_granted: class.subclass_level,
                required: true,
                quantity: 1,
                remaining,
                selected,
                options: ChoiceOptions::Inline(
                    class
                        .subclasses
                        .iter()
                        .map(|sub| ChoiceOption::slug(sub.slug.clone(), sub.name.clone()))
                        .collect(),
                ),
                metadata: ChoiceMetadata {
                    class_slug: Some(class.slug.clone()),
                    ..ChoiceMetadata::default()
                },
            });
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
        let options = choice.options.inline().unwrap_or_default();
        validate_selection(&choice.id, &input.selected, options, 1)?;
        let picked = input.selected[0].clone();

        let class_slug = choice
            .metadata
            .class_slug
            .clone()
            .unwrap_or_else(|| choice.key().map(|key| key.source_slug).unwrap_or_default());
        let class = rules
            .class(&class_slug)
            .ok_or_else(|| EngineError::UnknownClass(class_slug.clone()))?;
        let subclass = class.subclass(&picked).ok_or_else(|| {
            EngineError::invalid_selection(&choice.id, picked.clone(), "not a subclass of this class")
        })?;
        let class_level = character
            .class_entry(&class_slug)
            .map(|entry| entry.level)
            .ok_or_else(|| EngineError::ClassNotHeld(class_slug.clone()))?;

        // Swapping subclasses replaces the old subclass's features.
        character.remove_features_from_choice(&choice.id);
        Self::grant_features(character, subclass, class_level, &choice.id);

        if let Some(entry) = character.class_entry_mut(&class_slug) {
            entry.subclass = Some(picked);
        }
        Ok(())
    }

    fn can_undo(&self, character: &Character, choice: &PendingChoice) -> bool {
        // Undoable until further levels are built on top of the subclass.
        let class_slug = choice
            .metadata
            .class_slug
            .clone()
            .or_else(|| choice.key().ok().map(|key| key.source_slug));
        class_slug
            .and_then(|slug| character.class_entry(&slug))
            .is_some_and(|entry| entry.level == choice.level_granted)
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
                "class has advanced past the subclass level",
            ));
        }
        character.remove_features_from_choice(&choice.id);
        if let Some(slug) = choice.metadata.class_slug.as_deref() {
            if let Some(entry) = character.class_entry_mut(slug) {
                entry.subclass = None;
            }
        }
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
        ChaCha8Rng::seed_from_u64(11)
    }

    #[test]
    fn subclass_choice_appears_at_the_subclass_level() {
        let (rules, character) = fighter_with_level(2);
        assert!(SubclassHandler.pending(&character, &rules).is_empty());

        let (rules, character) = fighter_with_level(3);
        let choices = SubclassHandler.pending(&character, &rules);
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].level_granted, 3);
        assert!(choices[0].required);
    }

    #[test]
    fn resolving_grants_qualified_subclass_features() {
        let (rules, mut character) = fighter_with_level(3);
        let handler = SubclassHandler;
        let choice = handler.pending(&character, &rules).remove(0);

        handler
            .resolve(
                &mut character,
                &rules,
                &choice,
                &ResolutionInput::one("champion"),
                &mut rng(),
            )
            .unwrap();

        assert!(character.has_feature("improved-critical"));
        // Level 7 feature not yet qualified for.
        assert!(!character.has_feature("remarkable-athlete"));
        assert_eq!(
            character.class_entry("fighter").unwrap().subclass.as_deref(),
            Some("champion")
        );
    }

    #[test]
    fn switching_subclasses_swaps_features() {
        let (rules, mut character) = fighter_with_level(3);
        let handler = SubclassHandler;
        let choice = handler.pending(&character, &rules).remove(0);

        handler
            .resolve(
                &mut character,
                &rules,
                &choice,
                &ResolutionInput::one("champion"),
                &mut rng(),
            )
            .unwrap();
        handler
            .resolve(
                &mut character,
                &rules,
                &choice,
                &ResolutionInput::one("battle-master"),
                &mut rng(),
            )
            .unwrap();

        assert!(!character.has_feature("improved-critical"));
        assert!(character.has_feature("combat-superiority"));
    }

    #[test]
    fn unknown_subclass_is_rejected() {
        let (rules, mut character) = fighter_with_level(3);
        let handler = SubclassHandler;
        let choice = handler.pending(&character, &rules).remove(0);
        let err = handler
            .resolve(
                &mut character,
                &rules,
                &choice,
                &ResolutionInput::one("pirate-king"),
                &mut rng(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidSelection { .. }));
    }

    #[test]
    fn undo_blocked_after_further_levels() {
        let (rules, mut character) = fighter_with_level(3);
        let handler = SubclassHandler;
        let choice = handler.pending(&character, &rules).remove(0);
        handler
            .resolve(
                &mut character,
                &rules,
                &choice,
                &ResolutionInput::one("champion"),
                &mut rng(),
            )
            .unwrap();
        assert!(handler.can_undo(&character, &choice));

        if let Some(entry) = character.class_entry_mut("fighter") {
            entry.level = 4;
        }
        character.level_log.push("fighter".to_string());
        assert!(!handler.can_undo(&character, &choice));
        assert!(matches!(
            handler.undo(&mut character, &rules, &choice),
            Err(EngineError::ChoiceNotUndoable { .. })
        ));
    }
}
