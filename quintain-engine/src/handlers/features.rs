//! Countable feature choices: fighting styles and optional features
//! (maneuvers, invocations and the like), granted by classes or subclasses at
//! fixed levels.

use rand_chacha::ChaCha8Rng;

use crate::character::{Character, FeatureEntry};
use crate::choice::{
    ChoiceKey, ChoiceMetadata, ChoiceOption, ChoiceOptions, ChoiceSource, ChoiceType, PendingChoice,
};
use crate::data::{FeatureChoiceDef, Ruleset};
use crate::error::EngineError;

use super::{validate_selection, ChoiceHandler, ResolutionInput};

/// One handler instance per owned choice type; fighting styles and optional
/// features share identical semantics under different type tags.
pub struct FeatureChoiceHandler {
    choice_type: ChoiceType,
}

impl FeatureChoiceHandler {
    #[must_use]
    pub const fn new(choice_type: ChoiceType) -> Self {
        Self { choice_type }
    }

    fn build_choice(
        &self,
        character: &Character,
        def: &FeatureChoiceDef,
        source: ChoiceSource,
        source_slug: &str,
        source_name: &str,
    ) -> PendingChoice {
        let key = ChoiceKey::new(
            self.choice_type,
            source,
            source_slug,
            def.level,
            def.group.clone(),
        );
        let id = key.id();

        let selected: Vec<String> = character
            .features
            .iter()
            .filter(|feature| feature.choice_id.as_deref() == Some(id.as_str()))
            .map(|feature| feature.slug.clone())
            .collect();

        let options: Vec<ChoiceOption> = def
            .options
            .iter()
            .map(|option| ChoiceOption::slug(option.slug.clone(), option.name.clone()))
            .collect();

        PendingChoice {
            id,
            choice_type: self.choice_type,
            subtype: None,
            source,
            source_name: source_name.to_string(),
            level_granted: def.level,
            required: true,
            quantity: def.choose,
            remaining: def.choose.saturating_sub(selected.len() as u32),
            selected,
            options: ChoiceOptions::Inline(options),
            metadata: ChoiceMetadata::default(),
        }
    }
}

impl ChoiceHandler for FeatureChoiceHandler {
    fn choice_type(&self) -> ChoiceType {
        self.choice_type
    }

    fn pending(&self, character: &Character, rules: &Ruleset) -> Vec<PendingChoice> {
        let mut choices = Vec::new();
        for entry in &character.classes {
            let Some(class) = rules.class(&entry.class_slug) else {
                continue;
            };
            for def in &class.feature_choices {
                if def.choice_type == self.choice_type && def.level <= entry.level {
                    choices.push(self.build_choice(
                        character,
                        def,
                        ChoiceSource::Class,
                        &class.slug,
                        &class.name,
                    ));
                }
            }
            if let Some(subclass_slug) = &entry.subclass {
                if let Some(subclass) = class.subclass(subclass_slug) {
                    for def in &subclass.feature_choices {
                        if def.choice_type == self.choice_type && def.level <= entry.level {
                            choices.push(self.build_choice(
                                character,
                                def,
                                ChoiceSource::Subclass,
                                &subclass.slug,
                                &subclass.name,
                            ));
                        }
                    }
                }
            }
        }
        choices
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
        validate_selection(&choice.id, &input.selected, options, choice.quantity)?;

        let key = choice.key()?;
        character.remove_features_from_choice(&choice.id);
        for pick in &input.selected {
            let name = options
                .iter()
                .find(|option| option.pick_key() == Some(pick.as_str()))
                .map_or_else(|| pick.clone(), |option| option.label.clone());
            character.features.push(FeatureEntry {
                slug: pick.clone(),
                name,
                source: key.source,
                source_slug: key.source_slug.clone(),
                level_acquired: key.level,
                choice_id: Some(choice.id.clone()),
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
        character.remove_features_from_choice(&choice.id);
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
        ChaCha8Rng::seed_from_u64(21)
    }

    #[test]
    fn fighting_style_offered_at_level_one() {
        let (rules, character) = fighter_with_level(1);
        let handler = FeatureChoiceHandler::new(ChoiceType::FightingStyle);
        let choices = handler.pending(&character, &rules);
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].quantity, 1);
    }

    #[test]
    fn maneuvers_come_from_the_subclass() {
        let (rules, mut character) = fighter_with_level(3);
        if let Some(entry) = character.class_entry_mut("fighter") {
            entry.subclass = Some("battle-master".to_string());
        }

        let handler = FeatureChoiceHandler::new(ChoiceType::OptionalFeature);
        let choices = handler.pending(&character, &rules);
        assert_eq!(choices.len(), 1);
        let maneuvers = &choices[0];
        assert_eq!(maneuvers.source, ChoiceSource::Subclass);
        assert_eq!(maneuvers.quantity, 3);

        let mut character = character.clone();
        handler
            .resolve(
                &mut character,
                &rules,
                maneuvers,
                &ResolutionInput::select([
                    "maneuver-riposte",
                    "maneuver-parry",
                    "maneuver-trip-attack",
                ]),
                &mut rng(),
            )
            .unwrap();
        assert!(character.has_feature("maneuver-riposte"));

        // Re-resolving swaps the whole set.
        handler
            .resolve(
                &mut character,
                &rules,
                maneuvers,
                &ResolutionInput::select([
                    "maneuver-parry",
                    "maneuver-precision-attack",
                    "maneuver-menacing-attack",
                ]),
                &mut rng(),
            )
            .unwrap();
        assert!(!character.has_feature("maneuver-riposte"));
        assert!(character.has_feature("maneuver-precision-attack"));
        let maneuver_count = character
            .features
            .iter()
            .filter(|feature| feature.slug.starts_with("maneuver-"))
            .count();
        assert_eq!(maneuver_count, 3);
    }

    #[test]
    fn champion_has_no_optional_feature_choices() {
        let (rules, mut character) = fighter_with_level(3);
        if let Some(entry) = character.class_entry_mut("fighter") {
            entry.subclass = Some("champion".to_string());
        }
        let handler = FeatureChoiceHandler::new(ChoiceType::OptionalFeature);
        assert!(handler.pending(&character, &rules).is_empty());
    }
}
