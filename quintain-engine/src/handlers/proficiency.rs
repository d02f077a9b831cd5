//! Skill proficiency, language, and expertise choices.

use rand_chacha::ChaCha8Rng;

use crate::character::{Character, Grant};
use crate::choice::{
    ChoiceKey, ChoiceMetadata, ChoiceOption, ChoiceOptions, ChoiceSource, ChoiceType, PendingChoice,
};
use crate::data::Ruleset;
use crate::error::EngineError;

use super::{validate_selection, ChoiceHandler, ResolutionInput};

fn held_slugs<'a>(grants: &'a [Grant], except_choice: &str) -> Vec<&'a str> {
    grants
        .iter()
        .filter(|grant| grant.choice_id.as_deref() != Some(except_choice))
        .map(|grant| grant.slug.as_str())
        .collect()
}

fn selected_for(grants: &[Grant], choice_id: &str) -> Vec<String> {
    grants
        .iter()
        .filter(|grant| grant.choice_id.as_deref() == Some(choice_id))
        .map(|grant| grant.slug.clone())
        .collect()
}

pub struct ProficiencyHandler;

impl ProficiencyHandler {
    fn skill_choice(
        character: &Character,
        rules: &Ruleset,
        source: ChoiceSource,
        source_slug: &str,
        source_name: &str,
        choose: u32,
        pool: &[String],
    ) -> PendingChoice {
        let key = ChoiceKey::new(ChoiceType::Proficiency, source, source_slug, 1, "skills");
        let id = key.id();
        let selected = selected_for(&character.skill_proficiencies, &id);
        let held = held_slugs(&character.skill_proficiencies, &id);

        let options: Vec<ChoiceOption> = pool
            .iter()
            .filter(|slug| !held.contains(&slug.as_str()))
            .filter_map(|slug| {
                rules
                    .skills
                    .iter()
                    .find(|skill| skill.slug == *slug)
                    .map(|skill| ChoiceOption::slug(skill.slug.clone(), skill.name.clone()))
            })
            .collect();

        PendingChoice {
            id,
            choice_type: ChoiceType::Proficiency,
            subtype: Some("skill".to_string()),
            source,
            source_name: source_name.to_string(),
            level_granted: 1,
            required: true,
            quantity: choose,
            remaining: choose.saturating_sub(selected.len() as u32),
            selected,
            options: ChoiceOptions::Inline(options),
            metadata: ChoiceMetadata::default(),
        }
    }
}

impl ChoiceHandler for ProficiencyHandler {
    fn choice_type(&self) -> ChoiceType {
        ChoiceType::Proficiency
    }

    fn pending(&self, character: &Character, rules: &Ruleset) -> Vec<PendingChoice> {
        let mut choices = Vec::new();

        if let Some(primary) = character.primary_class() {
            if let Some(class) = rules.class(&primary.class_slug) {
                if let Some(skills) = &class.skill_choices {
                    choices.push(Self::skill_choice(
                        character,
                        rules,
                        ChoiceSource::Class,
                        &class.slug,
                        &class.name,
                        skills.choose,
                        &skills.from,
                    ));
                }
            }
        }

        if let Some(race) = rules.race(&character.race_slug) {
            if race.skill_choose > 0 {
                let pool: Vec<String> =
                    rules.skills.iter().map(|skill| skill.slug.clone()).collect();
                choices.push(Self::skill_choice(
                    character,
                    rules,
                    ChoiceSource::Race,
                    &race.slug,
                    &race.name,
                    race.skill_choose,
                    &pool,
                ));
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

        character
            .skill_proficiencies
            .retain(|grant| grant.choice_id.as_deref() != Some(choice.id.as_str()));
        for pick in &input.selected {
            character
                .skill_proficiencies
                .push(Grant::chosen(pick.clone(), choice.id.clone()));
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
        character
            .skill_proficiencies
            .retain(|grant| grant.choice_id.as_deref() != Some(choice.id.as_str()));
        Ok(())
    }
}

pub struct LanguageHandler;

impl LanguageHandler {
    fn language_choice(
        character: &Character,
        rules: &Ruleset,
        source: ChoiceSource,
        source_slug: &str,
        source_name: &str,
        choose: u32,
    ) -> PendingChoice {
        let key = ChoiceKey::new(ChoiceType::Language, source, source_slug, 1, "bonus");
        let id = key.id();
        let selected = selected_for(&character.languages, &id);
        let held = held_slugs(&character.languages, &id);

        let options: Vec<ChoiceOption> = rules
            .languages
            .iter()
            .filter(|language| !held.contains(&language.slug.as_str()))
            .map(|language| ChoiceOption::slug(language.slug.clone(), language.name.clone()))
            .collect();

        PendingChoice {
            id,
            choice_type: ChoiceType::Language,
            subtype: None,
            source,
            source_name: source_name.to_string(),
            level_granted: 1,
            required: true,
            quantity: choose,
            remaining: choose.saturating_sub(selected.len() as u32),
            selected,
            options: ChoiceOptions::Inline(options),
            metadata: ChoiceMetadata::default(),
        }
    }
}

impl ChoiceHandler for LanguageHandler {
    fn choice_type(&self) -> ChoiceType {
        ChoiceType::Language
    }

    fn pending(&self, character: &Character, rules: &Ruleset) -> Vec<PendingChoice> {
        let mut choices = Vec::new();
        if let Some(race) = rules.race(&character.race_slug) {
            if race.language_choose > 0 {
                choices.push(Self::language_choice(
                    character,
                    rules,
                    ChoiceSource::Race,
                    &race.slug,
                    &race.name,
                    race.language_choose,
                ));
            }
        }
        if let Some(background) = rules.background(&character.background_slug) {
            if background.language_choose > 0 {
                choices.push(Self::language_choice(
                    character,
                    rules,
                    ChoiceSource::Background,
                    &background.slug,
                    &background.name,
                    background.language_choose,
                ));
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

        character
            .languages
            .retain(|grant| grant.choice_id.as_deref() != Some(choice.id.as_str()));
        for pick in &input.selected {
            character
                .languages
                .push(Grant::chosen(pick.clone(), choice.id.clone()));
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
        character
            .languages
            .retain(|grant| grant.choice_id.as_deref() != Some(choice.id.as_str()));
        Ok(())
    }
}

/// Expertise draws its options from the skill proficiencies the character
/// already holds, so it must resolve after proficiency choices.
pub struct ExpertiseHandler;

impl ChoiceHandler for ExpertiseHandler {
    fn choice_type(&self) -> ChoiceType {
        ChoiceType::Expertise
    }

    fn pending(&self, character: &Character, rules: &Ruleset) -> Vec<PendingChoice> {
        let mut choices = Vec::new();
        for entry in &character.classes {
            let Some(class) = rules.class(&entry.class_slug) else {
                continue;
            };
            for def in &class.feature_choices {
                if def.choice_type != ChoiceType::Expertise || def.level > entry.level {
                    continue;
                }
                let key = ChoiceKey::new(
                    ChoiceType::Expertise,
                    ChoiceSource::Class,
                    class.slug.clone(),
                    def.level,
                    def.group.clone(),
                );
                let id = key.id();
                let selected = selected_for(&character.expertise, &id);
                let taken = held_slugs(&character.expertise, &id);

                let options: Vec<ChoiceOption> = character
                    .skill_proficiencies
                    .iter()
                    .filter(|grant| !taken.contains(&grant.slug.as_str()))
                    .filter_map(|grant| {
                        rules
                            .skills
                            .iter()
                            .find(|skill| skill.slug == grant.slug)
                            .map(|skill| ChoiceOption::slug(skill.slug.clone(), skill.name.clone()))
                    })
                    .collect();

                choices.push(PendingChoice {
                    id,
                    choice_type: ChoiceType::Expertise,
                    subtype: Some("skill".to_string()),
                    source: ChoiceSource::Class,
                    source_name: class.name.clone(),
                    level_granted: def.level,
                    required: true,
                    quantity: def.choose,
                    remaining: def.choose.saturating_sub(selected.len() as u32),
                    selected,
                    options: ChoiceOptions::Inline(options),
                    metadata: ChoiceMetadata {
                        class_slug: Some(class.slug.clone()),
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
        _rules: &Ruleset,
        choice: &PendingChoice,
        input: &ResolutionInput,
        _rng: &mut ChaCha8Rng,
    ) -> Result<(), EngineError> {
        let options = choice.options.inline().unwrap_or_default();
        validate_selection(&choice.id, &input.selected, options, choice.quantity)?;

        // Expertise only applies to skills the character is proficient in.
        for pick in &input.selected {
            if !character
                .skill_proficiencies
                .iter()
                .any(|grant| grant.slug == *pick)
            {
                return Err(EngineError::invalid_selection(
                    &choice.id,
                    pick.clone(),
                    "not proficient in this skill",
                ));
            }
        }

        character
            .expertise
            .retain(|grant| grant.choice_id.as_deref() != Some(choice.id.as_str()));
        for pick in &input.selected {
            character
                .expertise
                .push(Grant::chosen(pick.clone(), choice.id.clone()));
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
        character
            .expertise
            .retain(|grant| grant.choice_id.as_deref() != Some(choice.id.as_str()));
        Ok(())
    }
}
