//! The in-process character-management service.
//!
//! This is the collaborator surface the orchestration harness consumes:
//! character lookup, level-up, multiclass adoption, pending-choice listing,
//! choice resolution/undo, feature listing, and remote option fetching. The
//! shape is transport-agnostic; an HTTP layer would sit in front of these
//! same operations.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::character::{
    AbilityScores, Character, ClassEntry, EquipmentEntry, FeatureEntry, Grant, ItemProvenance,
    GOLD_ITEM_SLUG, MAX_LEVEL,
};
use crate::choice::{ChoiceKey, ChoiceOption, ChoiceSource, PendingChoice};
use crate::data::{ClassDef, Ruleset};
use crate::error::EngineError;
use crate::handlers::{HandlerRegistry, ResolutionInput};

/// Class row in a character summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSummary {
    pub class_slug: String,
    pub level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subclass: Option<String>,
}

/// Externally observable character state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSummary {
    pub id: u64,
    pub public_id: String,
    pub name: String,
    pub total_level: u8,
    pub max_hit_points: i32,
    pub current_hit_points: i32,
    pub classes: Vec<ClassSummary>,
    pub ability_scores: BTreeMap<String, i32>,
    pub is_complete: bool,
}

/// A feature as listed by the features operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRef {
    pub slug: String,
    pub source: String,
}

/// Result of leveling one class by one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelUpOutcome {
    pub previous_level: u8,
    pub new_level: u8,
    pub class_slug: String,
    pub class_level: u8,
    pub features_gained: Vec<FeatureGained>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGained {
    pub slug: String,
    pub name: String,
}

/// Parameters for creating a level-1 character.
#[derive(Debug, Clone)]
pub struct NewCharacter {
    pub name: String,
    pub public_id: String,
    pub race_slug: String,
    pub background_slug: String,
    pub class_slug: String,
    pub abilities: AbilityScores,
}

pub struct CharacterService {
    rules: Ruleset,
    registry: HandlerRegistry,
    characters: HashMap<u64, Character>,
    next_id: u64,
    rng: ChaCha8Rng,
}

impl CharacterService {
    /// Build a service over the given ruleset. The seed drives server-side
    /// dice (hit-point rolls); everything else is deterministic.
    #[must_use]
    pub fn new(rules: Ruleset, seed: u64) -> Self {
        Self {
            rules,
            registry: HandlerRegistry::standard(),
            characters: HashMap::new(),
            next_id: 1,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn rules(&self) -> &Ruleset {
        &self.rules
    }

    /// Create a complete-able level-1 character. Racial fixed bonuses apply
    /// immediately; level-1 HP is automatic (max hit die + CON modifier).
    pub fn create_character(&mut self, request: NewCharacter) -> Result<u64, EngineError> {
        let class = self
            .rules
            .class(&request.class_slug)
            .ok_or_else(|| EngineError::UnknownClass(request.class_slug.clone()))?;
        let race = self
            .rules
            .race(&request.race_slug)
            .ok_or_else(|| EngineError::UnknownRace(request.race_slug.clone()))?;
        let background = self
            .rules
            .background(&request.background_slug)
            .ok_or_else(|| EngineError::UnknownBackground(request.background_slug.clone()))?;

        let mut abilities = request.abilities;
        for (ability, bonus) in &race.fixed_bonuses {
            abilities.adjust(*ability, *bonus);
        }

        let con_modifier = abilities.modifier(crate::character::Ability::Con);
        let starting_hp = (i32::from(class.hit_die) + con_modifier).max(1);

        let mut character = Character {
            id: self.next_id,
            public_id: request.public_id,
            name: request.name,
            race_slug: race.slug.clone(),
            background_slug: background.slug.clone(),
            classes: vec![ClassEntry {
                class_slug: class.slug.clone(),
                level: 1,
                subclass: None,
                primary: true,
            }],
            abilities,
            max_hit_points: starting_hp,
            current_hit_points: starting_hp,
            level_log: vec![class.slug.clone()],
            hp_levels_resolved: vec![1],
            hp_rolls: Vec::new(),
            equipment: Vec::new(),
            spells: Vec::new(),
            skill_proficiencies: Vec::new(),
            expertise: Vec::new(),
            languages: Vec::new(),
            features: Vec::new(),
            ability_resolutions: Vec::new(),
            equipment_mode: None,
        };

        for slug in &class.fixed_proficiencies {
            character.skill_proficiencies.push(Grant::fixed(slug.clone()));
        }
        for slug in &background.skill_grants {
            character.skill_proficiencies.push(Grant::fixed(slug.clone()));
        }
        for slug in &race.fixed_languages {
            character.languages.push(Grant::fixed(slug.clone()));
        }
        if background.gold > 0 {
            character.equipment.push(EquipmentEntry {
                item_slug: GOLD_ITEM_SLUG.to_string(),
                quantity: background.gold,
                provenance: ItemProvenance::Background,
            });
        }

        grant_class_features(&mut character, class, 1);

        let id = character.id;
        self.characters.insert(id, character);
        self.next_id += 1;
        debug!(target: "quintain_engine::service", "created character {id}");
        Ok(id)
    }

    pub fn delete_character(&mut self, id: u64) -> Result<(), EngineError> {
        self.characters
            .remove(&id)
            .map(|_| ())
            .ok_or(EngineError::CharacterNotFound(id))
    }

    #[must_use]
    pub fn character(&self, id: u64) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn get_character(&self, id: u64) -> Result<CharacterSummary, EngineError> {
        let character = self
            .characters
            .get(&id)
            .ok_or(EngineError::CharacterNotFound(id))?;
        Ok(self.summarize(character))
    }

    fn summarize(&self, character: &Character) -> CharacterSummary {
        let pending = self.registry.pending_choices(character, &self.rules);
        let is_complete = !pending.iter().any(PendingChoice::blocks_completion);
        CharacterSummary {
            id: character.id,
            public_id: character.public_id.clone(),
            name: character.name.clone(),
            total_level: character.total_level(),
            max_hit_points: character.max_hit_points,
            current_hit_points: character.current_hit_points,
            classes: character
                .classes
                .iter()
                .map(|entry| ClassSummary {
                    class_slug: entry.class_slug.clone(),
                    level: entry.level,
                    subclass: entry.subclass.clone(),
                })
                .collect(),
            ability_scores: character.abilities.as_map(),
            is_complete,
        }
    }

    /// Level one class by one level.
    ///
    /// HP is never raised here; the new level surfaces a hit-point choice
    /// instead. Requires a complete character below the level cap.
    pub fn level_up_class(
        &mut self,
        id: u64,
        class_slug: Option<&str>,
    ) -> Result<LevelUpOutcome, EngineError> {
        let character = self
            .characters
            .get(&id)
            .ok_or(EngineError::CharacterNotFound(id))?;

        if character.total_level() >= MAX_LEVEL {
            return Err(EngineError::MaxLevelReached(MAX_LEVEL));
        }
        let pending = self.registry.pending_choices(character, &self.rules);
        let blocking = pending
            .iter()
            .filter(|choice| choice.blocks_completion())
            .count();
        if blocking > 0 {
            return Err(EngineError::IncompleteCharacter(blocking));
        }

        let slug = match class_slug {
            Some(slug) => {
                if character.class_entry(slug).is_none() {
                    return Err(EngineError::ClassNotHeld(slug.to_string()));
                }
                slug.to_string()
            }
            None => character
                .primary_class()
                .map(|entry| entry.class_slug.clone())
                .ok_or_else(|| EngineError::ClassNotHeld("primary".to_string()))?,
        };
        let class = self
            .rules
            .class(&slug)
            .ok_or_else(|| EngineError::UnknownClass(slug.clone()))?
            .clone();

        let character = self
            .characters
            .get_mut(&id)
            .ok_or(EngineError::CharacterNotFound(id))?;
        let previous_level = character.total_level();

        let entry = character
            .class_entry_mut(&slug)
            .ok_or_else(|| EngineError::ClassNotHeld(slug.clone()))?;
        entry.level += 1;
        let class_level = entry.level;
        character.level_log.push(slug.clone());

        let mut gained = grant_class_features(character, &class, class_level);
        gained.extend(grant_subclass_features(character, &class, class_level));

        let new_level = character.total_level();
        debug!(
            target: "quintain_engine::service",
            "character {id} leveled {slug} to {class_level} (total {new_level})"
        );

        Ok(LevelUpOutcome {
            previous_level,
            new_level,
            class_slug: slug,
            class_level,
            features_gained: gained,
        })
    }

    /// Adopt a new class at level 1.
    ///
    /// Prerequisite failures are expected outcomes; `force` bypasses them.
    pub fn add_class(&mut self, id: u64, class_slug: &str, force: bool) -> Result<(), EngineError> {
        let character = self
            .characters
            .get(&id)
            .ok_or(EngineError::CharacterNotFound(id))?;

        if character.total_level() >= MAX_LEVEL {
            return Err(EngineError::MaxLevelReached(MAX_LEVEL));
        }
        if character.class_entry(class_slug).is_some() {
            return Err(EngineError::DuplicateClass(class_slug.to_string()));
        }
        let class = self
            .rules
            .class(class_slug)
            .ok_or_else(|| EngineError::UnknownClass(class_slug.to_string()))?
            .clone();

        if !force && !class.multiclass_prereq.is_met(&character.abilities) {
            return Err(EngineError::PrerequisiteNotMet {
                class_slug: class_slug.to_string(),
                requirement: class.multiclass_prereq.describe(),
            });
        }

        let pending = self.registry.pending_choices(character, &self.rules);
        let blocking = pending
            .iter()
            .filter(|choice| choice.blocks_completion())
            .count();
        if blocking > 0 {
            return Err(EngineError::IncompleteCharacter(blocking));
        }

        let character = self
            .characters
            .get_mut(&id)
            .ok_or(EngineError::CharacterNotFound(id))?;
        character.classes.push(ClassEntry {
            class_slug: class.slug.clone(),
            level: 1,
            subclass: None,
            primary: false,
        });
        character.level_log.push(class.slug.clone());
        grant_class_features(character, &class, 1);

        debug!(
            target: "quintain_engine::service",
            "character {id} adopted class {class_slug}"
        );
        Ok(())
    }

    /// All choices derivable from current state, resolved groups included.
    pub fn pending_choices(&self, id: u64) -> Result<Vec<PendingChoice>, EngineError> {
        let character = self
            .characters
            .get(&id)
            .ok_or(EngineError::CharacterNotFound(id))?;
        Ok(self.registry.pending_choices(character, &self.rules))
    }

    pub fn resolve_choice(
        &mut self,
        id: u64,
        choice_id: &str,
        input: &ResolutionInput,
    ) -> Result<(), EngineError> {
        let key = ChoiceKey::parse(choice_id)?;
        let handler = self
            .registry
            .for_type(key.choice_type)
            .ok_or_else(|| EngineError::UnknownChoice(choice_id.to_string()))?;

        let character = self
            .characters
            .get_mut(&id)
            .ok_or(EngineError::CharacterNotFound(id))?;
        let choice = self
            .registry
            .pending_choices(character, &self.rules)
            .into_iter()
            .find(|choice| choice.id == choice_id)
            .ok_or_else(|| EngineError::UnknownChoice(choice_id.to_string()))?;

        let result = handler.resolve(character, &self.rules, &choice, input, &mut self.rng);
        match &result {
            Ok(()) => {
                debug!(target: "quintain_engine::service", "resolved {choice_id} for {id}");
            }
            Err(err) => {
                warn!(
                    target: "quintain_engine::service",
                    "choice resolution failed for {id}: {choice_id}: {err}"
                );
            }
        }
        result
    }

    pub fn undo_choice(&mut self, id: u64, choice_id: &str) -> Result<(), EngineError> {
        let key = ChoiceKey::parse(choice_id)?;
        let handler = self
            .registry
            .for_type(key.choice_type)
            .ok_or_else(|| EngineError::UnknownChoice(choice_id.to_string()))?;

        let character = self
            .characters
            .get_mut(&id)
            .ok_or(EngineError::CharacterNotFound(id))?;
        let choice = self
            .registry
            .pending_choices(character, &self.rules)
            .into_iter()
            .find(|choice| choice.id == choice_id)
            .ok_or_else(|| EngineError::UnknownChoice(choice_id.to_string()))?;

        if !handler.can_undo(character, &choice) {
            return Err(EngineError::not_undoable(
                choice_id,
                "no longer reversible at the character's current level",
            ));
        }
        handler.undo(character, &self.rules, &choice)
    }

    /// Features currently held, labeled by origin (`class:slug`, `feat`, ...).
    pub fn features(&self, id: u64) -> Result<Vec<FeatureRef>, EngineError> {
        let character = self
            .characters
            .get(&id)
            .ok_or(EngineError::CharacterNotFound(id))?;
        Ok(character
            .features
            .iter()
            .map(|feature| FeatureRef {
                slug: feature.slug.clone(),
                source: feature.source_label(),
            })
            .collect())
    }

    /// Resolve a remote option set named by a choice's `options` endpoint.
    pub fn fetch_options(
        &self,
        id: u64,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<Vec<ChoiceOption>, EngineError> {
        let character = self
            .characters
            .get(&id)
            .ok_or(EngineError::CharacterNotFound(id))?;

        let param = |name: &str| {
            params
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };

        match endpoint {
            "available-spells" => {
                let class_slug = param("class")
                    .ok_or_else(|| EngineError::BadEndpoint(format!("{endpoint}: missing class")))?;
                let min_level: u8 = param("min_level").unwrap_or("0").parse().unwrap_or(0);
                let max_level: u8 = param("max_level").unwrap_or("9").parse().unwrap_or(9);

                Ok(self
                    .rules
                    .spells_for_class(class_slug, min_level, max_level)
                    .into_iter()
                    .filter(|spell| {
                        !character.spells.iter().any(|entry| {
                            entry.spell_slug == spell.slug && entry.class_slug == class_slug
                        })
                    })
                    .map(|spell| ChoiceOption::slug(spell.slug.clone(), spell.name.clone()))
                    .collect())
            }
            "available-feats" => Ok(self
                .rules
                .feats
                .iter()
                .filter(|feat| !character.has_feature(&feat.slug))
                .map(|feat| ChoiceOption::slug(feat.slug.clone(), feat.name.clone()))
                .collect()),
            other => Err(EngineError::BadEndpoint(other.to_string())),
        }
    }
}

/// Grant a class's automatic features for one class level, at most once.
fn grant_class_features(
    character: &mut Character,
    class: &ClassDef,
    class_level: u8,
) -> Vec<FeatureGained> {
    let mut gained = Vec::new();
    for feature in class.features_at(class_level) {
        let already = character.features.iter().any(|held| {
            held.slug == feature.slug
                && held.source == ChoiceSource::Class
                && held.source_slug == class.slug
        });
        if already {
            continue;
        }
        character.features.push(FeatureEntry {
            slug: feature.slug.clone(),
            name: feature.name.clone(),
            source: ChoiceSource::Class,
            source_slug: class.slug.clone(),
            level_acquired: class_level,
            choice_id: None,
        });
        gained.push(FeatureGained {
            slug: feature.slug.clone(),
            name: feature.name.clone(),
        });
    }
    gained
}

/// Grant subclass features unlocked by a new class level, when a subclass is
/// already chosen. Tagged with the subclass choice id so a subclass switch
/// still replaces them.
fn grant_subclass_features(
    character: &mut Character,
    class: &ClassDef,
    class_level: u8,
) -> Vec<FeatureGained> {
    let Some(subclass_slug) = character
        .class_entry(&class.slug)
        .and_then(|entry| entry.subclass.clone())
    else {
        return Vec::new();
    };
    let Some(subclass) = class.subclass(&subclass_slug) else {
        return Vec::new();
    };

    let choice_id = ChoiceKey::new(
        crate::choice::ChoiceType::Subclass,
        ChoiceSource::Class,
        class.slug.clone(),
        class.subclass_level,
        "subclass",
    )
    .id();

    let mut gained = Vec::new();
    for feature in &subclass.features {
        if feature.level != class_level || feature.optional {
            continue;
        }
        if character.has_feature(&feature.slug) {
            continue;
        }
        character.features.push(FeatureEntry {
            slug: feature.slug.clone(),
            name: feature.name.clone(),
            source: ChoiceSource::Subclass,
            source_slug: subclass.slug.clone(),
            level_acquired: feature.level,
            choice_id: Some(choice_id.clone()),
        });
        gained.push(FeatureGained {
            slug: feature.slug.clone(),
            name: feature.name.clone(),
        });
    }
    gained
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Hand-built characters for handler unit tests.

    use crate::character::{AbilityScores, Character, ClassEntry};
    use crate::data::Ruleset;

    fn base_character(class_slug: &str, level: u8, abilities: AbilityScores) -> Character {
        Character {
            id: 1,
            public_id: "swift-raven-0001".to_string(),
            name: "Testling".to_string(),
            race_slug: "hill-dwarf".to_string(),
            background_slug: "soldier".to_string(),
            classes: vec![ClassEntry {
                class_slug: class_slug.to_string(),
                level,
                subclass: None,
                primary: true,
            }],
            abilities,
            max_hit_points: 12,
            current_hit_points: 12,
            level_log: (0..level).map(|_| class_slug.to_string()).collect(),
            hp_levels_resolved: vec![1],
            hp_rolls: Vec::new(),
            equipment: Vec::new(),
            spells: Vec::new(),
            skill_proficiencies: Vec::new(),
            expertise: Vec::new(),
            languages: Vec::new(),
            features: Vec::new(),
            ability_resolutions: Vec::new(),
            equipment_mode: None,
        }
    }

    pub(crate) fn fighter_with_level(level: u8) -> (Ruleset, Character) {
        let abilities = AbilityScores {
            strength: 15,
            dexterity: 13,
            constitution: 14,
            intelligence: 12,
            wisdom: 10,
            charisma: 8,
        };
        (Ruleset::builtin(), base_character("fighter", level, abilities))
    }

    pub(crate) fn rogue_with_level(level: u8) -> (Ruleset, Character) {
        let abilities = AbilityScores {
            strength: 8,
            dexterity: 15,
            constitution: 13,
            intelligence: 12,
            wisdom: 10,
            charisma: 14,
        };
        (Ruleset::builtin(), base_character("rogue", level, abilities))
    }

    pub(crate) fn wizard_with_level(level: u8) -> (Ruleset, Character) {
        let abilities = AbilityScores {
            strength: 8,
            dexterity: 13,
            constitution: 14,
            intelligence: 15,
            wisdom: 12,
            charisma: 10,
        };
        (Ruleset::builtin(), base_character("wizard", level, abilities))
    }

    pub(crate) fn half_elf_wizard(level: u8) -> (Ruleset, Character) {
        let (rules, mut character) = wizard_with_level(level);
        character.race_slug = "half-elf".to_string();
        (rules, character)
    }
}

#[cfg(test)]
mod tests {
    use crate::character::AbilityScores;

    use super::*;

    fn new_service() -> CharacterService {
        CharacterService::new(Ruleset::builtin(), 42)
    }

    fn fighter_request() -> NewCharacter {
        NewCharacter {
            name: "Torin".to_string(),
            public_id: "brave-wolf-ab12".to_string(),
            race_slug: "hill-dwarf".to_string(),
            background_slug: "soldier".to_string(),
            class_slug: "fighter".to_string(),
            abilities: AbilityScores {
                strength: 15,
                dexterity: 13,
                constitution: 14,
                intelligence: 12,
                wisdom: 10,
                charisma: 8,
            },
        }
    }

    #[test]
    fn created_character_has_automatic_level_one_hp() {
        let mut service = new_service();
        let id = service.create_character(fighter_request()).unwrap();
        let summary = service.get_character(id).unwrap();
        // d10 max + CON modifier; hill dwarf bumps CON 14 -> 16 (+3).
        assert_eq!(summary.max_hit_points, 13);
        assert_eq!(summary.total_level, 1);
        assert!(!summary.is_complete);
    }

    #[test]
    fn level_up_requires_a_complete_character() {
        let mut service = new_service();
        let id = service.create_character(fighter_request()).unwrap();
        let err = service.level_up_class(id, None).unwrap_err();
        assert!(matches!(err, EngineError::IncompleteCharacter(_)));
    }

    #[test]
    fn add_class_enforces_prerequisites_unless_forced() {
        let mut service = new_service();
        let mut request = fighter_request();
        // INT 8: wizard prereq (INT 13) fails.
        request.abilities.intelligence = 8;
        let id = service.create_character(request).unwrap();

        // Resolve nothing; prereq check happens before completeness.
        let err = service.add_class(id, "wizard", false).unwrap_err();
        assert!(matches!(err, EngineError::PrerequisiteNotMet { .. }));
        assert!(err.is_expected());
    }

    #[test]
    fn fetch_options_rejects_unknown_endpoints() {
        let mut service = new_service();
        let id = service.create_character(fighter_request()).unwrap();
        let err = service.fetch_options(id, "available-unicorns", &[]).unwrap_err();
        assert!(matches!(err, EngineError::BadEndpoint(_)));
    }

    #[test]
    fn fetch_spells_excludes_known() {
        let mut service = new_service();
        let mut request = fighter_request();
        request.class_slug = "wizard".to_string();
        request.abilities.intelligence = 15;
        let id = service.create_character(request).unwrap();

        let params = vec![
            ("class".to_string(), "wizard".to_string()),
            ("min_level".to_string(), "0".to_string()),
            ("max_level".to_string(), "0".to_string()),
        ];
        let before = service.fetch_options(id, "available-spells", &params).unwrap();

        let choice_id = "spell:class:wizard:1:cantrips";
        service
            .resolve_choice(
                id,
                choice_id,
                &ResolutionInput::select(["fire-bolt", "mage-hand", "light"]),
            )
            .unwrap();

        let after = service.fetch_options(id, "available-spells", &params).unwrap();
        assert_eq!(after.len(), before.len() - 3);
        assert!(after.iter().all(|option| option.slug.as_deref() != Some("fire-bolt")));
    }

    #[test]
    fn unknown_choice_ids_are_rejected() {
        let mut service = new_service();
        let id = service.create_character(fighter_request()).unwrap();
        let err = service
            .resolve_choice(id, "spell:class:wizard:1:cantrips", &ResolutionInput::one("fire-bolt"))
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownChoice(_)));

        let err = service
            .resolve_choice(id, "gibberish", &ResolutionInput::one("x"))
            .unwrap_err();
        assert!(matches!(err, EngineError::BadChoiceId(_)));
    }
}
