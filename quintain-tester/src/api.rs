//! The character-management surface the harness drives.
//!
//! The orchestrator only depends on this trait, never on how the collaborator
//! is implemented; the in-process engine service satisfies it directly, and a
//! remote transport could satisfy it just as well.

use quintain_engine::{
    CharacterService, CharacterSummary, ChoiceOption, EngineError, FeatureRef, LevelUpOutcome,
    PendingChoice, ResolutionInput,
};

/// Class metadata needed for enumeration and multiclass attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    pub slug: String,
    pub name: String,
    pub subclass_level: u8,
    pub playable: bool,
    pub subclasses: Vec<SubclassInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubclassInfo {
    pub slug: String,
    pub name: String,
}

pub trait CharacterApi {
    fn get_character(&self, id: u64) -> Result<CharacterSummary, EngineError>;

    fn level_up_class(&mut self, id: u64, class_slug: &str) -> Result<LevelUpOutcome, EngineError>;

    fn add_class(&mut self, id: u64, class_slug: &str, force: bool) -> Result<(), EngineError>;

    fn pending_choices(&self, id: u64) -> Result<Vec<PendingChoice>, EngineError>;

    fn resolve_choice(
        &mut self,
        id: u64,
        choice_id: &str,
        input: &ResolutionInput,
    ) -> Result<(), EngineError>;

    fn features(&self, id: u64) -> Result<Vec<FeatureRef>, EngineError>;

    fn fetch_options(
        &self,
        id: u64,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<Vec<ChoiceOption>, EngineError>;

    fn list_classes(&self) -> Vec<ClassInfo>;
}

impl CharacterApi for CharacterService {
    fn get_character(&self, id: u64) -> Result<CharacterSummary, EngineError> {
        CharacterService::get_character(self, id)
    }

    fn level_up_class(&mut self, id: u64, class_slug: &str) -> Result<LevelUpOutcome, EngineError> {
        CharacterService::level_up_class(self, id, Some(class_slug))
    }

    fn add_class(&mut self, id: u64, class_slug: &str, force: bool) -> Result<(), EngineError> {
        CharacterService::add_class(self, id, class_slug, force)
    }

    fn pending_choices(&self, id: u64) -> Result<Vec<PendingChoice>, EngineError> {
        CharacterService::pending_choices(self, id)
    }

    fn resolve_choice(
        &mut self,
        id: u64,
        choice_id: &str,
        input: &ResolutionInput,
    ) -> Result<(), EngineError> {
        CharacterService::resolve_choice(self, id, choice_id, input)
    }

    fn features(&self, id: u64) -> Result<Vec<FeatureRef>, EngineError> {
        CharacterService::features(self, id)
    }

    fn fetch_options(
        &self,
        id: u64,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<Vec<ChoiceOption>, EngineError> {
        CharacterService::fetch_options(self, id, endpoint, params)
    }

    fn list_classes(&self) -> Vec<ClassInfo> {
        self.rules()
            .classes
            .iter()
            .map(|class| ClassInfo {
                slug: class.slug.clone(),
                name: class.name.clone(),
                subclass_level: class.subclass_level,
                playable: class.playable,
                subclasses: class
                    .subclasses
                    .iter()
                    .map(|sub| SubclassInfo {
                        slug: sub.slug.clone(),
                        name: sub.name.clone(),
                    })
                    .collect(),
            })
            .collect()
    }
}
