//! Quintain Engine
//!
//! Platform-agnostic character-progression logic for D&D 5e-style characters:
//! the pending-choice contract, per-type resolution handlers with
//! replace-not-duplicate semantics, and the character service the automated
//! level-up harness drives. No UI, transport, or persistence dependencies.

pub mod character;
pub mod choice;
pub mod data;
pub mod error;
pub mod handlers;
pub mod service;

// Re-export commonly used types
pub use character::{
    Ability, AbilityResolution, AbilityScores, Character, ClassEntry, EquipmentEntry,
    EquipmentMode, FeatureEntry, Grant, HpRoll, ItemProvenance, SpellEntry, ABILITY_SCORE_CAP,
    GOLD_ITEM_SLUG, MAX_LEVEL,
};
pub use choice::{
    AbilityScoreState, ChoiceIdError, ChoiceKey, ChoiceMetadata, ChoiceOption, ChoiceOptions,
    ChoiceSource, ChoiceType, ItemGrant, PendingChoice, StartingWealth,
};
pub use data::{
    AbilityChoiceDef, BackgroundDef, ClassDef, EquipmentGroupDef, EquipmentOptionDef, FeatDef,
    FeatureChoiceDef, FeatureDef, FeatureOptionDef, LanguageDef, MulticlassPrereq, RaceDef,
    Ruleset, SkillChoiceDef, SkillDef, SpellcastingDef, SpellDef, SpellProgressionRow, SubclassDef,
};
pub use error::EngineError;
pub use handlers::{AsiSelection, ChoiceHandler, HandlerRegistry, ResolutionInput};
pub use service::{
    CharacterService, CharacterSummary, ClassSummary, FeatureGained, FeatureRef, LevelUpOutcome,
    NewCharacter,
};
