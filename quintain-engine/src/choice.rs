//! The pending-choice data contract.
//!
//! A [`PendingChoice`] describes one unresolved decision a character must make
//! (pick a subclass, choose spells, roll hit points, ...). Choices are never
//! persisted; they are recomputed from character state after every resolution.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every kind of decision the engine knows how to offer and resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceType {
    Proficiency,
    Language,
    Equipment,
    EquipmentMode,
    Spell,
    AsiOrFeat,
    Subclass,
    OptionalFeature,
    Expertise,
    FightingStyle,
    Feat,
    HitPoints,
    AbilityScore,
}

impl ChoiceType {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            ChoiceType::Proficiency => "proficiency",
            ChoiceType::Language => "language",
            ChoiceType::Equipment => "equipment",
            ChoiceType::EquipmentMode => "equipment_mode",
            ChoiceType::Spell => "spell",
            ChoiceType::AsiOrFeat => "asi_or_feat",
            ChoiceType::Subclass => "subclass",
            ChoiceType::OptionalFeature => "optional_feature",
            ChoiceType::Expertise => "expertise",
            ChoiceType::FightingStyle => "fighting_style",
            ChoiceType::Feat => "feat",
            ChoiceType::HitPoints => "hit_points",
            ChoiceType::AbilityScore => "ability_score",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "proficiency" => Some(ChoiceType::Proficiency),
            "language" => Some(ChoiceType::Language),
            "equipment" => Some(ChoiceType::Equipment),
            "equipment_mode" => Some(ChoiceType::EquipmentMode),
            "spell" => Some(ChoiceType::Spell),
            "asi_or_feat" => Some(ChoiceType::AsiOrFeat),
            "subclass" => Some(ChoiceType::Subclass),
            "optional_feature" => Some(ChoiceType::OptionalFeature),
            "expertise" => Some(ChoiceType::Expertise),
            "fighting_style" => Some(ChoiceType::FightingStyle),
            "feat" => Some(ChoiceType::Feat),
            "hit_points" => Some(ChoiceType::HitPoints),
            "ability_score" => Some(ChoiceType::AbilityScore),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChoiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Origin of a choice grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceSource {
    Class,
    Subclass,
    Race,
    Background,
    Feat,
    #[serde(rename = "levelup")]
    LevelUp,
}

impl ChoiceSource {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            ChoiceSource::Class => "class",
            ChoiceSource::Subclass => "subclass",
            ChoiceSource::Race => "race",
            ChoiceSource::Background => "background",
            ChoiceSource::Feat => "feat",
            ChoiceSource::LevelUp => "levelup",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "class" => Some(ChoiceSource::Class),
            "subclass" => Some(ChoiceSource::Subclass),
            "race" => Some(ChoiceSource::Race),
            "background" => Some(ChoiceSource::Background),
            "feat" => Some(ChoiceSource::Feat),
            "levelup" => Some(ChoiceSource::LevelUp),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChoiceIdError {
    #[error("malformed choice id: {0}")]
    Malformed(String),
    #[error("unknown choice type in id: {0}")]
    UnknownType(String),
    #[error("unknown choice source in id: {0}")]
    UnknownSource(String),
    #[error("bad level segment in id: {0}")]
    BadLevel(String),
}

/// Deterministic identity of a choice: `{type}:{source}:{source_slug}:{level}:{group}`.
///
/// The id doubles as the idempotency key for replace semantics: resolving the
/// same key twice replaces the first resolution instead of stacking a second.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChoiceKey {
    pub choice_type: ChoiceType,
    pub source: ChoiceSource,
    pub source_slug: String,
    pub level: u8,
    pub group: String,
}

impl ChoiceKey {
    #[must_use]
    pub fn new(
        choice_type: ChoiceType,
        source: ChoiceSource,
        source_slug: impl Into<String>,
        level: u8,
        group: impl Into<String>,
    ) -> Self {
        Self {
            choice_type,
            source,
            source_slug: source_slug.into(),
            level,
            group: group.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.choice_type.key(),
            self.source.key(),
            self.source_slug,
            self.level,
            self.group
        )
    }

    /// Parse an id back into its components.
    ///
    /// The source slug may itself contain `:` (compendium-prefixed slugs), so
    /// the id is split from both ends: two leading segments, two trailing
    /// segments, and whatever remains in the middle is the slug.
    pub fn parse(id: &str) -> Result<Self, ChoiceIdError> {
        let segments: Vec<&str> = id.split(':').collect();
        if segments.len() < 5 {
            return Err(ChoiceIdError::Malformed(id.to_string()));
        }

        let choice_type = ChoiceType::parse(segments[0])
            .ok_or_else(|| ChoiceIdError::UnknownType(segments[0].to_string()))?;
        let source = ChoiceSource::parse(segments[1])
            .ok_or_else(|| ChoiceIdError::UnknownSource(segments[1].to_string()))?;

        let level_segment = segments[segments.len() - 2];
        let level: u8 = level_segment
            .parse()
            .map_err(|_| ChoiceIdError::BadLevel(level_segment.to_string()))?;
        let group = segments[segments.len() - 1].to_string();
        let source_slug = segments[2..segments.len() - 2].join(":");

        Ok(Self {
            choice_type,
            source,
            source_slug,
            level,
            group,
        })
    }
}

impl std::fmt::Display for ChoiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id())
    }
}

/// One item granted by an equipment option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemGrant {
    pub item_slug: String,
    pub quantity: i64,
}

/// A single selectable option inside a choice.
///
/// Different choice kinds key their options differently (spells by `slug`,
/// equipment bundles by `value`, hit-point methods by `id`), so all three are
/// optional and [`ChoiceOption::pick_key`] applies the slug/value/id priority.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemGrant>,
}

impl ChoiceOption {
    #[must_use]
    pub fn slug(slug: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            slug: Some(slug.into()),
            label: label.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn value(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            label: label.into(),
            ..Self::default()
        }
    }

    /// Identifier used when submitting this option, by slug/value/id priority.
    #[must_use]
    pub fn pick_key(&self) -> Option<&str> {
        self.slug
            .as_deref()
            .or(self.value.as_deref())
            .or(self.id.as_deref())
    }
}

/// Where a choice's options come from: inline with the choice, or fetched
/// from a collaborator endpoint before selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceOptions {
    Inline(Vec<ChoiceOption>),
    Remote {
        endpoint: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        params: Vec<(String, String)>,
    },
}

impl ChoiceOptions {
    #[must_use]
    pub fn remote(endpoint: impl Into<String>) -> Self {
        ChoiceOptions::Remote {
            endpoint: endpoint.into(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn inline(&self) -> Option<&[ChoiceOption]> {
        match self {
            ChoiceOptions::Inline(options) => Some(options),
            ChoiceOptions::Remote { .. } => None,
        }
    }
}

/// Current value of one ability score, carried in ASI choice metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScoreState {
    pub code: String,
    pub current_value: i32,
}

/// Starting wealth roll for a class (`dice_count`d`die` x `multiplier` gp).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartingWealth {
    pub dice_count: u32,
    pub die: u32,
    pub multiplier: u32,
}

impl StartingWealth {
    /// Average result of the wealth roll, rounded to whole gold.
    #[must_use]
    pub fn average(&self) -> i64 {
        let per_die = f64::from(self.die + 1) / 2.0;
        (f64::from(self.dice_count) * per_die * f64::from(self.multiplier)).round() as i64
    }

    #[must_use]
    pub fn formula(&self) -> String {
        if self.multiplier > 1 {
            format!("{}d{} x {}", self.dice_count, self.die, self.multiplier)
        } else {
            format!("{}d{}", self.dice_count, self.die)
        }
    }
}

/// Type-specific auxiliary data attached to a choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spell_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_die: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub con_modifier: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_wealth: Option<StartingWealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gold_amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ability_scores: Vec<AbilityScoreState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asi_points: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choice_group: Option<String>,
}

/// One unresolved decision, computed on demand from character state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChoice {
    pub id: String,
    #[serde(rename = "type")]
    pub choice_type: ChoiceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub source: ChoiceSource,
    pub source_name: String,
    pub level_granted: u8,
    pub required: bool,
    pub quantity: u32,
    pub remaining: u32,
    pub selected: Vec<String>,
    pub options: ChoiceOptions,
    #[serde(default)]
    pub metadata: ChoiceMetadata,
}

impl PendingChoice {
    /// A choice is complete once nothing remains to be selected.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    #[must_use]
    pub fn blocks_completion(&self) -> bool {
        self.required && self.remaining > 0
    }

    pub fn key(&self) -> Result<ChoiceKey, ChoiceIdError> {
        ChoiceKey::parse(&self.id)
    }
}
