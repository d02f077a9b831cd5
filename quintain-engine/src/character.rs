//! Character state.
//!
//! Everything a resolution can grant is tagged with the choice id that granted
//! it, so re-resolving the same choice group can strip exactly the prior
//! grant before applying the new one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::choice::ChoiceSource;

pub const MAX_LEVEL: u8 = 20;
pub const ABILITY_SCORE_CAP: i32 = 20;

/// Slug used for currency rows in the inventory.
pub const GOLD_ITEM_SLUG: &str = "gold-gp";

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Ability {
    Str,
    Dex,
    Con,
    Int,
    Wis,
    Cha,
}

impl Ability {
    pub const ALL: [Ability; 6] = [
        Ability::Str,
        Ability::Dex,
        Ability::Con,
        Ability::Int,
        Ability::Wis,
        Ability::Cha,
    ];

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Ability::Str => "STR",
            Ability::Dex => "DEX",
            Ability::Con => "CON",
            Ability::Int => "INT",
            Ability::Wis => "WIS",
            Ability::Cha => "CHA",
        }
    }

    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "STR" => Some(Ability::Str),
            "DEX" => Some(Ability::Dex),
            "CON" => Some(Ability::Con),
            "INT" => Some(Ability::Int),
            "WIS" => Some(Ability::Wis),
            "CHA" => Some(Ability::Cha),
            _ => None,
        }
    }
}

impl std::fmt::Display for Ability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// The six scores of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self {
            strength: 10,
            dexterity: 10,
            constitution: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
        }
    }
}

impl AbilityScores {
    #[must_use]
    pub const fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Str => self.strength,
            Ability::Dex => self.dexterity,
            Ability::Con => self.constitution,
            Ability::Int => self.intelligence,
            Ability::Wis => self.wisdom,
            Ability::Cha => self.charisma,
        }
    }

    pub fn set(&mut self, ability: Ability, value: i32) {
        match ability {
            Ability::Str => self.strength = value,
            Ability::Dex => self.dexterity = value,
            Ability::Con => self.constitution = value,
            Ability::Int => self.intelligence = value,
            Ability::Wis => self.wisdom = value,
            Ability::Cha => self.charisma = value,
        }
    }

    pub fn adjust(&mut self, ability: Ability, delta: i32) {
        self.set(ability, self.get(ability) + delta);
    }

    /// Standard 5e modifier: floor((score - 10) / 2).
    #[must_use]
    pub const fn modifier(&self, ability: Ability) -> i32 {
        (self.get(ability) - 10).div_euclid(2)
    }

    #[must_use]
    pub fn as_map(&self) -> BTreeMap<String, i32> {
        Ability::ALL
            .iter()
            .map(|a| (a.code().to_string(), self.get(*a)))
            .collect()
    }
}

/// One class held by the character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub class_slug: String,
    pub level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subclass: Option<String>,
    pub primary: bool,
}

/// Equipment and gold mode gate: standard bundle vs starting gold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentMode {
    Equipment,
    Gold,
}

impl EquipmentMode {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            EquipmentMode::Equipment => "equipment",
            EquipmentMode::Gold => "gold",
        }
    }
}

/// Provenance of an inventory row. Currency rows distinguish starting-wealth
/// gold from background gold so a mode switch removes only the former.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ItemProvenance {
    Choice { choice_id: String, option: String },
    StartingWealth,
    Background,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentEntry {
    pub item_slug: String,
    pub quantity: i64,
    pub provenance: ItemProvenance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellEntry {
    pub spell_slug: String,
    pub choice_id: String,
    pub class_slug: String,
    pub level_acquired: u8,
}

/// A slug-shaped grant (proficiency, language, expertise) and the choice that
/// produced it. Fixed grants from class/race/background carry no choice id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choice_id: Option<String>,
}

impl Grant {
    #[must_use]
    pub fn fixed(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            choice_id: None,
        }
    }

    #[must_use]
    pub fn chosen(slug: impl Into<String>, choice_id: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            choice_id: Some(choice_id.into()),
        }
    }
}

/// A feature held by the character (class/subclass features, feats, racial
/// traits, chosen optional features).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureEntry {
    pub slug: String,
    pub name: String,
    pub source: ChoiceSource,
    pub source_slug: String,
    pub level_acquired: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choice_id: Option<String>,
}

impl FeatureEntry {
    /// Wire label used by the features listing, e.g. `class:fighter` or `feat`.
    #[must_use]
    pub fn source_label(&self) -> String {
        match self.source {
            ChoiceSource::Feat => "feat".to_string(),
            source => format!("{}:{}", source.key(), self.source_slug),
        }
    }
}

/// Recorded outcome of one hit-point choice, kept so the choice can be undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HpRoll {
    pub level: u8,
    pub gained: i32,
    pub choice_id: String,
}

/// Recorded outcome of an ASI-or-feat or racial ability choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityResolution {
    pub choice_id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub increases: BTreeMap<String, i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feat_slug: Option<String>,
}

/// A playable character and everything resolutions have granted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: u64,
    pub public_id: String,
    pub name: String,
    pub race_slug: String,
    pub background_slug: String,
    pub classes: Vec<ClassEntry>,
    pub abilities: AbilityScores,
    pub max_hit_points: i32,
    pub current_hit_points: i32,
    /// Class slug that granted each character level; index 0 is level 1.
    pub level_log: Vec<String>,
    pub hp_levels_resolved: Vec<u8>,
    pub hp_rolls: Vec<HpRoll>,
    pub equipment: Vec<EquipmentEntry>,
    pub spells: Vec<SpellEntry>,
    pub skill_proficiencies: Vec<Grant>,
    pub expertise: Vec<Grant>,
    pub languages: Vec<Grant>,
    pub features: Vec<FeatureEntry>,
    pub ability_resolutions: Vec<AbilityResolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment_mode: Option<EquipmentMode>,
}

impl Character {
    #[must_use]
    pub fn total_level(&self) -> u8 {
        self.classes.iter().map(|entry| entry.level).sum()
    }

    #[must_use]
    pub fn primary_class(&self) -> Option<&ClassEntry> {
        self.classes.iter().find(|entry| entry.primary)
    }

    #[must_use]
    pub fn class_entry(&self, slug: &str) -> Option<&ClassEntry> {
        self.classes.iter().find(|entry| entry.class_slug == slug)
    }

    pub fn class_entry_mut(&mut self, slug: &str) -> Option<&mut ClassEntry> {
        self.classes.iter_mut().find(|entry| entry.class_slug == slug)
    }

    #[must_use]
    pub fn class_levels(&self) -> BTreeMap<String, u8> {
        self.classes
            .iter()
            .map(|entry| (entry.class_slug.clone(), entry.level))
            .collect()
    }

    #[must_use]
    pub fn has_feature(&self, slug: &str) -> bool {
        self.features.iter().any(|feature| feature.slug == slug)
    }

    /// Character levels whose hit points have not been resolved yet.
    /// Level 1 never appears; its HP is set automatically at creation.
    #[must_use]
    pub fn pending_hp_levels(&self) -> Vec<u8> {
        (2..=self.total_level())
            .filter(|level| !self.hp_levels_resolved.contains(level))
            .collect()
    }

    /// Class slug that granted the given character level, from the level log.
    #[must_use]
    pub fn class_for_level(&self, level: u8) -> Option<&str> {
        self.level_log
            .get(usize::from(level).saturating_sub(1))
            .map(String::as_str)
    }

    /// Total gold across all currency rows.
    #[must_use]
    pub fn gold_total(&self) -> i64 {
        self.equipment
            .iter()
            .filter(|entry| entry.item_slug == GOLD_ITEM_SLUG)
            .map(|entry| entry.quantity)
            .sum()
    }

    /// Gold attributable to one provenance tag.
    #[must_use]
    pub fn gold_from(&self, provenance: &ItemProvenance) -> i64 {
        self.equipment
            .iter()
            .filter(|entry| entry.item_slug == GOLD_ITEM_SLUG && entry.provenance == *provenance)
            .map(|entry| entry.quantity)
            .sum()
    }

    /// Remove every inventory row granted by the given choice id.
    pub fn remove_equipment_from_choice(&mut self, choice_id: &str) {
        self.equipment.retain(|entry| {
            !matches!(&entry.provenance, ItemProvenance::Choice { choice_id: id, .. } if id == choice_id)
        });
    }

    /// Remove every spell granted by the given choice id.
    pub fn remove_spells_from_choice(&mut self, choice_id: &str) {
        self.spells.retain(|entry| entry.choice_id != choice_id);
    }

    /// Remove every feature granted by the given choice id.
    pub fn remove_features_from_choice(&mut self, choice_id: &str) {
        self.features
            .retain(|feature| feature.choice_id.as_deref() != Some(choice_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fighter_at(level: u8) -> Character {
        Character {
            id: 1,
            public_id: "brave-wolf-0001".to_string(),
            name: "Torin".to_string(),
            race_slug: "hill-dwarf".to_string(),
            background_slug: "soldier".to_string(),
            classes: vec![ClassEntry {
                class_slug: "fighter".to_string(),
                level,
                subclass: None,
                primary: true,
            }],
            abilities: AbilityScores::default(),
            max_hit_points: 12,
            current_hit_points: 12,
            level_log: (0..level).map(|_| "fighter".to_string()).collect(),
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

    #[test]
    fn ability_modifier_follows_5e_table() {
        let mut scores = AbilityScores::default();
        scores.set(Ability::Str, 8);
        assert_eq!(scores.modifier(Ability::Str), -1);
        scores.set(Ability::Str, 10);
        assert_eq!(scores.modifier(Ability::Str), 0);
        scores.set(Ability::Str, 15);
        assert_eq!(scores.modifier(Ability::Str), 2);
        scores.set(Ability::Str, 20);
        assert_eq!(scores.modifier(Ability::Str), 5);
    }

    #[test]
    fn total_level_sums_all_classes() {
        let mut character = fighter_at(3);
        character.classes.push(ClassEntry {
            class_slug: "rogue".to_string(),
            level: 2,
            subclass: None,
            primary: false,
        });
        assert_eq!(character.total_level(), 5);
    }

    #[test]
    fn pending_hp_levels_skip_level_one_and_resolved() {
        let mut character = fighter_at(4);
        character.hp_levels_resolved = vec![1, 2];
        assert_eq!(character.pending_hp_levels(), vec![3, 4]);
    }

    #[test]
    fn gold_provenance_is_tracked_separately() {
        let mut character = fighter_at(1);
        character.equipment.push(EquipmentEntry {
            item_slug: GOLD_ITEM_SLUG.to_string(),
            quantity: 10,
            provenance: ItemProvenance::Background,
        });
        character.equipment.push(EquipmentEntry {
            item_slug: GOLD_ITEM_SLUG.to_string(),
            quantity: 125,
            provenance: ItemProvenance::StartingWealth,
        });
        assert_eq!(character.gold_total(), 135);
        assert_eq!(character.gold_from(&ItemProvenance::Background), 10);
        assert_eq!(character.gold_from(&ItemProvenance::StartingWealth), 125);
    }

    #[test]
    fn removing_choice_equipment_keeps_other_rows() {
        let mut character = fighter_at(1);
        character.equipment.push(EquipmentEntry {
            item_slug: "longsword".to_string(),
            quantity: 1,
            provenance: ItemProvenance::Choice {
                choice_id: "equipment:class:fighter:1:group-1".to_string(),
                option: "a".to_string(),
            },
        });
        character.equipment.push(EquipmentEntry {
            item_slug: "rations".to_string(),
            quantity: 5,
            provenance: ItemProvenance::Fixed,
        });
        character.remove_equipment_from_choice("equipment:class:fighter:1:group-1");
        assert_eq!(character.equipment.len(), 1);
        assert_eq!(character.equipment[0].item_slug, "rations");
    }

    #[test]
    fn class_for_level_reads_the_level_log() {
        let mut character = fighter_at(2);
        character.classes.push(ClassEntry {
            class_slug: "rogue".to_string(),
            level: 1,
            subclass: None,
            primary: false,
        });
        character.level_log.push("rogue".to_string());
        assert_eq!(character.class_for_level(1), Some("fighter"));
        assert_eq!(character.class_for_level(3), Some("rogue"));
        assert_eq!(character.class_for_level(9), None);
    }
}
