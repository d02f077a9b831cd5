//! Reference rule data.
//!
//! The engine treats game rules as opaque input: classes, subclasses, spells,
//! feats, skills, and languages are plain data loaded from JSON, with a
//! built-in dataset as fallback so the engine is usable without assets.
//! Rule correctness is not validated here.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::character::Ability;
use crate::choice::{ChoiceType, ItemGrant, StartingWealth};

/// A class feature granted automatically at a class level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDef {
    pub slug: String,
    pub name: String,
    pub level: u8,
    #[serde(default)]
    pub optional: bool,
}

/// One selectable feature inside a feature choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureOptionDef {
    pub slug: String,
    pub name: String,
}

/// A countable feature choice granted at a class level: fighting styles,
/// expertise picks, maneuvers and similar optional features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureChoiceDef {
    pub choice_type: ChoiceType,
    pub level: u8,
    pub choose: u32,
    #[serde(default)]
    pub options: Vec<FeatureOptionDef>,
    /// Expertise-style choices draw their options from the proficiencies the
    /// character already holds instead of a fixed list.
    #[serde(default)]
    pub from_proficiencies: bool,
    pub group: String,
}

/// Cumulative known-spell targets for a class level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellProgressionRow {
    pub level: u8,
    pub cantrips_known: u32,
    pub spells_known: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellcastingDef {
    pub ability: Ability,
    pub progression: Vec<SpellProgressionRow>,
}

impl SpellcastingDef {
    #[must_use]
    pub fn row(&self, level: u8) -> Option<&SpellProgressionRow> {
        self.progression.iter().find(|row| row.level == level)
    }

    /// Highest spell level selectable at a class level (full-caster table).
    #[must_use]
    pub fn max_spell_level(&self, level: u8) -> u8 {
        level.div_ceil(2).min(9)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillChoiceDef {
    pub choose: u32,
    pub from: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentOptionDef {
    pub option: String,
    pub label: String,
    pub items: Vec<ItemGrant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentGroupDef {
    pub group: String,
    pub options: Vec<EquipmentOptionDef>,
}

/// Minimum-score requirement for adopting a class: at least one of the listed
/// (ability, minimum) pairs must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MulticlassPrereq {
    pub any_of: Vec<(Ability, i32)>,
}

impl MulticlassPrereq {
    #[must_use]
    pub fn is_met(&self, scores: &crate::character::AbilityScores) -> bool {
        self.any_of.is_empty()
            || self
                .any_of
                .iter()
                .any(|(ability, min)| scores.get(*ability) >= *min)
    }

    #[must_use]
    pub fn describe(&self) -> String {
        self.any_of
            .iter()
            .map(|(ability, min)| format!("{} {}", ability.code(), min))
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubclassDef {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub features: Vec<FeatureDef>,
    #[serde(default)]
    pub feature_choices: Vec<FeatureChoiceDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    pub slug: String,
    pub name: String,
    pub hit_die: u8,
    /// Class level at which the subclass choice appears.
    pub subclass_level: u8,
    /// Non-player archetypes are excluded from systematic runs.
    #[serde(default = "default_true")]
    pub playable: bool,
    pub asi_levels: Vec<u8>,
    #[serde(default)]
    pub multiclass_prereq: MulticlassPrereq,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spellcasting: Option<SpellcastingDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_choices: Option<SkillChoiceDef>,
    #[serde(default)]
    pub fixed_proficiencies: Vec<String>,
    #[serde(default)]
    pub equipment_groups: Vec<EquipmentGroupDef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_wealth: Option<StartingWealth>,
    #[serde(default)]
    pub features: Vec<FeatureDef>,
    #[serde(default)]
    pub feature_choices: Vec<FeatureChoiceDef>,
    #[serde(default)]
    pub subclasses: Vec<SubclassDef>,
}

impl ClassDef {
    #[must_use]
    pub fn subclass(&self, slug: &str) -> Option<&SubclassDef> {
        self.subclasses.iter().find(|sub| sub.slug == slug)
    }

    #[must_use]
    pub fn is_asi_level(&self, level: u8) -> bool {
        self.asi_levels.contains(&level)
    }

    #[must_use]
    pub fn features_at(&self, level: u8) -> impl Iterator<Item = &FeatureDef> {
        self.features
            .iter()
            .filter(move |feature| feature.level == level && !feature.optional)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityChoiceDef {
    pub choose: u32,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceDef {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub fixed_bonuses: Vec<(Ability, i32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ability_choice: Option<AbilityChoiceDef>,
    #[serde(default)]
    pub skill_choose: u32,
    #[serde(default)]
    pub language_choose: u32,
    #[serde(default)]
    pub fixed_languages: Vec<String>,
    #[serde(default)]
    pub feat_choice: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundDef {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub skill_grants: Vec<String>,
    #[serde(default)]
    pub language_choose: u32,
    #[serde(default)]
    pub gold: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellDef {
    pub slug: String,
    pub name: String,
    pub level: u8,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatDef {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillDef {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageDef {
    pub slug: String,
    pub name: String,
}

/// The complete rule dataset the engine operates over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    pub classes: Vec<ClassDef>,
    pub races: Vec<RaceDef>,
    pub backgrounds: Vec<BackgroundDef>,
    pub spells: Vec<SpellDef>,
    pub feats: Vec<FeatDef>,
    pub skills: Vec<SkillDef>,
    pub languages: Vec<LanguageDef>,
}

impl Ruleset {
    /// Load a ruleset from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid ruleset JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn class(&self, slug: &str) -> Option<&ClassDef> {
        self.classes.iter().find(|class| class.slug == slug)
    }

    #[must_use]
    pub fn race(&self, slug: &str) -> Option<&RaceDef> {
        self.races.iter().find(|race| race.slug == slug)
    }

    #[must_use]
    pub fn background(&self, slug: &str) -> Option<&BackgroundDef> {
        self.backgrounds.iter().find(|bg| bg.slug == slug)
    }

    #[must_use]
    pub fn spell(&self, slug: &str) -> Option<&SpellDef> {
        self.spells.iter().find(|spell| spell.slug == slug)
    }

    #[must_use]
    pub fn feat(&self, slug: &str) -> Option<&FeatDef> {
        self.feats.iter().find(|feat| feat.slug == slug)
    }

    /// Base classes a player may start in or multiclass into.
    #[must_use]
    pub fn playable_classes(&self) -> Vec<&ClassDef> {
        self.classes.iter().filter(|class| class.playable).collect()
    }

    /// Spells on a class list within the given spell-level range, inclusive.
    #[must_use]
    pub fn spells_for_class(&self, class_slug: &str, min_level: u8, max_level: u8) -> Vec<&SpellDef> {
        self.spells
            .iter()
            .filter(|spell| {
                spell.level >= min_level
                    && spell.level <= max_level
                    && spell.classes.iter().any(|slug| slug == class_slug)
            })
            .collect()
    }

    /// The built-in dataset: four playable classes with subclasses, three
    /// races, three backgrounds, and enough spells/feats/skills/languages to
    /// drive full level-1-to-20 runs.
    #[must_use]
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }
}

static BUILTIN: Lazy<Ruleset> = Lazy::new(|| Ruleset {
    classes: builtin_classes(),
    races: builtin_races(),
    backgrounds: builtin_backgrounds(),
    spells: builtin_spells(),
    feats: builtin_feats(),
    skills: builtin_skills(),
    languages: builtin_languages(),
});

const fn default_true() -> bool {
    true
}

fn feature(slug: &str, name: &str, level: u8) -> FeatureDef {
    FeatureDef {
        slug: slug.to_string(),
        name: name.to_string(),
        level,
        optional: false,
    }
}

fn feature_option(slug: &str, name: &str) -> FeatureOptionDef {
    FeatureOptionDef {
        slug: slug.to_string(),
        name: name.to_string(),
    }
}

fn item(slug: &str, quantity: i64) -> ItemGrant {
    ItemGrant {
        item_slug: slug.to_string(),
        quantity,
    }
}

fn equipment_option(option: &str, label: &str, items: Vec<ItemGrant>) -> EquipmentOptionDef {
    EquipmentOptionDef {
        option: option.to_string(),
        label: label.to_string(),
        items,
    }
}

fn full_caster_progression(base_cantrips: u32, spells_at_one: u32, spell_cap: u32) -> Vec<SpellProgressionRow> {
    (1..=20)
        .map(|level| {
            let cantrips_known = match level {
                1..=3 => base_cantrips,
                4..=9 => base_cantrips + 1,
                _ => base_cantrips + 2,
            };
            let spells_known = if spells_at_one == 0 {
                0
            } else {
                (spells_at_one + 2 * (u32::from(level) - 1)).min(spell_cap)
            };
            SpellProgressionRow {
                level,
                cantrips_known,
                spells_known,
            }
        })
        .collect()
}

fn fighting_style_choice(level: u8) -> FeatureChoiceDef {
    FeatureChoiceDef {
        choice_type: ChoiceType::FightingStyle,
        level,
        choose: 1,
        options: vec![
            feature_option("style-archery", "Archery"),
            feature_option("style-defense", "Defense"),
            feature_option("style-dueling", "Dueling"),
            feature_option("style-great-weapon-fighting", "Great Weapon Fighting"),
        ],
        from_proficiencies: false,
        group: format!("fighting_style_{level}"),
    }
}

fn expertise_choice(level: u8) -> FeatureChoiceDef {
    FeatureChoiceDef {
        choice_type: ChoiceType::Expertise,
        level,
        choose: 2,
        options: Vec::new(),
        from_proficiencies: true,
        group: format!("expertise_{level}"),
    }
}

fn builtin_classes() -> Vec<ClassDef> {
    vec![
        ClassDef {
            slug: "fighter".to_string(),
            name: "Fighter".to_string(),
            hit_die: 10,
            subclass_level: 3,
            playable: true,
            asi_levels: vec![4, 6, 8, 12, 14, 16, 19],
            multiclass_prereq: MulticlassPrereq {
                any_of: vec![(Ability::Str, 13), (Ability::Dex, 13)],
            },
            spellcasting: None,
            skill_choices: Some(SkillChoiceDef {
                choose: 2,
                from: vec![
                    "acrobatics".to_string(),
                    "animal-handling".to_string(),
                    "athletics".to_string(),
                    "history".to_string(),
                    "insight".to_string(),
                    "intimidation".to_string(),
                    "perception".to_string(),
                    "survival".to_string(),
                ],
            }),
            fixed_proficiencies: Vec::new(),
            equipment_groups: vec![
                EquipmentGroupDef {
                    group: "armor".to_string(),
                    options: vec![
                        equipment_option("a", "chain mail", vec![item("chain-mail", 1)]),
                        equipment_option(
                            "b",
                            "leather armor, longbow, and 20 arrows",
                            vec![item("leather-armor", 1), item("longbow", 1), item("arrows", 20)],
                        ),
                    ],
                },
                EquipmentGroupDef {
                    group: "weapons".to_string(),
                    options: vec![
                        equipment_option(
                            "a",
                            "a martial weapon and a shield",
                            vec![item("longsword", 1), item("shield", 1)],
                        ),
                        equipment_option(
                            "b",
                            "two martial weapons",
                            vec![item("longsword", 1), item("battleaxe", 1)],
                        ),
                    ],
                },
            ],
            starting_wealth: Some(StartingWealth {
                dice_count: 5,
                die: 4,
                multiplier: 10,
            }),
            features: vec![
                feature("second-wind", "Second Wind", 1),
                feature("action-surge", "Action Surge", 2),
                feature("extra-attack", "Extra Attack", 5),
                feature("indomitable", "Indomitable", 9),
            ],
            feature_choices: vec![fighting_style_choice(1)],
            subclasses: vec![
                SubclassDef {
                    slug: "champion".to_string(),
                    name: "Champion".to_string(),
                    features: vec![
                        feature("improved-critical", "Improved Critical", 3),
                        feature("remarkable-athlete", "Remarkable Athlete", 7),
                    ],
                    feature_choices: Vec::new(),
                },
                SubclassDef {
                    slug: "battle-master".to_string(),
                    name: "Battle Master".to_string(),
                    features: vec![
                        feature("combat-superiority", "Combat Superiority", 3),
                        feature("know-your-enemy", "Know Your Enemy", 7),
                    ],
                    feature_choices: vec![FeatureChoiceDef {
                        choice_type: ChoiceType::OptionalFeature,
                        level: 3,
                        choose: 3,
                        options: vec![
                            feature_option("maneuver-riposte", "Riposte"),
                            feature_option("maneuver-parry", "Parry"),
                            feature_option("maneuver-trip-attack", "Trip Attack"),
                            feature_option("maneuver-feinting-attack", "Feinting Attack"),
                            feature_option("maneuver-precision-attack", "Precision Attack"),
                            feature_option("maneuver-menacing-attack", "Menacing Attack"),
                        ],
                        from_proficiencies: false,
                        group: "maneuvers_3".to_string(),
                    }],
                },
            ],
        },
        ClassDef {
            slug: "rogue".to_string(),
            name: "Rogue".to_string(),
            hit_die: 8,
            subclass_level: 3,
            playable: true,
            asi_levels: vec![4, 8, 10, 12, 16, 19],
            multiclass_prereq: MulticlassPrereq {
                any_of: vec![(Ability::Dex, 13)],
            },
            spellcasting: None,
            skill_choices: Some(SkillChoiceDef {
                choose: 4,
                from: vec![
                    "acrobatics".to_string(),
                    "athletics".to_string(),
                    "deception".to_string(),
                    "insight".to_string(),
                    "intimidation".to_string(),
                    "investigation".to_string(),
                    "perception".to_string(),
                    "performance".to_string(),
                    "persuasion".to_string(),
                    "sleight-of-hand".to_string(),
                    "stealth".to_string(),
                ],
            }),
            fixed_proficiencies: vec!["thieves-tools".to_string()],
            equipment_groups: vec![
                EquipmentGroupDef {
                    group: "weapons".to_string(),
                    options: vec![
                        equipment_option("a", "a rapier", vec![item("rapier", 1)]),
                        equipment_option("b", "a shortsword", vec![item("shortsword", 1)]),
                    ],
                },
                EquipmentGroupDef {
                    group: "pack".to_string(),
                    options: vec![
                        equipment_option("a", "a burglar's pack", vec![item("burglars-pack", 1)]),
                        equipment_option(
                            "b",
                            "an explorer's pack",
                            vec![item("explorers-pack", 1)],
                        ),
                    ],
                },
            ],
            starting_wealth: Some(StartingWealth {
                dice_count: 4,
                die: 4,
                multiplier: 10,
            }),
            features: vec![
                feature("sneak-attack", "Sneak Attack", 1),
                feature("thieves-cant", "Thieves' Cant", 1),
                feature("cunning-action", "Cunning Action", 2),
                feature("uncanny-dodge", "Uncanny Dodge", 5),
                feature("evasion", "Evasion", 7),
            ],
            feature_choices: vec![expertise_choice(1), expertise_choice(6)],
            subclasses: vec![
                SubclassDef {
                    slug: "thief".to_string(),
                    name: "Thief".to_string(),
                    features: vec![
                        feature("fast-hands", "Fast Hands", 3),
                        feature("second-story-work", "Second-Story Work", 3),
                    ],
                    feature_choices: Vec::new(),
                },
                SubclassDef {
                    slug: "assassin".to_string(),
                    name: "Assassin".to_string(),
                    features: vec![feature("assassinate", "Assassinate", 3)],
                    feature_choices: Vec::new(),
                },
            ],
        },
        ClassDef {
            slug: "wizard".to_string(),
            name: "Wizard".to_string(),
            hit_die: 6,
            subclass_level: 2,
            playable: true,
            asi_levels: vec![4, 8, 12, 16, 19],
            multiclass_prereq: MulticlassPrereq {
                any_of: vec![(Ability::Int, 13)],
            },
            spellcasting: Some(SpellcastingDef {
                ability: Ability::Int,
                progression: full_caster_progression(3, 6, 24),
            }),
            skill_choices: Some(SkillChoiceDef {
                choose: 2,
                from: vec![
                    "arcana".to_string(),
                    "history".to_string(),
                    "insight".to_string(),
                    "investigation".to_string(),
                    "medicine".to_string(),
                    "religion".to_string(),
                ],
            }),
            fixed_proficiencies: Vec::new(),
            equipment_groups: vec![
                EquipmentGroupDef {
                    group: "weapons".to_string(),
                    options: vec![
                        equipment_option("a", "a quarterstaff", vec![item("quarterstaff", 1)]),
                        equipment_option("b", "a dagger", vec![item("dagger", 1)]),
                    ],
                },
                EquipmentGroupDef {
                    group: "focus".to_string(),
                    options: vec![
                        equipment_option(
                            "a",
                            "a component pouch",
                            vec![item("component-pouch", 1)],
                        ),
                        equipment_option("b", "an arcane focus", vec![item("arcane-focus", 1)]),
                    ],
                },
            ],
            starting_wealth: Some(StartingWealth {
                dice_count: 4,
                die: 4,
                multiplier: 10,
            }),
            features: vec![
                feature("spellcasting", "Spellcasting", 1),
                feature("arcane-recovery", "Arcane Recovery", 1),
            ],
            feature_choices: Vec::new(),
            subclasses: vec![
                SubclassDef {
                    slug: "evocation".to_string(),
                    name: "School of Evocation".to_string(),
                    features: vec![
                        feature("evocation-savant", "Evocation Savant", 2),
                        feature("sculpt-spells", "Sculpt Spells", 2),
                    ],
                    feature_choices: Vec::new(),
                },
                SubclassDef {
                    slug: "divination".to_string(),
                    name: "School of Divination".to_string(),
                    features: vec![
                        feature("divination-savant", "Divination Savant", 2),
                        feature("portent", "Portent", 2),
                    ],
                    feature_choices: Vec::new(),
                },
            ],
        },
        ClassDef {
            slug: "cleric".to_string(),
            name: "Cleric".to_string(),
            hit_die: 8,
            subclass_level: 1,
            playable: true,
            asi_levels: vec![4, 8, 12, 16, 19],
            multiclass_prereq: MulticlassPrereq {
                any_of: vec![(Ability::Wis, 13)],
            },
            // Prepared caster: cantrips are chosen, leveled spells are not.
            spellcasting: Some(SpellcastingDef {
                ability: Ability::Wis,
                progression: full_caster_progression(3, 0, 0),
            }),
            skill_choices: Some(SkillChoiceDef {
                choose: 2,
                from: vec![
                    "history".to_string(),
                    "insight".to_string(),
                    "medicine".to_string(),
                    "persuasion".to_string(),
                    "religion".to_string(),
                ],
            }),
            fixed_proficiencies: Vec::new(),
            equipment_groups: vec![EquipmentGroupDef {
                group: "weapons".to_string(),
                options: vec![
                    equipment_option("a", "a mace", vec![item("mace", 1)]),
                    equipment_option("b", "a warhammer", vec![item("warhammer", 1)]),
                ],
            }],
            starting_wealth: Some(StartingWealth {
                dice_count: 5,
                die: 4,
                multiplier: 10,
            }),
            features: vec![
                feature("spellcasting", "Spellcasting", 1),
                feature("channel-divinity", "Channel Divinity", 2),
                feature("destroy-undead", "Destroy Undead", 5),
            ],
            feature_choices: Vec::new(),
            subclasses: vec![
                SubclassDef {
                    slug: "life-domain".to_string(),
                    name: "Life Domain".to_string(),
                    features: vec![
                        feature("disciple-of-life", "Disciple of Life", 1),
                        feature("preserve-life", "Preserve Life", 2),
                    ],
                    feature_choices: Vec::new(),
                },
                SubclassDef {
                    slug: "light-domain".to_string(),
                    name: "Light Domain".to_string(),
                    features: vec![feature("warding-flare", "Warding Flare", 1)],
                    feature_choices: Vec::new(),
                },
            ],
        },
        // Non-player archetype kept out of systematic enumeration.
        ClassDef {
            slug: "warrior-sidekick".to_string(),
            name: "Warrior Sidekick".to_string(),
            hit_die: 8,
            subclass_level: 3,
            playable: false,
            asi_levels: vec![4, 8, 12, 16, 19],
            multiclass_prereq: MulticlassPrereq::default(),
            spellcasting: None,
            skill_choices: None,
            fixed_proficiencies: Vec::new(),
            equipment_groups: Vec::new(),
            starting_wealth: None,
            features: vec![feature("martial-role", "Martial Role", 1)],
            feature_choices: Vec::new(),
            subclasses: Vec::new(),
        },
    ]
}

fn builtin_races() -> Vec<RaceDef> {
    vec![
        RaceDef {
            slug: "hill-dwarf".to_string(),
            name: "Hill Dwarf".to_string(),
            fixed_bonuses: vec![(Ability::Con, 2), (Ability::Wis, 1)],
            ability_choice: None,
            skill_choose: 0,
            language_choose: 0,
            fixed_languages: vec!["common".to_string(), "dwarvish".to_string()],
            feat_choice: false,
        },
        RaceDef {
            slug: "half-elf".to_string(),
            name: "Half-Elf".to_string(),
            fixed_bonuses: vec![(Ability::Cha, 2)],
            ability_choice: Some(AbilityChoiceDef { choose: 2, amount: 1 }),
            skill_choose: 2,
            language_choose: 1,
            fixed_languages: vec!["common".to_string(), "elvish".to_string()],
            feat_choice: false,
        },
        RaceDef {
            slug: "variant-human".to_string(),
            name: "Variant Human".to_string(),
            fixed_bonuses: Vec::new(),
            ability_choice: Some(AbilityChoiceDef { choose: 2, amount: 1 }),
            skill_choose: 1,
            language_choose: 1,
            fixed_languages: vec!["common".to_string()],
            feat_choice: true,
        },
    ]
}

fn builtin_backgrounds() -> Vec<BackgroundDef> {
    vec![
        BackgroundDef {
            slug: "soldier".to_string(),
            name: "Soldier".to_string(),
            skill_grants: vec!["athletics".to_string(), "intimidation".to_string()],
            language_choose: 0,
            gold: 10,
        },
        BackgroundDef {
            slug: "sage".to_string(),
            name: "Sage".to_string(),
            skill_grants: vec!["arcana".to_string(), "history".to_string()],
            language_choose: 2,
            gold: 10,
        },
        BackgroundDef {
            slug: "acolyte".to_string(),
            name: "Acolyte".to_string(),
            skill_grants: vec!["insight".to_string(), "religion".to_string()],
            language_choose: 2,
            gold: 15,
        },
    ]
}

fn spell(slug: &str, name: &str, level: u8, classes: &[&str]) -> SpellDef {
    SpellDef {
        slug: slug.to_string(),
        name: name.to_string(),
        level,
        classes: classes.iter().map(|class| (*class).to_string()).collect(),
    }
}

fn builtin_spells() -> Vec<SpellDef> {
    vec![
        // Cantrips
        spell("fire-bolt", "Fire Bolt", 0, &["wizard"]),
        spell("mage-hand", "Mage Hand", 0, &["wizard"]),
        spell("prestidigitation", "Prestidigitation", 0, &["wizard"]),
        spell("ray-of-frost", "Ray of Frost", 0, &["wizard"]),
        spell("minor-illusion", "Minor Illusion", 0, &["wizard"]),
        spell("light", "Light", 0, &["wizard", "cleric"]),
        spell("sacred-flame", "Sacred Flame", 0, &["cleric"]),
        spell("guidance", "Guidance", 0, &["cleric"]),
        spell("thaumaturgy", "Thaumaturgy", 0, &["cleric"]),
        spell("spare-the-dying", "Spare the Dying", 0, &["cleric"]),
        spell("resistance", "Resistance", 0, &["cleric"]),
        // 1st level
        spell("magic-missile", "Magic Missile", 1, &["wizard"]),
        spell("shield", "Shield", 1, &["wizard"]),
        spell("mage-armor", "Mage Armor", 1, &["wizard"]),
        spell("sleep", "Sleep", 1, &["wizard"]),
        spell("detect-magic", "Detect Magic", 1, &["wizard", "cleric"]),
        spell("burning-hands", "Burning Hands", 1, &["wizard"]),
        spell("charm-person", "Charm Person", 1, &["wizard"]),
        spell("feather-fall", "Feather Fall", 1, &["wizard"]),
        spell("find-familiar", "Find Familiar", 1, &["wizard"]),
        spell("thunderwave", "Thunderwave", 1, &["wizard"]),
        // 2nd level
        spell("misty-step", "Misty Step", 2, &["wizard"]),
        spell("invisibility", "Invisibility", 2, &["wizard"]),
        spell("scorching-ray", "Scorching Ray", 2, &["wizard"]),
        spell("web", "Web", 2, &["wizard"]),
        spell("mirror-image", "Mirror Image", 2, &["wizard"]),
        spell("darkvision", "Darkvision", 2, &["wizard"]),
        // 3rd level
        spell("fireball", "Fireball", 3, &["wizard"]),
        spell("counterspell", "Counterspell", 3, &["wizard"]),
        spell("fly", "Fly", 3, &["wizard"]),
        spell("haste", "Haste", 3, &["wizard"]),
        spell("lightning-bolt", "Lightning Bolt", 3, &["wizard"]),
        spell("slow", "Slow", 3, &["wizard"]),
        // 4th level
        spell("greater-invisibility", "Greater Invisibility", 4, &["wizard"]),
        spell("polymorph", "Polymorph", 4, &["wizard"]),
        spell("ice-storm", "Ice Storm", 4, &["wizard"]),
        spell("dimension-door", "Dimension Door", 4, &["wizard"]),
        // 5th level
        spell("cone-of-cold", "Cone of Cold", 5, &["wizard"]),
        spell("wall-of-force", "Wall of Force", 5, &["wizard"]),
    ]
}

fn builtin_feats() -> Vec<FeatDef> {
    ["alert", "lucky", "mobile", "sentinel", "savage-attacker", "tavern-brawler"]
        .iter()
        .map(|slug| FeatDef {
            slug: (*slug).to_string(),
            name: slug
                .split('-')
                .map(|word| {
                    let mut chars = word.chars();
                    chars.next().map_or_else(String::new, |first| {
                        first.to_uppercase().collect::<String>() + chars.as_str()
                    })
                })
                .collect::<Vec<_>>()
                .join(" "),
        })
        .collect()
}

fn builtin_skills() -> Vec<SkillDef> {
    [
        ("acrobatics", "Acrobatics"),
        ("animal-handling", "Animal Handling"),
        ("arcana", "Arcana"),
        ("athletics", "Athletics"),
        ("deception", "Deception"),
        ("history", "History"),
        ("insight", "Insight"),
        ("intimidation", "Intimidation"),
        ("investigation", "Investigation"),
        ("medicine", "Medicine"),
        ("nature", "Nature"),
        ("perception", "Perception"),
        ("performance", "Performance"),
        ("persuasion", "Persuasion"),
        ("religion", "Religion"),
        ("sleight-of-hand", "Sleight of Hand"),
        ("stealth", "Stealth"),
        ("survival", "Survival"),
    ]
    .iter()
    .map(|(slug, name)| SkillDef {
        slug: (*slug).to_string(),
        name: (*name).to_string(),
    })
    .collect()
}

fn builtin_languages() -> Vec<LanguageDef> {
    [
        ("common", "Common"),
        ("dwarvish", "Dwarvish"),
        ("elvish", "Elvish"),
        ("giant", "Giant"),
        ("gnomish", "Gnomish"),
        ("goblin", "Goblin"),
        ("halfling", "Halfling"),
        ("orc", "Orc"),
        ("draconic", "Draconic"),
        ("celestial", "Celestial"),
        ("infernal", "Infernal"),
        ("sylvan", "Sylvan"),
    ]
    .iter()
    .map(|(slug, name)| LanguageDef {
        slug: (*slug).to_string(),
        name: (*name).to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_ruleset_is_coherent() {
        let rules = Ruleset::builtin();
        assert_eq!(rules.playable_classes().len(), 4);
        assert!(rules.class("warrior-sidekick").is_some());
        assert!(!rules.class("warrior-sidekick").unwrap().playable);

        for class in &rules.classes {
            for choice in &class.feature_choices {
                assert!(
                    choice.from_proficiencies || !choice.options.is_empty(),
                    "{} feature choice has no options",
                    class.slug
                );
            }
            if let Some(skills) = &class.skill_choices {
                for slug in &skills.from {
                    assert!(
                        rules.skills.iter().any(|s| &s.slug == slug),
                        "unknown skill {slug} offered by {}",
                        class.slug
                    );
                }
            }
        }
    }

    #[test]
    fn spell_lists_cover_the_wizard_progression() {
        let rules = Ruleset::builtin();
        let wizard = rules.class("wizard").unwrap();
        let casting = wizard.spellcasting.as_ref().unwrap();

        let cantrips = rules.spells_for_class("wizard", 0, 0);
        let max_cantrips = casting
            .progression
            .iter()
            .map(|row| row.cantrips_known)
            .max()
            .unwrap();
        assert!(cantrips.len() as u32 >= max_cantrips);

        // At every level, the cumulative spells-known target must be
        // satisfiable from the spells available up to that level.
        for row in &casting.progression {
            let max_level = casting.max_spell_level(row.level);
            let available = rules.spells_for_class("wizard", 1, max_level);
            assert!(
                available.len() as u32 >= row.spells_known,
                "level {} needs {} spells, only {} available",
                row.level,
                row.spells_known,
                available.len()
            );
        }
    }

    #[test]
    fn cleric_is_a_prepared_caster() {
        let rules = Ruleset::builtin();
        let cleric = rules.class("cleric").unwrap();
        let casting = cleric.spellcasting.as_ref().unwrap();
        assert!(casting.progression.iter().all(|row| row.spells_known == 0));
        assert!(casting.progression.iter().all(|row| row.cantrips_known > 0));
    }

    #[test]
    fn multiclass_prereq_accepts_any_listed_score() {
        let rules = Ruleset::builtin();
        let fighter = rules.class("fighter").unwrap();
        let mut scores = crate::character::AbilityScores::default();
        assert!(!fighter.multiclass_prereq.is_met(&scores));
        scores.set(Ability::Dex, 13);
        assert!(fighter.multiclass_prereq.is_met(&scores));
    }

    #[test]
    fn ruleset_round_trips_through_json() {
        let rules = Ruleset::builtin();
        let json = serde_json::to_string(&rules).unwrap();
        let parsed = Ruleset::from_json(&json).unwrap();
        assert_eq!(parsed, rules);
    }

    #[test]
    fn max_spell_level_follows_full_caster_table() {
        let casting = SpellcastingDef {
            ability: Ability::Int,
            progression: full_caster_progression(3, 6, 24),
        };
        assert_eq!(casting.max_spell_level(1), 1);
        assert_eq!(casting.max_spell_level(4), 2);
        assert_eq!(casting.max_spell_level(5), 3);
        assert_eq!(casting.max_spell_level(17), 9);
        assert_eq!(casting.max_spell_level(20), 9);
    }
}
