//! Per-type selection strategies for the automated test actor.
//!
//! Strategies never mutate state: they look at a choice and its (already
//! fetched) options and produce a candidate submission, which the executor
//! sends through the normal resolution path. Illegal picks therefore surface
//! as ordinary resolution failures, exactly as a buggy client's would.

use std::collections::BTreeMap;

use quintain_engine::{ChoiceOption, ChoiceType, PendingChoice, ResolutionInput};

use crate::randomizer::Randomizer;

const ASI_PICK_PERCENT: u32 = 70;
const SINGLE_INCREASE_PERCENT: u32 = 50;
const ABILITY_SCORE_CAP: i32 = 20;

#[derive(Debug, Clone, Default)]
pub struct SelectionStrategy {
    /// Preferred subclass slug, picked whenever it appears in the options.
    pub force_subclass: Option<String>,
}

impl SelectionStrategy {
    #[must_use]
    pub fn with_forced_subclass(slug: Option<String>) -> Self {
        Self {
            force_subclass: slug,
        }
    }

    /// Derive a submission for a choice, or `None` when nothing sensible can
    /// be picked (empty options and no usable metadata).
    pub fn select(
        &self,
        choice: &PendingChoice,
        options: &[ChoiceOption],
        randomizer: &mut Randomizer,
    ) -> Option<ResolutionInput> {
        match choice.choice_type {
            ChoiceType::HitPoints => Self::select_hit_points(options, randomizer),
            ChoiceType::AsiOrFeat => self.select_asi_or_feat(choice, options, randomizer),
            ChoiceType::Subclass => self.select_subclass(options, randomizer),
            ChoiceType::Feat => Self::pick_slugs(options, 1, randomizer),
            ChoiceType::Spell
            | ChoiceType::Proficiency
            | ChoiceType::Language
            | ChoiceType::Expertise
            | ChoiceType::AbilityScore
            | ChoiceType::OptionalFeature
            | ChoiceType::FightingStyle => {
                Self::pick_slugs(options, choice.remaining as usize, randomizer)
            }
            ChoiceType::Equipment | ChoiceType::EquipmentMode => {
                Self::pick_generic(options, 1, randomizer)
            }
        }
    }

    /// Prefer the deterministic `average` option so automated runs reproduce.
    fn select_hit_points(
        options: &[ChoiceOption],
        randomizer: &mut Randomizer,
    ) -> Option<ResolutionInput> {
        let keys: Vec<String> = options
            .iter()
            .filter_map(|option| option.pick_key().map(str::to_string))
            .collect();
        if keys.is_empty() {
            return None;
        }
        if keys.iter().any(|key| key == "average") {
            return Some(ResolutionInput::one("average"));
        }
        let picked = randomizer.pick_random(&keys, 1);
        Some(ResolutionInput::select(picked))
    }

    fn select_asi_or_feat(
        &self,
        choice: &PendingChoice,
        options: &[ChoiceOption],
        randomizer: &mut Randomizer,
    ) -> Option<ResolutionInput> {
        let feat_slugs: Vec<String> = options
            .iter()
            .filter_map(|option| option.slug.clone())
            .collect();
        let scores = &choice.metadata.ability_scores;
        let points = choice.metadata.asi_points.unwrap_or(2) as i32;

        if scores.is_empty() {
            if feat_slugs.is_empty() {
                return None;
            }
            let index = randomizer.random_int(0, feat_slugs.len() as i64 - 1) as usize;
            return Some(ResolutionInput::feat(feat_slugs[index].clone()));
        }
        if feat_slugs.is_empty() {
            return Self::build_asi(scores, points, randomizer);
        }

        if randomizer.chance(ASI_PICK_PERCENT) {
            Self::build_asi(scores, points, randomizer)
        } else {
            let index = randomizer.random_int(0, feat_slugs.len() as i64 - 1) as usize;
            Some(ResolutionInput::feat(feat_slugs[index].clone()))
        }
    }

    /// Distribute ASI points: +2 to one score or +1 to two, capped at 20.
    fn build_asi(
        scores: &[quintain_engine::AbilityScoreState],
        points: i32,
        randomizer: &mut Randomizer,
    ) -> Option<ResolutionInput> {
        let eligible: Vec<&quintain_engine::AbilityScoreState> = scores
            .iter()
            .filter(|score| score.current_value < ABILITY_SCORE_CAP)
            .collect();
        if eligible.is_empty() {
            return None;
        }

        let mut increases = BTreeMap::new();
        let single = randomizer.chance(SINGLE_INCREASE_PERCENT) || eligible.len() == 1;

        if single {
            let index = randomizer.random_int(0, eligible.len() as i64 - 1) as usize;
            let target = eligible[index];
            let increase = points.min(ABILITY_SCORE_CAP - target.current_value);
            if increase > 0 {
                increases.insert(target.code.clone(), increase);
            }
        } else {
            let first_index = randomizer.random_int(0, eligible.len() as i64 - 1) as usize;
            let first = eligible[first_index];
            let others: Vec<&&quintain_engine::AbilityScoreState> = eligible
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != first_index)
                .map(|(_, score)| score)
                .collect();
            if others.is_empty() {
                let increase = points.min(ABILITY_SCORE_CAP - first.current_value);
                if increase > 0 {
                    increases.insert(first.code.clone(), increase);
                }
            } else {
                increases.insert(first.code.clone(), 1);
                let second_index = randomizer.random_int(0, others.len() as i64 - 1) as usize;
                increases.insert(others[second_index].code.clone(), 1);
            }
        }

        if increases.is_empty() {
            None
        } else {
            Some(ResolutionInput::asi(increases))
        }
    }

    fn select_subclass(
        &self,
        options: &[ChoiceOption],
        randomizer: &mut Randomizer,
    ) -> Option<ResolutionInput> {
        let slugs: Vec<String> = options
            .iter()
            .filter_map(|option| option.slug.clone())
            .collect();
        if let Some(forced) = &self.force_subclass {
            if slugs.iter().any(|slug| slug == forced) {
                return Some(ResolutionInput::one(forced.clone()));
            }
        }
        if slugs.is_empty() {
            return None;
        }
        Some(ResolutionInput::select(randomizer.pick_random(&slugs, 1)))
    }

    /// Countable picks keyed by slug.
    fn pick_slugs(
        options: &[ChoiceOption],
        wanted: usize,
        randomizer: &mut Randomizer,
    ) -> Option<ResolutionInput> {
        let slugs: Vec<String> = options
            .iter()
            .filter_map(|option| option.pick_key().map(str::to_string))
            .collect();
        if slugs.is_empty() || wanted == 0 {
            return None;
        }
        let count = wanted.min(slugs.len());
        Some(ResolutionInput::select(randomizer.pick_random(&slugs, count)))
    }

    /// Fallback for anything keyed by value or id.
    fn pick_generic(
        options: &[ChoiceOption],
        wanted: usize,
        randomizer: &mut Randomizer,
    ) -> Option<ResolutionInput> {
        Self::pick_slugs(options, wanted, randomizer)
    }
}

#[cfg(test)]
mod tests {
    use quintain_engine::{
        AbilityScoreState, ChoiceMetadata, ChoiceOptions, ChoiceSource,
    };

    use super::*;

    fn choice(choice_type: ChoiceType, remaining: u32) -> PendingChoice {
        PendingChoice {
            id: format!("{}:class:fighter:1:test", choice_type.key()),
            choice_type,
            subtype: None,
            source: ChoiceSource::Class,
            source_name: "Fighter".to_string(),
            level_granted: 1,
            required: true,
            quantity: remaining,
            remaining,
            selected: Vec::new(),
            options: ChoiceOptions::Inline(Vec::new()),
            metadata: ChoiceMetadata::default(),
        }
    }

    fn hp_options() -> Vec<ChoiceOption> {
        ["roll", "average", "manual"]
            .iter()
            .map(|key| ChoiceOption {
                id: Some((*key).to_string()),
                label: (*key).to_string(),
                ..ChoiceOption::default()
            })
            .collect()
    }

    #[test]
    fn hit_points_prefers_average() {
        let strategy = SelectionStrategy::default();
        let mut rng = Randomizer::new(1);
        for _ in 0..10 {
            let input = strategy
                .select(&choice(ChoiceType::HitPoints, 1), &hp_options(), &mut rng)
                .unwrap();
            assert_eq!(input.selected, vec!["average".to_string()]);
        }
    }

    #[test]
    fn countable_choices_pick_min_of_remaining_and_available() {
        let strategy = SelectionStrategy::default();
        let mut rng = Randomizer::new(2);
        let options = vec![
            ChoiceOption::slug("a", "A"),
            ChoiceOption::slug("b", "B"),
            ChoiceOption::slug("c", "C"),
        ];

        let input = strategy
            .select(&choice(ChoiceType::Spell, 2), &options, &mut rng)
            .unwrap();
        assert_eq!(input.selected.len(), 2);

        let input = strategy
            .select(&choice(ChoiceType::Proficiency, 5), &options, &mut rng)
            .unwrap();
        assert_eq!(input.selected.len(), 3);
    }

    #[test]
    fn forced_subclass_wins_when_offered() {
        let strategy = SelectionStrategy::with_forced_subclass(Some("battle-master".to_string()));
        let mut rng = Randomizer::new(3);
        let options = vec![
            ChoiceOption::slug("champion", "Champion"),
            ChoiceOption::slug("battle-master", "Battle Master"),
        ];
        let input = strategy
            .select(&choice(ChoiceType::Subclass, 1), &options, &mut rng)
            .unwrap();
        assert_eq!(input.selected, vec!["battle-master".to_string()]);

        // Unavailable forced subclass falls back to a random pick.
        let strategy = SelectionStrategy::with_forced_subclass(Some("samurai".to_string()));
        let input = strategy
            .select(&choice(ChoiceType::Subclass, 1), &options, &mut rng)
            .unwrap();
        assert_eq!(input.selected.len(), 1);
    }

    #[test]
    fn asi_selection_respects_the_score_cap() {
        let strategy = SelectionStrategy::default();
        let mut rng = Randomizer::new(4);
        let mut asi_choice = choice(ChoiceType::AsiOrFeat, 1);
        asi_choice.metadata.ability_scores = vec![
            AbilityScoreState {
                code: "STR".to_string(),
                current_value: 19,
            },
            AbilityScoreState {
                code: "DEX".to_string(),
                current_value: 20,
            },
        ];
        asi_choice.metadata.asi_points = Some(2);

        for _ in 0..20 {
            let input = strategy.select(&asi_choice, &[], &mut rng).unwrap();
            match input.asi.unwrap() {
                quintain_engine::AsiSelection::Asi { increases } => {
                    // DEX is capped; only STR is eligible, and only +1 fits.
                    assert_eq!(increases.len(), 1);
                    assert_eq!(increases.get("STR"), Some(&1));
                }
                quintain_engine::AsiSelection::Feat { .. } => panic!("no feats offered"),
            }
        }
    }

    #[test]
    fn asi_falls_back_to_feat_when_scores_are_missing() {
        let strategy = SelectionStrategy::default();
        let mut rng = Randomizer::new(5);
        let asi_choice = choice(ChoiceType::AsiOrFeat, 1);
        let options = vec![ChoiceOption::slug("alert", "Alert")];
        let input = strategy.select(&asi_choice, &options, &mut rng).unwrap();
        assert!(matches!(
            input.asi,
            Some(quintain_engine::AsiSelection::Feat { .. })
        ));
    }

    #[test]
    fn selections_are_seed_reproducible() {
        let strategy = SelectionStrategy::default();
        let options: Vec<ChoiceOption> = (0..8)
            .map(|i| ChoiceOption::slug(format!("spell-{i}"), format!("Spell {i}")))
            .collect();

        let mut a = Randomizer::new(42);
        let mut b = Randomizer::new(42);
        for _ in 0..10 {
            let pick_a = strategy.select(&choice(ChoiceType::Spell, 3), &options, &mut a);
            let pick_b = strategy.select(&choice(ChoiceType::Spell, 3), &options, &mut b);
            assert_eq!(pick_a, pick_b);
        }
    }
}
