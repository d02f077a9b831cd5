//! The level-up flow executor.
//!
//! Walks a character from its current level to a target level: pick a class
//! to advance (linear / chaos / realistic), invoke the level-up, resolve every
//! pending required choice through the selection strategies, snapshot both
//! sides, validate, and aggregate a flow result. External-call failures abort
//! the run; validation failures are recorded and the run continues.

use log::{debug, warn};

use quintain_engine::{ChoiceOptions, ChoiceType, PendingChoice};

use crate::api::CharacterApi;
use crate::planner::{generate_plan, PlannerWeights};
use crate::randomizer::Randomizer;
use crate::result::{LevelUpFlowResult, LevelUpStepResult};
use crate::snapshot;
use crate::strategy::SelectionStrategy;
use crate::validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMode {
    /// Always advance the primary class.
    Linear,
    /// Random class advancement with opportunistic multiclass attempts.
    Chaos,
    /// Multiclass adoptions follow a precomputed plan.
    Realistic,
}

#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub target_level: u8,
    pub mode: FlowMode,
    /// Percent chance per level (past 2) to attempt a multiclass in chaos mode.
    pub multiclass_chance: u32,
    pub weights: PlannerWeights,
    pub force_subclass: Option<String>,
    /// Hard cap on resolve-all iterations; guarantees termination even when
    /// resolving one choice exposes another.
    pub max_resolve_iterations: u32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            target_level: 20,
            mode: FlowMode::Linear,
            multiclass_chance: 20,
            weights: PlannerWeights::default(),
            force_subclass: None,
            max_resolve_iterations: 20,
        }
    }
}

pub struct FlowExecutor {
    config: FlowConfig,
}

impl FlowExecutor {
    #[must_use]
    pub const fn new(config: FlowConfig) -> Self {
        Self { config }
    }

    pub fn execute(
        &self,
        api: &mut dyn CharacterApi,
        character_id: u64,
        randomizer: &mut Randomizer,
        iteration: u32,
    ) -> LevelUpFlowResult {
        let seed = randomizer.seed();

        let character = match api.get_character(character_id) {
            Ok(character) => character,
            Err(err) => {
                let mut result = LevelUpFlowResult::new(iteration, seed, character_id, "unknown");
                result.set_error(1, err.to_string());
                return result;
            }
        };

        let mut result =
            LevelUpFlowResult::new(iteration, seed, character_id, character.public_id.clone());
        result.start_level = character.total_level;
        result.label = character
            .classes
            .first()
            .map(|class| class.class_slug.clone())
            .unwrap_or_default();

        if character.classes.is_empty() {
            result.set_error(character.total_level, "character has no class");
            return result;
        }
        if !character.is_complete {
            result.set_error(
                character.total_level,
                "character is not complete - cannot level up",
            );
            return result;
        }

        let mut class_levels: Vec<(String, u8)> = character
            .classes
            .iter()
            .map(|class| (class.class_slug.clone(), class.level))
            .collect();
        let strategy = SelectionStrategy::with_forced_subclass(self.config.force_subclass.clone());

        let plan = (self.config.mode == FlowMode::Realistic).then(|| {
            let plan = generate_plan(
                character.total_level,
                self.config.target_level,
                self.config.weights,
                randomizer,
            );
            debug!(
                target: "quintain_tester::flow",
                "realistic plan: {} class(es), adoptions at {:?}",
                plan.class_count,
                plan.adoption_levels
            );
            plan
        });

        for level in (character.total_level + 1)..=self.config.target_level {
            let should_multiclass = match self.config.mode {
                FlowMode::Chaos => level > 2 && randomizer.chance(self.config.multiclass_chance),
                FlowMode::Realistic => plan
                    .as_ref()
                    .is_some_and(|plan| plan.adoption_levels.contains(&level)),
                FlowMode::Linear => false,
            };

            if should_multiclass {
                if let Some(new_class) =
                    try_add_multiclass(api, character_id, &class_levels, randomizer)
                {
                    class_levels.push((new_class, 1));
                    // Adoption may surface new requirements, and it consumed
                    // this level.
                    resolve_all_pending_choices(
                        api,
                        character_id,
                        randomizer,
                        &strategy,
                        self.config.max_resolve_iterations,
                    );
                    continue;
                }
            }

            let class_to_level =
                select_class_to_level(&class_levels, self.config.mode != FlowMode::Linear, randomizer);

            let before = match snapshot::capture(api, character_id) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    result.set_error(level, err.to_string());
                    break;
                }
            };
            let hp_before = before.derived.max_hp;

            let outcome = match api.level_up_class(character_id, &class_to_level) {
                Ok(outcome) => outcome,
                Err(err) => {
                    result.add_step(LevelUpStepResult::failure(
                        level,
                        &class_to_level,
                        vec![err.to_string()],
                        "api_error",
                        Vec::new(),
                        Some(before.derived),
                        None,
                    ));
                    // An external-call failure aborts the run; levels are
                    // never skipped past.
                    result.set_error(level, err.to_string());
                    break;
                }
            };

            resolve_all_pending_choices(
                api,
                character_id,
                randomizer,
                &strategy,
                self.config.max_resolve_iterations,
            );

            let after = match snapshot::capture(api, character_id) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    result.set_error(level, err.to_string());
                    break;
                }
            };
            let hp_gained = after.derived.max_hp - hp_before;

            if let Some(entry) = class_levels
                .iter_mut()
                .find(|(slug, _)| *slug == class_to_level)
            {
                entry.1 += 1;
            }

            let mut validation =
                validator::validate_level_up(&before, &after, &class_to_level, level);
            validation.merge(validator::validate_no_orphaned_choices(&after));

            let features_gained: Vec<String> = outcome
                .features_gained
                .iter()
                .map(|feature| feature.slug.clone())
                .collect();

            debug!(
                target: "quintain_tester::flow",
                "level {level}: {} now holds {} feature(s) at total level {}",
                after.character.public_id,
                after.features.len(),
                after.character.total_level
            );

            let step = if validation.passed {
                LevelUpStepResult::success(
                    level,
                    &class_to_level,
                    hp_gained,
                    features_gained,
                    validation.warnings,
                    Some(before.derived),
                    Some(after.derived),
                )
            } else {
                LevelUpStepResult::failure(
                    level,
                    &class_to_level,
                    validation.errors,
                    validation.pattern.unwrap_or_else(|| "unknown".to_string()),
                    validation.warnings,
                    Some(before.derived),
                    Some(after.derived),
                )
            };
            result.add_step(step);
        }

        debug!(
            target: "quintain_tester::flow",
            "run {iteration} finished: status {:?}, {} rng call(s)",
            result.status(),
            randomizer.call_count()
        );
        result
    }
}

/// Linear mode (or a single class) levels the first-held class; otherwise
/// pick a held class at random.
fn select_class_to_level(
    class_levels: &[(String, u8)],
    random_mode: bool,
    randomizer: &mut Randomizer,
) -> String {
    if !random_mode || class_levels.len() == 1 {
        return class_levels[0].0.clone();
    }
    let index = randomizer.random_int(0, class_levels.len() as i64 - 1) as usize;
    class_levels[index].0.clone()
}

/// Attempt to adopt a random eligible class. Prerequisite failures are
/// expected and silently skipped.
fn try_add_multiclass(
    api: &mut dyn CharacterApi,
    character_id: u64,
    class_levels: &[(String, u8)],
    randomizer: &mut Randomizer,
) -> Option<String> {
    let held: Vec<&str> = class_levels.iter().map(|(slug, _)| slug.as_str()).collect();
    let available: Vec<String> = api
        .list_classes()
        .into_iter()
        .filter(|class| class.playable && !held.contains(&class.slug.as_str()))
        .map(|class| class.slug)
        .collect();
    if available.is_empty() {
        return None;
    }

    let index = randomizer.random_int(0, available.len() as i64 - 1) as usize;
    let pick = available[index].clone();
    match api.add_class(character_id, &pick, false) {
        Ok(()) => Some(pick),
        Err(err) => {
            debug!(target: "quintain_tester::flow", "multiclass into {pick} skipped: {err}");
            None
        }
    }
}

/// Resolve required choices (plus eagerly, optional ASI choices) until none
/// remain or the iteration budget runs out.
pub fn resolve_all_pending_choices(
    api: &mut dyn CharacterApi,
    character_id: u64,
    randomizer: &mut Randomizer,
    strategy: &SelectionStrategy,
    max_iterations: u32,
) -> u32 {
    let mut resolved = 0;
    for _ in 0..max_iterations {
        let Ok(all_choices) = api.pending_choices(character_id) else {
            break;
        };
        let pending: Vec<PendingChoice> = all_choices
            .into_iter()
            .filter(|choice| {
                choice.remaining > 0
                    && (choice.required || choice.choice_type == ChoiceType::AsiOrFeat)
            })
            .collect();
        if pending.is_empty() {
            break;
        }
        for choice in pending {
            if resolve_single_choice(api, character_id, &choice, randomizer, strategy) {
                resolved += 1;
            }
        }
    }
    resolved
}

fn resolve_single_choice(
    api: &mut dyn CharacterApi,
    character_id: u64,
    choice: &PendingChoice,
    randomizer: &mut Randomizer,
    strategy: &SelectionStrategy,
) -> bool {
    let options = match &choice.options {
        ChoiceOptions::Inline(options) => options.clone(),
        ChoiceOptions::Remote { endpoint, params } => {
            let mut params = params.clone();
            // Spell option sets default to the primary class; multiclass
            // spell choices need their own class appended.
            if choice.choice_type == ChoiceType::Spell {
                if let Some(class_slug) = &choice.metadata.class_slug {
                    if !params.iter().any(|(key, _)| key == "class") {
                        params.push(("class".to_string(), class_slug.clone()));
                    }
                }
            }
            match api.fetch_options(character_id, endpoint, &params) {
                Ok(options) => options,
                Err(err) => {
                    warn!(
                        target: "quintain_tester::flow",
                        "options fetch failed for {}: {err}",
                        choice.id
                    );
                    Vec::new()
                }
            }
        }
    };

    let has_asi_metadata = choice.choice_type == ChoiceType::AsiOrFeat
        && !choice.metadata.ability_scores.is_empty();
    if options.is_empty() && !has_asi_metadata {
        warn!(
            target: "quintain_tester::flow",
            "empty options for choice {} ({})",
            choice.id,
            choice.choice_type
        );
        return false;
    }

    let Some(input) = strategy.select(choice, &options, randomizer) else {
        debug!(
            target: "quintain_tester::flow",
            "no selection derived for {}",
            choice.id
        );
        return false;
    };

    match api.resolve_choice(character_id, &choice.id, &input) {
        Ok(()) => true,
        Err(err) => {
            warn!(
                target: "quintain_tester::flow",
                "choice resolution failed for {}: {err}",
                choice.id
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use quintain_engine::{CharacterService, Ruleset};

    use crate::fixtures::build_test_character;
    use crate::result::RunStatus;

    use super::*;

    fn service() -> CharacterService {
        CharacterService::new(Ruleset::builtin(), 2024)
    }

    fn fixture(service: &mut CharacterService, seed: u64, class: Option<&str>) -> (u64, Randomizer) {
        let mut randomizer = Randomizer::new(seed);
        let strategy = SelectionStrategy::default();
        let id = build_test_character(service, &mut randomizer, class, &strategy)
            .expect("fixture character");
        (id, randomizer)
    }

    #[test]
    fn linear_run_from_three_to_six_passes_three_steps() {
        let mut service = service();
        let (id, mut randomizer) = fixture(&mut service, 12345, Some("fighter"));

        // Bring the character to level 3 first.
        let warmup = FlowExecutor::new(FlowConfig {
            target_level: 3,
            ..FlowConfig::default()
        });
        let warmup_result = warmup.execute(&mut service, id, &mut randomizer, 1);
        assert_eq!(warmup_result.status(), RunStatus::Pass);

        let executor = FlowExecutor::new(FlowConfig {
            target_level: 6,
            ..FlowConfig::default()
        });
        let result = executor.execute(&mut service, id, &mut randomizer, 1);

        assert_eq!(result.status(), RunStatus::Pass);
        assert_eq!(result.start_level, 3);
        let levels: Vec<u8> = result.steps.iter().map(|step| step.level).collect();
        assert_eq!(levels, vec![4, 5, 6]);
        assert_eq!(result.final_level(), 6);
        assert!(result.total_hp_gained() > 0);
    }

    #[test]
    fn incomplete_characters_error_out_before_leveling() {
        let mut service = service();
        let mut randomizer = Randomizer::new(7);
        // Raw creation without resolving the level-1 choices.
        let id = service
            .create_character(quintain_engine::NewCharacter {
                name: "Raw".to_string(),
                public_id: "raw-0001".to_string(),
                race_slug: "hill-dwarf".to_string(),
                background_slug: "soldier".to_string(),
                class_slug: "fighter".to_string(),
                abilities: quintain_engine::AbilityScores::default(),
            })
            .unwrap();

        let executor = FlowExecutor::new(FlowConfig::default());
        let result = executor.execute(&mut service, id, &mut randomizer, 1);
        assert_eq!(result.status(), RunStatus::Error);
        assert!(result.error.unwrap().message.contains("not complete"));
        assert!(result.steps.is_empty());
    }

    #[test]
    fn missing_characters_report_an_error_result() {
        let mut service = service();
        let mut randomizer = Randomizer::new(9);
        let executor = FlowExecutor::new(FlowConfig::default());
        let result = executor.execute(&mut service, 999, &mut randomizer, 3);
        assert_eq!(result.status(), RunStatus::Error);
        assert_eq!(result.iteration, 3);
    }

    #[test]
    fn chaos_run_reaches_target_and_stays_consistent() {
        let mut service = service();
        let (id, mut randomizer) = fixture(&mut service, 4242, Some("fighter"));

        let executor = FlowExecutor::new(FlowConfig {
            target_level: 10,
            mode: FlowMode::Chaos,
            ..FlowConfig::default()
        });
        let result = executor.execute(&mut service, id, &mut randomizer, 1);

        assert_eq!(result.status(), RunStatus::Pass, "failures: {:?}", result.failures());
        let summary = service.get_character(id).unwrap();
        assert_eq!(summary.total_level, 10);
        assert!(summary.is_complete);
    }

    #[test]
    fn chaos_runs_reproduce_for_the_same_seed() {
        let run = |seed: u64| {
            let mut service = CharacterService::new(Ruleset::builtin(), 2024);
            let (id, mut randomizer) = {
                let mut randomizer = Randomizer::new(seed);
                let strategy = SelectionStrategy::default();
                let id = build_test_character(&mut service, &mut randomizer, None, &strategy)
                    .expect("fixture");
                (id, randomizer)
            };
            let executor = FlowExecutor::new(FlowConfig {
                target_level: 8,
                mode: FlowMode::Chaos,
                ..FlowConfig::default()
            });
            let result = executor.execute(&mut service, id, &mut randomizer, 1);
            (
                result.status(),
                result
                    .steps
                    .iter()
                    .map(|step| (step.level, step.class_slug.clone(), step.hp_gained))
                    .collect::<Vec<_>>(),
            )
        };

        assert_eq!(run(777), run(777));
    }

    #[test]
    fn realistic_mode_respects_its_plan() {
        let mut service = service();
        let (id, mut randomizer) = fixture(&mut service, 31337, Some("fighter"));

        let executor = FlowExecutor::new(FlowConfig {
            target_level: 12,
            mode: FlowMode::Realistic,
            ..FlowConfig::default()
        });
        let result = executor.execute(&mut service, id, &mut randomizer, 1);

        assert_eq!(result.status(), RunStatus::Pass, "failures: {:?}", result.failures());
        let summary = service.get_character(id).unwrap();
        assert_eq!(summary.total_level, 12);
        // Never more than three classes in a realistic plan.
        assert!(summary.classes.len() <= 3);
    }

    #[test]
    fn forced_subclass_is_honored() {
        let mut service = service();
        let (id, mut randomizer) = fixture(&mut service, 55, Some("fighter"));

        let executor = FlowExecutor::new(FlowConfig {
            target_level: 3,
            force_subclass: Some("battle-master".to_string()),
            ..FlowConfig::default()
        });
        let result = executor.execute(&mut service, id, &mut randomizer, 1);
        assert_eq!(result.status(), RunStatus::Pass, "failures: {:?}", result.failures());

        let summary = service.get_character(id).unwrap();
        assert_eq!(
            summary.classes[0].subclass.as_deref(),
            Some("battle-master")
        );
    }
}
