//! Batch runners.
//!
//! The systematic runner enumerates every playable class/subclass pairing and
//! drives one orchestrated run per combination with a positionally derived
//! seed, so any single combination can be replayed in isolation. The
//! iteration runner repeats fixture-plus-flow runs for chaos and soak
//! testing.

use anyhow::{bail, Result};
use log::info;

use quintain_engine::CharacterService;

use crate::api::CharacterApi;
use crate::fixtures::build_test_character;
use crate::flow::{FlowConfig, FlowExecutor, FlowMode};
use crate::planner::PlannerWeights;
use crate::randomizer::Randomizer;
use crate::result::LevelUpFlowResult;
use crate::strategy::SelectionStrategy;

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub target_level: u8,
    pub base_seed: u64,
    pub iterations: u32,
    pub mode: FlowMode,
    pub force_class: Option<String>,
    pub class_filter: Option<String>,
    pub subclass_filter: Option<String>,
    pub multiclass_chance: u32,
    pub weights: PlannerWeights,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            target_level: 20,
            base_seed: 1337,
            iterations: 1,
            mode: FlowMode::Linear,
            force_class: None,
            class_filter: None,
            subclass_filter: None,
            multiclass_chance: 20,
            weights: PlannerWeights::default(),
        }
    }
}

impl BatchOptions {
    fn flow_config(&self, mode: FlowMode, force_subclass: Option<String>) -> FlowConfig {
        FlowConfig {
            target_level: self.target_level,
            mode,
            multiclass_chance: self.multiclass_chance,
            weights: self.weights,
            force_subclass,
            max_resolve_iterations: 20,
        }
    }
}

/// Run one (class, subclass) combination from a fresh fixture character.
fn run_combination(
    service: &mut CharacterService,
    options: &BatchOptions,
    class_slug: &str,
    subclass_slug: Option<&str>,
    seed: u64,
    iteration: u32,
) -> LevelUpFlowResult {
    let label = subclass_slug.unwrap_or(class_slug).to_string();
    let mut randomizer = Randomizer::new(seed);
    let strategy =
        SelectionStrategy::with_forced_subclass(subclass_slug.map(str::to_string));

    let character_id =
        match build_test_character(service, &mut randomizer, Some(class_slug), &strategy) {
            Ok(id) => id,
            Err(err) => {
                let mut result = LevelUpFlowResult::new(iteration, seed, 0, "unknown");
                result.label = label;
                result.set_error(1, err.to_string());
                return result;
            }
        };

    let executor = FlowExecutor::new(
        options.flow_config(FlowMode::Linear, subclass_slug.map(str::to_string)),
    );
    let mut result = executor.execute(service, character_id, &mut randomizer, iteration);
    result.label = label;
    info!(target: "quintain_tester::runner", "{}", result.summary());
    result
}

/// Systematically test every playable class/subclass combination.
///
/// Classes whose subclass arrives after level 1 are additionally run without
/// a forced subclass. Per-combination seeds are `base + class_index * 100 +
/// subclass_index + 1` so runs stay reproducible and replayable.
pub fn run_systematic(
    service: &mut CharacterService,
    options: &BatchOptions,
) -> Result<Vec<LevelUpFlowResult>> {
    let mut classes: Vec<crate::api::ClassInfo> = service
        .list_classes()
        .into_iter()
        .filter(|class| class.playable)
        .collect();

    if let Some(filter) = &options.class_filter {
        classes.retain(|class| class.slug == *filter);
        if classes.is_empty() {
            bail!("class not found: {filter}");
        }
    }

    let mut results = Vec::new();
    let mut iteration = 1;

    for (class_index, class) in classes.iter().enumerate() {
        let mut subclasses = class.subclasses.clone();
        if let Some(filter) = &options.subclass_filter {
            subclasses.retain(|subclass| subclass.slug == *filter);
        }

        let class_seed_base = options.base_seed + (class_index as u64) * 100;

        if class.subclass_level != 1 && options.subclass_filter.is_none() {
            results.push(run_combination(
                service,
                options,
                &class.slug,
                None,
                class_seed_base,
                iteration,
            ));
            iteration += 1;
        }

        for (subclass_index, subclass) in subclasses.iter().enumerate() {
            results.push(run_combination(
                service,
                options,
                &class.slug,
                Some(&subclass.slug),
                class_seed_base + subclass_index as u64 + 1,
                iteration,
            ));
            iteration += 1;
        }
    }

    Ok(results)
}

/// Repeat fixture-plus-flow runs, one per iteration, with seeds derived from
/// the base seed.
pub fn run_iterations(
    service: &mut CharacterService,
    options: &BatchOptions,
) -> Vec<LevelUpFlowResult> {
    let mut results = Vec::new();
    for i in 1..=options.iterations {
        let seed = options.base_seed + u64::from(i) - 1;
        let mut randomizer = Randomizer::new(seed);
        let strategy = SelectionStrategy::default();

        let character_id = match build_test_character(
            service,
            &mut randomizer,
            options.force_class.as_deref(),
            &strategy,
        ) {
            Ok(id) => id,
            Err(err) => {
                let mut result = LevelUpFlowResult::new(i, seed, 0, "unknown");
                result.set_error(1, err.to_string());
                results.push(result);
                continue;
            }
        };

        let executor = FlowExecutor::new(options.flow_config(options.mode, None));
        let result = executor.execute(service, character_id, &mut randomizer, i);
        info!(target: "quintain_tester::runner", "{}", result.summary());
        results.push(result);
    }
    results
}

/// Delete the characters a batch created. Returns how many were removed.
pub fn cleanup_characters(
    service: &mut CharacterService,
    results: &[LevelUpFlowResult],
) -> usize {
    let mut deleted = 0;
    for result in results {
        if result.character_id == 0 {
            continue;
        }
        if service.delete_character(result.character_id).is_ok() {
            deleted += 1;
        }
    }
    deleted
}
