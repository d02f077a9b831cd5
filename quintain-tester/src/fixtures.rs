//! Seeded fixture characters.
//!
//! Builds a complete level-1 character the way a player would: random (or
//! forced) class, random race and background, standard-array scores, then
//! every level-1 required choice resolved through the normal resolution path.

use anyhow::{bail, Context, Result};

use quintain_engine::{AbilityScores, CharacterService, NewCharacter};

use crate::api::CharacterApi;
use crate::flow::resolve_all_pending_choices;
use crate::randomizer::Randomizer;
use crate::strategy::SelectionStrategy;

const STANDARD_ARRAY: [i32; 6] = [15, 14, 13, 12, 10, 8];

const NAME_PREFIXES: [&str; 26] = [
    "Ael", "Bal", "Cor", "Dar", "Eld", "Fen", "Gar", "Hal", "Ith", "Jar", "Kel", "Lor", "Mal",
    "Nor", "Orn", "Pel", "Quar", "Ren", "Sar", "Tor", "Und", "Val", "Wyr", "Xan", "Yel", "Zar",
];

const NAME_SUFFIXES: [&str; 20] = [
    "an", "en", "in", "on", "ar", "er", "ir", "or", "ak", "ek", "ik", "ok", "us", "is", "os",
    "ath", "eth", "ith", "oth", "uth",
];

const PUBLIC_ID_ADJECTIVES: [&str; 20] = [
    "brave", "swift", "bold", "wise", "dark", "silver", "golden", "iron", "shadow", "storm",
    "frost", "flame", "ancient", "mighty", "silent", "noble", "wild", "fierce", "cunning",
    "valiant",
];

const PUBLIC_ID_NOUNS: [&str; 20] = [
    "warrior", "mage", "hunter", "rogue", "knight", "sage", "wanderer", "guardian", "seeker",
    "warden", "blade", "arrow", "shield", "wolf", "dragon", "hawk", "raven", "phoenix", "titan",
    "oracle",
];

const SUFFIX_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn pick<'a>(items: &'a [&'a str], randomizer: &mut Randomizer) -> &'a str {
    items[randomizer.random_int(0, items.len() as i64 - 1) as usize]
}

/// Random character name in the `Torin` / `Keleth` mold.
pub fn random_name(randomizer: &mut Randomizer) -> String {
    format!(
        "{}{}",
        pick(&NAME_PREFIXES, randomizer),
        pick(&NAME_SUFFIXES, randomizer)
    )
}

/// Public id in `adjective-noun-4char` format, seeded for reproducibility.
pub fn random_public_id(randomizer: &mut Randomizer) -> String {
    let suffix: String = (0..4)
        .map(|_| {
            let index = randomizer.random_int(0, SUFFIX_CHARS.len() as i64 - 1) as usize;
            SUFFIX_CHARS[index] as char
        })
        .collect();
    format!(
        "{}-{}-{suffix}",
        pick(&PUBLIC_ID_ADJECTIVES, randomizer),
        pick(&PUBLIC_ID_NOUNS, randomizer)
    )
}

/// Shuffle the standard array onto the six scores.
pub fn random_ability_scores(randomizer: &mut Randomizer) -> AbilityScores {
    let mut values = STANDARD_ARRAY;
    randomizer.shuffle(&mut values);
    AbilityScores {
        strength: values[0],
        dexterity: values[1],
        constitution: values[2],
        intelligence: values[3],
        wisdom: values[4],
        charisma: values[5],
    }
}

/// Create a complete level-1 character and resolve its creation choices.
///
/// # Errors
///
/// Fails when creation is rejected or required choices remain unresolved
/// after the bounded resolution loop.
pub fn build_test_character(
    service: &mut CharacterService,
    randomizer: &mut Randomizer,
    force_class: Option<&str>,
    strategy: &SelectionStrategy,
) -> Result<u64> {
    let class_slug = match force_class {
        Some(slug) => slug.to_string(),
        None => {
            let playable: Vec<String> = service
                .rules()
                .playable_classes()
                .iter()
                .map(|class| class.slug.clone())
                .collect();
            if playable.is_empty() {
                bail!("ruleset has no playable classes");
            }
            playable[randomizer.random_int(0, playable.len() as i64 - 1) as usize].clone()
        }
    };

    let races: Vec<String> = service
        .rules()
        .races
        .iter()
        .map(|race| race.slug.clone())
        .collect();
    let backgrounds: Vec<String> = service
        .rules()
        .backgrounds
        .iter()
        .map(|background| background.slug.clone())
        .collect();
    if races.is_empty() || backgrounds.is_empty() {
        bail!("ruleset is missing races or backgrounds");
    }
    let race_slug = races[randomizer.random_int(0, races.len() as i64 - 1) as usize].clone();
    let background_slug =
        backgrounds[randomizer.random_int(0, backgrounds.len() as i64 - 1) as usize].clone();

    let request = NewCharacter {
        name: random_name(randomizer),
        public_id: random_public_id(randomizer),
        race_slug,
        background_slug,
        class_slug,
        abilities: random_ability_scores(randomizer),
    };
    let id = service
        .create_character(request)
        .context("fixture character creation failed")?;

    resolve_all_pending_choices(service, id, randomizer, strategy, 20);

    let summary = service.get_character(id)?;
    if !summary.is_complete {
        let unresolved: Vec<String> = service
            .pending_choices(id)?
            .into_iter()
            .filter(quintain_engine::PendingChoice::blocks_completion)
            .map(|choice| choice.choice_type.key().to_string())
            .collect();
        bail!(
            "fixture character {} is incomplete after resolution: {}",
            summary.public_id,
            unresolved.join(", ")
        );
    }
    Ok(id)
}
