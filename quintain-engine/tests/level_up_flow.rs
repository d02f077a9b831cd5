//! Full level-up flows driven through the public service API.

use std::collections::BTreeMap;

use quintain_engine::{
    AbilityScores, CharacterService, ChoiceOptions, ChoiceType, EngineError, NewCharacter,
    PendingChoice, ResolutionInput, Ruleset,
};

fn service() -> CharacterService {
    CharacterService::new(Ruleset::builtin(), 1337)
}

fn request(class_slug: &str) -> NewCharacter {
    NewCharacter {
        name: "Testling".to_string(),
        public_id: format!("test-{class_slug}"),
        race_slug: "hill-dwarf".to_string(),
        background_slug: "soldier".to_string(),
        class_slug: class_slug.to_string(),
        abilities: AbilityScores {
            strength: 15,
            dexterity: 13,
            constitution: 14,
            intelligence: 14,
            wisdom: 12,
            charisma: 8,
        },
    }
}

/// Deterministic stand-in for the automated harness: first-option picks,
/// average HP, +2 to the first uncapped ability.
fn build_input(
    service: &CharacterService,
    id: u64,
    choice: &PendingChoice,
) -> Option<ResolutionInput> {
    match choice.choice_type {
        ChoiceType::HitPoints => Some(ResolutionInput::one("average")),
        ChoiceType::EquipmentMode => Some(ResolutionInput::one("equipment")),
        ChoiceType::AsiOrFeat => {
            let target = choice
                .metadata
                .ability_scores
                .iter()
                .find(|score| score.current_value <= 18)?;
            let mut increases = BTreeMap::new();
            increases.insert(target.code.clone(), 2);
            Some(ResolutionInput::asi(increases))
        }
        _ => {
            let options = match &choice.options {
                ChoiceOptions::Inline(options) => options.clone(),
                ChoiceOptions::Remote { endpoint, params } => {
                    let mut params = params.clone();
                    if let Some(class_slug) = &choice.metadata.class_slug {
                        if !params.iter().any(|(key, _)| key == "class") {
                            params.push(("class".to_string(), class_slug.clone()));
                        }
                    }
                    service.fetch_options(id, endpoint, &params).ok()?
                }
            };
            let count = (choice.remaining as usize).min(options.len());
            if count == 0 {
                return None;
            }
            Some(ResolutionInput::select(
                options
                    .iter()
                    .take(count)
                    .filter_map(|option| option.pick_key().map(str::to_string)),
            ))
        }
    }
}

fn resolve_pending(service: &mut CharacterService, id: u64) {
    for _ in 0..20 {
        let pending: Vec<PendingChoice> = service
            .pending_choices(id)
            .unwrap()
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
            if let Some(input) = build_input(service, id, &choice) {
                let _ = service.resolve_choice(id, &choice.id, &input);
            }
        }
    }
}

#[test]
fn fighter_levels_one_to_six() {
    let mut service = service();
    let id = service.create_character(request("fighter")).unwrap();

    resolve_pending(&mut service, id);
    assert!(service.get_character(id).unwrap().is_complete);

    for target in 2..=6u8 {
        let before = service.get_character(id).unwrap();
        let outcome = service.level_up_class(id, None).unwrap();
        assert_eq!(outcome.new_level, target);

        resolve_pending(&mut service, id);
        let after = service.get_character(id).unwrap();

        assert_eq!(after.total_level, before.total_level + 1);
        assert_eq!(after.classes[0].level, before.classes[0].level + 1);
        assert!(
            after.max_hit_points > before.max_hit_points,
            "HP must rise once the hit-point choice is resolved"
        );
        assert!(after.is_complete);
    }

    // Subclass landed at level 3 and its features followed.
    let summary = service.get_character(id).unwrap();
    assert_eq!(summary.classes[0].subclass.as_deref(), Some("champion"));
    let features = service.features(id).unwrap();
    assert!(features.iter().any(|f| f.slug == "improved-critical"));
    assert!(features.iter().any(|f| f.slug == "extra-attack"));
}

#[test]
fn level_up_features_are_granted_exactly_once() {
    let mut service = service();
    let id = service.create_character(request("fighter")).unwrap();
    resolve_pending(&mut service, id);

    let outcome = service.level_up_class(id, None).unwrap();
    assert_eq!(
        outcome
            .features_gained
            .iter()
            .map(|f| f.slug.as_str())
            .collect::<Vec<_>>(),
        vec!["action-surge"]
    );

    let features = service.features(id).unwrap();
    let count = features.iter().filter(|f| f.slug == "action-surge").count();
    assert_eq!(count, 1);
}

#[test]
fn wizard_multiclass_gets_its_own_spell_choices() {
    let mut service = service();
    let id = service.create_character(request("fighter")).unwrap();
    resolve_pending(&mut service, id);
    service.level_up_class(id, None).unwrap();
    resolve_pending(&mut service, id);

    // INT 14 passes the wizard prerequisite (INT 13).
    service.add_class(id, "wizard", false).unwrap();
    let pending = service.pending_choices(id).unwrap();
    let wizard_spell_groups: Vec<&PendingChoice> = pending
        .iter()
        .filter(|choice| {
            choice.choice_type == ChoiceType::Spell
                && choice.metadata.class_slug.as_deref() == Some("wizard")
        })
        .collect();
    assert_eq!(wizard_spell_groups.len(), 2, "cantrips and leveled spells");

    resolve_pending(&mut service, id);
    let summary = service.get_character(id).unwrap();
    assert_eq!(summary.total_level, 3);
    assert!(summary.is_complete);

    // Equipment-mode and equipment never reappear for the adopted class.
    let pending = service.pending_choices(id).unwrap();
    assert!(pending
        .iter()
        .all(|choice| choice.choice_type != ChoiceType::EquipmentMode));
}

#[test]
fn prerequisite_failure_is_a_clean_expected_error() {
    let mut service = service();
    let mut req = request("fighter");
    req.abilities.wisdom = 8;
    let id = service.create_character(req).unwrap();
    resolve_pending(&mut service, id);

    let err = service.add_class(id, "cleric", false).unwrap_err();
    assert!(err.is_expected());
    // Forcing bypasses the gate.
    service.add_class(id, "cleric", true).unwrap();
    let summary = service.get_character(id).unwrap();
    assert_eq!(summary.classes.len(), 2);
    assert_eq!(summary.total_level, 2);
}

#[test]
fn leveling_stops_at_the_cap() {
    let mut service = service();
    let id = service.create_character(request("fighter")).unwrap();
    resolve_pending(&mut service, id);

    for _ in 2..=20u8 {
        service.level_up_class(id, None).unwrap();
        resolve_pending(&mut service, id);
    }
    let summary = service.get_character(id).unwrap();
    assert_eq!(summary.total_level, 20);

    let err = service.level_up_class(id, None).unwrap_err();
    assert!(matches!(err, EngineError::MaxLevelReached(20)));
}

#[test]
fn cleric_picks_subclass_at_level_one() {
    let mut service = service();
    let mut req = request("cleric");
    req.abilities.wisdom = 15;
    let id = service.create_character(req).unwrap();

    let pending = service.pending_choices(id).unwrap();
    assert!(pending
        .iter()
        .any(|choice| choice.choice_type == ChoiceType::Subclass && choice.remaining > 0));

    resolve_pending(&mut service, id);
    let summary = service.get_character(id).unwrap();
    assert!(summary.is_complete);
    assert_eq!(summary.classes[0].subclass.as_deref(), Some("life-domain"));
    let features = service.features(id).unwrap();
    assert!(features.iter().any(|f| f.slug == "disciple-of-life"));
}
