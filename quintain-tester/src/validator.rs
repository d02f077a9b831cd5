//! Level-up invariants.
//!
//! Validation is a pure function of two snapshots; failures are returned as
//! structured results with a pattern tag, never thrown, so a full run can
//! still produce a complete trace.

use crate::snapshot::Snapshot;

pub const HP_PENDING_WARNING: &str = "HP choice pending - HP not yet increased";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub pattern: Option<String>,
}

impl ValidationOutcome {
    fn pass() -> Self {
        Self {
            passed: true,
            ..Self::default()
        }
    }

    fn record_error(&mut self, error: String, pattern: &str) {
        self.passed = false;
        self.errors.push(error);
        if self.pattern.is_none() {
            self.pattern = Some(pattern.to_string());
        }
    }

    /// Fold another outcome into this one, keeping the first pattern.
    pub fn merge(&mut self, other: ValidationOutcome) {
        if !other.passed {
            self.passed = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        if self.pattern.is_none() {
            self.pattern = other.pattern;
        }
    }
}

/// Check the invariants of one level-up step.
#[must_use]
pub fn validate_level_up(
    before: &Snapshot,
    after: &Snapshot,
    class_slug: &str,
    expected_total_level: u8,
) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::pass();

    if after.derived.total_level != expected_total_level {
        outcome.record_error(
            format!(
                "total level is {} but expected {expected_total_level}",
                after.derived.total_level
            ),
            "level_not_incremented",
        );
    }

    let class_before = before
        .derived
        .class_levels
        .get(class_slug)
        .copied()
        .unwrap_or(0);
    let class_after = after
        .derived
        .class_levels
        .get(class_slug)
        .copied()
        .unwrap_or(0);
    if class_after != class_before + 1 {
        outcome.record_error(
            format!("{class_slug} level is {class_after} but expected {}", class_before + 1),
            &format!("class_level_mismatch:{class_slug}"),
        );
    }

    if after.derived.max_hp <= before.derived.max_hp {
        if after.derived.has_pending_hp_choice {
            // The gain is deferred to a pending hit-point choice.
            outcome.warnings.push(HP_PENDING_WARNING.to_string());
        } else {
            outcome.record_error(
                format!(
                    "max HP did not increase ({} -> {})",
                    before.derived.max_hp, after.derived.max_hp
                ),
                "hp_not_increased",
            );
        }
    }

    outcome
}

/// Any required choice with selections outstanding is an orphan.
#[must_use]
pub fn validate_no_orphaned_choices(snapshot: &Snapshot) -> ValidationOutcome {
    let orphaned: Vec<String> = snapshot
        .pending_choices
        .iter()
        .filter(|choice| choice.required && choice.remaining > 0)
        .map(|choice| choice.choice_type.key().to_string())
        .collect();

    let mut outcome = ValidationOutcome::pass();
    if !orphaned.is_empty() {
        outcome.record_error(
            format!("orphaned required choices: {}", orphaned.join(", ")),
            "orphaned_choices",
        );
    }
    outcome
}
