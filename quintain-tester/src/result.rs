//! Step and flow results.
//!
//! Results are write-once, read-many: the executor appends steps as it goes
//! and the report layer consumes them afterwards.

use serde::{Deserialize, Serialize};

use crate::snapshot::DerivedFields;

/// Outcome of leveling one class by one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelUpStepResult {
    pub level: u8,
    pub class_slug: String,
    pub passed: bool,
    pub hp_gained: i32,
    pub features_gained: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<DerivedFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<DerivedFields>,
}

impl LevelUpStepResult {
    #[must_use]
    pub fn success(
        level: u8,
        class_slug: impl Into<String>,
        hp_gained: i32,
        features_gained: Vec<String>,
        warnings: Vec<String>,
        before: Option<DerivedFields>,
        after: Option<DerivedFields>,
    ) -> Self {
        Self {
            level,
            class_slug: class_slug.into(),
            passed: true,
            hp_gained,
            features_gained,
            errors: Vec::new(),
            warnings,
            pattern: None,
            before,
            after,
        }
    }

    #[must_use]
    pub fn failure(
        level: u8,
        class_slug: impl Into<String>,
        errors: Vec<String>,
        pattern: impl Into<String>,
        warnings: Vec<String>,
        before: Option<DerivedFields>,
        after: Option<DerivedFields>,
    ) -> Self {
        Self {
            level,
            class_slug: class_slug.into(),
            passed: false,
            hp_gained: 0,
            features_gained: Vec::new(),
            errors,
            warnings,
            pattern: Some(pattern.into()),
            before,
            after,
        }
    }
}

/// Overall status of a flow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Pass,
    Fail,
    Error,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pass => f.write_str("PASS"),
            RunStatus::Fail => f.write_str("FAIL"),
            RunStatus::Error => f.write_str("ERROR"),
        }
    }
}

/// Terminal error that aborted a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowError {
    pub at_level: u8,
    pub message: String,
}

/// Ordered record of one orchestration run, keyed by iteration and seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelUpFlowResult {
    pub iteration: u32,
    pub seed: u64,
    pub character_id: u64,
    pub public_id: String,
    /// Display label: the class/subclass combination or starting class.
    pub label: String,
    pub start_level: u8,
    pub steps: Vec<LevelUpStepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FlowError>,
}

impl LevelUpFlowResult {
    #[must_use]
    pub fn new(iteration: u32, seed: u64, character_id: u64, public_id: impl Into<String>) -> Self {
        Self {
            iteration,
            seed,
            character_id,
            public_id: public_id.into(),
            label: String::new(),
            start_level: 1,
            steps: Vec::new(),
            error: None,
        }
    }

    pub fn add_step(&mut self, step: LevelUpStepResult) {
        self.steps.push(step);
    }

    /// Record a terminal error; the run stops at this level.
    pub fn set_error(&mut self, at_level: u8, message: impl Into<String>) {
        self.error = Some(FlowError {
            at_level,
            message: message.into(),
        });
    }

    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.error.is_some()
    }

    #[must_use]
    pub fn is_passed(&self) -> bool {
        self.error.is_none() && self.steps.iter().all(|step| step.passed)
    }

    #[must_use]
    pub fn status(&self) -> RunStatus {
        if self.has_error() {
            RunStatus::Error
        } else if self.steps.iter().all(|step| step.passed) {
            RunStatus::Pass
        } else {
            RunStatus::Fail
        }
    }

    /// Highest level a passing step reached, or the starting level.
    #[must_use]
    pub fn final_level(&self) -> u8 {
        self.steps
            .iter()
            .filter(|step| step.passed)
            .map(|step| step.level)
            .max()
            .unwrap_or(self.start_level)
    }

    #[must_use]
    pub fn total_hp_gained(&self) -> i32 {
        self.steps.iter().map(|step| step.hp_gained).sum()
    }

    #[must_use]
    pub fn failures(&self) -> Vec<&LevelUpStepResult> {
        self.steps.iter().filter(|step| !step.passed).collect()
    }

    /// One-line human summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "[{}] {} (seed {}) level {} after {} step(s), {} HP gained",
            self.status(),
            if self.label.is_empty() {
                self.public_id.as_str()
            } else {
                self.label.as_str()
            },
            self.seed,
            self.final_level(),
            self.steps.len(),
            self.total_hp_gained()
        )
    }
}
