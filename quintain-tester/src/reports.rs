//! Report generation and persistence.
//!
//! Reports round-trip: saved as JSON keyed by run id, loadable and listable
//! by the CLI later. Console and markdown renderers work over any writer so
//! output can be redirected to a file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::result::{LevelUpFlowResult, RunStatus};

/// Echo of the options a batch ran with, persisted for reproducibility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    pub mode: String,
    pub target_level: u8,
    pub iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subclass_filter: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelStats {
    pub max_reached: u8,
    pub avg_reached: f64,
    pub total_levels_gained: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterUsed {
    pub id: u64,
    pub public_id: String,
    pub status: RunStatus,
    pub final_level: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub failure_patterns: BTreeMap<String, u32>,
    pub characters_used: Vec<CharacterUsed>,
    pub level_stats: LevelStats,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: String,
    pub timestamp: String,
    pub seed: u64,
    pub options: RunOptions,
    pub iterations: usize,
    pub results: Vec<LevelUpFlowResult>,
    pub summary: ReportSummary,
}

/// Condensed row for report listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportIndexEntry {
    pub run_id: String,
    pub timestamp: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub max_level: u8,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Aggregate a result set into a persisted report.
#[must_use]
pub fn generate(results: Vec<LevelUpFlowResult>, seed: u64, options: RunOptions) -> Report {
    let mut summary = ReportSummary {
        total: results.len(),
        ..ReportSummary::default()
    };

    let mut levels_reached = Vec::new();
    for result in &results {
        summary.characters_used.push(CharacterUsed {
            id: result.character_id,
            public_id: result.public_id.clone(),
            status: result.status(),
            final_level: result.final_level(),
        });
        levels_reached.push(result.final_level());
        summary.level_stats.total_levels_gained += result.steps.len();

        match result.status() {
            RunStatus::Pass => summary.passed += 1,
            RunStatus::Error => summary.errors += 1,
            RunStatus::Fail => {
                summary.failed += 1;
                for step in result.failures() {
                    let pattern = step
                        .pattern
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string());
                    *summary.failure_patterns.entry(pattern).or_insert(0) += 1;
                }
            }
        }
    }

    if !levels_reached.is_empty() {
        summary.level_stats.max_reached = levels_reached.iter().copied().max().unwrap_or(0);
        summary.level_stats.avg_reached = round1(
            f64::from(levels_reached.iter().map(|level| u32::from(*level)).sum::<u32>())
                / levels_reached.len() as f64,
        );
    }
    summary.pass_rate = if summary.total > 0 {
        round1((summary.passed as f64 / summary.total as f64) * 100.0)
    } else {
        0.0
    };

    Report {
        run_id: uuid::Uuid::new_v4().to_string(),
        timestamp: chrono::Local::now().to_rfc3339(),
        seed,
        options,
        iterations: results.len(),
        results,
        summary,
    }
}

/// Persist a report under the reports directory as `{run_id}.json`.
pub fn save(report: &Report, directory: &Path) -> Result<PathBuf> {
    fs::create_dir_all(directory)
        .with_context(|| format!("failed to create {}", directory.display()))?;
    let path = directory.join(format!("{}.json", report.run_id));
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

pub fn load(directory: &Path, run_id: &str) -> Result<Report> {
    let path = directory.join(format!("{run_id}.json"));
    let json =
        fs::read_to_string(&path).with_context(|| format!("report not found: {run_id}"))?;
    serde_json::from_str(&json).with_context(|| format!("malformed report: {run_id}"))
}

/// All saved reports, newest first.
pub fn list(directory: &Path) -> Result<Vec<ReportIndexEntry>> {
    let mut entries = Vec::new();
    let Ok(dir) = fs::read_dir(directory) else {
        return Ok(entries);
    };
    for entry in dir.flatten() {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let Ok(json) = fs::read_to_string(&path) else {
            continue;
        };
        let Ok(report) = serde_json::from_str::<Report>(&json) else {
            continue;
        };
        entries.push(ReportIndexEntry {
            run_id: report.run_id,
            timestamp: report.timestamp,
            total: report.summary.total,
            passed: report.summary.passed,
            failed: report.summary.failed,
            pass_rate: report.summary.pass_rate,
            max_level: report.summary.level_stats.max_reached,
        });
    }
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(entries)
}

/// Console-friendly summary with colored pass/fail markers.
pub fn write_console(
    writer: &mut dyn Write,
    report: &Report,
    failures_only: bool,
) -> std::io::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{}", "Level-Up Flow Results".bright_cyan().bold())?;
    writeln!(writer, "{}", "=====================".cyan())?;
    writeln!(writer, "Run ID: {}", report.run_id)?;
    writeln!(writer, "Seed: {}", report.seed)?;
    writeln!(writer)?;
    writeln!(writer, "Total:   {}", report.summary.total)?;
    writeln!(
        writer,
        "Passed:  {} ({}%)",
        report.summary.passed.to_string().green(),
        report.summary.pass_rate
    )?;
    writeln!(writer, "Failed:  {}", report.summary.failed.to_string().red())?;
    writeln!(writer, "Errors:  {}", report.summary.errors.to_string().yellow())?;

    writeln!(writer)?;
    writeln!(writer, "{}", "Level Stats".bright_yellow().bold())?;
    writeln!(writer, "Max level reached:   {}", report.summary.level_stats.max_reached)?;
    writeln!(writer, "Avg level reached:   {}", report.summary.level_stats.avg_reached)?;
    writeln!(
        writer,
        "Total levels gained: {}",
        report.summary.level_stats.total_levels_gained
    )?;

    if !report.summary.failure_patterns.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "{}", "Failure Patterns".bright_red().bold())?;
        for (pattern, count) in &report.summary.failure_patterns {
            writeln!(writer, "  {pattern}: {count}")?;
        }
    }

    writeln!(writer)?;
    for result in &report.results {
        let status = result.status();
        if failures_only && status == RunStatus::Pass {
            continue;
        }
        let marker = match status {
            RunStatus::Pass => "PASS".green(),
            RunStatus::Fail => "FAIL".red(),
            RunStatus::Error => "ERROR".yellow(),
        };
        writeln!(
            writer,
            "[{marker}] {} (L{})",
            if result.label.is_empty() {
                result.public_id.as_str()
            } else {
                result.label.as_str()
            },
            result.final_level()
        )?;
        for step in result.failures() {
            for error in &step.errors {
                writeln!(writer, "    - Level {}: {}", step.level, error.red())?;
            }
        }
        if let Some(error) = &result.error {
            writeln!(
                writer,
                "    - Error at level {}: {}",
                error.at_level,
                error.message.yellow()
            )?;
        }
    }
    Ok(())
}

pub fn write_markdown(writer: &mut dyn Write, report: &Report) -> std::io::Result<()> {
    writeln!(writer, "# Level-Up Flow Results\n")?;
    writeln!(writer, "- **Run ID**: {}", report.run_id)?;
    writeln!(writer, "- **Seed**: {}", report.seed)?;
    writeln!(writer, "- **Total**: {}", report.summary.total)?;
    writeln!(writer, "- **Passed**: {}", report.summary.passed)?;
    writeln!(writer, "- **Failed**: {}", report.summary.failed)?;
    writeln!(writer, "- **Errors**: {}", report.summary.errors)?;
    writeln!(writer, "- **Pass rate**: {}%\n", report.summary.pass_rate)?;

    if !report.summary.failure_patterns.is_empty() {
        writeln!(writer, "## Failure Patterns\n")?;
        for (pattern, count) in &report.summary.failure_patterns {
            writeln!(writer, "- `{pattern}`: {count}")?;
        }
        writeln!(writer)?;
    }

    writeln!(writer, "## Results\n")?;
    for result in &report.results {
        let marker = match result.status() {
            RunStatus::Pass => "✅",
            RunStatus::Fail => "❌",
            RunStatus::Error => "⚠️",
        };
        writeln!(
            writer,
            "### {marker} {} (level {})\n",
            if result.label.is_empty() {
                result.public_id.as_str()
            } else {
                result.label.as_str()
            },
            result.final_level()
        )?;
        writeln!(writer, "- Seed: {}", result.seed)?;
        writeln!(writer, "- Steps: {}", result.steps.len())?;
        writeln!(writer, "- HP gained: {}", result.total_hp_gained())?;
        for step in result.failures() {
            for error in &step.errors {
                writeln!(writer, "- Level {}: {}", step.level, error)?;
            }
        }
        if let Some(error) = &result.error {
            writeln!(writer, "- Error at level {}: {}", error.at_level, error.message)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

pub fn write_json(writer: &mut dyn Write, report: &Report) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    writeln!(writer, "{json}")?;
    Ok(())
}
