mod api;
mod fixtures;
mod flow;
mod planner;
mod randomizer;
mod reports;
mod result;
mod runner;
mod snapshot;
mod strategy;
mod validator;

use std::fs::File;
use std::io::{stdout, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use rand::Rng;

use quintain_engine::{CharacterService, Ruleset};

use flow::FlowMode;
use runner::BatchOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Level the starting class straight to the target
    Linear,
    /// Random class advancement and opportunistic multiclassing
    Chaos,
    /// Multiclass adoptions follow a weighted realistic plan
    Realistic,
    /// Every class/subclass combination, one linear run each
    Systematic,
}

impl Mode {
    const fn flow_mode(self) -> FlowMode {
        match self {
            Mode::Chaos => FlowMode::Chaos,
            Mode::Realistic => FlowMode::Realistic,
            Mode::Linear | Mode::Systematic => FlowMode::Linear,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Mode::Linear => "linear",
            Mode::Chaos => "chaos",
            Mode::Realistic => "realistic",
            Mode::Systematic => "systematic",
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "quintain-tester", version)]
#[command(about = "Automated QA for Quintain character progression - level-up flow testing")]
struct Args {
    /// Run mode
    #[arg(long, value_enum, default_value_t = Mode::Linear)]
    mode: Mode,

    /// Number of iterations (linear/chaos/realistic modes)
    #[arg(long, default_value_t = 1)]
    iterations: u32,

    /// Target level to reach
    #[arg(long, default_value_t = 20)]
    target_level: u8,

    /// Random seed for reproducibility (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Force a specific starting class (e.g. fighter)
    #[arg(long)]
    force_class: Option<String>,

    /// Systematic mode: test only this base class
    #[arg(long)]
    class: Option<String>,

    /// Systematic mode: test only this subclass
    #[arg(long)]
    subclass: Option<String>,

    /// Percent chance per level to attempt multiclassing in chaos mode
    #[arg(long, default_value_t = 20)]
    multiclass_chance: u32,

    /// Path to a ruleset JSON file (built-in dataset when omitted)
    #[arg(long)]
    ruleset: Option<PathBuf>,

    /// Only show failures in the report body
    #[arg(long)]
    failures_only: bool,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["console", "json", "markdown"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Directory for persisted run reports
    #[arg(long, default_value = "target/level-up-reports")]
    reports_dir: PathBuf,

    /// List previous reports and exit
    #[arg(long)]
    list_reports: bool,

    /// Show a previous report by run id and exit
    #[arg(long)]
    show_report: Option<String>,

    /// Delete test characters after the run
    #[arg(long)]
    cleanup: bool,

    /// Verbose per-run output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list_reports {
        return list_reports(&args);
    }
    if let Some(run_id) = args.show_report.clone() {
        return show_report(&args, &run_id);
    }

    let seed = args
        .seed
        .unwrap_or_else(|| rand::thread_rng().gen_range(1..=999_999));
    let rules = load_ruleset(&args)?;

    announce_banner(&args, seed);

    let mut service = CharacterService::new(rules, seed);
    let batch = BatchOptions {
        target_level: args.target_level,
        base_seed: seed,
        iterations: args.iterations,
        mode: args.mode.flow_mode(),
        force_class: args.force_class.clone(),
        class_filter: args.class.clone(),
        subclass_filter: args.subclass.clone(),
        multiclass_chance: args.multiclass_chance,
        weights: planner::PlannerWeights::default(),
    };

    let results = match args.mode {
        Mode::Systematic => runner::run_systematic(&mut service, &batch)?,
        _ => runner::run_iterations(&mut service, &batch),
    };

    if args.verbose {
        for result in &results {
            println!("{}", result.summary());
        }
    }

    let options = reports::RunOptions {
        mode: args.mode.label().to_string(),
        target_level: args.target_level,
        iterations: args.iterations,
        force_class: args.force_class.clone(),
        class_filter: args.class.clone(),
        subclass_filter: args.subclass.clone(),
    };
    let report = reports::generate(results, seed, options);
    let saved_path = reports::save(&report, &args.reports_dir)?;

    let mut output_target = OutputTarget::new(args.output.clone())?;
    match args.report.as_str() {
        "json" => reports::write_json(output_target.writer(), &report)?,
        "markdown" => reports::write_markdown(output_target.writer(), &report)?,
        _ => reports::write_console(output_target.writer(), &report, args.failures_only)?,
    }
    output_target.flush_inner()?;

    println!();
    println!("Report saved to: {}", saved_path.display());

    if args.cleanup {
        let deleted = runner::cleanup_characters(&mut service, &report.results);
        println!("Deleted {deleted} test characters.");
    }

    if report.summary.failed > 0 || report.summary.errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn announce_banner(args: &Args, seed: u64) {
    println!("{}", "Quintain Level-Up Tester".bright_cyan().bold());
    println!("{}", "========================".cyan());
    println!("Mode: {}", args.mode.label());
    println!("Seed: {seed}");
    println!("Target Level: {}", args.target_level);
    if let Some(class) = &args.force_class {
        println!("Forced Class: {class}");
    }
    println!();
}

fn load_ruleset(args: &Args) -> Result<Ruleset> {
    match &args.ruleset {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ruleset::from_json(&json)
                .with_context(|| format!("failed to parse {}", path.display()))
        }
        None => Ok(Ruleset::builtin()),
    }
}

fn list_reports(args: &Args) -> Result<()> {
    let entries = reports::list(&args.reports_dir)?;
    if entries.is_empty() {
        println!("No reports found.");
        return Ok(());
    }
    println!(
        "{:<38} {:<26} {:>5} {:>6} {:>6} {:>9} {:>9}",
        "Run ID", "Timestamp", "Total", "Passed", "Failed", "Pass Rate", "Max Level"
    );
    for entry in entries {
        println!(
            "{:<38} {:<26} {:>5} {:>6} {:>6} {:>8}% {:>9}",
            entry.run_id,
            &entry.timestamp[..entry.timestamp.len().min(25)],
            entry.total,
            entry.passed,
            entry.failed,
            entry.pass_rate,
            entry.max_level
        );
    }
    Ok(())
}

fn show_report(args: &Args, run_id: &str) -> Result<()> {
    let report = reports::load(&args.reports_dir, run_id)?;
    let mut output_target = OutputTarget::new(args.output.clone())?;
    reports::write_console(output_target.writer(), &report, args.failures_only)?;
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(writer) => writer,
            Self::File(writer) => writer,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(writer) => writer.flush(),
            Self::File(writer) => writer.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_maps_to_flow_modes() {
        assert_eq!(Mode::Linear.flow_mode(), FlowMode::Linear);
        assert_eq!(Mode::Systematic.flow_mode(), FlowMode::Linear);
        assert_eq!(Mode::Chaos.flow_mode(), FlowMode::Chaos);
        assert_eq!(Mode::Realistic.flow_mode(), FlowMode::Realistic);
    }

    #[test]
    fn args_parse_with_defaults() {
        let args = Args::parse_from(["quintain-tester"]);
        assert_eq!(args.target_level, 20);
        assert_eq!(args.iterations, 1);
        assert_eq!(args.report, "console");
        assert!(!args.cleanup);
    }

    #[test]
    fn args_accept_systematic_filters() {
        let args = Args::parse_from([
            "quintain-tester",
            "--mode",
            "systematic",
            "--class",
            "fighter",
            "--subclass",
            "battle-master",
            "--target-level",
            "5",
            "--seed",
            "12345",
        ]);
        assert_eq!(args.mode, Mode::Systematic);
        assert_eq!(args.class.as_deref(), Some("fighter"));
        assert_eq!(args.subclass.as_deref(), Some("battle-master"));
        assert_eq!(args.seed, Some(12345));
    }

    #[test]
    fn output_target_writes_to_files() {
        let path = std::env::temp_dir().join("quintain-output-test.txt");
        let mut target = OutputTarget::new(Some(path.clone())).unwrap();
        writeln!(target.writer(), "ok").unwrap();
        target.flush_inner().unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("ok"));
    }
}
