use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::autoplay::{run_battle, Autopilot};
use crate::combat::BattleEngine;
use crate::config::{EngineConfig, ENV_DATA, ENV_MAX_TURNS, ENV_SEED};
use crate::data::{load_game_data, validate_game_data_file, ValidationSeverity};
use crate::error::{ConfigError, ExitCode, TurnforgeError};
use crate::events::EventBus;
use crate::logging::{init_logging, LogFormat};
use crate::report::write_report_file;

/// Turn-based combat simulator.
#[derive(Parser, Debug)]
#[command(name = "turnforge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format on stderr.
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub log_format: LogFormatArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Human,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Human => Self::Human,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Auto-play a battle and print a JSON summary.
    Simulate(SimulateArgs),
    /// Check a game data file for authoring errors.
    Validate(DataArgs),
    /// Print the first turn's sorted timeline as JSON.
    Timeline(TimelineArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Game data file (YAML or JSON).
    #[arg(long, env = ENV_DATA)]
    pub data: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Level id; defaults to the first level in the data file.
    #[arg(long)]
    pub level: Option<String>,

    #[arg(long, env = ENV_SEED)]
    pub seed: Option<u64>,

    #[arg(long, env = ENV_MAX_TURNS)]
    pub max_turns: Option<u32>,

    /// Also write a per-action CSV report.
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Print one TSV line instead of JSON.
    #[arg(long)]
    pub table: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TimelineArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[arg(long)]
    pub level: Option<String>,
}

pub fn run_with_args(args: &[String]) -> i32 {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::USAGE_ERROR
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_logging(cli.log_format.into(), cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return ExitCode::ERROR;
        }
    };

    let result = match cli.command {
        Command::Simulate(args) => runtime.block_on(handle_simulate(args)),
        Command::Validate(args) => handle_validate(&args),
        Command::Timeline(args) => runtime.block_on(handle_timeline(args)),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}

fn base_config(data: &DataArgs) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    if let Some(path) = &data.data {
        config.data_path.clone_from(path);
    }
    config
}

/// Level defaults to the first one in the data file.
fn engine_for(config: &EngineConfig, level: Option<String>) -> Result<(BattleEngine, String), TurnforgeError> {
    let data = load_game_data(&config.data_path)?;
    let level = level
        .or_else(|| data.first_level_id().map(str::to_string))
        .ok_or_else(|| ConfigError::UnknownLevel("<none>".into()))?;
    Ok((BattleEngine::new(data, config, EventBus::new()), level))
}

async fn handle_simulate(args: SimulateArgs) -> Result<i32, TurnforgeError> {
    let mut config = base_config(&args.data);
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(max_turns) = args.max_turns {
        config.max_turns = max_turns;
    }

    let (mut engine, level) = engine_for(&config, args.level)?;
    let summary = run_battle(&mut engine, &level, config.max_turns, config.seed).await?;

    if let Some(path) = &args.csv {
        write_report_file(path, engine.report_rows())?;
    }

    if args.table {
        println!("level\tseed\tresult\tturns\tactions");
        println!(
            "{}\t{}\t{}\t{}\t{}",
            summary.level_id, summary.seed, summary.result, summary.turns, summary.actions
        );
    } else {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_validate(args: &DataArgs) -> Result<i32, TurnforgeError> {
    let config = base_config(args);
    let report = validate_game_data_file(&config.data_path)?;
    for diagnostic in &report.diagnostics {
        eprintln!("- {diagnostic}");
    }
    let path = config.data_path.display();
    if report.has_errors() {
        eprintln!(
            "validation failed: {path}: {} error(s), {} warning(s)",
            report.count(ValidationSeverity::Error),
            report.count(ValidationSeverity::Warning)
        );
        return Ok(ExitCode::CONFIG_ERROR);
    }
    println!(
        "validation passed: {path} ({} warning(s))",
        report.count(ValidationSeverity::Warning)
    );
    Ok(ExitCode::SUCCESS)
}

async fn handle_timeline(args: TimelineArgs) -> Result<i32, TurnforgeError> {
    let config = base_config(&args.data);
    let (mut engine, level) = engine_for(&config, args.level)?;
    engine.start_battle(&level)?;
    Autopilot.plan_turn(&mut engine);
    engine.commit_planning()?;
    println!("{}", serde_json::to_string_pretty(&engine.timeline_snapshot())?);
    Ok(ExitCode::SUCCESS)
}
