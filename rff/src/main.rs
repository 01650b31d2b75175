//! `rff`: solve a problem by reasoning backward from its goal.
//!
//! Prints the accepted answer on stdout. Exit codes are listed in
//! [`rff::exit_codes`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use rff::domains::game24::Game24Strategy;
use rff::domains::word_problem::WordProblemStrategy;
use rff::exit_codes;
use rff::io::config::{DEFAULT_CONFIG_FILE, RffConfig, SearchConfig, load_config, write_config};
use rff::io::generator::CommandGenerator;
use rff::io::trace::TraceWriter;
use rff::logging;
use rff::looping::{ExhaustedError, run_loop};
use rff::strategy::Strategy;

#[derive(Parser)]
#[command(
    name = "rff",
    version,
    about = "Reason-from-future search over a text-generation backend"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller on one problem.
    Solve {
        #[command(subcommand)]
        problem: Problem,
    },
    /// Manage the config file.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum Problem {
    /// Combine the numbers with + - * / into 24, using each exactly once.
    Game24 {
        /// Comma-separated input numbers, e.g. `1,2,5,9`.
        #[arg(long, value_delimiter = ',', required = true)]
        numbers: Vec<u64>,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Arithmetic word problem with a numeric answer.
    Word {
        #[arg(long)]
        question: String,
        /// Expected answer; required for verification unless `--no-gold`.
        #[arg(long)]
        gold: Option<f64>,
        #[command(flatten)]
        search: SearchArgs,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Config file; missing means defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    max_iterations: Option<u32>,
    #[arg(long)]
    min_iterations: Option<u32>,
    /// Accept a locally valid answer without global verification.
    #[arg(long)]
    no_gold: bool,
    /// Write one JSON line per iteration to this file.
    #[arg(long)]
    trace: Option<PathBuf>,
}

impl SearchArgs {
    fn load(&self) -> Result<RffConfig> {
        let mut config = load_config(&self.config)?;
        if let Some(max_iterations) = self.max_iterations {
            config.search.max_iterations = max_iterations;
        }
        if let Some(min_iterations) = self.min_iterations {
            config.search.min_iterations = min_iterations;
        }
        if self.no_gold {
            config.search.require_gold = false;
        }
        config.validate().context("validate command-line overrides")?;
        debug!(?config, "effective config");
        Ok(config)
    }
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write a config file with default values.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
        #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(()) => exit_codes::SOLVED,
        Err(err) => {
            eprintln!("{:#}", err);
            if err.downcast_ref::<ExhaustedError>().is_some() {
                exit_codes::EXHAUSTED
            } else {
                exit_codes::INVALID
            }
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Solve { problem } => cmd_solve(problem),
        Command::Config {
            command: ConfigCommand::Init { force, path },
        } => cmd_config_init(&path, force),
    }
}

fn cmd_solve(problem: Problem) -> Result<()> {
    match problem {
        Problem::Game24 { numbers, search } => {
            let config = search.load()?;
            let generator = CommandGenerator::from_config(&config.generator)?;
            let strategy = Game24Strategy::new(generator, numbers)?;
            solve(
                &strategy.problem(),
                &strategy,
                &config.search,
                search.trace.as_deref(),
            )
        }
        Problem::Word {
            question,
            gold,
            search,
        } => {
            let config = search.load()?;
            let generator = CommandGenerator::from_config(&config.generator)?;
            let strategy = WordProblemStrategy::new(generator, question.as_str(), gold)?;
            solve(&question, &strategy, &config.search, search.trace.as_deref())
        }
    }
}

fn solve<S: Strategy>(
    problem: &str,
    strategy: &S,
    config: &SearchConfig,
    trace: Option<&Path>,
) -> Result<()> {
    let mut writer = trace.map(TraceWriter::create).transpose()?;
    let mut trace_error = None;
    let result = run_loop(problem, strategy, config, |step| {
        if let Some(writer) = writer.as_mut()
            && trace_error.is_none()
            && let Err(err) = writer.append(step)
        {
            trace_error = Some(err);
        }
    });
    let solution = result?;
    if let Some(err) = trace_error {
        return Err(err);
    }
    println!("{}", solution.answer);
    Ok(())
}

fn cmd_config_init(path: &Path, force: bool) -> Result<()> {
    if !force && path.exists() {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &RffConfig::default())?;
    println!("{}", path.display());
    Ok(())
}
