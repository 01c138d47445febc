//! smtsmith CLI - drive the fuzzing engine from the command line.

use clap::Parser;
use serde::Serialize;
use smtsmith_core::fsm::{Fsm, FsmConfig};
use smtsmith_core::mgr::ManagerConfig;
use smtsmith_core::rng::SeedGenerator;
use smtsmith_core::solver::mock::{default_options, MockSolver};
use smtsmith_core::theory::Theory;
use smtsmith_core::trace::TraceWriter;
use smtsmith_core::FuzzerError;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Model-based fuzzer for SMT solvers.
#[derive(Debug, Parser)]
#[command(name = "smtsmith", version, about)]
struct Args {
    /// Seed for the random generator.
    #[arg(short, long, default_value_t = 0)]
    seed: u32,

    /// Maximum number of successful actions per run.
    #[arg(short = 'n', long, default_value_t = 1000)]
    max_steps: u64,

    /// Comma-separated theories to enable (default: all supported).
    #[arg(short, long, value_delimiter = ',')]
    theories: Vec<String>,

    /// Restrict arithmetic to linear operators.
    #[arg(long)]
    linear: bool,

    /// Accept Real sorts where Int is expected.
    #[arg(long)]
    arith_subtyping: bool,

    /// Emit random SMT-LIB symbols instead of `_x{n}` counters.
    #[arg(long)]
    random_symbols: bool,

    /// Write the trace to this file (default: stdout).
    #[arg(short = 'o', long)]
    trace: Option<PathBuf>,

    /// Replay the given trace file instead of generating.
    #[arg(short, long, conflicts_with = "runs")]
    untrace: Option<PathBuf>,

    /// Number of consecutive runs with derived seeds (0 = single run).
    #[arg(long, default_value_t = 0)]
    runs: u32,

    /// Print run statistics as JSON to stderr.
    #[arg(long)]
    stats_json: bool,

    /// Increase verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    seed: u32,
    steps: u64,
    stats: &'a smtsmith_core::Statistics,
}

fn parse_theories(args: &Args) -> Result<Vec<Theory>, String> {
    if args.theories.is_empty() {
        return Ok(Theory::ALL.to_vec());
    }
    let mut theories = Vec::new();
    for name in &args.theories {
        let t = Theory::from_str_opt(name).ok_or_else(|| format!("unknown theory '{name}'"))?;
        theories.push(t);
    }
    if !theories.contains(&Theory::Bool) {
        theories.push(Theory::Bool);
    }
    Ok(theories)
}

fn trace_writer(args: &Args) -> io::Result<TraceWriter> {
    Ok(match &args.trace {
        Some(path) => TraceWriter::new(Box::new(File::create(path)?)),
        None => TraceWriter::new(Box::new(io::stdout())),
    })
}

fn fsm_config(args: &Args, seed: u32, theories: Vec<Theory>) -> FsmConfig {
    FsmConfig {
        seed,
        max_steps: args.max_steps,
        manager: ManagerConfig {
            theories,
            linear_arith: args.linear,
            arith_subtyping: args.arith_subtyping,
            simple_symbols: !args.random_symbols,
        },
    }
}

fn report(args: &Args, seed: u32, fsm: &Fsm) {
    if args.stats_json {
        let summary = RunSummary {
            seed,
            steps: fsm.stats().steps,
            stats: fsm.stats(),
        };
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => {
                let _ = writeln!(io::stderr(), "{json}");
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize statistics"),
        }
    }
}

fn run_once(args: &Args, seed: u32, trace: TraceWriter) -> Result<(), FuzzerError> {
    let theories = parse_theories(args).map_err(FuzzerError::Config)?;
    let config = fsm_config(args, seed, theories);
    let mut fsm = Fsm::new(Box::new(MockSolver::new()), config, default_options(), trace)?;
    fsm.run()?;
    tracing::info!(seed, steps = fsm.stats().steps, "run complete");
    report(args, seed, &fsm);
    Ok(())
}

fn replay(args: &Args, path: &PathBuf) -> Result<(), FuzzerError> {
    let theories = parse_theories(args).map_err(FuzzerError::Config)?;
    let config = fsm_config(args, args.seed, theories);
    let trace = trace_writer(args)?;
    let mut fsm = Fsm::new(Box::new(MockSolver::new()), config, default_options(), trace)?;
    let mut reader = BufReader::new(File::open(path)?);
    fsm.untrace(&mut reader)?;
    tracing::info!(file = %path.display(), "replay complete");
    report(args, args.seed, &fsm);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("smtsmith: failed to set tracing subscriber: {e}");
    }

    let result = if let Some(path) = &args.untrace {
        replay(&args, path)
    } else if args.runs > 0 {
        let mut seeds = SeedGenerator::new(args.seed);
        let mut result = Ok(());
        for _ in 0..args.runs {
            let seed = seeds.next_seed();
            result = run_once(&args, seed, TraceWriter::sink());
            if result.is_err() {
                break;
            }
        }
        result
    } else {
        match trace_writer(&args) {
            Ok(trace) => run_once(&args, args.seed, trace),
            Err(e) => Err(e.into()),
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_bug_candidate() => {
            eprintln!("smtsmith: bug candidate: {e}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("smtsmith: error: {e}");
            ExitCode::FAILURE
        }
    }
}
