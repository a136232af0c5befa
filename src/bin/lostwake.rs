//! Lost-wakeup reproduction harness entry point.
//!
//! Forks one harness instance per CPU, drives each through the scripted
//! race rounds, and reports a single verdict: exit 0 when every round on
//! every replica saw its readiness notification, 1 (or a fatal-signal
//! code) when a wakeup was lost, and 3 when the kernel cannot run the
//! measurement at all.

use clap::{ArgAction, Parser};
use lostwake::config::{HarnessConfig, DEFAULT_ROUNDS};
use lostwake::exit::ExitCode;
use lostwake::replicate::replicate;
use lostwake::reservoir::ByteReservoir;
use lostwake::{aggregate, worker, Error};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "lostwake", version, about = "Deterministic lost-wakeup race reproducer")]
struct Cli {
    /// Race rounds to drive per replica
    #[arg(long, default_value_t = DEFAULT_ROUNDS)]
    rounds: u32,

    /// Per-round readiness wait budget in milliseconds
    #[arg(long = "timeout-ms", default_value_t = 5000)]
    timeout_ms: u64,

    /// Replicas to fork (default: one per CPU)
    #[arg(long)]
    workers: Option<usize>,

    /// Run a single instance in this process instead of forking
    #[arg(long, action = ArgAction::SetTrue)]
    foreground: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbosity {
        0 => "lostwake=info",
        1 => "lostwake=debug",
        _ => "lostwake=trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // All outcomes funnel through here; nothing else in the parent calls
    // process::exit.
    let code = run(&cli);
    std::process::exit(code);
}

fn run(cli: &Cli) -> i32 {
    let config = HarnessConfig::default()
        .rounds(cli.rounds)
        .wait_timeout(Duration::from_millis(cli.timeout_ms))
        .workers(cli.workers);
    if let Err(err) = config.validate() {
        tracing::error!(error = %err, "invalid configuration");
        return ExitCode::FAILURE;
    }

    // The reservoir outlives every replica: children inherit the path and
    // exit without unwinding, so only this process deletes the file.
    let reservoir = match ByteReservoir::create() {
        Ok(reservoir) => reservoir,
        Err(err) => {
            tracing::error!(error = %err, "setting up byte reservoir");
            return err.exit_code();
        }
    };

    if cli.foreground {
        return worker::run_to_exit_code(&config, reservoir.path());
    }

    let workers = config.effective_workers();
    tracing::info!(workers, rounds = config.rounds, "replicating harness instances");
    let exits = match replicate(workers, |index| {
        let _span = tracing::info_span!("replica", index).entered();
        worker::run_to_exit_code(&config, reservoir.path())
    }) {
        Ok(exits) => exits,
        Err(err) => {
            let err = Error::from(err);
            tracing::error!(error = %err, "replication failed");
            return err.exit_code();
        }
    };

    for exit in &exits {
        let code = exit.status.code();
        if !ExitCode::is_success(code) && !ExitCode::is_skip(code) {
            tracing::warn!(pid = exit.pid, status = %exit.status, "replica failed");
        }
    }

    let summary = aggregate::summarize(&exits);
    let code = summary.exit_code();
    tracing::info!(
        total = summary.total,
        succeeded = summary.succeeded,
        skipped = summary.skipped,
        verdict = ExitCode::description(code),
        "run complete"
    );
    code
}
