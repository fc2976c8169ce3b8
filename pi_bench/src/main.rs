use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use pi_bench::cli::{self, RunArgs};
use pi_bench::config::FRAME_INTERVAL;
use pi_bench::{run_frames, Reporter, RunController};

#[derive(Parser)]
#[command(name = "pi_bench")]
#[command(about = "Monte Carlo pi benchmark, one OS thread per worker")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::init_tracing(cli.run.log_level);

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Release))?;

    let config = cli.run.to_config();
    cli::print_header(&config);

    let mut controller = RunController::threaded();
    controller.start(config)?;
    let mut reporter = Reporter::new();

    // The main thread doubles as the foreground sampling context.
    let outcome = run_frames(
        &mut controller,
        &mut reporter,
        FRAME_INTERVAL,
        &shutdown,
        |report| {
            print!("\r{}", cli::status_line(&report.snapshot));
            let _ = io::stdout().flush();
        },
    );
    println!();

    cli::print_summary(&outcome.into_summary(controller.config().worker_count));
    Ok(())
}
