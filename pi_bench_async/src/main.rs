use std::io::{self, Write};

use anyhow::Result;
use clap::Parser;
use pi_bench::cli::{self, RunArgs};
use pi_bench::config::FRAME_INTERVAL;
use pi_bench::{Reporter, RunController};
use pi_bench_async::{drive, TokioSpawner};
use tokio::signal;

#[derive(Parser)]
#[command(name = "pi_bench_async")]
#[command(about = "Monte Carlo pi benchmark, one tokio task per worker")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::init_tracing(cli.run.log_level);

    let config = cli.run.to_config();
    cli::print_header(&config);

    let mut controller = RunController::new(Box::new(TokioSpawner::current()));
    controller.start(config)?;
    let mut reporter = Reporter::new();

    let shutdown = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(%error, "unable to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let outcome = drive(
        &mut controller,
        &mut reporter,
        FRAME_INTERVAL,
        shutdown,
        |report| {
            print!("\r{}", cli::status_line(&report.snapshot));
            let _ = io::stdout().flush();
        },
    )
    .await;
    println!();

    cli::print_summary(&outcome.into_summary(controller.config().worker_count));
    Ok(())
}
