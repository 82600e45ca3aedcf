//! evalkit - Main Entry Point

use clap::Parser;
use evalkit::cli::{cmd_benchmark, cmd_info, cmd_tune, Cli, Commands};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evalkit=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Benchmark { task, run, learners, output } => {
            cmd_benchmark(&task, &run, &learners, output.as_deref())?;
        }
        Commands::Tune { task, run, learner, trials, space, output } => {
            cmd_tune(&task, &run, &learner, trials, space.as_deref(), output.as_deref())?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
    }

    Ok(())
}
