//! fairfit - Main Entry Point

use clap::Parser;
use fairfit::cli::{cmd_evaluate, cmd_models, cmd_optimize, Cli, Commands, OptimizeArgs};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fairfit=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate { data, target, protected, model, config } => {
            cmd_evaluate(&data, &target, &protected, &model, config.as_deref())?;
        }
        Commands::Optimize {
            data,
            target,
            protected,
            model,
            techniques,
            output_dir,
            config,
            continue_on_error,
            parallel,
            timeout_secs,
        } => {
            cmd_optimize(OptimizeArgs {
                data: &data,
                target: &target,
                protected: &protected,
                model: &model,
                techniques: techniques.as_deref(),
                output_dir: &output_dir,
                config: config.as_deref(),
                continue_on_error,
                parallel,
                timeout_secs,
            })?;
        }
        Commands::Models => cmd_models()?,
    }

    Ok(())
}
