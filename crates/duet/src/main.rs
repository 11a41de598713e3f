// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use duet::config::Config;

#[derive(Parser)]
#[command(name = "duet", version, about = "AI-assisted terminal: one shell, two writers.")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    subcommand: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Validate or run a workflow file.
    Flow {
        #[command(subcommand)]
        command: FlowCommands,
    },
    /// Gather an environment snapshot and print it as JSON.
    Probe,
    /// Classify an utterance and print the response plan.
    Classify { utterance: String },
}

#[derive(clap::Subcommand)]
enum FlowCommands {
    /// Structural validation only.
    Validate { file: PathBuf },
    /// Execute with the process executor and print the record.
    Run { file: PathBuf },
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    if config.log_format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = cli.config;

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }
    init_tracing(&config);

    // LLM providers are wired by the embedding application; the CLI runs
    // with the capability unbound and degrades accordingly.
    let llm: Option<duet::llm::SharedLlm> = None;

    let outcome = match cli.subcommand {
        Some(Commands::Flow { command: FlowCommands::Validate { file } }) => {
            duet::run::flow_validate(&file).map(|()| 0)
        }
        Some(Commands::Flow { command: FlowCommands::Run { file } }) => {
            duet::run::flow_run(&config, &file, llm).await
        }
        Some(Commands::Probe) => duet::run::probe_snapshot(&config).await.map(|()| 0),
        Some(Commands::Classify { utterance }) => {
            duet::run::classify(&config, &utterance, llm).await.map(|()| 0)
        }
        None => duet::run::interactive(config).await,
    };

    match outcome {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("fatal: {e:#}");
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
