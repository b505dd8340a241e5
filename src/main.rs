use clap::error::ErrorKind as ClapErrorKind;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use yt_analyzer::cli::{Cli, Commands};
use yt_analyzer::{AnalyzerError, Config, Envelope, Pipeline};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let message = e.render().to_string();
            let err = anyhow::Error::new(AnalyzerError::Usage(message.trim().to_string()));
            return Envelope::failure(&err).emit();
        }
    };

    init_tracing(cli.verbose, cli.log_json);

    run(cli).await.emit()
}

/// Logs go to stderr; stdout carries only the envelope
fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose { "yt_analyzer=debug" } else { "yt_analyzer=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli) -> Envelope {
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config.with_overrides(cli.scratch_dir, cli.storage_dir),
        Err(e) => return Envelope::failure(&e),
    };

    let pipeline = match Pipeline::new(config, cli.quiet) {
        Ok(pipeline) => pipeline,
        Err(e) => return Envelope::failure(&e),
    };

    match cli.command {
        Commands::Download { input } => Envelope::from_result(&pipeline.download(&input).await),
        Commands::ExtractFrames { input, timestamps } => {
            Envelope::from_result(&pipeline.extract_frames(&input, &timestamps).await)
        }
        Commands::FetchTranscript { input } => {
            Envelope::from_result(&pipeline.fetch_transcript(&input).await)
        }
        Commands::CheckTools => Envelope::success(&pipeline.check_tools().await),
        Commands::Config => Envelope::success(pipeline.config()),
    }
}
