use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scene_timeline::commands;
use scene_timeline::config::{Coverage, Settings, TextSource};

/// Build gapless scene timelines from narration word timings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a timeline from word timings and scene proposals
    Build {
        /// Word timings JSON
        #[arg(long)]
        words: PathBuf,
        /// Scene proposals JSON ({"scenes": [...]})
        #[arg(long)]
        proposals: PathBuf,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum)]
        coverage: Option<Coverage>,
        #[arg(long, value_enum)]
        text_source: Option<TextSource>,
    },

    /// Ask the scene planner for proposals, then build the timeline
    Plan {
        /// Narration script
        #[arg(long)]
        script: PathBuf,
        /// Word timings JSON
        #[arg(long)]
        words: PathBuf,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify an existing timeline
    Check {
        #[arg(long)]
        timeline: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut settings = Settings::load_or_default(cli.settings.as_deref())?;

    match cli.command {
        Commands::Build {
            words,
            proposals,
            output,
            coverage,
            text_source,
        } => {
            if let Some(coverage) = coverage {
                settings.coverage = coverage;
            }
            if let Some(text_source) = text_source {
                settings.text_source = text_source;
            }
            let timeline = commands::build(&words, &proposals, &settings.timeline_config())?;
            commands::write_timeline(&timeline, output.as_deref())?;
        }
        Commands::Plan {
            script,
            words,
            output,
        } => {
            let timeline = commands::plan(&script, &words, &settings).await?;
            commands::write_timeline(&timeline, output.as_deref())?;
        }
        Commands::Check { timeline } => {
            let violations = commands::check(&timeline, &settings.timeline_config())?;
            if !violations.is_empty() {
                for violation in &violations {
                    eprintln!("{violation}");
                }
                return Ok(ExitCode::FAILURE);
            }
            println!("{} is valid", timeline.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}
