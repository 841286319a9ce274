//! attrgate command line.
//!
//! Checks authorization policy documents and traces the decision the filter
//! would take for a recorded request.
//!
//! # Quick Start
//!
//! ```bash
//! # Validate a policy document
//! attrgate check policy.toml
//!
//! # Trace the decision for one request
//! attrgate evaluate --policy policy.toml --request request.json
//!
//! # Show effective settings (attrgate.toml, ATTRGATE_* overrides)
//! attrgate config show
//! ```

mod commands;
mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use attrgate_config::{AttrgateConfig, ConfigLoader, LogFormat, LoggingConfig};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Exit status of `evaluate --fail-on-deny` for a rejected request.
const EXIT_DENIED: u8 = 2;

/// attrgate - attribute-based authorization for SSO pipelines.
#[derive(Parser)]
#[command(name = "attrgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding attrgate.toml.
    #[arg(short = 'C', long, global = true, default_value = ".")]
    project: PathBuf,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Compile a policy document and summarize its scopes.
    Check {
        /// Policy document (defaults to policy.file from settings).
        policy: Option<PathBuf>,
    },

    /// Decide a recorded request against a policy.
    Evaluate {
        /// Policy document (defaults to policy.file from settings).
        #[arg(short, long)]
        policy: Option<PathBuf>,

        /// Request context as JSON.
        #[arg(short, long)]
        request: PathBuf,

        /// Language the rejection text is picked for.
        #[arg(short, long)]
        language: Option<String>,

        /// Exit with status 2 when the request is rejected.
        #[arg(long)]
        fail_on_deny: bool,

        /// Output format (text, json).
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Settings management commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show effective settings.
    Show {
        /// Output format (text, json, toml).
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    style::set_no_color(cli.no_color);

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check { policy } => {
            let settings = load_settings(&cli.project)?;
            commands::check::run(&policy_path(policy, &settings))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Evaluate {
            policy,
            request,
            language,
            fail_on_deny,
            format,
        } => {
            let settings = load_settings(&cli.project)?;
            let passed = commands::evaluate::run(
                &settings,
                &commands::evaluate::EvaluateArgs {
                    policy: &policy_path(policy, &settings),
                    request: &request,
                    language: language.as_deref(),
                    format: &format,
                },
            )?;
            if !passed && fail_on_deny {
                return Ok(ExitCode::from(EXIT_DENIED));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config(ConfigCommands::Show { format }) => {
            let settings = load_settings(&cli.project)?;
            commands::config::show(&settings, &format)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Loads layered settings and installs the subscriber they describe.
fn load_settings(project: &Path) -> Result<AttrgateConfig> {
    let settings = ConfigLoader::new()
        .with_project_dir(project)
        .load()
        .with_context(|| format!("Failed to load settings from {}", project.display()))?;
    init_logging(&settings.logging);
    Ok(settings)
}

/// Explicit path wins; otherwise the (already resolved) settings path.
fn policy_path(arg: Option<PathBuf>, settings: &AttrgateConfig) -> PathBuf {
    arg.unwrap_or_else(|| settings.policy.file.clone())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
