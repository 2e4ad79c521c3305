//! `rucam`: RUCAM causality assessment for drug-induced liver injury case
//! reports.
//!
//! Usage:
//!   rucam run case.pdf --output-dir reports/ --arbiter-beta
//!   rucam bundle case.pdf
//!   rucam validate arbiter-alpha_report.md
//!   rucam route deepseek-reasoner

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rucam_cli::{
    apply_options, bundle_json, describe_endpoint, http_client, load_config, read_input, run_case,
    validate_text, RunOptions,
};
use rucam_contracts::error::{RucamError, RucamResult};

// ── CLI definition ────────────────────────────────────────────────────────────

/// RUCAM causality assessment pipeline.
///
/// Ingests a case report PDF into a canonical evidence bundle, runs
/// independent analyst models over it, and reconciles their reports with
/// one or more arbiter models.
#[derive(Parser)]
#[command(
    name = "rucam",
    about = "RUCAM causality assessment for DILI case reports",
    long_about = "Builds a case bundle from a PDF, runs analyst models with the production\n\
                  instructions, and reconciles their reports into a validated RUCAM verdict."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline and print the final report.
    Run {
        /// Case report PDF.
        pdf: PathBuf,
        /// Instruction template to use instead of the embedded one.
        #[arg(long)]
        prompt_path: Option<PathBuf>,
        /// Directory for per-stage markdown reports and the stage trail.
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Enable Arbiter Beta.
        #[arg(long)]
        arbiter_beta: bool,
        /// Enable Arbiter Gamma.
        #[arg(long)]
        arbiter_gamma: bool,
        /// TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Run analysts (and then arbiters) concurrently.
        #[arg(long)]
        parallel: bool,
    },
    /// Print the canonical case bundle JSON.
    Bundle {
        pdf: PathBuf,
    },
    /// Validate a verdict JSON file or an arbiter report.
    Validate {
        file: PathBuf,
    },
    /// Print the endpoint and provider a model identifier routes to.
    Route {
        model: String,
        /// TOML configuration file with `[[routes]]` overrides.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run {
            pdf,
            prompt_path,
            output_dir,
            arbiter_beta,
            arbiter_gamma,
            config,
            parallel,
        } => run(
            pdf,
            RunOptions {
                prompt_path,
                output_dir,
                arbiter_beta,
                arbiter_gamma,
                config_path: config,
                parallel,
            },
        ),
        Command::Bundle { pdf } => bundle_json(&pdf).map(|json| println!("{}", json)),
        Command::Validate { file } => validate(file),
        Command::Route { model, config } => route(&model, config),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

// ── Subcommands ───────────────────────────────────────────────────────────────

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn run(pdf: PathBuf, options: RunOptions) -> RucamResult<()> {
    let config = load_config(env_lookup, options.config_path.as_deref())?;
    let config = apply_options(config, &options)?;
    let client = http_client(&config, env_lookup)?;

    let report = run_case(config, &pdf, Arc::new(client))?;
    println!("{}", report.outcome.final_report);
    for path in &report.written {
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

fn validate(file: PathBuf) -> RucamResult<()> {
    let text = read_input(&file)?;

    match validate_text(&text) {
        Ok(verdict) => {
            let json = serde_json::to_string_pretty(&verdict).map_err(|e| RucamError::Serialization {
                reason: e.to_string(),
            })?;
            println!("{}", json);
            Ok(())
        }
        Err(mut failures) => {
            // main prints the last failure when the error propagates
            let last = failures.pop().ok_or_else(|| RucamError::Serialization {
                reason: "validation failed without a reason".to_string(),
            })?;
            for failure in &failures {
                eprintln!("error: verdict from '{}' failed validation: {}", file.display(), failure);
            }
            Err(RucamError::Validation {
                stage: file.display().to_string(),
                failure: last,
            })
        }
    }
}

fn route(model: &str, config: Option<PathBuf>) -> RucamResult<()> {
    let config = load_config(env_lookup, config.as_deref())?;
    println!("{}", describe_endpoint(&config.routing_table().resolve(model)));
    Ok(())
}
