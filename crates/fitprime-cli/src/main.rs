use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fitprime_webhook::{
    StevoEnvelope, generate_token, sign_payload, validate_stevo_payload,
    validate_webhook_signature,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "fitprime-cli")]
#[command(about = "Operator tooling for FitPrime webhook authentication")]
#[command(version = VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh random webhook token
    Token,

    /// Compute the X-Webhook-Signature value for a body
    Sign {
        /// Shared signing secret
        #[arg(short, long)]
        secret: String,

        /// File holding the exact request body
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Check a signature against a body
    Verify {
        /// Shared signing secret
        #[arg(short = 'k', long)]
        secret: String,

        /// Signature as sent in the header (sha256=<hex>)
        #[arg(short, long)]
        signature: String,

        /// File holding the exact request body
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Validate a Stevo webhook body
    CheckPayload {
        /// JSON file with the webhook body
        #[arg(short, long)]
        input: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct VerifyOutput {
    valid: bool,
}

#[derive(Debug, Serialize)]
struct PayloadReport {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    envelope: Option<StevoEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let ok = match cli.command {
        Commands::Token => {
            println!("{}", generate_token());
            true
        }
        Commands::Sign { secret, input } => {
            let body = read_input(&input)?;
            println!("{}", sign_payload(&body, &secret)?);
            true
        }
        Commands::Verify {
            secret,
            signature,
            input,
        } => {
            let body = read_input(&input)?;
            let output = VerifyOutput {
                valid: validate_webhook_signature(&body, &signature, &secret),
            };
            print_json(&output)?;
            output.valid
        }
        Commands::CheckPayload { input } => {
            let body = read_input(&input)?;
            let report = check_payload(&body);
            print_json(&report)?;
            report.valid
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read input file: {:?}", path))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Parse and validate a webhook body; malformed JSON is reported, not raised
fn check_payload(body: &[u8]) -> PayloadReport {
    let result = serde_json::from_slice::<serde_json::Value>(body)
        .map_err(|e| format!("JSON parsing error: {}", e))
        .and_then(|payload| validate_stevo_payload(&payload).map_err(|e| e.to_string()));

    match result {
        Ok(envelope) => PayloadReport {
            valid: true,
            envelope: Some(envelope),
            error: None,
        },
        Err(error) => PayloadReport {
            valid: false,
            envelope: None,
            error: Some(error),
        },
    }
}
