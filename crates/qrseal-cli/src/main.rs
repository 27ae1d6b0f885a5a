//! qrseal CLI - sealed, self-expiring QR tokens
//!
//! Usage:
//!   qrseal encode  - Seal a JSON payload into a token
//!   qrseal decode  - Open a token and report valid / invalid / expired
//!   qrseal keygen  - Generate a random shared secret
//!   qrseal watch   - Re-issue a fresh token on a fixed cadence

mod settings;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use qrseal_core::config::MIN_SECRET_LEN;
use qrseal_core::{Codec, Outcome, RequiredFields};
use serde_json::Value;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;

#[derive(Parser)]
#[command(name = "qrseal")]
#[command(version)]
#[command(about = "Sealed, self-expiring tokens for QR codes", long_about = None)]
struct Cli {
    #[command(flatten)]
    security: SecurityArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SecurityArgs {
    /// TOML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Shared secret (prefer QRSEAL_SECRET, flags end up in shell history)
    #[arg(long, global = true)]
    secret: Option<String>,

    /// Validity window in seconds
    #[arg(long, global = true)]
    validity_secs: Option<i64>,

    /// Skip AES encryption (token is base64 JSON, readable by anyone)
    #[arg(long, global = true)]
    no_encryption: bool,

    /// Skip the HMAC signature (token is not tamper-evident)
    #[arg(long, global = true)]
    no_signature: bool,

    /// Random IV per token; not readable by static-IV decoders
    #[arg(long, global = true)]
    per_token_iv: bool,
}

impl SecurityArgs {
    fn overrides(&self) -> Settings {
        Settings {
            secret: self.secret.clone(),
            validity_secs: self.validity_secs,
            encryption: self.no_encryption.then_some(false),
            signature: self.no_signature.then_some(false),
            per_token_iv: self.per_token_iv.then_some(true),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Seal a JSON payload into a token
    Encode {
        /// JSON payload (read from stdin when omitted)
        payload: Option<String>,
    },

    /// Open a token. Exit code: 0 valid, 1 invalid, 2 expired
    Decode {
        /// Token (read from stdin when omitted)
        token: Option<String>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,

        /// Top-level payload fields that must be present
        #[arg(long = "require", value_name = "FIELD")]
        required: Vec<String>,
    },

    /// Generate a random alphanumeric secret
    Keygen {
        /// Secret length in characters
        #[arg(long, default_value_t = 48)]
        len: usize,
    },

    /// Print a fresh token on a fixed cadence until interrupted
    Watch {
        /// JSON payload (read from stdin when omitted)
        payload: Option<String>,

        /// Seconds between tokens (default: 80% of the validity window)
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Stop after this many tokens
        #[arg(long)]
        count: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr, tokens to stdout
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode { payload } => {
            let codec = build_codec(&cli.security)?;
            let payload = read_payload(payload)?;
            let token = codec.encode(&payload).context("Failed to encode token")?;
            println!("{token}");
        }

        Commands::Decode {
            token,
            json,
            required,
        } => {
            let codec = build_codec(&cli.security)?;
            let token = match token {
                Some(token) => token,
                None => read_stdin()?,
            };

            let mut outcome = codec.decode(&token);
            if !required.is_empty() {
                outcome = outcome.enforce(&RequiredFields::new(required));
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{outcome}");
                if let Some(data) = outcome.data() {
                    println!("{}", serde_json::to_string_pretty(data)?);
                }
            }

            return Ok(match outcome {
                Outcome::Valid { .. } => ExitCode::SUCCESS,
                Outcome::Invalid { .. } => ExitCode::from(1),
                Outcome::Expired => ExitCode::from(2),
            });
        }

        Commands::Keygen { len } => {
            if len < MIN_SECRET_LEN {
                warn!(len, min = MIN_SECRET_LEN, "secret too short for encrypted tokens");
            }
            let secret = qrseal_crypto::generate_secret(len).context("Failed to generate secret")?;
            println!("{secret}");
        }

        Commands::Watch {
            payload,
            interval_secs,
            count,
        } => {
            let codec = build_codec(&cli.security)?;
            let payload = read_payload(payload)?;
            let every = match interval_secs {
                Some(secs) => Duration::from_secs(secs),
                None => codec.config().refresh_interval(),
            };
            if every.is_zero() {
                bail!("Refresh interval must be positive (is the validity window zero?)");
            }
            watch(&codec, &payload, every, count).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn build_codec(args: &SecurityArgs) -> anyhow::Result<Codec> {
    let mut settings = Settings::load(args.config.as_deref())?;
    settings.merge(args.overrides());
    Ok(Codec::new(settings.into_config()?))
}

fn read_stdin() -> anyhow::Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        eprintln!("Reading from stdin, end with Ctrl-D");
    }
    std::io::read_to_string(stdin).context("Failed to read stdin")
}

fn read_payload(arg: Option<String>) -> anyhow::Result<Value> {
    let text = match arg {
        Some(text) => text,
        None => read_stdin()?,
    };
    serde_json::from_str(&text).context("Payload is not valid JSON")
}

async fn watch(
    codec: &Codec,
    payload: &Value,
    every: Duration,
    count: Option<u64>,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(every);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut issued = 0u64;
    info!(interval_ms = every.as_millis() as u64, "watching");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let token = codec.encode(payload).context("Failed to encode token")?;
                println!("{token}");
                issued += 1;
                info!(issued, "token refreshed");
                if count.is_some_and(|n| issued >= n) {
                    break;
                }
            }
            _ = &mut shutdown => {
                info!(issued, "interrupted");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "qrseal",
            "decode",
            "TOKEN",
            "--no-encryption",
            "--require",
            "user",
            "--require",
            "seat",
        ])
        .unwrap();
        assert!(cli.security.no_encryption);
        let overrides = cli.security.overrides();
        assert_eq!(overrides.encryption, Some(false));
        assert_eq!(overrides.signature, None);

        match cli.command {
            Commands::Decode { token, required, .. } => {
                assert_eq!(token.as_deref(), Some("TOKEN"));
                assert_eq!(required, vec!["user", "seat"]);
            }
            _ => panic!("expected decode"),
        }
    }

    #[tokio::test]
    async fn test_watch_stops_after_count() {
        let config = qrseal_core::Config::new("0123456789abcdef0123456789abcdef").unwrap();
        let codec = Codec::new(config);
        watch(&codec, &serde_json::json!({ "n": 1 }), Duration::from_millis(5), Some(3))
            .await
            .unwrap();
    }
}
