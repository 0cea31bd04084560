//! Verification Gateway CLI
//!
//! Offline tooling for gateway configuration:
//!
//! - `validate`: load a config file, run every semantic check, print a summary
//! - `rank`: show which configured providers would serve a check, best first
//!
//! Provider implementations are supplied by the embedding service, so the
//! CLI works from the static provider metadata in the config file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use verification_gateway::config::{load_config, ConfigError, ObservabilityConfig};
use verification_gateway::observability::logging::init_logging;
use verification_gateway::providers::registry::rank_infos;
use verification_gateway::providers::types::{CheckType, ServiceTier};

#[derive(Parser)]
#[command(name = "verification-gateway")]
#[command(about = "Configuration tooling for the verification gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Rank configured providers for a check
    Rank {
        #[arg(short, long)]
        config: PathBuf,

        #[arg(long)]
        check_type: CheckType,

        #[arg(long, default_value = "US")]
        locale: String,

        #[arg(long, default_value = "standard")]
        tier: ServiceTier,
    },
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&ObservabilityConfig {
        log_level: "warn".to_string(),
        ..ObservabilityConfig::default()
    })?;

    match cli.command {
        Commands::Validate { config } => {
            let loaded = match load_config(&config) {
                Ok(loaded) => loaded,
                Err(ConfigError::Validation(errors)) => {
                    eprintln!("{} is invalid:", config.display());
                    for error in errors {
                        eprintln!("  - {}", error);
                    }
                    return Ok(ExitCode::FAILURE);
                }
                Err(e) => return Err(e.into()),
            };

            println!("{} is valid", config.display());
            println!(
                "  router: max_retries={} attempt_timeout_ms={} accept_stale={}",
                loaded.router.max_retries,
                loaded.router.attempt_timeout_ms,
                loaded.router.accept_stale
            );
            println!(
                "  circuit breaker overrides: {}",
                loaded.circuit_breaker.providers.len()
            );
            println!("  rate limit overrides: {}", loaded.rate_limit.providers.len());
            println!("  budgets: {}", loaded.budgets.len());
            println!("  providers: {}", loaded.providers.len());
        }
        Commands::Rank {
            config,
            check_type,
            locale,
            tier,
        } => {
            let loaded = load_config(&config)?;
            let ranked = rank_infos(&loaded.providers, check_type, &locale, tier);
            if ranked.is_empty() {
                println!("No provider supports {} in locale {} ({})", check_type, locale, tier);
                return Ok(ExitCode::FAILURE);
            }

            println!("{} in {} ({}):", check_type, locale, tier);
            for (i, (info, rank)) in ranked.iter().enumerate() {
                println!(
                    "  {}. {} ({}) cost_tier={:?} reliability={:.3}",
                    i + 1,
                    info.id,
                    info.name,
                    rank.cost_tier,
                    1.0 - rank.unreliability
                );
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
