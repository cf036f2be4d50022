mod api;
mod gateway;

use clap::{Parser, Subcommand};
use gateway::{CredentialResolver, Gateway, ResolvedCredentials};
use herald_channels::telegram::TelegramChannel;
use herald_core::{config, vault::CredentialVault};
use herald_exec::RemoteExecutor;
use herald_providers::gemini::GeminiProvider;
use herald_store::Store;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "herald",
    version,
    about = "Herald — quota-gated AI message relay with sandboxed execution"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay bot.
    Start,
    /// Check configuration without starting.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Start => {
            let cfg = config::load(&cli.config)?;

            // Missing key material is the one failure that must abort startup:
            // without it no stored credential can ever be read back.
            let vault = CredentialVault::from_passphrase(&cfg.vault.passphrase).map_err(|e| {
                anyhow::anyhow!(
                    "{e}. Set [vault] passphrase in {} or the HERALD_VAULT_KEY env var.",
                    cli.config
                )
            })?;

            let store = Store::new(&cfg.store).await?;

            let provider = Arc::new(GeminiProvider::from_config(&cfg.provider.gemini));
            let executor = Arc::new(RemoteExecutor::from_config(&cfg.executor));

            let resolver = Arc::new(CredentialResolver::new(
                vault,
                ResolvedCredentials {
                    completion: cfg.provider.gemini.api_key.clone(),
                    execution: cfg.executor.api_key.clone(),
                },
                Duration::from_secs(cfg.vault.cache_ttl_minutes * 60),
            ));

            // Build channels.
            let mut channels: HashMap<String, Arc<dyn herald_core::traits::Channel>> =
                HashMap::new();

            if let Some(ref tg) = cfg.channel.telegram {
                if tg.enabled {
                    if tg.bot_token.is_empty() {
                        anyhow::bail!(
                            "Telegram is enabled but bot_token is empty. \
                             Set it in config.toml or the TELEGRAM_BOT_TOKEN env var."
                        );
                    }
                    channels.insert(
                        "telegram".to_string(),
                        Arc::new(TelegramChannel::new(tg.clone())),
                    );
                }
            }

            if channels.is_empty() {
                anyhow::bail!("No channels enabled. Enable at least one channel in config.toml.");
            }

            println!("Herald — starting relay...");
            let gw = Arc::new(Gateway::new(
                provider,
                executor,
                channels,
                store,
                resolver,
                cfg.gate.clone(),
                cfg.api.clone(),
                cfg.store.history_limit,
            ));
            gw.run().await?;
        }
        Commands::Status => {
            let cfg = config::load(&cli.config)?;
            println!("Herald — Status Check\n");
            println!("Config: {}", cli.config);
            println!();

            println!(
                "  vault: {}",
                if cfg.vault.passphrase.is_empty() {
                    "missing passphrase (set HERALD_VAULT_KEY)"
                } else {
                    "configured"
                }
            );
            println!(
                "  gemini: {}",
                if cfg.provider.gemini.api_key.is_empty() {
                    "missing default api_key"
                } else {
                    "configured"
                }
            );
            println!("  executor: {}", cfg.executor.base_url);
            match cfg.channel.telegram {
                Some(ref tg) if tg.enabled && !tg.bot_token.is_empty() => {
                    println!("  telegram: configured");
                }
                Some(ref tg) if tg.enabled => {
                    println!("  telegram: enabled but missing bot_token");
                }
                Some(_) => println!("  telegram: disabled"),
                None => println!("  telegram: not configured"),
            }
            println!(
                "  admin api: {}",
                if cfg.api.enabled {
                    format!("{}:{}", cfg.api.host, cfg.api.port)
                } else {
                    "disabled".to_string()
                }
            );
        }
    }

    Ok(())
}
