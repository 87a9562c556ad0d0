mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::warn;

use ssopilot_core::AppConfig;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config).unwrap_or_else(|_| {
        warn!(path = %cli.config, "config file not found, using defaults");
        include_str!("../config/default.toml").to_string()
    });
    let mut config: AppConfig = toml::from_str(&config_str)?;

    // Environment variable overrides
    if let Ok(v) = std::env::var("SSOPILOT_PROFILE_DIR") {
        if !v.is_empty() {
            config.browser.profile_dir = v;
        }
    }

    match cli.command {
        Commands::Login {
            verification_url,
            password,
            username,
            no_headless,
            timeout,
        } => {
            let confirmed = commands::login::run(
                config,
                verification_url,
                password,
                username,
                !no_headless,
                timeout,
            )
            .await?;
            if !confirmed {
                std::process::exit(1);
            }
        }
        Commands::ClearSession => {
            commands::clear_session::run(config)?;
        }
    }

    Ok(())
}
