use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use url::Url;

use ssopilot_core::{session, AppConfig};
use ssopilot_flow::{AuthSession, FlowDriver, FlowError, HeadlessBrowser, ManualGate, Secret};

/// Blocks until the operator finishes logging in by hand (visible mode).
struct StdinGate;

#[async_trait]
impl ManualGate for StdinGate {
    async fn wait_for_completion(&self) -> Result<(), FlowError> {
        eprintln!("Complete the login in the browser window, then press Enter...");
        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(|e| FlowError::ManualAborted(e.to_string()))?;
        Ok(())
    }
}

/// Run one login attempt. Returns whether authentication was confirmed.
pub async fn run(
    config: AppConfig,
    verification_url: String,
    password: String,
    username: Option<String>,
    headless: bool,
    timeout_ms: u64,
) -> Result<bool> {
    Url::parse(&verification_url).context("verification URL is not a valid URL")?;

    let timeout = Duration::from_millis(timeout_ms);
    let profile_dir = session::resolve_profile_dir(&config.browser.profile_dir)?;
    info!("session profile: {}", profile_dir.display());

    let browser = HeadlessBrowser::launch(&config.browser, headless, profile_dir, timeout)
        .context("launching browser")?;

    let auth = AuthSession {
        verification_url,
        username,
        secret: Secret::new(password),
        timeout,
        headless,
    };

    let gate = StdinGate;
    let mut driver = FlowDriver::new(&browser, auth, config.timing.clone());
    if !headless {
        driver = driver.with_manual_gate(&gate);
    }

    let report = driver.run().await;

    if let Some(dump) = &report.field_dump {
        eprintln!("{}", dump.render());
    }
    println!("{}", report.summary());

    Ok(report.is_success())
}
