use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ssopilot", about = "Headless SSO device-login automation")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Complete a pending SSO device authorization in a controlled browser
    Login {
        /// Verification URL from the device-authorization flow
        verification_url: String,

        /// Identity-provider password (retrieve from your secret manager)
        password: String,

        /// Username/email, if the identity provider asks for one
        #[arg(long)]
        username: Option<String>,

        /// Run the browser visibly, with manual fallback when the form
        /// cannot be automated
        #[arg(long)]
        no_headless: bool,

        /// Timeout in milliseconds for page operations
        #[arg(long, default_value = "60000")]
        timeout: u64,
    },
    /// Remove persisted browser session state (cookies, local storage)
    ClearSession,
}
