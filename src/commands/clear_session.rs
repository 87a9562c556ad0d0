use anyhow::Result;

use ssopilot_core::{session, AppConfig};

/// Clear-session command - wipe the persistent browser profile so the next
/// login starts unauthenticated.
pub fn run(config: AppConfig) -> Result<()> {
    if session::clear_profile_dir(&config.browser.profile_dir)? {
        println!("Session state cleared.");
    } else {
        println!("No session state to clear.");
    }
    Ok(())
}
