use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserConfig {
    /// Persistent profile directory handed to the browser, so an
    /// identity-provider session from a previous run can short-circuit login.
    #[serde(default = "default_profile_dir")]
    pub profile_dir: String,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_chrome_args")]
    pub chrome_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            profile_dir: default_profile_dir(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            chrome_args: default_chrome_args(),
        }
    }
}

/// Wait windows and poll intervals for the login flow, in milliseconds.
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    /// Fixed pause after navigation so client-side rendering/redirects settle.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// How long an empty SAML consumer page may sit before we stop expecting
    /// a silent redirect from a prior session.
    #[serde(default = "default_redirect_wait_ms")]
    pub redirect_wait_ms: u64,
    /// How long a sign-in page gets to render its form.
    #[serde(default = "default_form_wait_ms")]
    pub form_wait_ms: u64,
    /// Post-submit window for a positive success signal.
    #[serde(default = "default_confirm_wait_ms")]
    pub confirm_wait_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            redirect_wait_ms: default_redirect_wait_ms(),
            form_wait_ms: default_form_wait_ms(),
            confirm_wait_ms: default_confirm_wait_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_profile_dir() -> String {
    "~/.ssopilot/browser-profile".to_string()
}
fn default_window_width() -> u32 {
    1920
}
fn default_window_height() -> u32 {
    1080
}
fn default_chrome_args() -> Vec<String> {
    // Required for running in Docker containers
    vec![
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
    ]
}
fn default_settle_ms() -> u64 {
    1500
}
fn default_redirect_wait_ms() -> u64 {
    10_000
}
fn default_form_wait_ms() -> u64 {
    8_000
}
fn default_confirm_wait_ms() -> u64 {
    5_000
}
fn default_poll_interval_ms() -> u64 {
    200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_gets_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.timing.redirect_wait_ms, 10_000);
        assert_eq!(config.timing.poll_interval_ms, 200);
        assert!(config.browser.profile_dir.starts_with("~/"));
        assert!(config
            .browser
            .chrome_args
            .iter()
            .any(|a| a == "--no-sandbox"));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: AppConfig = toml::from_str("[timing]\nconfirm_wait_ms = 250\n").unwrap();
        assert_eq!(config.timing.confirm_wait_ms, 250);
        assert_eq!(config.timing.form_wait_ms, 8_000);
    }
}
