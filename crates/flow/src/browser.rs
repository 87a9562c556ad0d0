//! `headless_chrome` implementation of the page-driver seam.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use tracing::info;

use ssopilot_core::config::BrowserConfig;

use crate::page::{PageDriver, Predicate};
use crate::wait::{wait_until, WaitOutcome};
use crate::FlowError;

pub struct HeadlessBrowser {
    // Kept alive for the lifetime of the tab; dropping it closes the
    // DevTools connection.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl HeadlessBrowser {
    /// Launch a browser with a persistent profile so identity-provider
    /// sessions carry over between invocations.
    pub fn launch(
        config: &BrowserConfig,
        headless: bool,
        profile_dir: PathBuf,
        operation_timeout: Duration,
    ) -> Result<Self> {
        let extra_args: Vec<OsString> = config.chrome_args.iter().map(OsString::from).collect();

        let mut builder = LaunchOptionsBuilder::default();
        builder
            .headless(headless)
            .window_size(Some((config.window_width, config.window_height)))
            .user_data_dir(Some(profile_dir))
            .idle_browser_timeout(operation_timeout + Duration::from_secs(30))
            .args(extra_args.iter().map(|a| a.as_ref()).collect());

        // Use CHROME_PATH env var if set (for Docker/custom installs)
        if let Ok(chrome_path) = std::env::var("CHROME_PATH") {
            builder.path(Some(PathBuf::from(chrome_path)));
        }

        let browser = Browser::new(builder.build()?)?;
        let tab = browser.new_tab()?;
        tab.set_default_timeout(operation_timeout);

        info!("browser launched (headless: {})", headless);
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    fn eval(&self, script: &str) -> Result<Option<serde_json::Value>, FlowError> {
        let result = self
            .tab
            .evaluate(script, false)
            .map_err(|e| FlowError::Browser(e.to_string()))?;
        Ok(result.value)
    }

    fn eval_bool(&self, script: &str) -> Result<bool, FlowError> {
        Ok(self.eval(script)?.and_then(|v| v.as_bool()).unwrap_or(false))
    }
}

// Selector and value strings are injected into scripts as JSON literals so
// quotes and backslashes (e.g. in a password) cannot escape the script.
fn js_string(value: &str) -> Result<String, FlowError> {
    serde_json::to_string(value).map_err(|e| FlowError::Browser(e.to_string()))
}

#[async_trait]
impl PageDriver for HeadlessBrowser {
    async fn navigate(&self, url: &str) -> Result<(), FlowError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| FlowError::Navigation(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| FlowError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<WaitOutcome, FlowError> {
        // The DevTools protocol has no Playwright-style networkidle event;
        // readyState plus the caller's settle interval covers late
        // client-side rendering.
        wait_until(timeout, Duration::from_millis(200), || {
            self.eval_bool("document.readyState === 'complete'")
        })
        .await
    }

    fn current_url(&self) -> Result<String, FlowError> {
        Ok(self.tab.get_url())
    }

    fn content(&self) -> Result<String, FlowError> {
        self.tab
            .get_content()
            .map_err(|e| FlowError::Browser(e.to_string()))
    }

    fn fill(&self, selector: &str, value: &str) -> Result<(), FlowError> {
        let selector_js = js_string(selector)?;
        let value_js = js_string(value)?;
        let script = format!(
            r#"
            (function() {{
                const elem = document.querySelector({selector_js});
                if (!elem) {{
                    throw new Error('element not found: ' + {selector_js});
                }}
                elem.focus();
                elem.value = {value_js};
                elem.dispatchEvent(new Event('input', {{ bubbles: true }}));
                elem.dispatchEvent(new Event('change', {{ bubbles: true }}));
            }})()
            "#
        );
        self.eval(&script)?;
        Ok(())
    }

    fn click(&self, target: &Predicate) -> Result<(), FlowError> {
        let script = match target {
            Predicate::Css(selector) => {
                let selector_js = js_string(selector)?;
                format!(
                    r#"
                    (function() {{
                        const elem = document.querySelector({selector_js});
                        if (!elem) {{
                            throw new Error('element not found: ' + {selector_js});
                        }}
                        elem.click();
                    }})()
                    "#
                )
            }
            Predicate::SubmitText(fragment) => {
                let fragment_js = js_string(&fragment.to_lowercase())?;
                format!(
                    r#"
                    (function() {{
                        const controls = document.querySelectorAll('button, input[type="submit"]');
                        for (const el of controls) {{
                            const text = (el.innerText || el.value || '').toLowerCase();
                            if (el.offsetParent !== null && text.includes({fragment_js})) {{
                                el.click();
                                return;
                            }}
                        }}
                        throw new Error('no submit control matching ' + {fragment_js});
                    }})()
                    "#
                )
            }
        };
        self.eval(&script)?;
        Ok(())
    }

    fn press_key(&self, key: &str) -> Result<(), FlowError> {
        self.tab
            .press_key(key)
            .map_err(|e| FlowError::Browser(e.to_string()))?;
        Ok(())
    }
}
