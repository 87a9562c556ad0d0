//! The seam between the flow logic and whatever renders the page.
//!
//! Everything the driver does to a page goes through [`PageDriver`], so the
//! state machine can run against a real browser or a scripted stand-in.

use std::time::Duration;

use async_trait::async_trait;

use crate::selectors::matches_html;
use crate::wait::WaitOutcome;
use crate::FlowError;

/// One way of locating a page element, ranked among alternatives for the
/// same logical target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// CSS selector evaluated against the rendered document.
    Css(&'static str),
    /// A submit control (button or `input[type=submit]`) whose visible text
    /// contains the fragment, case-insensitively.
    SubmitText(&'static str),
}

impl Predicate {
    pub fn describe(&self) -> String {
        match self {
            Predicate::Css(selector) => format!("css `{selector}`"),
            Predicate::SubmitText(fragment) => format!("submit text ~ \"{fragment}\""),
        }
    }
}

#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Load a URL. Failure here is fatal to the attempt.
    async fn navigate(&self, url: &str) -> Result<(), FlowError>;

    /// Bounded wait for document quiescence after navigation. A timeout is a
    /// negative signal for the caller, not an error.
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<WaitOutcome, FlowError>;

    fn current_url(&self) -> Result<String, FlowError>;

    /// Serialized rendered document, including dynamically inserted content.
    fn content(&self) -> Result<String, FlowError>;

    /// Whether any element matches the predicate right now.
    fn exists(&self, target: &Predicate) -> Result<bool, FlowError> {
        Ok(matches_html(&self.content()?, target))
    }

    /// Type a value into the first element matching the CSS selector.
    fn fill(&self, selector: &str, value: &str) -> Result<(), FlowError>;

    fn click(&self, target: &Predicate) -> Result<(), FlowError>;

    /// Send a key press (e.g. `Enter`) to the focused element.
    fn press_key(&self, key: &str) -> Result<(), FlowError>;
}
