// Page-state detection and login progression for headless SSO flows.
pub mod browser;
pub mod classify;
pub mod diagnostics;
pub mod driver;
pub mod observe;
pub mod page;
pub mod selectors;
pub mod wait;

// Re-exports for convenience
pub use browser::HeadlessBrowser;
pub use classify::FlowStage;
pub use diagnostics::FieldDump;
pub use driver::{AuthSession, FlowDriver, LoginOutcome, LoginReport, ManualGate, Secret};
pub use observe::{observe, PageObservation};
pub use page::{PageDriver, Predicate};
pub use wait::{wait_until, WaitOutcome};

#[derive(Debug, Clone, thiserror::Error)]
pub enum FlowError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("no password field matched any candidate selector")]
    PasswordFieldNotFound,

    #[error("manual completion aborted: {0}")]
    ManualAborted(String),
}
