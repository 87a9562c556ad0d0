//! The flow driver: sequences navigation, classification and actions to a
//! terminal outcome. Exactly one credential fill and one submit per
//! invocation, since a wrong password looks the same as a slow page from
//! out here and retrying would risk an account lockout.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use ssopilot_core::config::TimingConfig;

use crate::classify::{classify, classify_after_submit, is_saml_consumer, FlowStage};
use crate::diagnostics::FieldDump;
use crate::observe::observe;
use crate::page::{PageDriver, Predicate};
use crate::selectors::{
    resolve_first, PASSWORD_CANDIDATES, SUBMIT_CANDIDATES, USERNAME_CANDIDATES,
};
use crate::wait::{wait_until, WaitOutcome};
use crate::FlowError;

/// A credential that must never appear in logs or diagnostics.
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Read the secret for a field-fill action.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

/// One login attempt against an identity provider. Owned by the driver for
/// the duration of the attempt.
#[derive(Debug)]
pub struct AuthSession {
    pub verification_url: String,
    pub username: Option<String>,
    pub secret: Secret,
    pub timeout: Duration,
    pub headless: bool,
}

/// Driver states. `Confirmed` and `Failed` are terminal; `Indeterminate` is
/// terminal too and maps to a failure result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverState {
    Start,
    PageLoaded,
    CredentialsNeeded,
    AlreadyAuthenticated,
    CredentialsFilled,
    Submitted,
    ManualHandoff,
    Confirmed,
    Indeterminate,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: String,
    pub to: String,
    /// Offset from attempt start.
    pub at: Duration,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Confirmed,
    Indeterminate,
    Failed(String),
}

#[derive(Debug)]
pub struct LoginReport {
    pub outcome: LoginOutcome,
    pub final_url: Option<String>,
    pub fill_actions: usize,
    pub submit_actions: usize,
    pub transitions: Vec<StateTransition>,
    pub duration: Duration,
    /// Present only on the could-not-find-password failure path.
    pub field_dump: Option<FieldDump>,
}

impl LoginReport {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, LoginOutcome::Confirmed)
    }

    pub fn summary(&self) -> String {
        match &self.outcome {
            LoginOutcome::Confirmed => format!(
                "✓ authentication confirmed in {}ms (fills: {}, submits: {})",
                self.duration.as_millis(),
                self.fill_actions,
                self.submit_actions
            ),
            LoginOutcome::Indeterminate => format!(
                "✗ could not confirm authentication after {}ms (final url: {})",
                self.duration.as_millis(),
                self.final_url.as_deref().unwrap_or("unknown")
            ),
            LoginOutcome::Failed(reason) => format!("✗ login failed: {}", reason),
        }
    }
}

/// External resume signal for visible-mode manual completion. The CLI backs
/// this with stdin; tests resume immediately.
#[async_trait]
pub trait ManualGate: Send + Sync {
    async fn wait_for_completion(&self) -> Result<(), FlowError>;
}

pub struct FlowDriver<'a, D: PageDriver + ?Sized> {
    page: &'a D,
    session: AuthSession,
    timing: TimingConfig,
    manual_gate: Option<&'a dyn ManualGate>,
    state: DriverState,
    transitions: Vec<StateTransition>,
    started: Instant,
    fill_actions: usize,
    submit_actions: usize,
    field_dump: Option<FieldDump>,
}

impl<'a, D: PageDriver + ?Sized> FlowDriver<'a, D> {
    pub fn new(page: &'a D, session: AuthSession, timing: TimingConfig) -> Self {
        Self {
            page,
            session,
            timing,
            manual_gate: None,
            state: DriverState::Start,
            transitions: Vec::new(),
            started: Instant::now(),
            fill_actions: 0,
            submit_actions: 0,
            field_dump: None,
        }
    }

    pub fn with_manual_gate(mut self, gate: &'a dyn ManualGate) -> Self {
        self.manual_gate = Some(gate);
        self
    }

    /// Run the attempt to a terminal outcome. No collaborator fault
    /// propagates past this boundary.
    pub async fn run(mut self) -> LoginReport {
        let outcome = match self.attempt().await {
            Ok(outcome) => outcome,
            Err(err) => {
                let reason = err.to_string();
                self.transition(DriverState::Failed(reason.clone()), None);
                warn!("login attempt failed: {}", reason);
                LoginOutcome::Failed(reason)
            }
        };

        LoginReport {
            outcome,
            final_url: self.page.current_url().ok(),
            fill_actions: self.fill_actions,
            submit_actions: self.submit_actions,
            transitions: self.transitions,
            duration: self.started.elapsed(),
            field_dump: self.field_dump,
        }
    }

    async fn attempt(&mut self) -> Result<LoginOutcome, FlowError> {
        self.load_page().await?;

        let stage = self.settle_on_stage().await?;
        match stage {
            FlowStage::LoginFormPresent | FlowStage::AwaitingPageLoad => {
                // AwaitingPageLoad past its window still enters the credential
                // stage: password resolution below decides (and dumps
                // diagnostics) instead of guessing earlier.
                self.transition(DriverState::CredentialsNeeded, None);
                if self.fill_credentials().await? {
                    self.submit().await?;
                } // else: manual handoff already happened, the human submitted
                self.confirm().await
            }
            _ => {
                self.transition(DriverState::AlreadyAuthenticated, None);
                info!("no login form present, session appears pre-authenticated");
                self.confirm().await
            }
        }
    }

    async fn load_page(&mut self) -> Result<(), FlowError> {
        info!("navigating to {}", self.session.verification_url);
        self.page.navigate(&self.session.verification_url).await?;

        if self.page.wait_for_network_idle(self.session.timeout).await? == WaitOutcome::TimedOut {
            warn!(
                "network did not reach idle within {}ms, continuing",
                self.session.timeout.as_millis()
            );
        }

        // Let client-side rendering and auto-redirects settle.
        sleep(Duration::from_millis(self.timing.settle_ms)).await;

        let url = self.page.current_url()?;
        if url.contains("okta.com") {
            info!("detected Okta identity-provider page");
        }
        if is_saml_consumer(&url) {
            info!("on SAML consumer endpoint, watching for a silent redirect");
        }
        self.transition(DriverState::PageLoaded, Some(url));
        Ok(())
    }

    /// Bounded re-classification loop: covers both redirect detection on a
    /// SAML consumer page and a sign-in form that is still rendering.
    async fn settle_on_stage(&mut self) -> Result<FlowStage, FlowError> {
        let page = self.page;
        let timing = &self.timing;
        let loaded = Instant::now();
        let window = Duration::from_millis(timing.redirect_wait_ms.max(timing.form_wait_ms));
        let form_window = Duration::from_millis(timing.form_wait_ms);
        let poll = Duration::from_millis(timing.poll_interval_ms);

        let mut stage = FlowStage::AwaitingPageLoad;
        wait_until(window, poll, || {
            let observation = observe(page)?;
            stage = classify(&observation, loaded.elapsed(), timing);
            let keep_waiting = match stage {
                // classify bounds this one by the redirect window itself
                FlowStage::IdentityProviderRedirectPending => true,
                FlowStage::AwaitingPageLoad => loaded.elapsed() < form_window,
                _ => false,
            };
            Ok(!keep_waiting)
        })
        .await?;

        info!("page classified as {:?}", stage);
        Ok(stage)
    }

    async fn fill_credentials(&mut self) -> Result<bool, FlowError> {
        if let Some(username) = self.session.username.clone() {
            match resolve_first(self.page, USERNAME_CANDIDATES)? {
                Some(&Predicate::Css(selector)) => {
                    info!("filling username via {}", selector);
                    self.page.fill(selector, &username)?;
                    self.fill_actions += 1;
                }
                _ => info!("no username field matched, skipping"),
            }
        }

        match resolve_first(self.page, PASSWORD_CANDIDATES)? {
            Some(candidate) => {
                if let Predicate::Css(selector) = *candidate {
                    info!("found password field via {}", selector);
                    self.page.fill(selector, self.session.secret.expose())?;
                    self.fill_actions += 1;
                }
                self.transition(DriverState::CredentialsFilled, None);
                Ok(true)
            }
            None => {
                warn!("no password field matched any candidate selector");
                let observation = observe(self.page)?;
                self.field_dump = Some(FieldDump::from_observation(&observation));

                if !self.session.headless {
                    if let Some(gate) = self.manual_gate {
                        self.transition(DriverState::ManualHandoff, None);
                        info!("visible browser: waiting for manual completion");
                        gate.wait_for_completion().await?;
                        // Proceed as if filled and submitted; the confirmation
                        // phase re-checks the page state.
                        return Ok(false);
                    }
                }

                Err(FlowError::PasswordFieldNotFound)
            }
        }
    }

    /// Best-effort: some forms submit implicitly, so a missing or broken
    /// submit control never aborts the flow.
    async fn submit(&mut self) -> Result<(), FlowError> {
        match resolve_first(self.page, SUBMIT_CANDIDATES)? {
            Some(candidate) => match self.page.click(candidate) {
                Ok(()) => {
                    info!("submitted login form via {}", candidate.describe());
                    self.submit_actions += 1;
                }
                Err(err) => warn!("submit click failed ({}), relying on implicit submit", err),
            },
            None => {
                warn!("no submit control matched, falling back to Enter");
                match self.page.press_key("Enter") {
                    Ok(()) => self.submit_actions += 1,
                    Err(err) => warn!("key press failed ({}), relying on implicit submit", err),
                }
            }
        }
        self.transition(DriverState::Submitted, None);
        Ok(())
    }

    async fn confirm(&mut self) -> Result<LoginOutcome, FlowError> {
        info!("waiting for authentication confirmation");
        let page = self.page;
        let timing = &self.timing;
        let submitted = Instant::now();
        let window = Duration::from_millis(timing.confirm_wait_ms);
        let poll = Duration::from_millis(timing.poll_interval_ms);

        let mut stage = FlowStage::CredentialsSubmitted;
        let outcome = wait_until(window, poll, || {
            let observation = observe(page)?;
            stage = classify_after_submit(&observation, submitted.elapsed(), timing);
            Ok(stage != FlowStage::CredentialsSubmitted)
        })
        .await?;

        if outcome == WaitOutcome::TimedOut {
            stage = FlowStage::AuthenticationIndeterminate;
        }

        match stage {
            FlowStage::AuthenticationConfirmed => {
                let detail = self.page.current_url().ok();
                self.transition(DriverState::Confirmed, detail);
                info!("authentication confirmed");
                Ok(LoginOutcome::Confirmed)
            }
            _ => {
                self.transition(DriverState::Indeterminate, None);
                warn!("no success indicator and still on a login page");
                Ok(LoginOutcome::Indeterminate)
            }
        }
    }

    fn transition(&mut self, next: DriverState, detail: Option<String>) {
        let from = format!("{:?}", self.state);
        let to = format!("{:?}", next);
        self.transitions.push(StateTransition {
            from,
            to,
            at: self.started.elapsed(),
            detail,
        });
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn test_timing() -> TimingConfig {
        TimingConfig {
            settle_ms: 10,
            redirect_wait_ms: 100,
            form_wait_ms: 80,
            confirm_wait_ms: 50,
            poll_interval_ms: 5,
        }
    }

    fn session(username: Option<&str>, headless: bool) -> AuthSession {
        AuthSession {
            verification_url: "https://device.sso.example.com/verify?user_code=ABCD-EFGH"
                .to_string(),
            username: username.map(str::to_string),
            secret: Secret::new("hunter2"),
            timeout: Duration::from_millis(500),
            headless,
        }
    }

    #[derive(Clone)]
    struct Snapshot {
        url: &'static str,
        html: &'static str,
    }

    /// Page stand-in scripted by (ms offset, snapshot) timelines. After a
    /// submit action the post-submit timeline takes over, offsets relative
    /// to the submit.
    struct ScriptedPage {
        timeline: Vec<(u64, Snapshot)>,
        after_submit: Option<Vec<(u64, Snapshot)>>,
        navigated_at: Mutex<Option<Instant>>,
        submitted_at: Mutex<Option<Instant>>,
        manual_override: Mutex<Option<Snapshot>>,
        fail_navigation: bool,
        fills: Mutex<Vec<(String, String)>>,
        clicks: Mutex<Vec<String>>,
        keys: Mutex<Vec<String>>,
    }

    impl ScriptedPage {
        fn new(timeline: Vec<(u64, Snapshot)>) -> Self {
            Self {
                timeline,
                after_submit: None,
                navigated_at: Mutex::new(None),
                submitted_at: Mutex::new(None),
                manual_override: Mutex::new(None),
                fail_navigation: false,
                fills: Mutex::new(Vec::new()),
                clicks: Mutex::new(Vec::new()),
                keys: Mutex::new(Vec::new()),
            }
        }

        fn with_post_submit(mut self, timeline: Vec<(u64, Snapshot)>) -> Self {
            self.after_submit = Some(timeline);
            self
        }

        fn failing_navigation() -> Self {
            let mut page = Self::new(vec![(
                0,
                Snapshot {
                    url: "about:blank",
                    html: "",
                },
            )]);
            page.fail_navigation = true;
            page
        }

        fn current(&self) -> Snapshot {
            if let Some(snapshot) = self.manual_override.lock().unwrap().clone() {
                return snapshot;
            }
            if let (Some(at), Some(timeline)) =
                (*self.submitted_at.lock().unwrap(), self.after_submit.as_ref())
            {
                return Self::pick(timeline, at.elapsed());
            }
            let elapsed = self
                .navigated_at
                .lock()
                .unwrap()
                .map(|at| at.elapsed())
                .unwrap_or_default();
            Self::pick(&self.timeline, elapsed)
        }

        fn pick(timeline: &[(u64, Snapshot)], elapsed: Duration) -> Snapshot {
            timeline
                .iter()
                .filter(|(offset, _)| Duration::from_millis(*offset) <= elapsed)
                .last()
                .or_else(|| timeline.first())
                .map(|(_, snapshot)| snapshot.clone())
                .expect("scripted timeline must not be empty")
        }

        fn mark_submitted(&self) {
            let mut submitted = self.submitted_at.lock().unwrap();
            if submitted.is_none() {
                *submitted = Some(Instant::now());
            }
        }
    }

    #[async_trait]
    impl PageDriver for ScriptedPage {
        async fn navigate(&self, _url: &str) -> Result<(), FlowError> {
            if self.fail_navigation {
                return Err(FlowError::Navigation("dns lookup failed".to_string()));
            }
            *self.navigated_at.lock().unwrap() = Some(Instant::now());
            Ok(())
        }

        async fn wait_for_network_idle(
            &self,
            _timeout: Duration,
        ) -> Result<WaitOutcome, FlowError> {
            Ok(WaitOutcome::Satisfied)
        }

        fn current_url(&self) -> Result<String, FlowError> {
            Ok(self.current().url.to_string())
        }

        fn content(&self) -> Result<String, FlowError> {
            Ok(self.current().html.to_string())
        }

        fn fill(&self, selector: &str, value: &str) -> Result<(), FlowError> {
            self.fills
                .lock()
                .unwrap()
                .push((selector.to_string(), value.to_string()));
            Ok(())
        }

        fn click(&self, target: &Predicate) -> Result<(), FlowError> {
            self.clicks.lock().unwrap().push(target.describe());
            self.mark_submitted();
            Ok(())
        }

        fn press_key(&self, key: &str) -> Result<(), FlowError> {
            self.keys.lock().unwrap().push(key.to_string());
            self.mark_submitted();
            Ok(())
        }
    }

    /// Gate that flips the scripted page to a logged-in state, standing in
    /// for a human completing the form.
    struct ResumeGate<'a> {
        page: &'a ScriptedPage,
        resumed_to: Snapshot,
    }

    #[async_trait]
    impl ManualGate for ResumeGate<'_> {
        async fn wait_for_completion(&self) -> Result<(), FlowError> {
            *self.page.manual_override.lock().unwrap() = Some(self.resumed_to.clone());
            Ok(())
        }
    }

    /// Gate that must never be reached (headless runs).
    struct UnreachableGate;

    #[async_trait]
    impl ManualGate for UnreachableGate {
        async fn wait_for_completion(&self) -> Result<(), FlowError> {
            panic!("manual gate must not be used in headless mode");
        }
    }

    const SAML_EMPTY: Snapshot = Snapshot {
        url: "https://corp.okta.com/app/example/sso/saml",
        html: "<html><body></body></html>",
    };
    const DASHBOARD: Snapshot = Snapshot {
        url: "https://device.sso.example.com/dashboard",
        html: "<html><body><h1>Devices</h1></body></html>",
    };
    const SIGNIN_SPINNER: Snapshot = Snapshot {
        url: "https://corp.okta.com/signin",
        html: "<html><body><div class='spinner'></div></body></html>",
    };
    const SIGNIN_PASSWORD_ONLY: Snapshot = Snapshot {
        url: "https://corp.okta.com/signin",
        html: r#"<html><body><form>
            <input type="password" name="password" id="okta-signin-password" />
            <button type="submit">Sign In</button>
        </form></body></html>"#,
    };
    const APPROVED: Snapshot = Snapshot {
        url: "https://device.sso.example.com/approved",
        html: "<html><body><p>You may now close this window.</p></body></html>",
    };

    #[tokio::test(start_paused = true)]
    async fn prior_session_redirects_to_success_without_any_actions() {
        // Scenario: the verification URL redirects almost immediately to an
        // authenticated page; no form ever appears.
        let page = ScriptedPage::new(vec![(0, SAML_EMPTY), (8, DASHBOARD)]);
        let report = FlowDriver::new(&page, session(None, true), test_timing())
            .run()
            .await;

        assert!(report.is_success());
        assert_eq!(report.fill_actions, 0);
        assert_eq!(report.submit_actions, 0);
        assert!(page.fills.lock().unwrap().is_empty());
        assert!(page.clicks.lock().unwrap().is_empty());
        assert!(report
            .transitions
            .iter()
            .any(|t| t.to == "AlreadyAuthenticated"));
    }

    #[tokio::test(start_paused = true)]
    async fn password_only_form_is_filled_and_confirmed() {
        // Scenario: password-only form; the supplied username has no
        // matching field and is skipped; submit goes through the first
        // matching predicate; a success fragment appears afterwards.
        let page = ScriptedPage::new(vec![(0, SIGNIN_PASSWORD_ONLY)])
            .with_post_submit(vec![(0, SIGNIN_PASSWORD_ONLY), (20, APPROVED)]);
        let report = FlowDriver::new(
            &page,
            session(Some("alice@example.com"), true),
            test_timing(),
        )
        .run()
        .await;

        assert!(report.is_success());
        assert_eq!(
            *page.fills.lock().unwrap(),
            vec![("input[name='password']".to_string(), "hunter2".to_string())]
        );
        assert_eq!(
            *page.clicks.lock().unwrap(),
            vec!["css `button[type='submit']`".to_string()]
        );
        assert_eq!(report.fill_actions, 1);
        assert_eq!(report.submit_actions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn form_rendering_during_redirect_window_is_picked_up() {
        let page = ScriptedPage::new(vec![(0, SAML_EMPTY), (40, SIGNIN_PASSWORD_ONLY)])
            .with_post_submit(vec![(0, APPROVED)]);
        let report = FlowDriver::new(&page, session(None, true), test_timing())
            .run()
            .await;

        assert!(report.is_success());
        assert_eq!(report.fill_actions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_password_field_fails_headless_with_dump() {
        // Scenario: the form never renders. Headless runs must fail with the
        // field dump and never touch the manual gate.
        let page = ScriptedPage::new(vec![(0, SIGNIN_SPINNER)]);
        let gate = UnreachableGate;
        let report = FlowDriver::new(&page, session(None, true), test_timing())
            .with_manual_gate(&gate)
            .run()
            .await;

        assert!(!report.is_success());
        assert!(matches!(report.outcome, LoginOutcome::Failed(ref reason)
            if reason.contains("password")));
        assert!(report.field_dump.is_some());
        assert!(page.fills.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_on_signin_after_submit_is_indeterminate() {
        // Conservative-failure property: no success fragment, URL still on
        // signin for the whole confirmation window.
        let page = ScriptedPage::new(vec![(0, SIGNIN_PASSWORD_ONLY)])
            .with_post_submit(vec![(0, SIGNIN_PASSWORD_ONLY)]);
        let report = FlowDriver::new(&page, session(None, true), test_timing())
            .run()
            .await;

        assert!(!report.is_success());
        assert_eq!(report.outcome, LoginOutcome::Indeterminate);
        assert_eq!(report.fill_actions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_failure_is_fatal() {
        let page = ScriptedPage::failing_navigation();
        let report = FlowDriver::new(&page, session(None, true), test_timing())
            .run()
            .await;

        assert!(!report.is_success());
        assert!(matches!(report.outcome, LoginOutcome::Failed(ref reason)
            if reason.contains("navigation failed")));
        assert!(report.summary().starts_with('✗'));
    }

    #[tokio::test(start_paused = true)]
    async fn visible_mode_hands_off_to_manual_completion() {
        let page = ScriptedPage::new(vec![(0, SIGNIN_SPINNER)]);
        let gate = ResumeGate {
            page: &page,
            resumed_to: DASHBOARD,
        };
        let report = FlowDriver::new(&page, session(None, false), test_timing())
            .with_manual_gate(&gate)
            .run()
            .await;

        assert!(report.is_success());
        assert!(report.transitions.iter().any(|t| t.to == "ManualHandoff"));
        // the human typed the credentials, not the driver
        assert!(page.fills.lock().unwrap().is_empty());
        assert_eq!(report.fill_actions, 0);
    }

    #[test]
    fn secret_never_appears_in_debug_output() {
        let auth = session(Some("alice@example.com"), true);
        let rendered = format!("{:?}", auth);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("Secret(****)"));
    }
}
