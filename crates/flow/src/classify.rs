//! Stage classification: pure decision rules over a page snapshot.
//!
//! No single signal is reliable across identity providers, so the rules use
//! weak, redundant signals (URL shape, element presence, text fragments) in
//! a fixed precedence order. The ordering itself is a contract: a page can
//! satisfy several weak signals at once, and "already past login" must only
//! win after an in-progress redirect has been ruled out.
//!
//! Known ambiguity, preserved deliberately: a login form that renders at a
//! `/sso/saml` URL is classified redirect-pending until the password field
//! actually appears (rule 2 then wins on the next poll). The right
//! precedence is provider-specific and not decidable here.

use std::time::Duration;

use ssopilot_core::config::TimingConfig;

use crate::observe::PageObservation;
use crate::selectors::{LOGIN_URL_FRAGMENTS, SAML_CONSUMER_FRAGMENT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    AwaitingPageLoad,
    IdentityProviderRedirectPending,
    LoginFormPresent,
    AlreadyAuthenticated,
    CredentialsSubmitted,
    AuthenticationConfirmed,
    AuthenticationIndeterminate,
}

/// Classify a page before any credentials have been submitted.
pub fn classify(
    observation: &PageObservation,
    elapsed_since_load: Duration,
    timing: &TimingConfig,
) -> FlowStage {
    let has_password = observation.password_fields > 0;

    // Rule 1: an empty SAML consumer page may be silently completing a prior
    // session's redirect; give it the redirect window before interpreting it
    // any other way.
    if is_saml_consumer(&observation.url)
        && !has_password
        && elapsed_since_load < Duration::from_millis(timing.redirect_wait_ms)
    {
        return FlowStage::IdentityProviderRedirectPending;
    }

    // Rule 2: a rendered password field always means a login form.
    if has_password {
        return FlowStage::LoginFormPresent;
    }

    // Rule 3: sign-in URL but no form yet; the driver bounds the retry.
    if has_login_fragment(&observation.url) {
        return FlowStage::AwaitingPageLoad;
    }

    // Rule 4: no login indicator at all.
    FlowStage::AlreadyAuthenticated
}

/// Re-classification after a submit action (or for a pre-authenticated
/// session). Ambiguity past the confirmation window is failure, never
/// assumed success.
pub fn classify_after_submit(
    observation: &PageObservation,
    elapsed_since_submit: Duration,
    timing: &TimingConfig,
) -> FlowStage {
    if observation.success_indicator {
        return FlowStage::AuthenticationConfirmed;
    }

    if !has_login_fragment(&observation.url) {
        return FlowStage::AuthenticationConfirmed;
    }

    if elapsed_since_submit < Duration::from_millis(timing.confirm_wait_ms) {
        return FlowStage::CredentialsSubmitted;
    }

    FlowStage::AuthenticationIndeterminate
}

pub fn is_saml_consumer(url: &str) -> bool {
    url.to_lowercase().contains(SAML_CONSUMER_FRAGMENT)
}

pub fn has_login_fragment(url: &str) -> bool {
    let url = url.to_lowercase();
    LOGIN_URL_FRAGMENTS
        .iter()
        .any(|fragment| url.contains(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(url: &str, html: &str) -> PageObservation {
        PageObservation::from_rendered(url.to_string(), html)
    }

    const PASSWORD_FORM: &str = r#"<input type="password" name="password" />"#;
    const EMPTY_PAGE: &str = "<html><body></body></html>";

    #[test]
    fn visible_password_field_is_always_a_login_form() {
        let timing = TimingConfig::default();
        // Even on a SAML consumer URL, even with a success fragment in the
        // page chrome, a rendered password field wins.
        let page = obs(
            "https://corp.okta.com/sso/saml",
            r#"<p>success stories</p><input type="password" name="password" />"#,
        );
        assert_eq!(
            classify(&page, Duration::from_millis(0), &timing),
            FlowStage::LoginFormPresent
        );
        assert_ne!(
            classify(&page, Duration::from_secs(60), &timing),
            FlowStage::AlreadyAuthenticated
        );
    }

    #[test]
    fn no_password_and_neutral_url_is_already_authenticated() {
        let timing = TimingConfig::default();
        let page = obs("https://device.sso.example.com/dashboard", EMPTY_PAGE);
        assert_eq!(
            classify(&page, Duration::from_millis(0), &timing),
            FlowStage::AlreadyAuthenticated
        );
    }

    #[test]
    fn empty_saml_page_is_redirect_pending_only_within_window() {
        let timing = TimingConfig::default();
        let page = obs("https://corp.okta.com/app/sso/saml", EMPTY_PAGE);
        assert_eq!(
            classify(&page, Duration::from_millis(500), &timing),
            FlowStage::IdentityProviderRedirectPending
        );
        // Past the window the page falls through to the no-login-indicator
        // interpretation; the conservative confirmation phase decides.
        assert_eq!(
            classify(&page, Duration::from_millis(timing.redirect_wait_ms), &timing),
            FlowStage::AlreadyAuthenticated
        );
    }

    #[test]
    fn signin_url_without_form_is_awaiting_page_load() {
        let timing = TimingConfig::default();
        let page = obs("https://corp.okta.com/signin", "<div>spinner</div>");
        assert_eq!(
            classify(&page, Duration::from_millis(100), &timing),
            FlowStage::AwaitingPageLoad
        );
    }

    #[test]
    fn classification_is_idempotent() {
        let timing = TimingConfig::default();
        let page = obs("https://corp.okta.com/signin", PASSWORD_FORM);
        let elapsed = Duration::from_millis(1234);
        let first = classify(&page, elapsed, &timing);
        for _ in 0..5 {
            assert_eq!(classify(&page, elapsed, &timing), first);
        }
    }

    #[test]
    fn post_submit_success_fragment_confirms() {
        let timing = TimingConfig::default();
        let page = obs(
            "https://corp.okta.com/signin",
            "<p>You may now close this window</p>",
        );
        assert_eq!(
            classify_after_submit(&page, Duration::from_millis(0), &timing),
            FlowStage::AuthenticationConfirmed
        );
    }

    #[test]
    fn post_submit_navigation_away_from_login_confirms() {
        let timing = TimingConfig::default();
        let page = obs("https://device.sso.example.com/approved", EMPTY_PAGE);
        assert_eq!(
            classify_after_submit(&page, Duration::from_millis(0), &timing),
            FlowStage::AuthenticationConfirmed
        );
    }

    #[test]
    fn post_submit_stuck_on_signin_is_indeterminate_after_window() {
        let timing = TimingConfig::default();
        let page = obs("https://corp.okta.com/signin", PASSWORD_FORM);
        assert_eq!(
            classify_after_submit(&page, Duration::from_millis(100), &timing),
            FlowStage::CredentialsSubmitted
        );
        // Never success: ambiguity past the window is failure.
        assert_eq!(
            classify_after_submit(&page, Duration::from_millis(timing.confirm_wait_ms), &timing),
            FlowStage::AuthenticationIndeterminate
        );
    }
}
