//! Ordered candidate predicates for the logical login-form targets.
//!
//! Identity providers vary in markup, so each target has a list of
//! equally-plausible predicates tried in fixed priority order. First match
//! wins; the ordering is a contract, not an implementation detail.

use scraper::{Html, Selector};

use crate::page::{PageDriver, Predicate};
use crate::FlowError;

pub const USERNAME_CANDIDATES: &[Predicate] = &[
    Predicate::Css("input[name='username']"),
    Predicate::Css("input[name='email']"),
    Predicate::Css("input[type='email']"),
    Predicate::Css("input[id='username']"),
    Predicate::Css("input[id='email']"),
];

pub const PASSWORD_CANDIDATES: &[Predicate] = &[
    Predicate::Css("input[name='password']"),
    Predicate::Css("input[type='password']"),
    Predicate::Css("input[id='password']"),
    Predicate::Css("input[id='passwordInput']"),
    Predicate::Css("input[placeholder*='password' i]"),
    Predicate::Css("input[aria-label*='password' i]"),
];

pub const SUBMIT_CANDIDATES: &[Predicate] = &[
    Predicate::Css("button[type='submit']"),
    Predicate::Css("input[type='submit']"),
    Predicate::SubmitText("sign in"),
    Predicate::SubmitText("login"),
    Predicate::SubmitText("continue"),
];

/// URL fragments that mark a page as part of the sign-in flow.
pub const LOGIN_URL_FRAGMENTS: &[&str] = &["login", "signin"];

/// Identity-provider SAML assertion-consumer path fragment. A page here may
/// be silently completing a prior session's redirect.
pub const SAML_CONSUMER_FRAGMENT: &str = "/sso/saml";

/// Text fragments that positively confirm a completed login.
pub const SUCCESS_FRAGMENTS: &[&str] = &[
    "success",
    "authenticated",
    "you may now close this window",
    "you may close this browser",
];

/// Walk the candidate list in order and return the first predicate the page
/// currently matches.
pub fn resolve_first<'a, D: PageDriver + ?Sized>(
    driver: &D,
    candidates: &'a [Predicate],
) -> Result<Option<&'a Predicate>, FlowError> {
    for candidate in candidates {
        if driver.exists(candidate)? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Evaluate a predicate against a rendered-HTML snapshot.
///
/// An unparseable selector counts as no match, so an exotic candidate never
/// blocks the rest of the list.
pub fn matches_html(html: &str, target: &Predicate) -> bool {
    let document = Html::parse_document(html);
    match target {
        Predicate::Css(css) => Selector::parse(css)
            .map(|selector| document.select(&selector).next().is_some())
            .unwrap_or(false),
        Predicate::SubmitText(fragment) => submit_text_matches(&document, fragment),
    }
}

fn submit_text_matches(document: &Html, fragment: &str) -> bool {
    let fragment = fragment.to_lowercase();

    if let Ok(selector) = Selector::parse("button") {
        for button in document.select(&selector) {
            let text = button.text().collect::<String>().to_lowercase();
            if text.contains(&fragment) {
                return true;
            }
        }
    }

    if let Ok(selector) = Selector::parse("input[type='submit']") {
        for input in document.select(&selector) {
            if let Some(value) = input.value().attr("value") {
                if value.to_lowercase().contains(&fragment) {
                    return true;
                }
            }
        }
    }

    false
}
