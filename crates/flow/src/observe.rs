//! Page observation: an immutable snapshot of the signals the classifier
//! needs, produced fresh on every step. Stale observations must not be
//! reused across actions because the DOM may have changed.

use scraper::{Html, Selector};

use crate::page::PageDriver;
use crate::selectors::SUCCESS_FRAGMENTS;
use crate::FlowError;

#[derive(Debug, Clone)]
pub struct PageObservation {
    pub url: String,
    /// Visible password-type inputs.
    pub password_fields: usize,
    /// Visible username/email-type inputs.
    pub username_fields: usize,
    /// Any of the fixed success-indicator fragments present.
    pub success_indicator: bool,
    /// Every input element's attributes, for the failure dump.
    pub inputs: Vec<InputField>,
    /// iframe URLs, for the failure dump.
    pub frames: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct InputField {
    pub input_type: String,
    pub name: Option<String>,
    pub id: Option<String>,
    pub placeholder: Option<String>,
    pub class: Option<String>,
    pub visible: bool,
}

/// Take a fresh snapshot of the driver's current page.
pub fn observe<D: PageDriver + ?Sized>(driver: &D) -> Result<PageObservation, FlowError> {
    let url = driver.current_url()?;
    let html = driver.content()?;
    Ok(PageObservation::from_rendered(url, &html))
}

impl PageObservation {
    pub fn from_rendered(url: String, html: &str) -> Self {
        let document = Html::parse_document(html);
        let inputs = collect_inputs(&document);

        let password_fields = inputs
            .iter()
            .filter(|field| field.visible && field.input_type == "password")
            .count();
        let username_fields = inputs
            .iter()
            .filter(|field| field.visible && is_username_like(field))
            .count();

        let html_lower = html.to_lowercase();
        let success_indicator = SUCCESS_FRAGMENTS
            .iter()
            .any(|fragment| html_lower.contains(fragment));

        Self {
            url,
            password_fields,
            username_fields,
            success_indicator,
            inputs,
            frames: collect_frames(&document),
        }
    }
}

fn collect_inputs(document: &Html) -> Vec<InputField> {
    let Ok(selector) = Selector::parse("input") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|input| {
            let element = input.value();
            let input_type = element.attr("type").unwrap_or("text").to_string();
            // Static visibility check: an out-of-flow element is invisible to
            // the user even though it is in the DOM.
            let style = element.attr("style").unwrap_or("").replace(' ', "");
            let visible = input_type != "hidden"
                && element.attr("hidden").is_none()
                && !style.contains("display:none")
                && !style.contains("visibility:hidden");

            InputField {
                input_type,
                name: element.attr("name").map(str::to_string),
                id: element.attr("id").map(str::to_string),
                placeholder: element.attr("placeholder").map(str::to_string),
                class: element.attr("class").map(str::to_string),
                visible,
            }
        })
        .collect()
}

fn is_username_like(field: &InputField) -> bool {
    if field.input_type == "email" {
        return true;
    }
    if field.input_type != "text" {
        return false;
    }
    let named = |attr: &Option<String>| {
        attr.as_deref()
            .map(|value| {
                let value = value.to_lowercase();
                value.contains("user") || value.contains("email")
            })
            .unwrap_or(false)
    };
    named(&field.name) || named(&field.id)
}

fn collect_frames(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("iframe") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|frame| frame.value().attr("src").map(str::to_string))
        .collect()
}
