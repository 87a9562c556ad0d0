//! Failure diagnostics for the could-not-find-password path: a dump of every
//! input element's attributes and the frame list, so an operator can extend
//! the candidate selectors for an unrecognized identity provider.
//!
//! Purely informational, never machine-parsed, and never contains field
//! values.

use std::fmt::Write;

use crate::observe::{InputField, PageObservation};

#[derive(Debug, Clone)]
pub struct FieldDump {
    pub page_url: String,
    pub inputs: Vec<InputField>,
    pub frames: Vec<String>,
}

impl FieldDump {
    pub fn from_observation(observation: &PageObservation) -> Self {
        Self {
            page_url: observation.url.clone(),
            inputs: observation.inputs.clone(),
            frames: observation.frames.clone(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "could not find a password field");
        let _ = writeln!(out, "page url: {}", self.page_url);

        let _ = writeln!(out, "input fields found on page: {}", self.inputs.len());
        for (index, input) in self.inputs.iter().enumerate() {
            let _ = writeln!(
                out,
                "  [{}] type={}, name={}, id={}, placeholder={}, class={}, visible={}",
                index,
                input.input_type,
                attr(&input.name),
                attr(&input.id),
                attr(&input.placeholder),
                attr(&input.class),
                input.visible,
            );
        }

        let _ = writeln!(out, "frames: {}", self.frames.len());
        for (index, frame) in self.frames.iter().enumerate() {
            let _ = writeln!(out, "  [{}] {}", index, frame);
        }

        out
    }
}

fn attr(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("(none)")
}
