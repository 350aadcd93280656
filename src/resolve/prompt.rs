use dialoguer::Select;

use crate::util::output;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickItem {
    pub label: String,
    pub detail: String,
}

impl PickItem {
    pub fn new(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            detail: detail.into(),
        }
    }
}

/// Capability interface over whatever front end hosts the resolution
/// engine. Returns the chosen index, or `None` when the prompt was
/// dismissed.
pub trait RepositoryPicker {
    fn pick(&self, items: &[PickItem], placeholder: &str) -> Option<usize>;
}

/// Interactive terminal picker.
pub struct TerminalPicker;

impl RepositoryPicker for TerminalPicker {
    fn pick(&self, items: &[PickItem], placeholder: &str) -> Option<usize> {
        let rendered: Vec<String> = items
            .iter()
            .map(|item| {
                if item.detail.is_empty() {
                    item.label.clone()
                } else {
                    format!("{} ({})", item.label, item.detail)
                }
            })
            .collect();
        Select::new()
            .with_prompt(placeholder)
            .items(&rendered)
            .default(0)
            .interact_opt()
            .ok()
            .flatten()
    }
}

/// Non-interactive picker: takes the first candidate in enumeration order
/// so scripted callers never block on input.
pub struct FirstCandidatePicker;

impl RepositoryPicker for FirstCandidatePicker {
    fn pick(&self, items: &[PickItem], placeholder: &str) -> Option<usize> {
        let first = items.first()?;
        output::info(&format!("{placeholder}: auto-selected {}", first.label));
        Some(0)
    }
}
