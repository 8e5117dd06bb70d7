//! Help overlay listing the configured shortcuts.

use crate::dom::Dom;
use crate::shortcuts::ShortcutMapping;

pub struct HelpOverlay {
    lines: Vec<String>,
    visible: bool,
}

impl HelpOverlay {
    pub fn new(mapping: &ShortcutMapping, leader: &str) -> Self {
        Self {
            lines: help_lines(mapping, leader),
            visible: false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn toggle(&mut self, dom: &mut dyn Dom) {
        self.visible = !self.visible;
        if self.visible {
            dom.set_help_overlay(Some(self.lines.as_slice()));
        } else {
            dom.set_help_overlay(None);
        }
    }
}

/// One line per binding: the key (chords shown as `g n`), then the
/// description, in configuration order.
pub fn help_lines(mapping: &ShortcutMapping, leader: &str) -> Vec<String> {
    let entries: Vec<(String, &str)> = mapping
        .entries()
        .map(|(key, action)| (display_key(key, leader), action.description()))
        .collect();
    let width = entries.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
    entries
        .into_iter()
        .map(|(key, desc)| format!("{key:<width$}  {desc}"))
        .collect()
}

fn display_key(key: &str, leader: &str) -> String {
    match key.strip_prefix(leader) {
        Some(rest) if !rest.is_empty() => format!("{leader} {rest}"),
        _ => key.to_string(),
    }
}
