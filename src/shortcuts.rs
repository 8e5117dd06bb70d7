//! Shortcut table and dispatch guard.
//!
//! Every action a key can trigger is a [`ShortcutAction`] variant. The
//! configured key strings are resolved once into an immutable
//! [`ShortcutMapping`]; [`dispatch`] looks a normalized identifier up and
//! decides whether the action may run.

use std::collections::HashMap;

use log::debug;

use crate::dom::{Dom, text_entry_focused};
use crate::keys::{Modifier, Modifiers};

/// All actions reachable from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShortcutAction {
    NextPost,
    PreviousPost,
    LikePost,
    ReplyToPost,
    CycleFeed,
    OpenPost,
    FocusSearch,
    ExpandPhoto,
    LoadMore,
    ShowShortcuts,
}

impl ShortcutAction {
    /// Declaration order; also the help overlay order.
    pub const ALL: [ShortcutAction; 10] = [
        ShortcutAction::NextPost,
        ShortcutAction::PreviousPost,
        ShortcutAction::LikePost,
        ShortcutAction::ReplyToPost,
        ShortcutAction::CycleFeed,
        ShortcutAction::OpenPost,
        ShortcutAction::FocusSearch,
        ShortcutAction::ExpandPhoto,
        ShortcutAction::LoadMore,
        ShortcutAction::ShowShortcuts,
    ];

    /// Key of this action in the `[shortcuts]` config table.
    pub fn config_name(self) -> &'static str {
        match self {
            ShortcutAction::NextPost => "nextPost",
            ShortcutAction::PreviousPost => "previousPost",
            ShortcutAction::LikePost => "likePost",
            ShortcutAction::ReplyToPost => "replyToPost",
            ShortcutAction::CycleFeed => "cycleFeed",
            ShortcutAction::OpenPost => "openPost",
            ShortcutAction::FocusSearch => "focusSearch",
            ShortcutAction::ExpandPhoto => "expandPhoto",
            ShortcutAction::LoadMore => "loadMore",
            ShortcutAction::ShowShortcuts => "showShortcuts",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ShortcutAction::NextPost => "Next post",
            ShortcutAction::PreviousPost => "Previous post",
            ShortcutAction::LikePost => "Like / unlike post",
            ShortcutAction::ReplyToPost => "Reply to post",
            ShortcutAction::CycleFeed => "Next feed tab (shift: previous)",
            ShortcutAction::OpenPost => "Open post",
            ShortcutAction::FocusSearch => "Focus search",
            ShortcutAction::ExpandPhoto => "Expand photo",
            ShortcutAction::LoadMore => "Load new posts",
            ShortcutAction::ShowShortcuts => "Show / hide shortcuts",
        }
    }

    /// Modifiers that may be held without blocking the action.
    pub fn allowed_modifiers(self) -> &'static [Modifier] {
        match self {
            ShortcutAction::CycleFeed | ShortcutAction::ShowShortcuts => &[Modifier::Shift],
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub action: ShortcutAction,
    pub allowed_modifiers: &'static [Modifier],
}

impl Binding {
    pub fn new(action: ShortcutAction) -> Self {
        Self {
            action,
            allowed_modifiers: action.allowed_modifiers(),
        }
    }

    pub fn allows(&self, modifier: Modifier) -> bool {
        self.allowed_modifiers.contains(&modifier)
    }
}

/// Normalized identifier → binding. Built once, never mutated.
#[derive(Debug, Clone, Default)]
pub struct ShortcutMapping {
    bindings: HashMap<String, Binding>,
    order: Vec<(String, ShortcutAction)>,
}

impl ShortcutMapping {
    /// Build from `(action, key)` pairs. When two actions share a key the
    /// later one takes it; nothing else is validated.
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = (ShortcutAction, &'a str)>) -> Self {
        let mut mapping = Self::default();
        for (action, key) in keys {
            if let Some(prev) = mapping.bindings.insert(key.to_string(), Binding::new(action)) {
                debug!(
                    "shortcuts: '{key}' rebound from {:?} to {action:?}",
                    prev.action
                );
                mapping.order.retain(|(k, _)| k != key);
            }
            mapping.order.push((key.to_string(), action));
        }
        mapping
    }

    pub fn get(&self, identifier: &str) -> Option<&Binding> {
        self.bindings.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Live bindings as `(key, action)` in configuration order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, ShortcutAction)> {
        self.order.iter().map(|(k, a)| (k.as_str(), *a))
    }
}

/// Why a mapped shortcut was not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocked {
    TextEntryFocused,
    ModifierNotAllowed(Modifier),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Not a shortcut; the page handles the key normally.
    Unmapped,
    /// A shortcut, but the guard refused it. The default is not prevented.
    Blocked(Blocked),
    /// Prevent the default and run the action once.
    Invoke(ShortcutAction),
}

impl Dispatch {
    pub fn prevents_default(&self) -> bool {
        matches!(self, Dispatch::Invoke(_))
    }
}

/// Guard shared by every binding: never hijack text entry, never fire with a
/// modifier the binding does not allow.
pub fn check_guard(dom: &dyn Dom, binding: &Binding, modifiers: Modifiers) -> Option<Blocked> {
    if text_entry_focused(dom) {
        return Some(Blocked::TextEntryFocused);
    }
    modifiers
        .held()
        .find(|m| !binding.allows(*m))
        .map(Blocked::ModifierNotAllowed)
}

pub fn dispatch(
    mapping: &ShortcutMapping,
    identifier: &str,
    modifiers: Modifiers,
    dom: &dyn Dom,
) -> Dispatch {
    let Some(binding) = mapping.get(identifier) else {
        return Dispatch::Unmapped;
    };
    match check_guard(dom, binding, modifiers) {
        Some(reason) => {
            debug!("shortcuts: '{identifier}' blocked ({reason:?})");
            Dispatch::Blocked(reason)
        }
        None => Dispatch::Invoke(binding.action),
    }
}
