//! Key input layer: key presses, modifier sets, and the leader-key chord
//! state machine.
//!
//! Pure logic, no I/O. Time is passed in explicitly.

use std::fmt;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::debug;
use serde::Deserialize;

pub const DEFAULT_LEADER_KEY: &str = "g";
pub const DEFAULT_CHORD_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Meta,
}

impl Modifier {
    pub const ALL: [Modifier; 4] = [Modifier::Ctrl, Modifier::Alt, Modifier::Shift, Modifier::Meta];
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Shift => "shift",
            Modifier::Meta => "meta",
        };
        f.write_str(name)
    }
}

/// Modifier keys held during a key press.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    pub fn is_held(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Ctrl => self.ctrl,
            Modifier::Alt => self.alt,
            Modifier::Shift => self.shift,
            Modifier::Meta => self.meta,
        }
    }

    /// Held modifiers, in ctrl/alt/shift/meta order.
    pub fn held(&self) -> impl Iterator<Item = Modifier> + '_ {
        Modifier::ALL.into_iter().filter(move |m| self.is_held(*m))
    }
}

/// A key-down event as the page sees it: the DOM `key` value plus modifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    pub key: String,
    pub modifiers: Modifiers,
}

impl KeyPress {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(key: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
        }
    }

    pub fn shifted(key: impl Into<String>) -> Self {
        Self::with_modifiers(
            key,
            Modifiers {
                shift: true,
                ..Modifiers::NONE
            },
        )
    }

    /// Convert a terminal key event. Releases and keys without a DOM name
    /// give `None`.
    pub fn from_terminal(event: KeyEvent) -> Option<Self> {
        if event.kind == KeyEventKind::Release {
            return None;
        }
        let key = match event.code {
            KeyCode::Char(c) => c.to_string(),
            KeyCode::Enter => "Enter".into(),
            KeyCode::Tab | KeyCode::BackTab => "Tab".into(),
            KeyCode::Esc => "Escape".into(),
            KeyCode::Backspace => "Backspace".into(),
            KeyCode::Delete => "Delete".into(),
            KeyCode::Insert => "Insert".into(),
            KeyCode::Up => "ArrowUp".into(),
            KeyCode::Down => "ArrowDown".into(),
            KeyCode::Left => "ArrowLeft".into(),
            KeyCode::Right => "ArrowRight".into(),
            KeyCode::Home => "Home".into(),
            KeyCode::End => "End".into(),
            KeyCode::PageUp => "PageUp".into(),
            KeyCode::PageDown => "PageDown".into(),
            KeyCode::F(n) => format!("F{n}"),
            _ => return None,
        };
        let m = event.modifiers;
        let modifiers = Modifiers {
            ctrl: m.contains(KeyModifiers::CONTROL),
            alt: m.contains(KeyModifiers::ALT),
            shift: m.contains(KeyModifiers::SHIFT) || event.code == KeyCode::BackTab,
            meta: m.intersects(KeyModifiers::SUPER | KeyModifiers::META),
        };
        Some(Self { key, modifiers })
    }
}

/// Case-fold single ASCII letters; leave every other key name untouched so
/// `Enter` stays `Enter`.
pub fn normalize_key(key: &str) -> String {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => c.to_ascii_lowercase().to_string(),
        _ => key.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrefixState {
    Idle,
    PendingPrefix { expires_at: Instant },
}

/// What a key press turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The leader key started a chord: suppress its default, dispatch nothing.
    Consumed,
    /// A normalized shortcut identifier to dispatch.
    Emit(String),
}

/// Turns raw key presses into shortcut identifiers, folding
/// `leader` + next key into one chord identifier.
///
/// There is a single pending state, so chords never nest: pressing the leader
/// while pending completes the chord as `leader + leader`.
pub struct PrefixKeyMachine {
    leader: String,
    timeout: Duration,
    state: PrefixState,
}

impl Default for PrefixKeyMachine {
    fn default() -> Self {
        Self::new(DEFAULT_LEADER_KEY, DEFAULT_CHORD_TIMEOUT)
    }
}

impl PrefixKeyMachine {
    pub fn new(leader: &str, timeout: Duration) -> Self {
        Self {
            leader: normalize_key(leader),
            timeout,
            state: PrefixState::Idle,
        }
    }

    pub fn leader(&self) -> &str {
        &self.leader
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, PrefixState::PendingPrefix { .. })
    }

    /// Deadline of the open chord window, if any.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            PrefixState::PendingPrefix { expires_at } => Some(expires_at),
            PrefixState::Idle => None,
        }
    }

    /// Close the chord window once its deadline has passed. Returns true if
    /// the pending leader was dropped.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.state {
            PrefixState::PendingPrefix { expires_at } if now >= expires_at => {
                debug!("keys: leader '{}' expired", self.leader);
                self.state = PrefixState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn feed(&mut self, key: &str, now: Instant) -> KeyOutcome {
        // A deadline that passed between ticks still counts.
        self.expire(now);
        let key = normalize_key(key);

        match self.state {
            PrefixState::Idle if key == self.leader => {
                // Entering the pending state replaces any earlier deadline.
                self.state = PrefixState::PendingPrefix {
                    expires_at: now + self.timeout,
                };
                debug!("keys: leader '{key}' pressed, waiting for second key");
                KeyOutcome::Consumed
            }
            PrefixState::PendingPrefix { .. } => {
                self.state = PrefixState::Idle;
                let chord = format!("{}{key}", self.leader);
                debug!("keys: chord '{chord}'");
                KeyOutcome::Emit(chord)
            }
            PrefixState::Idle => KeyOutcome::Emit(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn emit(s: &str) -> KeyOutcome {
        KeyOutcome::Emit(s.to_string())
    }

    #[test]
    fn normalize_folds_letters_only() {
        assert_eq!(normalize_key("J"), "j");
        assert_eq!(normalize_key("j"), "j");
        assert_eq!(normalize_key("Enter"), "Enter");
        assert_eq!(normalize_key("?"), "?");
        assert_eq!(normalize_key("1"), "1");
        assert_eq!(normalize_key("É"), "É");
    }

    #[test]
    fn plain_key_passes_through() {
        let mut m = PrefixKeyMachine::default();
        assert_eq!(m.feed("j", Instant::now()), emit("j"));
        assert!(!m.is_pending());
    }

    #[test]
    fn leader_then_key_within_window_is_chord() {
        let mut m = PrefixKeyMachine::default();
        let t0 = Instant::now();
        assert_eq!(m.feed("g", t0), KeyOutcome::Consumed);
        assert!(m.is_pending());
        assert_eq!(m.feed("h", t0 + ms(499)), emit("gh"));
        assert!(!m.is_pending());
    }

    #[test]
    fn leader_expires_after_window() {
        let mut m = PrefixKeyMachine::default();
        let t0 = Instant::now();
        assert_eq!(m.feed("g", t0), KeyOutcome::Consumed);
        assert!(!m.expire(t0 + ms(499)));
        assert!(m.expire(t0 + ms(500)));
        assert_eq!(m.feed("h", t0 + ms(600)), emit("h"));
    }

    #[test]
    fn late_key_without_tick_is_handled_from_idle() {
        let mut m = PrefixKeyMachine::default();
        let t0 = Instant::now();
        m.feed("g", t0);
        assert_eq!(m.feed("h", t0 + ms(500)), emit("h"));
    }

    #[test]
    fn double_leader_yields_gg() {
        let mut m = PrefixKeyMachine::default();
        let t0 = Instant::now();
        m.feed("g", t0);
        assert_eq!(m.feed("G", t0 + ms(10)), emit("gg"));
        assert!(!m.is_pending());
    }

    #[test]
    fn new_leader_gets_fresh_deadline() {
        let mut m = PrefixKeyMachine::default();
        let t0 = Instant::now();
        m.feed("g", t0);
        m.expire(t0 + ms(500));
        m.feed("g", t0 + ms(700));
        assert_eq!(m.deadline(), Some(t0 + ms(1200)));
        assert_eq!(m.feed("n", t0 + ms(1100)), emit("gn"));
    }

    #[test]
    fn chord_keeps_non_letter_second_key() {
        let mut m = PrefixKeyMachine::default();
        let t0 = Instant::now();
        m.feed("g", t0);
        assert_eq!(m.feed("Enter", t0), emit("gEnter"));
    }

    #[test]
    fn custom_leader_is_normalized() {
        let mut m = PrefixKeyMachine::new("X", ms(200));
        let t0 = Instant::now();
        assert_eq!(m.leader(), "x");
        assert_eq!(m.feed("g", t0), emit("g"));
        assert_eq!(m.feed("x", t0), KeyOutcome::Consumed);
        assert_eq!(m.feed("y", t0 + ms(199)), emit("xy"));
    }

    #[test]
    fn held_modifiers_in_order() {
        let mods = Modifiers {
            meta: true,
            ctrl: true,
            ..Modifiers::NONE
        };
        assert_eq!(mods.held().collect::<Vec<_>>(), vec![Modifier::Ctrl, Modifier::Meta]);
        assert_eq!(Modifiers::NONE.held().count(), 0);
    }

    fn term_key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn terminal_char_with_shift() {
        let press = KeyPress::from_terminal(term_key(KeyCode::Char('F'), KeyModifiers::SHIFT)).unwrap();
        assert_eq!(press, KeyPress::shifted("F"));
    }

    #[test]
    fn terminal_named_keys() {
        let enter = KeyPress::from_terminal(term_key(KeyCode::Enter, KeyModifiers::NONE)).unwrap();
        assert_eq!(enter.key, "Enter");
        let back_tab = KeyPress::from_terminal(term_key(KeyCode::BackTab, KeyModifiers::NONE)).unwrap();
        assert_eq!(back_tab, KeyPress::shifted("Tab"));
        let ctrl_c = KeyPress::from_terminal(term_key(KeyCode::Char('c'), KeyModifiers::CONTROL)).unwrap();
        assert!(ctrl_c.modifiers.ctrl);
    }

    #[test]
    fn terminal_release_is_ignored() {
        let mut ev = term_key(KeyCode::Char('j'), KeyModifiers::NONE);
        ev.kind = KeyEventKind::Release;
        assert!(KeyPress::from_terminal(ev).is_none());
        assert!(KeyPress::from_terminal(term_key(KeyCode::Null, KeyModifiers::NONE)).is_none());
    }
}
