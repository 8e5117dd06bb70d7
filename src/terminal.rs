//! Interactive host: real key presses from a raw-mode terminal dispatched
//! against a [`MemoryPage`].

use std::io::{self, Write, stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{ExecutableCommand, cursor, terminal};
use log::debug;

use crate::config::Config;
use crate::extension::Extension;
use crate::keys::KeyPress;
use crate::page::{MemoryPage, PageEvent};

const FRAME: Duration = Duration::from_millis(16);

// ---------------------------------------------------------------------------
// RawGuard: Drop restores cooked mode and the cursor
// ---------------------------------------------------------------------------

pub struct RawGuard {
    cleaned: bool,
}

impl RawGuard {
    pub fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        stdout().execute(cursor::Hide)?;
        Ok(Self { cleaned: false })
    }

    pub fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        let _ = stdout().execute(cursor::Show);
        let _ = terminal::disable_raw_mode();
    }
}

impl Drop for RawGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn is_quit(ev: &KeyEvent) -> bool {
    ev.kind == KeyEventKind::Press
        && (ev.code == KeyCode::Esc
            || (ev.code == KeyCode::Char('c') && ev.modifiers.contains(KeyModifiers::CONTROL)))
}

/// Raw mode needs explicit carriage returns.
fn say(out: &mut impl Write, line: &str) -> io::Result<()> {
    write!(out, "{line}\r\n")?;
    out.flush()
}

fn describe_event(page_event: &PageEvent) -> String {
    match page_event {
        PageEvent::Clicked(n) => format!("  click {n}"),
        PageEvent::Focused(n) => format!("  focus {n}"),
        PageEvent::TextSelected(n) => format!("  select {n}"),
        PageEvent::ScrolledTo(n) => format!("  scroll to {n}"),
        PageEvent::OverlayShown(lines) => {
            let mut s = String::from("  shortcuts:");
            for l in lines {
                s.push_str("\r\n    ");
                s.push_str(l);
            }
            s
        }
        PageEvent::OverlayHidden => "  shortcuts hidden".to_string(),
    }
}

/// Run until Esc or Ctrl-C. Each key press is reported with whether the
/// extension handled it, followed by the page side effects it caused.
pub fn run_live(mut page: MemoryPage, config: &Config) -> Result<()> {
    let mut guard = RawGuard::enter()?;
    let mut out = stdout();
    let mut ext = Extension::start(config, &mut page, Instant::now());
    say(&mut out, "feedkeys live: press keys, Esc or Ctrl-C to quit")?;

    let result = (|| -> Result<()> {
        loop {
            let now = Instant::now();
            ext.tick(&mut page, now);
            for ev in page.take_events() {
                say(&mut out, &describe_event(&ev))?;
            }

            if !event::poll(FRAME)? {
                continue;
            }
            let Event::Key(key_event) = event::read()? else {
                continue;
            };
            debug!("event: {key_event:?}");
            if is_quit(&key_event) {
                return Ok(());
            }
            let Some(press) = KeyPress::from_terminal(key_event) else {
                continue;
            };
            let handled = ext.handle_key(&press, &mut page, Instant::now());
            let verdict = if handled { "handled" } else { "passed through" };
            say(&mut out, &format!("key {} ({verdict})", press.key))?;
            for ev in page.take_events() {
                say(&mut out, &describe_event(&ev))?;
            }
            if ext.chord_pending() {
                say(&mut out, "  waiting for second key")?;
            }
        }
    })();

    guard.cleanup();
    result
}
