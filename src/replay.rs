//! Scripted replay: run timed key presses and page mutations against a
//! [`MemoryPage`] and collect what happened.
//!
//! The driver owns the clock. It ticks the extension once per frame up to
//! each step's timestamp, applies the step, and after the last step keeps
//! ticking until no wait or chord is outstanding (bounded by the wait
//! timeout).

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use log::debug;
use serde::Deserialize;

use crate::config::Config;
use crate::extension::{Extension, Phase};
use crate::keys::{KeyPress, Modifiers};
use crate::page::{MemoryPage, PageEvent, PageSpec};

const DEFAULT_FRAME_MS: u64 = 16;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReplayScript {
    pub frame_ms: Option<u64>,
    pub page: PageSpec,
    pub steps: Vec<Step>,
}

/// One timed step. Exactly one of `key`, `attach`, `detach`, `focus`, `blur`
/// must be given.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Step {
    pub at_ms: u64,
    pub key: Option<String>,
    pub modifiers: Modifiers,
    pub attach: Option<String>,
    pub detach: Option<String>,
    pub focus: Option<String>,
    pub blur: bool,
}

impl ReplayScript {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("failed to parse replay script")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Key { key: KeyPress, prevented: bool },
    Page(PageEvent),
    Attached(String),
    Detached(String),
    FocusMoved(Option<String>),
}

#[derive(Debug)]
pub struct ReplayOutcome {
    /// `(elapsed ms, entry)` in order of occurrence.
    pub entries: Vec<(u64, Entry)>,
    pub phase: Phase,
    pub current_post: Option<String>,
    pub feed_index: Option<usize>,
    pub help_visible: bool,
    pub elapsed: Duration,
}

impl ReplayOutcome {
    pub fn page_events(&self) -> impl Iterator<Item = &PageEvent> {
        self.entries.iter().filter_map(|(_, e)| match e {
            Entry::Page(ev) => Some(ev),
            _ => None,
        })
    }

    /// Human-readable log, one line per entry, plus a summary.
    pub fn lines(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .entries
            .iter()
            .map(|(ms, entry)| format!("{ms:>6}ms  {}", describe(entry)))
            .collect();
        out.push(format!(
            "phase={:?} feed={} post={} help={}",
            self.phase,
            self.feed_index.map_or("-".to_string(), |i| i.to_string()),
            self.current_post.as_deref().unwrap_or("-"),
            if self.help_visible { "shown" } else { "hidden" },
        ));
        out
    }
}

fn describe(entry: &Entry) -> String {
    match entry {
        Entry::Key { key, prevented } => {
            let mods: Vec<String> = key.modifiers.held().map(|m| m.to_string()).collect();
            let combo = if mods.is_empty() {
                key.key.clone()
            } else {
                format!("{}+{}", mods.join("+"), key.key)
            };
            let verdict = if *prevented { "handled" } else { "passed through" };
            format!("key {combo} ({verdict})")
        }
        Entry::Page(PageEvent::Clicked(n)) => format!("  click {n}"),
        Entry::Page(PageEvent::Focused(n)) => format!("  focus {n}"),
        Entry::Page(PageEvent::TextSelected(n)) => format!("  select {n}"),
        Entry::Page(PageEvent::ScrolledTo(n)) => format!("  scroll to {n}"),
        Entry::Page(PageEvent::OverlayShown(lines)) => {
            format!("  help overlay shown ({} lines)", lines.len())
        }
        Entry::Page(PageEvent::OverlayHidden) => "  help overlay hidden".to_string(),
        Entry::Attached(n) => format!("page: {n} attached"),
        Entry::Detached(n) => format!("page: {n} detached"),
        Entry::FocusMoved(Some(n)) => format!("page: focus in {n}"),
        Entry::FocusMoved(None) => "page: focus cleared".to_string(),
    }
}

struct Driver<'a> {
    page: MemoryPage,
    ext: Extension,
    t0: Instant,
    clock: Duration,
    frame: Duration,
    entries: Vec<(u64, Entry)>,
    config: &'a Config,
}

impl Driver<'_> {
    fn now_ms(&self) -> u64 {
        self.clock.as_millis() as u64
    }

    fn drain(&mut self) {
        let ms = self.now_ms();
        for ev in self.page.take_events() {
            self.entries.push((ms, Entry::Page(ev)));
        }
    }

    fn tick(&mut self) {
        self.clock += self.frame;
        self.ext.tick(&mut self.page, self.t0 + self.clock);
        self.drain();
    }

    fn advance_to(&mut self, target: Duration) {
        while self.clock + self.frame <= target {
            self.tick();
        }
        if self.clock < target {
            self.clock = target;
        }
    }

    fn lookup(&self, name: &str) -> Result<crate::dom::Element> {
        self.page
            .find(name)
            .with_context(|| format!("step refers to unknown element '{name}'"))
    }

    fn apply(&mut self, step: &Step) -> Result<()> {
        let ms = self.now_ms();
        if let Some(key) = &step.key {
            let press = KeyPress::with_modifiers(key.clone(), step.modifiers);
            let prevented = self
                .ext
                .handle_key(&press, &mut self.page, self.t0 + self.clock);
            self.entries.push((
                ms,
                Entry::Key {
                    key: press,
                    prevented,
                },
            ));
        } else if let Some(name) = &step.attach {
            let el = self.lookup(name)?;
            self.page.attach(el);
            self.entries.push((ms, Entry::Attached(name.clone())));
        } else if let Some(name) = &step.detach {
            let el = self.lookup(name)?;
            self.page.detach(el);
            self.entries.push((ms, Entry::Detached(name.clone())));
        } else if let Some(name) = &step.focus {
            let el = self.lookup(name)?;
            self.page.set_focus(Some(el));
            self.entries.push((ms, Entry::FocusMoved(Some(name.clone()))));
        } else if step.blur {
            self.page.set_focus(None);
            self.entries.push((ms, Entry::FocusMoved(None)));
        }
        self.drain();
        Ok(())
    }

    fn settle(&mut self) {
        let deadline = self.clock + self.config.wait_timeout + self.frame;
        while (self.ext.pending_waits() > 0 || self.ext.chord_pending()) && self.clock < deadline {
            self.tick();
        }
    }
}

fn validate(step: &Step) -> Result<()> {
    let actions = [
        step.key.is_some(),
        step.attach.is_some(),
        step.detach.is_some(),
        step.focus.is_some(),
        step.blur,
    ];
    match actions.iter().filter(|a| **a).count() {
        1 => Ok(()),
        0 => bail!("step at {}ms does nothing", step.at_ms),
        _ => bail!("step at {}ms has more than one action", step.at_ms),
    }
}

pub fn run(script: &ReplayScript, config: &Config) -> Result<ReplayOutcome> {
    for step in &script.steps {
        validate(step)?;
    }
    let mut steps: Vec<&Step> = script.steps.iter().collect();
    steps.sort_by_key(|s| s.at_ms);

    let mut page = MemoryPage::from_spec(script.page.clone())?;
    let t0 = Instant::now();
    let ext = Extension::start(config, &mut page, t0);
    let mut driver = Driver {
        page,
        ext,
        t0,
        clock: Duration::ZERO,
        frame: Duration::from_millis(script.frame_ms.unwrap_or(DEFAULT_FRAME_MS).max(1)),
        entries: Vec::new(),
        config,
    };
    driver.drain();

    for step in steps {
        driver.advance_to(Duration::from_millis(step.at_ms));
        debug!("replay: step at {}ms", step.at_ms);
        driver.apply(step)?;
    }
    driver.settle();

    let current_post = driver
        .ext
        .current_post()
        .map(|el| driver.page.name(el).to_string());
    Ok(ReplayOutcome {
        phase: driver.ext.phase(),
        current_post,
        feed_index: driver.ext.feed_index(),
        help_visible: driver.ext.help_visible(),
        elapsed: driver.clock,
        entries: driver.entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
        [[page.elements]]
        name = "root"
        selectors = ['div[data-testid="followingFeedPage-feed-flatlist"]']

        [[page.elements]]
        name = "p0"
        selectors = ['div[data-testid*="feedItem-by-"]']

        [[page.elements]]
        name = "p1"
        selectors = ['div[data-testid*="feedItem-by-"]']

        [[steps]]
        at_ms = 0
        key = "j"

        [[steps]]
        at_ms = 100
        key = "j"

        [[steps]]
        at_ms = 50
        key = "x"
    "#;

    #[test]
    fn runs_steps_in_time_order() {
        let script = ReplayScript::from_toml(SCRIPT).unwrap();
        let outcome = run(&script, &Config::default()).unwrap();
        assert_eq!(outcome.phase, Phase::Ready);
        assert_eq!(outcome.current_post.as_deref(), Some("p1"));
        let keys: Vec<(u64, &str, bool)> = outcome
            .entries
            .iter()
            .filter_map(|(ms, e)| match e {
                Entry::Key { key, prevented } => Some((*ms, key.key.as_str(), *prevented)),
                _ => None,
            })
            .collect();
        assert_eq!(keys, vec![(0, "j", true), (50, "x", false), (100, "j", true)]);
    }

    #[test]
    fn summary_line_is_last() {
        let script = ReplayScript::from_toml(SCRIPT).unwrap();
        let outcome = run(&script, &Config::default()).unwrap();
        let lines = outcome.lines();
        assert_eq!(
            lines.last().map(String::as_str),
            Some("phase=Ready feed=- post=p1 help=hidden")
        );
        assert!(lines[0].contains("key j (handled)"));
    }

    #[test]
    fn step_with_two_actions_is_rejected() {
        let script = ReplayScript {
            steps: vec![Step {
                key: Some("j".into()),
                blur: true,
                ..Step::default()
            }],
            ..ReplayScript::default()
        };
        assert!(run(&script, &Config::default()).is_err());
    }

    #[test]
    fn unknown_element_is_an_error() {
        let script = ReplayScript {
            steps: vec![Step {
                attach: Some("ghost".into()),
                ..Step::default()
            }],
            ..ReplayScript::default()
        };
        let err = run(&script, &Config::default()).unwrap_err();
        assert!(format!("{err:#}").contains("ghost"));
    }

    #[test]
    fn empty_page_goes_inert() {
        let outcome = run(&ReplayScript::default(), &Config::default()).unwrap();
        assert_eq!(outcome.phase, Phase::Inert);
        assert!(outcome.elapsed > Duration::from_millis(5000));
    }
}
