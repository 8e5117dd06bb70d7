//! The extension: one explicit struct holding all navigation state.
//!
//! Lifecycle:
//!   `start`: build the shortcut table, wait for the app root to mount
//!   `Ready`: discover feed tabs, start handling keys
//!   `Inert`: the app root never appeared; every key passes through
//!
//! The host calls `handle_key` for each key-down and `tick` once per frame.
//! Both take the page and the current time; nothing here reads a clock.

use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::actions;
use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::dom::{APP_ROOT, Dom, Element, text_entry_focused};
use crate::feed::{Direction, FeedCycle, FeedTabs};
use crate::help::HelpOverlay;
use crate::keys::{KeyOutcome, KeyPress, PrefixKeyMachine};
use crate::shortcuts::{Dispatch, ShortcutAction, ShortcutMapping, dispatch};
use crate::waiter::{WaitError, WaitQueue, WaitRequest, WaitResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Ready,
    Inert,
}

/// What a settled wait was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitPurpose {
    AppLoad,
    FeedLoad,
    SearchInput,
}

pub struct Extension {
    phase: Phase,
    keys: PrefixKeyMachine,
    mapping: ShortcutMapping,
    feed: Option<FeedCycle>,
    current_post: Option<Element>,
    help: HelpOverlay,
    waits: WaitQueue<WaitPurpose>,
    wait_timeout: Duration,
}

impl Extension {
    pub fn start(config: &Config, dom: &mut dyn Dom, now: Instant) -> Self {
        let mapping = config.mapping();
        let keys = PrefixKeyMachine::new(&config.leader_key, config.chord_timeout);
        let help = HelpOverlay::new(&mapping, keys.leader());
        let mut ext = Self {
            phase: Phase::Loading,
            keys,
            mapping,
            feed: None,
            current_post: None,
            help,
            waits: WaitQueue::new(),
            wait_timeout: config.wait_timeout,
        };
        info!("extension: waiting for app root");
        let request = WaitRequest::new(APP_ROOT, config.wait_timeout, CancellationToken::new(), now);
        ext.schedule(WaitPurpose::AppLoad, request, dom);
        ext
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == Phase::Ready
    }

    pub fn current_post(&self) -> Option<Element> {
        self.current_post
    }

    pub fn feed_index(&self) -> Option<usize> {
        self.feed.as_ref().and_then(FeedCycle::current_index)
    }

    pub fn feed_tab_count(&self) -> usize {
        self.feed.as_ref().map_or(0, |f| f.tabs().len())
    }

    pub fn help_visible(&self) -> bool {
        self.help.is_visible()
    }

    pub fn help_lines(&self) -> &[String] {
        self.help.lines()
    }

    pub fn mapping(&self) -> &ShortcutMapping {
        &self.mapping
    }

    pub fn chord_pending(&self) -> bool {
        self.keys.is_pending()
    }

    pub fn pending_waits(&self) -> usize {
        self.waits.len()
    }

    /// Handle one key-down. Returns whether the page's default handling of
    /// the key should be suppressed.
    pub fn handle_key(&mut self, key: &KeyPress, dom: &mut dyn Dom, now: Instant) -> bool {
        if self.phase != Phase::Ready {
            return false;
        }
        // Typing into a field must not be eaten by the leader key either.
        if text_entry_focused(dom) {
            return false;
        }
        let identifier = match self.keys.feed(&key.key, now) {
            KeyOutcome::Consumed => return true,
            KeyOutcome::Emit(id) => id,
        };
        match dispatch(&self.mapping, &identifier, key.modifiers, dom) {
            Dispatch::Invoke(action) => {
                debug!("extension: '{identifier}' -> {action:?}");
                self.invoke(action, key, dom, now);
                true
            }
            Dispatch::Unmapped | Dispatch::Blocked(_) => false,
        }
    }

    /// One frame: close an expired chord window and advance outstanding waits.
    pub fn tick(&mut self, dom: &mut dyn Dom, now: Instant) {
        self.keys.expire(now);
        for (purpose, result) in self.waits.tick(dom, now) {
            self.settle(purpose, result, dom);
        }
    }

    fn invoke(&mut self, action: ShortcutAction, key: &KeyPress, dom: &mut dyn Dom, now: Instant) {
        let outcome = match action {
            ShortcutAction::NextPost => {
                actions::next_post(dom, self.current_post).map(|p| self.current_post = Some(p))
            }
            ShortcutAction::PreviousPost => {
                actions::previous_post(dom, self.current_post).map(|p| self.current_post = Some(p))
            }
            ShortcutAction::LikePost => actions::like_post(dom, self.current_post),
            ShortcutAction::ReplyToPost => actions::reply_to_post(dom, self.current_post),
            ShortcutAction::OpenPost => actions::open_post(dom, self.current_post),
            ShortcutAction::ExpandPhoto => actions::expand_photo(dom, self.current_post),
            ShortcutAction::FocusSearch => match actions::focus_search(dom, self.wait_timeout, now) {
                Ok(Some(request)) => {
                    self.schedule(WaitPurpose::SearchInput, request, dom);
                    Ok(())
                }
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            },
            ShortcutAction::LoadMore => {
                actions::load_more(dom).map(|post| self.current_post = post)
            }
            ShortcutAction::CycleFeed => {
                self.cycle_feed(Direction::from_shift(key.modifiers.shift), dom, now);
                Ok(())
            }
            ShortcutAction::ShowShortcuts => {
                self.help.toggle(dom);
                Ok(())
            }
        };
        if let Err(e) = outcome {
            warn!("{action:?}: {e}");
        }
    }

    fn cycle_feed(&mut self, direction: Direction, dom: &mut dyn Dom, now: Instant) {
        let Some(feed) = self.feed.as_mut() else {
            warn!("extension: feed tabs unavailable");
            return;
        };
        if let Some(request) = feed.cycle(direction, dom, &mut self.current_post, now) {
            self.schedule(WaitPurpose::FeedLoad, request, dom);
        }
    }

    /// Queue a wait, applying it right away if it already settled. The
    /// request's own start time is the first check's time.
    fn schedule(&mut self, purpose: WaitPurpose, request: WaitRequest, dom: &mut dyn Dom) {
        let started = request.started();
        if let Some((purpose, result)) = self.waits.start(purpose, request, dom, started) {
            self.settle(purpose, result, dom);
        }
    }

    fn settle(&mut self, purpose: WaitPurpose, result: WaitResult, dom: &mut dyn Dom) {
        match purpose {
            WaitPurpose::AppLoad => match result {
                Ok(_) => self.on_app_loaded(dom),
                Err(e) => {
                    error!("extension: initialization failed: {e}");
                    self.phase = Phase::Inert;
                }
            },
            WaitPurpose::FeedLoad => {
                if let Some(feed) = self.feed.as_mut() {
                    feed.on_feed_loaded(result, dom, &mut self.current_post);
                }
            }
            WaitPurpose::SearchInput => match result {
                Ok(input) => actions::finish_focus_search(dom, input),
                Err(WaitError::Cancelled) => {}
                Err(e) => error!("extension: failed to find search input: {e}"),
            },
        }
    }

    fn on_app_loaded(&mut self, dom: &dyn Dom) {
        self.phase = Phase::Ready;
        info!("extension: app loaded, {} shortcut(s) active", self.mapping.len());
        match FeedTabs::discover(dom) {
            Ok(tabs) => self.feed = Some(FeedCycle::new(tabs, self.wait_timeout)),
            Err(e) => error!("extension: failed to initialize feed tabs: {e:#}"),
        }
    }
}
