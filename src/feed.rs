//! Feed tabs and the coordinator that switches between them.
//!
//! Switching tabs starts a wait for the new feed's content. Only the latest
//! switch may set the current post: every cycle cancels the previous wait's
//! token before starting a new one, so a slow, superseded wait settles as
//! `Cancelled` and is ignored.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use crate::cancel::CancellationToken;
use crate::dom::{Dom, Element, FEED_ITEM, FEED_TABS, feed_content_selector};
use crate::waiter::{WaitError, WaitRequest, WaitResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedTab {
    pub element: Element,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Shift walks the tabs backwards.
    pub fn from_shift(shift: bool) -> Self {
        if shift {
            Direction::Backward
        } else {
            Direction::Forward
        }
    }
}

/// Tab list discovered once at startup plus the current position.
#[derive(Debug, Clone, Default)]
pub struct FeedTabs {
    tabs: Vec<FeedTab>,
    current: Option<usize>,
}

impl FeedTabs {
    pub fn new(tabs: Vec<FeedTab>) -> Self {
        let current = tabs.iter().position(|t| t.is_active);
        Self { tabs, current }
    }

    /// Read the tab bar. A tab is active when its first child carries a
    /// `border-bottom-color` style (the underline).
    pub fn discover(dom: &dyn Dom) -> Result<Self> {
        let container = dom
            .query(FEED_TABS)
            .with_context(|| format!("feed tab container {FEED_TABS} not found"))?;
        let tabs: Vec<FeedTab> = dom
            .children(container)
            .into_iter()
            .map(|element| {
                let is_active = dom
                    .children(element)
                    .first()
                    .and_then(|first| dom.style_property(*first, "border-bottom-color"))
                    .is_some();
                FeedTab { element, is_active }
            })
            .collect();
        let feed_tabs = Self::new(tabs);
        info!(
            "feed: discovered {} tab(s), active={:?}",
            feed_tabs.len(),
            feed_tabs.current
        );
        Ok(feed_tabs)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn tab(&self, index: usize) -> Option<&FeedTab> {
        self.tabs.get(index)
    }

    /// Move one step, wrapping at both ends. With no current tab, forward
    /// lands on the first tab and backward on the last. `None` when there
    /// are no tabs.
    pub fn advance(&mut self, direction: Direction) -> Option<usize> {
        let n = self.tabs.len();
        if n == 0 {
            return None;
        }
        let next = match (self.current, direction) {
            (Some(i), Direction::Forward) => (i + 1) % n,
            (Some(i), Direction::Backward) => (i + n - 1) % n,
            (None, Direction::Forward) => 0,
            // Clamped to the last tab rather than stepping back from -1.
            (None, Direction::Backward) => n - 1,
        };
        self.current = Some(next);
        Some(next)
    }
}

/// Switches feed tabs, keeping at most one live content wait.
pub struct FeedCycle {
    tabs: FeedTabs,
    active_token: Option<CancellationToken>,
    wait_timeout: Duration,
}

impl FeedCycle {
    pub fn new(tabs: FeedTabs, wait_timeout: Duration) -> Self {
        Self {
            tabs,
            active_token: None,
            wait_timeout,
        }
    }

    pub fn tabs(&self) -> &FeedTabs {
        &self.tabs
    }

    pub fn current_index(&self) -> Option<usize> {
        self.tabs.current_index()
    }

    /// Switch to the neighbouring tab. Returns the content wait the caller
    /// must schedule; the previous wait, if still running, is cancelled.
    pub fn cycle(
        &mut self,
        direction: Direction,
        dom: &mut dyn Dom,
        current_post: &mut Option<Element>,
        now: Instant,
    ) -> Option<WaitRequest> {
        if self.tabs.is_empty() {
            warn!("feed: no feed tabs to cycle through");
            return None;
        }
        if let Some(token) = self.active_token.take() {
            token.cancel();
        }
        let index = self.tabs.advance(direction)?;
        let tab = *self.tabs.tab(index)?;
        debug!("feed: cycling {direction:?} to tab {index}");
        dom.click(tab.element);
        *current_post = None;

        let token = CancellationToken::new();
        self.active_token = Some(token.clone());
        Some(WaitRequest::new(
            feed_content_selector(index),
            self.wait_timeout,
            token,
            now,
        ))
    }

    /// Apply a settled content wait.
    pub fn on_feed_loaded(&mut self, result: WaitResult, dom: &dyn Dom, current_post: &mut Option<Element>) {
        match result {
            Ok(feed) => {
                self.active_token = None;
                *current_post = dom.query_in(feed, FEED_ITEM);
                debug!("feed: content loaded, first post {:?}", *current_post);
            }
            Err(WaitError::Cancelled) => {
                debug!("feed: superseded content wait dropped");
            }
            Err(e) => {
                self.active_token = None;
                error!("feed: failed to load feed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{ElementSpec, MemoryPage};
    use crate::waiter::{DEFAULT_WAIT_TIMEOUT, WaitQueue};

    fn tab(name: &str, active: bool) -> ElementSpec {
        let mut underline = ElementSpec::new(format!("{name}-label"));
        if active {
            underline = underline.style("border-bottom-color", "rgb(0, 133, 255)");
        }
        ElementSpec::new(name).child(underline)
    }

    fn page(n: usize, active: usize) -> MemoryPage {
        let mut page = MemoryPage::new();
        let mut bar = ElementSpec::new("tabbar").selector(FEED_TABS);
        for i in 0..n {
            bar = bar.child(tab(&format!("tab{i}"), i == active));
        }
        page.add(bar);
        for i in 0..n {
            page.add(
                ElementSpec::new(format!("feed{i}"))
                    .selector(&feed_content_selector(i))
                    .detached()
                    .child(ElementSpec::new(format!("feed{i}-post0")).selector(FEED_ITEM)),
            );
        }
        page
    }

    #[test]
    fn discover_finds_active_tab() {
        let page = page(3, 1);
        let tabs = FeedTabs::discover(&page).unwrap();
        assert_eq!(tabs.len(), 3);
        assert_eq!(tabs.current_index(), Some(1));
        assert_eq!(tabs.tab(0).unwrap().element, page.find("tab0").unwrap());
    }

    #[test]
    fn discover_without_container_fails() {
        assert!(FeedTabs::discover(&MemoryPage::new()).is_err());
    }

    #[test]
    fn advance_wraps_both_ways() {
        let dummy = |i| FeedTab {
            element: Element(i),
            is_active: i == 0,
        };
        let mut tabs = FeedTabs::new((0..4).map(dummy).collect());
        for (i, expected) in [(0usize, 1usize), (1, 2), (2, 3), (3, 0)] {
            assert_eq!(tabs.current_index(), Some(i));
            assert_eq!(tabs.advance(Direction::Forward), Some(expected));
        }
        assert_eq!(tabs.advance(Direction::Backward), Some(3));
        assert_eq!(tabs.advance(Direction::Backward), Some(2));
    }

    #[test]
    fn advance_without_active_tab() {
        let tabs: Vec<FeedTab> = (0..3)
            .map(|i| FeedTab {
                element: Element(i),
                is_active: false,
            })
            .collect();
        assert_eq!(FeedTabs::new(tabs.clone()).advance(Direction::Forward), Some(0));
        assert_eq!(FeedTabs::new(tabs).advance(Direction::Backward), Some(2));
        assert_eq!(FeedTabs::default().advance(Direction::Forward), None);
    }

    #[test]
    fn cycle_clicks_tab_and_clears_post() {
        let mut page = page(2, 0);
        let mut cycle = FeedCycle::new(FeedTabs::discover(&page).unwrap(), DEFAULT_WAIT_TIMEOUT);
        let mut current = Some(Element(99));
        let req = cycle
            .cycle(Direction::Forward, &mut page, &mut current, Instant::now())
            .unwrap();
        assert_eq!(req.selector(), feed_content_selector(1));
        assert_eq!(current, None);
        assert_eq!(cycle.current_index(), Some(1));
        assert_eq!(
            page.take_events(),
            vec![crate::page::PageEvent::Clicked("tab1".into())]
        );
    }

    #[test]
    fn rapid_cycles_only_latest_sets_post() {
        let mut page = page(3, 0);
        let mut cycle = FeedCycle::new(FeedTabs::discover(&page).unwrap(), DEFAULT_WAIT_TIMEOUT);
        let mut queue = WaitQueue::new();
        let mut current = None;
        let t0 = Instant::now();

        let first = cycle.cycle(Direction::Forward, &mut page, &mut current, t0).unwrap();
        assert!(queue.start(1, first, &page, t0).is_none());
        let second = cycle.cycle(Direction::Forward, &mut page, &mut current, t0).unwrap();
        assert!(queue.start(2, second, &page, t0).is_none());

        // Both feeds appear in the same frame; the first wait must not win.
        page.attach(page.find("feed1").unwrap());
        page.attach(page.find("feed2").unwrap());
        let settled = queue.tick(&page, t0 + Duration::from_millis(16));
        assert_eq!(settled.len(), 2);
        assert_eq!(settled[0], (1, Err(WaitError::Cancelled)));

        for (_, result) in settled {
            cycle.on_feed_loaded(result, &page, &mut current);
        }
        assert_eq!(current, page.find("feed2-post0"));
    }

    #[test]
    fn not_found_leaves_state_consistent() {
        let mut page = page(2, 0);
        let mut cycle = FeedCycle::new(FeedTabs::discover(&page).unwrap(), Duration::from_millis(50));
        let mut current = None;
        let t0 = Instant::now();
        let mut req = cycle.cycle(Direction::Backward, &mut page, &mut current, t0).unwrap();
        let result = match req.poll(&page, t0 + Duration::from_millis(51)) {
            std::task::Poll::Ready(r) => r,
            std::task::Poll::Pending => panic!("expected timeout"),
        };
        assert!(matches!(result, Err(WaitError::NotFound { .. })));
        cycle.on_feed_loaded(result, &page, &mut current);
        assert_eq!(current, None);
        assert_eq!(cycle.current_index(), Some(1));
    }

    #[test]
    fn cycle_with_no_tabs_is_noop() {
        let mut page = MemoryPage::new();
        let mut cycle = FeedCycle::new(FeedTabs::default(), DEFAULT_WAIT_TIMEOUT);
        let mut current = Some(Element(1));
        assert!(
            cycle
                .cycle(Direction::Forward, &mut page, &mut current, Instant::now())
                .is_none()
        );
        assert_eq!(current, Some(Element(1)));
        assert!(page.events().is_empty());
    }
}
