//! Element waiter: poll for a selector once per frame until it matches, the
//! timeout passes, or the wait is cancelled.
//!
//! Nothing here sleeps. A [`WaitRequest`] is a small state machine advanced by
//! [`WaitRequest::poll`]; a [`WaitQueue`] holds the outstanding requests of one
//! owner, tags each with a purpose, and is ticked by the host's frame loop.
//! Time is always passed in, so tests drive the clock by hand.

use std::task::Poll;
use std::time::{Duration, Instant};

use log::debug;

use crate::cancel::CancellationToken;
use crate::dom::{Dom, Element};

pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// Superseded by a newer request. Not a failure; callers stay quiet.
    #[error("wait cancelled")]
    Cancelled,
    #[error("element {selector} not found within {}ms", timeout.as_millis())]
    NotFound { selector: String, timeout: Duration },
}

impl WaitError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitError::Cancelled)
    }
}

pub type WaitResult = Result<Element, WaitError>;

/// A single outstanding wait.
#[derive(Debug)]
pub struct WaitRequest {
    selector: String,
    timeout: Duration,
    token: CancellationToken,
    started: Instant,
    settled: bool,
}

impl WaitRequest {
    pub fn new(
        selector: impl Into<String>,
        timeout: Duration,
        token: CancellationToken,
        started: Instant,
    ) -> Self {
        Self {
            selector: selector.into(),
            timeout,
            token,
            started,
            settled: false,
        }
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// One tick. Checks cancellation, then the selector, then the deadline;
    /// a token cancelled in the same tick a match appears still yields
    /// `Cancelled`.
    ///
    /// Settles at most once. Polling a settled request stays `Pending`.
    pub fn poll(&mut self, dom: &dyn Dom, now: Instant) -> Poll<WaitResult> {
        if self.settled {
            return Poll::Pending;
        }
        if self.token.is_cancelled() {
            self.settled = true;
            return Poll::Ready(Err(WaitError::Cancelled));
        }
        if let Some(el) = dom.query(&self.selector) {
            self.settled = true;
            return Poll::Ready(Ok(el));
        }
        if now.saturating_duration_since(self.started) > self.timeout {
            self.settled = true;
            return Poll::Ready(Err(WaitError::NotFound {
                selector: self.selector.clone(),
                timeout: self.timeout,
            }));
        }
        Poll::Pending
    }
}

/// Outstanding waits, each tagged with what its owner does on settlement.
pub struct WaitQueue<P> {
    pending: Vec<(P, WaitRequest)>,
}

impl<P> Default for WaitQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> WaitQueue<P> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Run the first check right away. A request that settles immediately is
    /// returned and never queued; otherwise it waits for the next tick.
    pub fn start(
        &mut self,
        purpose: P,
        mut request: WaitRequest,
        dom: &dyn Dom,
        now: Instant,
    ) -> Option<(P, WaitResult)> {
        match request.poll(dom, now) {
            Poll::Ready(result) => Some((purpose, result)),
            Poll::Pending => {
                debug!("waiter: queued {}", request.selector());
                self.pending.push((purpose, request));
                None
            }
        }
    }

    /// Advance every outstanding request by one tick. Settled requests are
    /// dropped and returned in the order they were started.
    pub fn tick(&mut self, dom: &dyn Dom, now: Instant) -> Vec<(P, WaitResult)> {
        let mut settled = Vec::new();
        let mut still_pending = Vec::with_capacity(self.pending.len());
        for (purpose, mut request) in self.pending.drain(..) {
            match request.poll(dom, now) {
                Poll::Ready(result) => settled.push((purpose, result)),
                Poll::Pending => still_pending.push((purpose, request)),
            }
        }
        self.pending = still_pending;
        settled
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
