//! Cancellation token shared between the creator of a wait and the waiter.

use std::cell::Cell;
use std::rc::Rc;

/// One-shot cancellation flag.
///
/// Clones observe the same flag. The engine is single-threaded, so the flag
/// lives in an `Rc<Cell<_>>` rather than an atomic. A token is never reused:
/// every wait gets a fresh one.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the token cancelled. Calling it again has no further effect.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        assert!(!CancellationToken::new().is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn clones_share_state() {
        let owner = CancellationToken::new();
        let observer = owner.clone();
        owner.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn independent_tokens_do_not_interfere() {
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        a.cancel();
        assert!(!b.is_cancelled());
    }
}
