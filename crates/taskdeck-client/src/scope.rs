//! Scoped liveness for in-flight fetches.
//!
//! A view that starts a fetch holds a [`ScopeGuard`]; the fetch holds a
//! [`ScopeToken`]. When the view goes away (guard dropped or cancelled), late
//! results are discarded instead of applied. The request itself still runs to
//! completion on the wire.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owner side of a scope. Cancels the scope when dropped.
#[derive(Debug)]
pub struct ScopeGuard {
    live: Arc<AtomicBool>,
}

/// Observer side of a scope, handed to in-flight work.
#[derive(Debug, Clone)]
pub struct ScopeToken {
    live: Arc<AtomicBool>,
}

impl ScopeGuard {
    pub fn new() -> Self {
        Self {
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn token(&self) -> ScopeToken {
        ScopeToken {
            live: Arc::clone(&self.live),
        }
    }

    /// End the scope early. Idempotent.
    pub fn cancel(&self) {
        self.live.store(false, Ordering::Release);
    }
}

impl Default for ScopeGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl ScopeToken {
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Await `fut` and keep its output only if the scope is still live.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        let output = fut.await;
        if self.is_live() {
            Some(output)
        } else {
            tracing::trace!("Scope ended before completion, discarding result");
            None
        }
    }

    /// Apply `value` with `f` if the scope is still live. Returns whether it ran.
    pub fn apply<T>(&self, value: T, f: impl FnOnce(T)) -> bool {
        if self.is_live() {
            f(value);
            true
        } else {
            false
        }
    }
}
