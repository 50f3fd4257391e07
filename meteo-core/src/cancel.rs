//! Cooperative cancellation shared between a caller and its in-flight requests.
//!
//! A [`CancellationToken`] is a flag plus a wake-up notification. Clones share
//! state. [`CancellationToken::child_token`] builds a token that is cancelled
//! whenever its parent is, without the reverse being true; that is how a
//! per-attempt timeout is layered on top of a caller-supplied token.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<Inner>>>,
    /// Held so that a chain stays reachable from its root while any
    /// descendant is alive, even if a token in the middle was dropped.
    _parents: Vec<Arc<Inner>>,
}

impl Inner {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();

        let children = {
            let mut guard = self.children.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }

    fn adopt(&self, child: &Arc<Inner>) {
        let mut children = self.children.lock().unwrap_or_else(|e| e.into_inner());
        if self.cancelled.load(Ordering::SeqCst) {
            drop(children);
            child.cancel();
            return;
        }
        children.retain(|w| w.strong_count() > 0);
        children.push(Arc::downgrade(child));
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone and every descendant observes it.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// A new token cancelled when `self` is. Cancelling the child leaves
    /// `self` untouched.
    pub fn child_token(&self) -> Self {
        Self::linked(&[self])
    }

    /// A new token cancelled as soon as any of `parents` is.
    pub fn linked(parents: &[&CancellationToken]) -> Self {
        let token = Self {
            inner: Arc::new(Inner {
                _parents: parents.iter().map(|p| Arc::clone(&p.inner)).collect(),
                ..Inner::default()
            }),
        };
        for parent in parents {
            parent.inner.adopt(&token.inner);
        }
        token
    }

    /// Resolves once the token is cancelled. Returns immediately if it already is.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
