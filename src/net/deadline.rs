//! One shared timeout for every querier started by a single query.

use std::{
    future::Future,
    sync::{Arc, Weak},
    time::Duration,
};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

type Listener = Box<dyn FnOnce() + Send>;

struct Inner {
    timeout: Duration,
    token: CancellationToken,
    /// `None` once the deadline has fired.
    listeners: Mutex<Option<Vec<Listener>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn fire(&self) {
        let Some(listeners) = self.listeners.lock().take() else {
            // already fired
            return;
        };
        debug!("deadline of {:?} expired", self.timeout);
        self.token.cancel();
        for listener in listeners {
            listener();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

/// A one-shot broadcast cancellation that fires after a fixed timeout.
///
/// Clones share the same state. Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct ConnectionDeadline {
    inner: Arc<Inner>,
}

impl ConnectionDeadline {
    pub fn new(timeout: Duration) -> Self {
        let inner = Arc::new(Inner {
            timeout,
            token: CancellationToken::new(),
            listeners: Mutex::new(Some(Vec::new())),
            timer: Mutex::new(None),
        });

        let weak: Weak<Inner> = Arc::downgrade(&inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire();
            }
        });
        *inner.timer.lock() = Some(timer);

        Self { inner }
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    pub fn is_expired(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Fires the deadline now. Does nothing if it already fired.
    pub fn expire(&self) {
        self.inner.fire();
    }

    /// Runs `listener` once when the deadline fires, or right away if it
    /// already has.
    pub fn on_expire(&self, listener: impl FnOnce() + Send + 'static) {
        let mut listeners = self.inner.listeners.lock();
        match listeners.as_mut() {
            Some(listeners) => listeners.push(Box::new(listener)),
            None => {
                drop(listeners);
                listener();
            }
        }
    }

    /// Resolves once the deadline has fired.
    pub async fn expired(&self) {
        self.inner.token.cancelled().await
    }

    /// Races `fut` against the deadline.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.expired() => Err(Error::ConnectionTimeout),
            res = fut => res,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_timeout() {
        let deadline = ConnectionDeadline::new(Duration::from_secs(10));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            deadline.on_expire(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert!(!deadline.is_expired());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        deadline.expired().await;
        assert!(deadline.is_expired());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // firing again doesn't call anything twice
        deadline.expire();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_listener_runs_immediately() {
        let deadline = ConnectionDeadline::new(Duration::from_secs(1));
        deadline.expire();

        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        deadline.on_expire(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out() {
        let deadline = ConnectionDeadline::new(Duration::from_millis(500));

        let res = deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(res, Err(Error::ConnectionTimeout)));

        let res = ConnectionDeadline::new(Duration::from_secs(1))
            .run(async { Ok(7) })
            .await;
        assert_eq!(res.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_state() {
        let deadline = ConnectionDeadline::new(Duration::from_secs(60));
        let clone = deadline.clone();
        clone.expire();
        assert!(deadline.is_expired());
    }
}
