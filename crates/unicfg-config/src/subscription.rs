//! Change subscriptions
//!
//! A subscription polls a resolver on a fixed interval and hands the value
//! to a callback whenever it differs structurally from the last delivered
//! one. The handle is the only way to stop it; cancelling (or dropping) it
//! stops the timer and suppresses any delivery still in flight.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use unicfg_common::ConfigValue;

/// Callback invoked with the newly resolved value (`None` once it disappears)
pub type ChangeCallback = Box<dyn Fn(Option<ConfigValue>) + Send + Sync>;

pub struct Subscription {
    key: String,
    live: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Start polling `resolve` every `interval`.
    pub fn start<R, Fut>(
        key: impl Into<String>,
        interval: Duration,
        resolve: R,
        callback: ChangeCallback,
    ) -> Self
    where
        R: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<ConfigValue>> + Send + 'static,
    {
        let key = key.into();
        let live = Arc::new(AtomicBool::new(true));
        let flag = live.clone();
        let task_key = key.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            let mut last: Option<ConfigValue> = None;
            loop {
                ticker.tick().await;
                if !flag.load(Ordering::SeqCst) {
                    break;
                }
                let current = resolve().await;
                if current == last {
                    continue;
                }
                // cancelled while the poll was suspended
                if !flag.load(Ordering::SeqCst) {
                    break;
                }
                debug!(key = %task_key, "subscribed value changed");
                callback(current.clone());
                last = current;
            }
        });

        Self {
            key,
            live,
            task: Some(task),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_active(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Stop polling. No callback runs after this returns.
    pub fn cancel(&mut self) {
        self.live.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(key = %self.key, "subscription cancelled");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use parking_lot::Mutex;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<Option<ConfigValue>>>>, ChangeCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, Box::new(move |v| sink.lock().push(v)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_only_changes() {
        let source = Arc::new(Mutex::new(Some(ConfigValue::from(1))));
        let polled = source.clone();
        let (seen, callback) = recorder();

        let _sub = Subscription::start(
            "a.b",
            Duration::from_secs(30),
            move || {
                let value = polled.lock().clone();
                async move { value }
            },
            callback,
        );

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(*seen.lock(), vec![Some(ConfigValue::from(1))]);

        *source.lock() = Some(ConfigValue::from(2));
        tokio::time::sleep(Duration::from_secs(30)).await;
        *source.lock() = None;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(
            *seen.lock(),
            vec![Some(ConfigValue::from(1)), Some(ConfigValue::from(2)), None]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let (seen, callback) = recorder();

        let mut sub = Subscription::start(
            "a.b",
            Duration::from_secs(30),
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) as i64;
                async move { Some(ConfigValue::from(n)) }
            },
            callback,
        );

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(seen.lock().len(), 1);

        sub.cancel();
        assert!(!sub.is_active());
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_slow_poll_suppresses_delivery() {
        let (seen, callback) = recorder();
        let mut sub = Subscription::start(
            "a.b",
            Duration::from_secs(30),
            || async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Some(ConfigValue::from(true))
            },
            callback,
        );

        // first poll starts at 30s and resolves at 40s
        tokio::time::sleep(Duration::from_secs(35)).await;
        sub.cancel();
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert!(seen.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let (seen, callback) = recorder();
        let sub = Subscription::start(
            "a.b",
            Duration::from_secs(30),
            || async { Some(ConfigValue::from(1)) },
            callback,
        );
        drop(sub);
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(seen.lock().is_empty());
    }
}
