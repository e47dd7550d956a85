//! Notification deduplicator.
//!
//! Non-error messages are debounced per message text (trailing edge), so a
//! burst of identical notifications produces one toast. A message identical to
//! a live toast is dropped. At most `max_toasts` are live; the oldest is
//! evicted first. Each toast expires after its TTL unless dismissed earlier.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::domain::{AppError, Severity, Toast};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the notifier
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub debounce: Duration,
    pub max_toasts: usize,
    /// TTL used when the caller does not pass one
    pub default_ttl: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            max_toasts: 5,
            default_ttl: Duration::from_secs(5),
        }
    }
}

impl NotifierConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        use std::env;

        let debounce_ms = env::var("VRF_DICE_TOAST_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);

        let max_toasts = env::var("VRF_DICE_TOAST_MAX")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(5);

        let default_ttl_ms = env::var("VRF_DICE_TOAST_TTL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5_000);

        Self {
            debounce: Duration::from_millis(debounce_ms),
            max_toasts,
            default_ttl: Duration::from_millis(default_ttl_ms),
        }
    }
}

/// What happened to a `notify` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered(Uuid),
    /// Scheduled; collapses with identical messages until the window closes
    Debounced,
    /// Identical toast already live
    Duplicate,
}

struct PendingToast {
    severity: Severity,
    ttl: Duration,
    timer: AbortHandle,
}

#[derive(Default)]
struct NotifierState {
    live: VecDeque<Toast>,
    pending: HashMap<String, PendingToast>,
    expiry: HashMap<Uuid, AbortHandle>,
}

/// Debouncing, deduplicating, capped toast queue
pub struct Notifier {
    config: NotifierConfig,
    state: Mutex<NotifierState>,
    toasts: watch::Sender<Vec<Toast>>,
    weak: Weak<Notifier>,
}

impl Notifier {
    pub fn new(config: NotifierConfig) -> Arc<Self> {
        let (toasts, _) = watch::channel(Vec::new());
        Arc::new_cyclic(|weak| Self {
            config,
            state: Mutex::new(NotifierState::default()),
            toasts,
            weak: weak.clone(),
        })
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Current live toasts, oldest first
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Toast>> {
        self.toasts.subscribe()
    }

    /// Queue a notification. Must be called from within a tokio runtime.
    pub fn notify(
        &self,
        message: impl Into<String>,
        severity: Severity,
        ttl: Option<Duration>,
    ) -> NotifyOutcome {
        let message = message.into();
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let mut state = self.lock();

        if state.live.iter().any(|t| t.message == message) {
            trace!(message = %message, "Duplicate toast suppressed");
            return NotifyOutcome::Duplicate;
        }

        if severity == Severity::Error || ttl.is_zero() {
            if let Some(pending) = state.pending.remove(&message) {
                pending.timer.abort();
            }
            let id = self.deliver(&mut state, message, severity, ttl);
            self.publish(&state);
            return NotifyOutcome::Delivered(id);
        }

        let weak = self.weak.clone();
        let key = message.clone();
        let debounce = self.config.debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Some(notifier) = weak.upgrade() {
                notifier.flush(&key);
            }
        })
        .abort_handle();

        if let Some(previous) = state.pending.insert(
            message,
            PendingToast {
                severity,
                ttl,
                timer,
            },
        ) {
            previous.timer.abort();
        }
        NotifyOutcome::Debounced
    }

    /// Notify with the class message and severity of an error
    pub fn notify_error(&self, err: &AppError) -> NotifyOutcome {
        self.notify(err.user_message(), err.severity(), None)
    }

    pub fn dismiss(&self, id: Uuid) -> bool {
        let mut state = self.lock();
        let before = state.live.len();
        state.live.retain(|t| t.id != id);
        if let Some(timer) = state.expiry.remove(&id) {
            timer.abort();
        }
        let removed = state.live.len() != before;
        if removed {
            self.publish(&state);
        }
        removed
    }

    /// Drop every live and pending toast
    pub fn clear(&self) {
        let mut state = self.lock();
        for (_, pending) in state.pending.drain() {
            pending.timer.abort();
        }
        for (_, timer) in state.expiry.drain() {
            timer.abort();
        }
        state.live.clear();
        self.publish(&state);
    }

    fn flush(&self, message: &str) {
        let mut state = self.lock();
        let Some(pending) = state.pending.remove(message) else {
            return;
        };
        if state.live.iter().any(|t| t.message == message) {
            return;
        }
        self.deliver(&mut state, message.to_string(), pending.severity, pending.ttl);
        self.publish(&state);
    }

    fn deliver(
        &self,
        state: &mut NotifierState,
        message: String,
        severity: Severity,
        ttl: Duration,
    ) -> Uuid {
        let toast = Toast::new(message, severity, ttl);
        let id = toast.id;
        debug!(toast_id = %id, severity = %severity, message = %toast.message, "Toast delivered");
        state.live.push_back(toast);

        while state.live.len() > self.config.max_toasts.max(1) {
            if let Some(evicted) = state.live.pop_front() {
                if let Some(timer) = state.expiry.remove(&evicted.id) {
                    timer.abort();
                }
                trace!(toast_id = %evicted.id, "Oldest toast evicted");
            }
        }

        if !ttl.is_zero() {
            let weak = self.weak.clone();
            let timer = tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                if let Some(notifier) = weak.upgrade() {
                    notifier.expire(id);
                }
            })
            .abort_handle();
            state.expiry.insert(id, timer);
        }
        id
    }

    fn expire(&self, id: Uuid) {
        let mut state = self.lock();
        state.expiry.remove(&id);
        let before = state.live.len();
        state.live.retain(|t| t.id != id);
        if state.live.len() != before {
            self.publish(&state);
        }
    }

    fn publish(&self, state: &NotifierState) {
        let snapshot: Vec<Toast> = state.live.iter().cloned().collect();
        self.toasts.send_replace(snapshot);
    }

    fn lock(&self) -> MutexGuard<'_, NotifierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, pending) in state.pending.drain() {
            pending.timer.abort();
        }
        for (_, timer) in state.expiry.drain() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    fn notifier() -> Arc<Notifier> {
        Notifier::new(NotifierConfig::default())
    }

    /// Paused clock auto-advances through every timer due before `duration`
    async fn settle(duration: Duration) {
        tokio::time::sleep(duration).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_within_window_yields_one_toast() {
        let notifier = notifier();
        assert_eq!(
            notifier.notify("Balance updated", Severity::Info, None),
            NotifyOutcome::Debounced
        );
        settle(Duration::from_millis(100)).await;
        notifier.notify("Balance updated", Severity::Info, None);

        settle(Duration::from_millis(350)).await;
        let toasts = notifier.toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].message, "Balance updated");
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_bypasses_debounce() {
        let notifier = notifier();
        let outcome = notifier.notify("RPC down", Severity::Error, None);
        assert!(matches!(outcome, NotifyOutcome::Delivered(_)));
        assert_eq!(notifier.toasts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_is_immediate_and_sticky() {
        let notifier = notifier();
        let outcome = notifier.notify("Switch manually", Severity::Warning, Some(Duration::ZERO));
        assert!(matches!(outcome, NotifyOutcome::Delivered(_)));

        settle(Duration::from_secs(3600)).await;
        assert_eq!(notifier.toasts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_duplicate_is_suppressed() {
        let notifier = notifier();
        notifier.notify("RPC down", Severity::Error, None);
        assert_eq!(
            notifier.notify("RPC down", Severity::Error, None),
            NotifyOutcome::Duplicate
        );
        assert_eq!(notifier.toasts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cap_evicts_oldest() {
        let notifier = notifier();
        for i in 0..7 {
            notifier.notify(format!("error {i}"), Severity::Error, None);
        }
        let toasts = notifier.toasts();
        assert_eq!(toasts.len(), 5);
        assert_eq!(toasts[0].message, "error 2");
        assert_eq!(toasts[4].message, "error 6");
    }

    #[tokio::test(start_paused = true)]
    async fn test_toast_expires_after_ttl() {
        let notifier = notifier();
        notifier.notify("Saved", Severity::Success, Some(Duration::from_secs(2)));
        settle(Duration::from_millis(301)).await;
        assert_eq!(notifier.toasts().len(), 1);

        settle(Duration::from_secs(2)).await;
        assert!(notifier.toasts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_removes_toast() {
        let notifier = notifier();
        let NotifyOutcome::Delivered(id) = notifier.notify("Oops", Severity::Error, None) else {
            panic!("expected immediate delivery");
        };
        assert!(notifier.dismiss(id));
        assert!(notifier.toasts().is_empty());
        assert!(!notifier.dismiss(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_notify_error_uses_class_message() {
        let notifier = notifier();
        notifier.notify_error(&AppError::UnsupportedNetwork(1));
        notifier.notify_error(&AppError::UnsupportedNetwork(137));
        settle(Duration::from_millis(301)).await;

        let toasts = notifier.toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].severity, Severity::Warning);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_pending() {
        let notifier = notifier();
        notifier.notify("Pending", Severity::Info, None);
        notifier.clear();
        settle(Duration::from_secs(1)).await;
        assert!(notifier.toasts().is_empty());
    }
}
