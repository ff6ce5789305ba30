//! Transient toast messages.
//!
//! The board polls [`Notifier::prune_expired`] once per tick instead of
//! arming a timer per toast.

use std::time::{Duration, Instant};

pub const DEFAULT_DURATION: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
    Warning,
}

impl ToastKind {
    pub fn label(self) -> &'static str {
        match self {
            ToastKind::Success => "ok",
            ToastKind::Error => "error",
            ToastKind::Info => "info",
            ToastKind::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub id: u64,
    pub kind: ToastKind,
    pub message: String,
    pub expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct Notifier {
    toasts: Vec<Toast>,
    next_id: u64,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a toast and return its id.
    pub fn show(&mut self, kind: ToastKind, message: impl Into<String>, duration: Duration) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.toasts.push(Toast { id, kind, message: message.into(), expires_at: Instant::now() + duration });
        id
    }

    pub fn success(&mut self, message: impl Into<String>) -> u64 {
        self.show(ToastKind::Success, message, DEFAULT_DURATION)
    }

    pub fn error(&mut self, message: impl Into<String>) -> u64 {
        self.show(ToastKind::Error, message, DEFAULT_DURATION)
    }

    pub fn info(&mut self, message: impl Into<String>) -> u64 {
        self.show(ToastKind::Info, message, DEFAULT_DURATION)
    }

    pub fn warning(&mut self, message: impl Into<String>) -> u64 {
        self.show(ToastKind::Warning, message, DEFAULT_DURATION)
    }

    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.id != id);
        self.toasts.len() != before
    }

    pub fn clear(&mut self) {
        self.toasts.clear();
    }

    /// Drop every toast whose time is up at `now`. Returns how many went.
    pub fn prune_expired(&mut self, now: Instant) -> usize {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.expires_at > now);
        before - self.toasts.len()
    }

    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    /// Most recently shown toast still alive.
    pub fn latest(&self) -> Option<&Toast> {
        self.toasts.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_increase_and_latest_is_newest() {
        let mut n = Notifier::new();
        let a = n.success("saved");
        let b = n.error("failed");
        assert!(b > a);
        assert_eq!(n.latest().map(|t| t.kind), Some(ToastKind::Error));
        assert_eq!(n.toasts().len(), 2);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut n = Notifier::new();
        let a = n.info("one");
        n.warning("two");
        assert!(n.remove(a));
        assert!(!n.remove(a));
        assert_eq!(n.toasts().len(), 1);
        n.clear();
        assert!(n.latest().is_none());
    }

    #[test]
    fn test_prune_expired() {
        let mut n = Notifier::new();
        n.show(ToastKind::Info, "short", Duration::from_millis(10));
        n.info("default");
        let later = Instant::now() + Duration::from_millis(500);
        assert_eq!(n.prune_expired(later), 1);
        assert_eq!(n.latest().map(|t| t.message.as_str()), Some("default"));
        assert_eq!(n.prune_expired(Instant::now() + DEFAULT_DURATION * 2), 1);
        assert!(n.toasts().is_empty());
    }
}
