//! Tracking of in-flight gateway calls.
//!
//! Only the call the controller is currently waiting for may deliver a
//! result. A call that timed out, or whose run was reset, is forgotten and
//! its eventual completion is dropped.

use std::fmt;
use std::time::Duration;

use crate::core::GatewayConfig;

/// Kind of remote call, which fixes its timeout policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Export,
    Replace,
    VersionCounter,
    WriteHistory,
}

impl CallKind {
    pub fn label(self) -> &'static str {
        match self {
            CallKind::Export => "Document export",
            CallKind::Replace => "Document replacement",
            CallKind::VersionCounter => "Version counter lookup",
            CallKind::WriteHistory => "Version history write",
        }
    }

    /// Bounded wait for this kind of call.
    pub fn timeout(self, config: &GatewayConfig) -> Duration {
        match self {
            CallKind::Export => config.export_timeout(),
            CallKind::Replace => config.replace_timeout(),
            CallKind::VersionCounter => config.counter_timeout(),
            CallKind::WriteHistory => config.history_timeout(),
        }
    }
}

/// Identifier of one remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// The single outstanding call, if any.
#[derive(Debug, Default)]
pub struct CallTracker {
    next_id: u64,
    active: Option<(CallId, CallKind)>,
}

impl CallTracker {
    /// Register a new call; it replaces any previous one.
    pub fn begin(&mut self, kind: CallKind) -> CallId {
        self.next_id += 1;
        let id = CallId(self.next_id);
        self.active = Some((id, kind));
        id
    }

    pub fn is_current(&self, id: CallId) -> bool {
        matches!(self.active, Some((active, _)) if active == id)
    }

    /// Settle `id`. Returns false if it was no longer being waited for.
    pub fn settle(&mut self, id: CallId) -> bool {
        if self.is_current(id) {
            self.active = None;
            true
        } else {
            false
        }
    }

    /// Forget the outstanding call.
    pub fn invalidate(&mut self) -> Option<CallKind> {
        self.active.take().map(|(_, kind)| kind)
    }

    pub fn active(&self) -> Option<CallKind> {
        self.active.map(|(_, kind)| kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_once() {
        let mut tracker = CallTracker::default();
        let id = tracker.begin(CallKind::Export);
        assert!(tracker.is_current(id));
        assert!(tracker.settle(id));
        assert!(!tracker.settle(id));
        assert_eq!(tracker.active(), None);
    }

    #[test]
    fn test_new_call_supersedes_old() {
        let mut tracker = CallTracker::default();
        let first = tracker.begin(CallKind::Export);
        let second = tracker.begin(CallKind::Replace);
        assert!(!tracker.settle(first));
        assert!(tracker.settle(second));
    }

    #[test]
    fn test_invalidate() {
        let mut tracker = CallTracker::default();
        let id = tracker.begin(CallKind::WriteHistory);
        assert_eq!(tracker.invalidate(), Some(CallKind::WriteHistory));
        assert!(!tracker.settle(id));
    }

    #[test]
    fn test_timeout_policy() {
        let config = GatewayConfig::default();
        assert_eq!(CallKind::Export.timeout(&config), Duration::from_secs(30));
        assert_eq!(CallKind::Replace.timeout(&config), Duration::from_secs(60));
    }
}
