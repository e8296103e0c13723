//! Autoplay gesture gate.
//!
//! Browsers (and some desktop shells) refuse to start audio until the
//! user has interacted with the page. The gate models that policy as a
//! two-state machine: `Blocked` until a monitored interaction arrives,
//! then `Granted` for the rest of the session.
//!
//! While blocked, `start()` calls are deferred: the requested offset is
//! recorded (last one wins) and consumed when the grant finally lands.

/// State machine gating playback start on a user gesture.
#[derive(Debug, Clone, Default)]
pub struct GestureGate {
    granted: bool,
    pending_start: Option<f64>,
}

impl GestureGate {
    /// A gate honoring the platform's autoplay policy.
    ///
    /// If `require_gesture` is false the gate starts out granted and
    /// never defers anything.
    pub fn new(require_gesture: bool) -> Self {
        Self {
            granted: !require_gesture,
            pending_start: None,
        }
    }

    /// Whether audio may start right now.
    pub fn granted(&self) -> bool {
        self.granted
    }

    /// The deferred start offset, if one is waiting on a grant.
    pub fn pending_start(&self) -> Option<f64> {
        self.pending_start
    }

    /// Ask to start at `offset_seconds`.
    ///
    /// Returns `Some(offset)` if playback may proceed immediately, or
    /// `None` if the request was deferred. Repeated requests while
    /// blocked overwrite the pending offset.
    pub fn request_start(&mut self, offset_seconds: f64) -> Option<f64> {
        if self.granted {
            Some(offset_seconds)
        } else {
            self.pending_start = Some(offset_seconds);
            None
        }
    }

    /// Record a user gesture, granting the gate for the session.
    ///
    /// Returns a deferred start offset to act on, if one was pending.
    /// Granting an already-granted gate is a no-op.
    pub fn grant(&mut self) -> Option<f64> {
        self.granted = true;
        self.pending_start.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ungated_platform_starts_immediately() {
        let mut gate = GestureGate::new(false);
        assert_eq!(gate.request_start(1.5), Some(1.5));
        assert_eq!(gate.pending_start(), None);
    }

    #[test]
    fn blocked_start_is_deferred_last_wins() {
        let mut gate = GestureGate::new(true);
        assert_eq!(gate.request_start(1.0), None);
        assert_eq!(gate.request_start(2.0), None);
        assert_eq!(gate.pending_start(), Some(2.0));
    }

    #[test]
    fn grant_consumes_pending_offset() {
        let mut gate = GestureGate::new(true);
        gate.request_start(2.0);
        assert_eq!(gate.grant(), Some(2.0));
        assert!(gate.granted());
        // Consumed: a second grant has nothing pending.
        assert_eq!(gate.grant(), None);
    }

    #[test]
    fn granted_is_terminal_for_the_session() {
        let mut gate = GestureGate::new(true);
        gate.grant();
        assert_eq!(gate.request_start(0.5), Some(0.5));
        assert_eq!(gate.pending_start(), None);
    }
}
