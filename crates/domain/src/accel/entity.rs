use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Per-connection acceleration state.
///
/// The failure states and `Denied` are terminal: once entered, no
/// `accelerate()` call changes the state again. Recovery requires the
/// connection to be torn down and a fresh one created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelMode {
    /// Repeated fast-path evictions without any offloaded traffic.
    FailNoAction,
    /// Submit call rejected by the transport too many times.
    FailDriver,
    /// Fast-path engine nacked rule creation too many times.
    FailNack,
    /// Rule construction found an unsupportable encapsulation mix.
    FailRule,
    /// Destroy request was nacked.
    FailDecel,
    /// Never eligible (set at creation, e.g. conntrack helper present).
    Denied,
    /// Not accelerated, eligible for an attempt.
    Decel,
    /// Create submitted, awaiting the asynchronous acknowledgement.
    AccelPending,
    /// Rule installed in the fast path.
    Accel,
    /// Destroy submitted, awaiting the asynchronous acknowledgement.
    DecelPending,
}

impl AccelMode {
    /// Terminal states: the failure family plus `Denied`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::FailNoAction
                | Self::FailDriver
                | Self::FailNack
                | Self::FailRule
                | Self::FailDecel
                | Self::Denied
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FailNoAction => "fail_no_action",
            Self::FailDriver => "fail_driver",
            Self::FailNack => "fail_nack",
            Self::FailRule => "fail_rule",
            Self::FailDecel => "fail_decel",
            Self::Denied => "denied",
            Self::Decel => "decel",
            Self::AccelPending => "accel_pending",
            Self::Accel => "accel",
            Self::DecelPending => "decel_pending",
        }
    }
}

impl std::fmt::Display for AccelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry ceilings, copied onto every context at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccelLimits {
    pub no_action: u16,
    pub driver_fail: u16,
    pub nack: u16,
}

impl Default for AccelLimits {
    fn default() -> Self {
        Self {
            no_action: 250,
            driver_fail: 250,
            nack: 250,
        }
    }
}

/// Retry counters. The `*_total` fields are cumulative for the life of
/// the connection; the short counters reset on success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccelStats {
    pub no_action_seen: u16,
    pub no_action_seen_total: u32,
    pub driver_fail: u16,
    pub driver_fail_total: u32,
    pub nack: u16,
    pub nack_total: u32,
    pub decelerate_pending: bool,
}

/// Outcome of a decelerate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecelDisposition {
    /// A decelerate is already queued; nothing to do.
    AlreadyPending,
    /// Create is in flight; the decelerate was recorded and will be
    /// actioned by the create acknowledgement handler.
    Deferred,
    /// Not accelerated (covers denied and failure states).
    NotAccelerated,
    /// Transitioned to `DecelPending`; caller must submit the destroy.
    Begin,
}

/// Outcome of a fast-path-initiated eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeaseOutcome {
    /// Not accelerated by the time the notification arrived.
    Ignored,
    /// Acceleration ended, connection back to `Decel`.
    Decelerated,
    /// Eviction-without-traffic limit reached, terminal.
    FailedNoAction,
}

#[derive(Debug, Clone, Copy)]
pub struct AccelSnapshot {
    pub mode: AccelMode,
    pub can_accel: bool,
    pub stats: AccelStats,
}

#[derive(Debug)]
struct AccelInner {
    mode: AccelMode,
    stats: AccelStats,
}

/// Concurrency-safe acceleration state for one connection.
///
/// The lock is held only for the state flag and counters; rule
/// construction and transport submits happen outside it. Lifetime is
/// managed by `Arc` on the owning connection, so reference counts can
/// never go negative by construction.
#[derive(Debug)]
pub struct AccelContext {
    can_accel: bool,
    limits: AccelLimits,
    inner: Mutex<AccelInner>,
}

impl AccelContext {
    pub fn new(can_accel: bool, limits: AccelLimits) -> Self {
        let mode = if can_accel {
            AccelMode::Decel
        } else {
            AccelMode::Denied
        };
        Self {
            can_accel,
            limits,
            inner: Mutex::new(AccelInner {
                mode,
                stats: AccelStats::default(),
            }),
        }
    }

    pub fn can_accel(&self) -> bool {
        self.can_accel
    }

    pub fn limits(&self) -> AccelLimits {
        self.limits
    }

    pub fn mode(&self) -> AccelMode {
        self.inner.lock().expect("accel lock poisoned").mode
    }

    pub fn snapshot(&self) -> AccelSnapshot {
        let inner = self.inner.lock().expect("accel lock poisoned");
        AccelSnapshot {
            mode: inner.mode,
            can_accel: self.can_accel,
            stats: inner.stats,
        }
    }

    /// Begin an acceleration attempt. Only `Decel` is eligible; every
    /// other state (including all terminal ones) makes this a no-op.
    pub fn try_begin_accel(&self) -> bool {
        let mut inner = self.inner.lock().expect("accel lock poisoned");
        if inner.mode != AccelMode::Decel {
            return false;
        }
        inner.mode = AccelMode::AccelPending;
        true
    }

    /// Rule construction failed while `AccelPending`: terminal.
    pub fn fail_rule(&self) {
        let mut inner = self.inner.lock().expect("accel lock poisoned");
        debug_assert_eq!(inner.mode, AccelMode::AccelPending, "unexpected mode");
        inner.mode = AccelMode::FailRule;
    }

    /// Transport accepted a submit: the driver-fail streak resets.
    pub fn submit_ok(&self) {
        let mut inner = self.inner.lock().expect("accel lock poisoned");
        inner.stats.driver_fail = 0;
    }

    /// Transport rejected a submit. Returns true when the streak just
    /// hit the limit and the context went terminal.
    pub fn submit_failed(&self) -> bool {
        let mut inner = self.inner.lock().expect("accel lock poisoned");
        inner.stats.driver_fail_total += 1;
        inner.stats.driver_fail += 1;
        if inner.stats.driver_fail >= self.limits.driver_fail {
            inner.mode = AccelMode::FailDriver;
            return true;
        }
        false
    }

    /// Create acknowledgement (ack). Returns true when a decelerate was
    /// requested while pending and must be actioned now.
    pub fn create_acked(&self) -> bool {
        let mut inner = self.inner.lock().expect("accel lock poisoned");
        debug_assert_eq!(inner.mode, AccelMode::AccelPending, "unexpected mode");
        inner.mode = AccelMode::Accel;
        // Cleared again by later evidence of offloaded traffic.
        inner.stats.no_action_seen += 1;
        inner.stats.nack = 0;
        if inner.stats.decelerate_pending {
            inner.stats.decelerate_pending = false;
            return true;
        }
        false
    }

    /// Create acknowledgement (nack). Terminal after the limit,
    /// otherwise revert to `Decel` so the next packet may retry.
    pub fn create_nacked(&self) {
        let mut inner = self.inner.lock().expect("accel lock poisoned");
        debug_assert_eq!(inner.mode, AccelMode::AccelPending, "unexpected mode");
        inner.stats.nack += 1;
        inner.stats.nack_total += 1;
        inner.mode = if inner.stats.nack >= self.limits.nack {
            AccelMode::FailNack
        } else {
            AccelMode::Decel
        };
        // Nothing became accelerated, so nothing is left to decelerate.
        inner.stats.decelerate_pending = false;
    }

    pub fn request_decel(&self) -> DecelDisposition {
        let mut inner = self.inner.lock().expect("accel lock poisoned");
        if inner.stats.decelerate_pending {
            return DecelDisposition::AlreadyPending;
        }
        if inner.mode == AccelMode::AccelPending {
            inner.stats.decelerate_pending = true;
            return DecelDisposition::Deferred;
        }
        if inner.mode != AccelMode::Accel {
            return DecelDisposition::NotAccelerated;
        }
        inner.mode = AccelMode::DecelPending;
        DecelDisposition::Begin
    }

    /// Destroy acknowledgement. Returns false if the context was no
    /// longer `DecelPending` (e.g. an out-of-band flush already ended
    /// acceleration); the payload must then be ignored.
    pub fn destroy_response(&self, acked: bool) -> bool {
        let mut inner = self.inner.lock().expect("accel lock poisoned");
        if inner.mode != AccelMode::DecelPending {
            return false;
        }
        inner.mode = if acked {
            AccelMode::Decel
        } else {
            AccelMode::FailDecel
        };
        true
    }

    /// Fast-path-initiated eviction (never called for manager-initiated
    /// deceleration).
    pub fn accel_ceased(&self) -> CeaseOutcome {
        let mut inner = self.inner.lock().expect("accel lock poisoned");
        if inner.mode != AccelMode::Accel {
            return CeaseOutcome::Ignored;
        }
        if inner.stats.no_action_seen != 0 {
            inner.stats.no_action_seen_total += 1;
        }
        if inner.stats.no_action_seen >= self.limits.no_action {
            inner.mode = AccelMode::FailNoAction;
            CeaseOutcome::FailedNoAction
        } else {
            inner.mode = AccelMode::Decel;
            CeaseOutcome::Decelerated
        }
    }

    /// The sync path observed offloaded traffic: the rule is useful.
    pub fn action_seen(&self) {
        let mut inner = self.inner.lock().expect("accel lock poisoned");
        inner.stats.no_action_seen = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AccelContext {
        AccelContext::new(true, AccelLimits::default())
    }

    fn ctx_with(limits: AccelLimits) -> AccelContext {
        AccelContext::new(true, limits)
    }

    #[test]
    fn starts_decel_when_eligible() {
        assert_eq!(ctx().mode(), AccelMode::Decel);
    }

    #[test]
    fn starts_denied_when_not_eligible() {
        let c = AccelContext::new(false, AccelLimits::default());
        assert_eq!(c.mode(), AccelMode::Denied);
        assert!(!c.try_begin_accel());
        assert_eq!(c.mode(), AccelMode::Denied);
    }

    #[test]
    fn begin_accel_only_from_decel() {
        let c = ctx();
        assert!(c.try_begin_accel());
        assert_eq!(c.mode(), AccelMode::AccelPending);
        // Second attempt while pending is a no-op.
        assert!(!c.try_begin_accel());
        assert_eq!(c.mode(), AccelMode::AccelPending);
    }

    #[test]
    fn full_accel_cycle() {
        let c = ctx();
        assert!(c.try_begin_accel());
        c.submit_ok();
        assert!(!c.create_acked());
        assert_eq!(c.mode(), AccelMode::Accel);
        assert_eq!(c.snapshot().stats.no_action_seen, 1);

        assert_eq!(c.request_decel(), DecelDisposition::Begin);
        assert_eq!(c.mode(), AccelMode::DecelPending);
        assert!(c.destroy_response(true));
        assert_eq!(c.mode(), AccelMode::Decel);
    }

    #[test]
    fn decel_during_pending_is_deferred_then_actioned_once() {
        let c = ctx();
        assert!(c.try_begin_accel());
        assert_eq!(c.request_decel(), DecelDisposition::Deferred);
        // A second request while deferred is swallowed.
        assert_eq!(c.request_decel(), DecelDisposition::AlreadyPending);

        // Ack arrives: the deferred decelerate must be reported exactly once.
        assert!(c.create_acked());
        assert_eq!(c.mode(), AccelMode::Accel);
        assert!(!c.snapshot().stats.decelerate_pending);
    }

    #[test]
    fn nack_reverts_and_clears_deferred_decel() {
        let c = ctx();
        assert!(c.try_begin_accel());
        assert_eq!(c.request_decel(), DecelDisposition::Deferred);
        c.create_nacked();
        assert_eq!(c.mode(), AccelMode::Decel);
        assert!(!c.snapshot().stats.decelerate_pending);
        assert_eq!(c.snapshot().stats.nack, 1);
    }

    #[test]
    fn nack_limit_is_terminal() {
        let c = ctx_with(AccelLimits {
            nack: 2,
            ..AccelLimits::default()
        });
        for _ in 0..2 {
            assert!(c.try_begin_accel());
            c.create_nacked();
        }
        assert_eq!(c.mode(), AccelMode::FailNack);
        assert!(!c.try_begin_accel());
        assert_eq!(c.snapshot().stats.nack_total, 2);
    }

    #[test]
    fn ack_resets_nack_streak() {
        let c = ctx_with(AccelLimits {
            nack: 3,
            ..AccelLimits::default()
        });
        assert!(c.try_begin_accel());
        c.create_nacked();
        assert!(c.try_begin_accel());
        c.create_acked();
        assert_eq!(c.snapshot().stats.nack, 0);
        assert_eq!(c.snapshot().stats.nack_total, 1);
    }

    #[test]
    fn driver_fail_limit_is_terminal_and_sticky() {
        let c = ctx_with(AccelLimits {
            driver_fail: 3,
            ..AccelLimits::default()
        });
        assert!(c.try_begin_accel());
        assert!(!c.submit_failed());
        assert!(!c.submit_failed());
        assert!(c.submit_failed());
        assert_eq!(c.mode(), AccelMode::FailDriver);
        // Fourth accelerate attempt is a no-op.
        assert!(!c.try_begin_accel());
        assert_eq!(c.mode(), AccelMode::FailDriver);
        assert_eq!(c.snapshot().stats.driver_fail_total, 3);
    }

    #[test]
    fn submit_ok_resets_driver_streak_but_not_total() {
        let c = ctx();
        assert!(c.try_begin_accel());
        assert!(!c.submit_failed());
        c.submit_ok();
        let stats = c.snapshot().stats;
        assert_eq!(stats.driver_fail, 0);
        assert_eq!(stats.driver_fail_total, 1);
    }

    #[test]
    fn rule_failure_is_terminal() {
        let c = ctx();
        assert!(c.try_begin_accel());
        c.fail_rule();
        assert_eq!(c.mode(), AccelMode::FailRule);
        assert!(!c.try_begin_accel());
    }

    #[test]
    fn stale_destroy_response_is_ignored() {
        let c = ctx();
        assert!(c.try_begin_accel());
        c.create_acked();
        // Eviction raced ahead of our destroy ack.
        assert_eq!(c.accel_ceased(), CeaseOutcome::Decelerated);
        assert!(!c.destroy_response(true));
        assert_eq!(c.mode(), AccelMode::Decel);
    }

    #[test]
    fn destroy_nack_is_terminal() {
        let c = ctx();
        assert!(c.try_begin_accel());
        c.create_acked();
        assert_eq!(c.request_decel(), DecelDisposition::Begin);
        assert!(c.destroy_response(false));
        assert_eq!(c.mode(), AccelMode::FailDecel);
        assert!(!c.try_begin_accel());
    }

    #[test]
    fn cease_ignored_when_not_accelerated() {
        let c = ctx();
        assert_eq!(c.accel_ceased(), CeaseOutcome::Ignored);
    }

    #[test]
    fn action_seen_clears_no_action_counter() {
        let c = ctx();
        assert!(c.try_begin_accel());
        c.create_acked();
        c.action_seen();
        assert_eq!(c.accel_ceased(), CeaseOutcome::Decelerated);
        assert_eq!(c.snapshot().stats.no_action_seen_total, 0);
    }

    /// A flow that never carries offloaded traffic reaches the
    /// no-action terminal state after exactly `limit` accelerate/evict
    /// cycles: the counter is incremented on each ack and compared with
    /// `>=` inside the eviction handler.
    #[test]
    fn no_action_limit_after_exactly_limit_cycles() {
        let limit = 4u16;
        let c = ctx_with(AccelLimits {
            no_action: limit,
            ..AccelLimits::default()
        });
        for cycle in 1..=limit {
            assert!(c.try_begin_accel(), "cycle {cycle} should be eligible");
            c.create_acked();
            let outcome = c.accel_ceased();
            if cycle < limit {
                assert_eq!(outcome, CeaseOutcome::Decelerated, "cycle {cycle}");
            } else {
                assert_eq!(outcome, CeaseOutcome::FailedNoAction);
            }
        }
        assert_eq!(c.mode(), AccelMode::FailNoAction);
        assert_eq!(c.snapshot().stats.no_action_seen_total, u32::from(limit));
    }

    #[test]
    fn decel_request_in_terminal_state_is_noop() {
        let c = AccelContext::new(false, AccelLimits::default());
        assert_eq!(c.request_decel(), DecelDisposition::NotAccelerated);
    }
}
