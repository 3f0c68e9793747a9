use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use domain::accel::counters::AcceleratedCounts;
use domain::accel::entity::AccelLimits;
use domain::common::entity::ProtoClass;
use ports::primary::control::ControlPort;

/// Operational control state: the stop/resume flag, the terminate
/// flag, the retry-limit defaults handed to new connections, and the
/// read-only accelerated counters.
pub struct ControlState {
    stopped: AtomicBool,
    terminate: AtomicBool,
    limits: Mutex<AccelLimits>,
    counters: Arc<AcceleratedCounts>,
}

impl ControlState {
    pub fn new(limits: AccelLimits, counters: Arc<AcceleratedCounts>) -> Self {
        Self {
            stopped: AtomicBool::new(false),
            terminate: AtomicBool::new(false),
            limits: Mutex::new(limits),
            counters,
        }
    }
}

impl ControlPort for ControlState {
    fn stop(&self) {
        tracing::info!("packet processing stopped");
        self.stopped.store(true, Ordering::Release);
    }

    fn resume(&self) {
        tracing::info!("packet processing resumed");
        self.stopped.store(false, Ordering::Release);
    }

    fn stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn begin_terminate(&self) {
        tracing::info!("terminate pending, new connections fail open");
        self.terminate.store(true, Ordering::Release);
    }

    fn terminate_pending(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }

    fn limits(&self) -> AccelLimits {
        *self.limits.lock().expect("limits lock poisoned")
    }

    fn set_limits(&self, limits: AccelLimits) {
        *self.limits.lock().expect("limits lock poisoned") = limits;
    }

    fn accelerated(&self, class: ProtoClass) -> u64 {
        self.counters.get(class)
    }

    fn accelerated_total(&self) -> u64 {
        self.counters.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ControlState {
        ControlState::new(AccelLimits::default(), Arc::new(AcceleratedCounts::new()))
    }

    #[test]
    fn stop_resume_roundtrip() {
        let s = state();
        assert!(!s.stopped());
        s.stop();
        assert!(s.stopped());
        s.resume();
        assert!(!s.stopped());
    }

    #[test]
    fn terminate_is_one_way() {
        let s = state();
        assert!(!s.terminate_pending());
        s.begin_terminate();
        assert!(s.terminate_pending());
    }

    #[test]
    fn limits_update() {
        let s = state();
        assert_eq!(s.limits().nack, 250);
        s.set_limits(AccelLimits {
            no_action: 10,
            driver_fail: 20,
            nack: 30,
        });
        assert_eq!(s.limits().no_action, 10);
        assert_eq!(s.limits().driver_fail, 20);
        assert_eq!(s.limits().nack, 30);
    }

    #[test]
    fn counters_are_read_through() {
        let counters = Arc::new(AcceleratedCounts::new());
        let s = ControlState::new(AccelLimits::default(), Arc::clone(&counters));
        counters.increment(ProtoClass::Udp);
        assert_eq!(s.accelerated(ProtoClass::Udp), 1);
        assert_eq!(s.accelerated_total(), 1);
    }
}
