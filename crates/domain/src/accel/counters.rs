use std::sync::atomic::{AtomicU64, Ordering};

use crate::common::entity::ProtoClass;

/// Process-wide counts of currently accelerated connections, total and
/// per transport class.
///
/// These are simple increments/decrements with a never-negative
/// invariant; going below zero is a programming error, not a condition
/// to recover from, so decrement asserts instead of saturating.
#[derive(Debug, Default)]
pub struct AcceleratedCounts {
    tcp: AtomicU64,
    udp: AtomicU64,
    non_ported: AtomicU64,
    total: AtomicU64,
}

impl AcceleratedCounts {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, class: ProtoClass) -> &AtomicU64 {
        match class {
            ProtoClass::Tcp => &self.tcp,
            ProtoClass::Udp => &self.udp,
            ProtoClass::NonPorted => &self.non_ported,
        }
    }

    pub fn increment(&self, class: ProtoClass) {
        self.slot(class).fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement(&self, class: ProtoClass) {
        let prev = self.slot(class).fetch_sub(1, Ordering::Relaxed);
        assert!(prev > 0, "{class} accelerated count underflow");
        let prev_total = self.total.fetch_sub(1, Ordering::Relaxed);
        assert!(prev_total > 0, "total accelerated count underflow");
    }

    pub fn get(&self, class: ProtoClass) -> u64 {
        self.slot(class).load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn increment_decrement_roundtrip() {
        let counts = AcceleratedCounts::new();
        for _ in 0..5 {
            counts.increment(ProtoClass::Tcp);
        }
        counts.increment(ProtoClass::Udp);
        assert_eq!(counts.get(ProtoClass::Tcp), 5);
        assert_eq!(counts.get(ProtoClass::Udp), 1);
        assert_eq!(counts.total(), 6);

        for _ in 0..5 {
            counts.decrement(ProtoClass::Tcp);
        }
        counts.decrement(ProtoClass::Udp);
        assert_eq!(counts.total(), 0);
        assert_eq!(counts.get(ProtoClass::Tcp), 0);
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn underflow_asserts() {
        let counts = AcceleratedCounts::new();
        counts.decrement(ProtoClass::Tcp);
    }

    #[test]
    fn concurrent_accel_decel_ends_at_zero() {
        let counts = Arc::new(AcceleratedCounts::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let counts = Arc::clone(&counts);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    counts.increment(ProtoClass::Tcp);
                    counts.decrement(ProtoClass::Tcp);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counts.get(ProtoClass::Tcp), 0);
        assert_eq!(counts.total(), 0);
    }
}
