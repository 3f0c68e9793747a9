use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use domain::common::entity::Sender;
use domain::conn::entity::{ConnSync, SyncReason};
use ports::secondary::connection_store::ConnectionStorePort;
use ports::secondary::conntrack_port::ConntrackPort;
use ports::secondary::metrics_port::MetricsPort;
use ports::secondary::neighbor_port::NeighborPort;
use ports::secondary::offload_port::OffloadEvent;

use crate::accel_engine::AccelEngine;

/// Consumes the inbound offload event channel: create/destroy
/// acknowledgements re-enter the acceleration engine, periodic stats
/// syncs credit totals and drive the eviction/no-action logic.
///
/// Uses `tokio::select!` for cancellation awareness and drains the
/// channel on shutdown so late acknowledgements still settle state.
pub struct OffloadEventDispatcher {
    store: Arc<dyn ConnectionStorePort>,
    engine: Arc<AccelEngine>,
    conntrack: Arc<dyn ConntrackPort>,
    neighbors: Arc<dyn NeighborPort>,
    metrics: Arc<dyn MetricsPort>,
}

impl OffloadEventDispatcher {
    pub fn new(
        store: Arc<dyn ConnectionStorePort>,
        engine: Arc<AccelEngine>,
        conntrack: Arc<dyn ConntrackPort>,
        neighbors: Arc<dyn NeighborPort>,
        metrics: Arc<dyn MetricsPort>,
    ) -> Self {
        Self {
            store,
            engine,
            conntrack,
            neighbors,
            metrics,
        }
    }

    pub async fn run(self, mut rx: mpsc::Receiver<OffloadEvent>, cancel: CancellationToken) {
        let mut count: u64 = 0;

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    // Drain remaining events before exiting.
                    while let Ok(event) = rx.try_recv() {
                        count += 1;
                        self.dispatch(event);
                    }
                    break;
                }
                msg = rx.recv() => {
                    match msg {
                        Some(event) => {
                            count += 1;
                            self.dispatch(event);
                        }
                        None => break, // channel closed
                    }
                }
            }
        }

        tracing::info!(total_events = count, "offload event dispatcher stopped");
    }

    pub fn dispatch(&self, event: OffloadEvent) {
        match event {
            OffloadEvent::CreateResponse { serial, response } => {
                let Some(conn) = self.store.find_by_serial(serial) else {
                    tracing::trace!(serial, "create response for unknown connection");
                    self.metrics.record_event_dropped("unknown_serial");
                    return;
                };
                self.engine.on_create_response(&conn, response);
            }
            OffloadEvent::DestroyResponse { serial, response } => {
                let Some(conn) = self.store.find_by_serial(serial) else {
                    tracing::trace!(serial, "destroy response for unknown connection");
                    self.metrics.record_event_dropped("unknown_serial");
                    return;
                };
                self.engine.on_destroy_response(&conn, response);
                // A defunct connection was only kept findable for this
                // acknowledgement; release the stored record now.
                if conn.is_defunct() {
                    self.store.remove(&conn.tuple());
                }
            }
            OffloadEvent::Sync(sync) => self.process_sync(&sync),
        }
    }

    fn process_sync(&self, sync: &ConnSync) {
        let Some(conn) = self.store.find(&sync.tuple) else {
            tracing::trace!(tuple = %sync.tuple, "sync for unknown connection");
            self.sync_conntrack(sync);
            return;
        };

        if !conn.touch() {
            self.sync_conntrack(sync);
            return;
        }

        if sync.flow_tx_packets > 0 || sync.return_tx_packets > 0 {
            // What the fast path received per direction is what each
            // side of the connection sent.
            conn.credit_data(Sender::Src, sync.flow_rx_bytes, sync.flow_rx_packets);
            conn.credit_data(Sender::Dest, sync.return_rx_bytes, sync.return_rx_packets);

            // Offloaded traffic moved: the rule is doing useful work.
            self.engine.action_seen(&conn);
        }

        for classifier in conn.assignments() {
            classifier.sync_to(sync);
        }

        match sync.reason {
            SyncReason::Destroy => {
                // Final sync for a manager-initiated destroy; the
                // destroy acknowledgement carries the state change.
                tracing::trace!(serial = conn.serial(), "final sync for destroy");
            }
            SyncReason::Flush | SyncReason::Evict => {
                tracing::debug!(serial = conn.serial(), reason = ?sync.reason,
                    "fast path ended acceleration");
                self.engine.accel_ceased(&conn);
            }
            SyncReason::Stats => {
                // Keep neighbor entries fresh while traffic bypasses
                // the slow path.
                self.neighbors.refresh(&sync.tuple.src_addr);
                self.neighbors.refresh(&sync.tuple.dst_addr);
            }
        }

        // A stale classifier generation means the rule may no longer
        // describe policy; force a deceleration so the next packet
        // re-evaluates.
        if conn.generation() != self.store.generation() {
            tracing::debug!(serial = conn.serial(), "generation changed, decelerating");
            self.engine.decelerate(&conn);
        }

        self.sync_conntrack(sync);
    }

    /// Refresh the tracking subsystem regardless of whether we still
    /// know the connection.
    fn sync_conntrack(&self, sync: &ConnSync) {
        self.conntrack.extend_timeout(&sync.tuple, sync.inc_ticks_ms);
        self.conntrack.credit_totals(&sync.tuple, sync);
        if let Some(snap) = &sync.tcp {
            self.conntrack.merge_tcp_window(&sync.tuple, snap);
        }
    }
}
