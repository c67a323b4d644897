use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

/// Handle used by services to emit audit events without blocking on the sink.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Audit events emitted by every mutation of the ledger or the reservation
/// table. The processing loop is the boundary to the external audit sink;
/// in particular it is what preserves the history of records pruned on
/// reaching zero quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    StockReceived {
        record_id: Uuid,
        sku: String,
        warehouse: String,
        level1: i64,
        level2: i64,
        level3: i64,
    },
    StockAdjusted {
        record_id: Uuid,
        sku: String,
        warehouse: String,
        level1_delta: i64,
        level2_delta: i64,
        level3_delta: i64,
        reason: String,
        adjusted_by: String,
        record_pruned: bool,
    },
    StockReserved {
        reservation_id: Uuid,
        record_id: Uuid,
        sku: String,
        warehouse: String,
        level1: i64,
        level2: i64,
        level3: i64,
        base_total: i64,
        rates_missing: bool,
        reserved_by: String,
    },
    ReservationCancelled {
        reservation_id: Uuid,
        record_id: Uuid,
        cancelled_by: String,
        reason: Option<String>,
    },
    ReservationFulfilled {
        reservation_id: Uuid,
        record_id: Uuid,
        sku: String,
        warehouse: String,
        level1: i64,
        level2: i64,
        level3: i64,
        base_total: i64,
        record_pruned: bool,
        fulfilled_by: String,
    },
    ConversionRateChanged {
        sku: String,
        level1_rate: i64,
        level2_rate: i64,
        changed_at: DateTime<Utc>,
    },
}

/// Consumes events from the channel and writes them to the audit log.
///
/// Runs for the lifetime of the process; exits when every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting audit event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::StockReceived {
                record_id,
                sku,
                warehouse,
                level1,
                level2,
                level3,
            } => {
                info!(
                    target: "audit",
                    record_id = %record_id,
                    sku = %sku,
                    warehouse = %warehouse,
                    level1 = level1,
                    level2 = level2,
                    level3 = level3,
                    "Stock received"
                );
            }
            Event::StockAdjusted {
                record_id,
                sku,
                warehouse,
                level1_delta,
                level2_delta,
                level3_delta,
                reason,
                adjusted_by,
                record_pruned,
            } => {
                info!(
                    target: "audit",
                    record_id = %record_id,
                    sku = %sku,
                    warehouse = %warehouse,
                    level1_delta = level1_delta,
                    level2_delta = level2_delta,
                    level3_delta = level3_delta,
                    reason = %reason,
                    adjusted_by = %adjusted_by,
                    record_pruned = record_pruned,
                    "Stock adjusted"
                );
            }
            Event::StockReserved {
                reservation_id,
                record_id,
                sku,
                base_total,
                rates_missing,
                reserved_by,
                ..
            } => {
                info!(
                    target: "audit",
                    reservation_id = %reservation_id,
                    record_id = %record_id,
                    sku = %sku,
                    base_total = base_total,
                    rates_missing = rates_missing,
                    reserved_by = %reserved_by,
                    "Stock reserved"
                );
            }
            Event::ReservationCancelled {
                reservation_id,
                record_id,
                cancelled_by,
                reason,
            } => {
                info!(
                    target: "audit",
                    reservation_id = %reservation_id,
                    record_id = %record_id,
                    cancelled_by = %cancelled_by,
                    reason = reason.as_deref().unwrap_or("-"),
                    "Reservation cancelled"
                );
            }
            Event::ReservationFulfilled {
                reservation_id,
                record_id,
                sku,
                base_total,
                record_pruned,
                fulfilled_by,
                ..
            } => {
                info!(
                    target: "audit",
                    reservation_id = %reservation_id,
                    record_id = %record_id,
                    sku = %sku,
                    base_total = base_total,
                    record_pruned = record_pruned,
                    fulfilled_by = %fulfilled_by,
                    "Reservation fulfilled"
                );
            }
            Event::ConversionRateChanged {
                sku,
                level1_rate,
                level2_rate,
                changed_at,
            } => {
                info!(
                    target: "audit",
                    sku = %sku,
                    level1_rate = level1_rate,
                    level2_rate = level2_rate,
                    changed_at = %changed_at,
                    "Conversion rate changed"
                );
            }
        }

        if let Ok(serialized) = serde_json::to_string(&event) {
            tracing::debug!(target: "audit", payload = %serialized, "Audit payload");
        } else {
            error!("Failed to serialize audit event");
        }
    }

    info!("Audit event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender
            .send(Event::ReservationCancelled {
                reservation_id: Uuid::new_v4(),
                record_id: Uuid::new_v4(),
                cancelled_by: "tester".into(),
                reason: None,
            })
            .await
            .expect("send should succeed");

        match rx.recv().await {
            Some(Event::ReservationCancelled { cancelled_by, .. }) => {
                assert_eq!(cancelled_by, "tester");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        let result = sender
            .send(Event::ConversionRateChanged {
                sku: "SKU-1".into(),
                level1_rate: 144,
                level2_rate: 12,
                changed_at: Utc::now(),
            })
            .await;
        assert!(result.is_err());
    }
}
