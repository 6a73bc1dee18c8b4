//! # Ledger Events
//!
//! Every state change in Holdfast produces exactly one [`LedgerEvent`]:
//! one per hold transition, one per token movement or approval. Events are
//! pushed synchronously into an [`EventSink`] while the operation still holds
//! the ledger lock, so sinks observe them in commit order.
//!
//! Sinks provided here:
//!
//! - [`RecordingSink`] keeps everything in memory (tests, audits).
//! - [`TracingSink`] writes each event as a structured `tracing` record.
//! - `tokio::sync::broadcast::Sender<LedgerEvent>` fans events out to async
//!   subscribers; see [`event_channel`].
//! - [`NoopSink`] discards everything.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, trace};

use crate::config::EVENT_CHANNEL_CAPACITY;
use crate::types::{Address, Amount, HashLock, HoldId, Timestamp};

// ---------------------------------------------------------------------------
// Event model
// ---------------------------------------------------------------------------

/// Who released a hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseKind {
    /// The notary released it (allowed at any time).
    Notary,
    /// The holder released it after expiry (or with no expiration set).
    Expiration,
}

/// A single observable state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// A hold was placed and the holder's balance locked.
    HoldCreated {
        /// The new hold's id.
        hold_id: HoldId,
        /// Whose balance is locked.
        holder: Address,
        /// Designated recipient, or the zero address if left open.
        recipient: Address,
        /// Party controlling the hold.
        notary: Address,
        /// Locked amount.
        value: Amount,
        /// Expiration timestamp (`0` means already expired).
        expiration: Timestamp,
        /// Commitment gating execution (zero means none).
        hash_lock: HashLock,
    },
    /// A hold was released and its value returned to the holder.
    HoldReleased {
        /// The released hold.
        hold_id: HoldId,
        /// The holder whose balance became spendable again.
        holder: Address,
        /// Amount unlocked.
        value: Amount,
        /// Whether the notary or the expiry rule released it.
        released_by: ReleaseKind,
    },
    /// A hold was executed and its value moved to the recipient.
    HoldExecuted {
        /// The executed hold.
        hold_id: HoldId,
        /// The debited holder.
        holder: Address,
        /// The resolved recipient that was credited.
        recipient: Address,
        /// Amount moved.
        value: Amount,
    },
    /// Value moved between accounts. Mints come from the zero address and
    /// burns go to it.
    Transfer {
        /// Debited account.
        from: Address,
        /// Credited account.
        to: Address,
        /// Amount moved.
        value: Amount,
    },
    /// An allowance was set.
    Approval {
        /// Account granting the allowance.
        owner: Address,
        /// Account allowed to spend.
        spender: Address,
        /// New allowance.
        value: Amount,
    },
}

impl LedgerEvent {
    /// Short, stable name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::HoldCreated { .. } => "hold_created",
            LedgerEvent::HoldReleased { .. } => "hold_released",
            LedgerEvent::HoldExecuted { .. } => "hold_executed",
            LedgerEvent::Transfer { .. } => "transfer",
            LedgerEvent::Approval { .. } => "approval",
        }
    }

    /// The hold this event refers to, if any.
    pub fn hold_id(&self) -> Option<HoldId> {
        match self {
            LedgerEvent::HoldCreated { hold_id, .. }
            | LedgerEvent::HoldReleased { hold_id, .. }
            | LedgerEvent::HoldExecuted { hold_id, .. } => Some(*hold_id),
            LedgerEvent::Transfer { .. } | LedgerEvent::Approval { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination for ledger events.
///
/// `emit` is called with the ledger lock held. Implementations must not
/// block and must not call back into the ledger.
pub trait EventSink: Send + Sync {
    /// Delivers one event.
    fn emit(&self, event: LedgerEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: LedgerEvent) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LedgerEvent>>,
}

impl RecordingSink {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().clone()
    }

    /// Drains and returns everything recorded so far.
    pub fn take(&self) -> Vec<LedgerEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// The most recent event, if any.
    pub fn last(&self) -> Option<LedgerEvent> {
        self.events.lock().last().cloned()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: LedgerEvent) {
        self.events.lock().push(event);
    }
}

/// Writes each event to `tracing` at `info` level under the
/// `holdfast::events` target, with the JSON payload as a field.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: LedgerEvent) {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        info!(target: "holdfast::events", kind = event.kind(), payload = %payload, "ledger event");
    }
}

impl EventSink for broadcast::Sender<LedgerEvent> {
    fn emit(&self, event: LedgerEvent) {
        // An error only means nobody is subscribed right now.
        if self.send(event).is_err() {
            trace!("ledger event dropped: no subscribers");
        }
    }
}

/// Creates a broadcast channel sized for ledger events.
pub fn event_channel() -> (broadcast::Sender<LedgerEvent>, broadcast::Receiver<LedgerEvent>) {
    broadcast::channel(EVENT_CHANNEL_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transfer(value: Amount) -> LedgerEvent {
        LedgerEvent::Transfer {
            from: Address::ZERO,
            to: Address::from_label("holder"),
            value,
        }
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        assert!(sink.is_empty());

        sink.emit(sample_transfer(1));
        sink.emit(sample_transfer(2));

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.events()[0], sample_transfer(1));
        assert_eq!(sink.last(), Some(sample_transfer(2)));
    }

    #[test]
    fn recording_sink_take_drains() {
        let sink = RecordingSink::new();
        sink.emit(sample_transfer(5));
        assert_eq!(sink.take().len(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn hold_id_is_exposed_for_hold_events_only() {
        let id = HoldId::from_bytes([1u8; 32]);
        let executed = LedgerEvent::HoldExecuted {
            hold_id: id,
            holder: Address::from_label("holder"),
            recipient: Address::from_label("recipient"),
            value: 9,
        };
        assert_eq!(executed.hold_id(), Some(id));
        assert_eq!(executed.kind(), "hold_executed");
        assert_eq!(sample_transfer(1).hold_id(), None);
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let event = LedgerEvent::HoldReleased {
            hold_id: HoldId::from_bytes([2u8; 32]),
            holder: Address::from_label("holder"),
            value: 30,
            released_by: ReleaseKind::Notary,
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "hold_released");
        assert_eq!(json["released_by"], "notary");
        assert_eq!(json["value"], 30);

        let back: LedgerEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn broadcast_sender_delivers_to_subscribers() {
        let (tx, mut rx) = event_channel();
        tx.emit(sample_transfer(7));
        assert_eq!(rx.try_recv().unwrap(), sample_transfer(7));
    }

    #[test]
    fn broadcast_sender_without_subscribers_does_not_panic() {
        let (tx, rx) = event_channel();
        drop(rx);
        tx.emit(sample_transfer(1));
    }

    #[test]
    fn noop_and_tracing_sinks_accept_events() {
        NoopSink.emit(sample_transfer(1));
        TracingSink.emit(sample_transfer(1));
    }
}
