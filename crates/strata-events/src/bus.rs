use std::sync::Arc;

use serde_json::Value;
use strata_domain::{Event, EventId};
use strata_store::Store;

use crate::error::EventsError;

/// Durable append-only event log. Publishing only appends a row — delivery
/// to webhooks/subscriptions happens on separate worker loops (see
/// `delivery`) so a broken downstream consumer never blocks a supervisor
/// from recording the transition that actually matters.
pub struct EventBus {
    store: Arc<dyn Store>,
}

impl EventBus {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn publish(
        &self,
        event_type: &str,
        subject_id: &str,
        old_state: &str,
        new_state: &str,
        payload: Value,
    ) -> Result<Event, EventsError> {
        let event = Event {
            id: EventId::new(),
            event_type: event_type.to_string(),
            subject_id: subject_id.to_string(),
            old_state: old_state.to_string(),
            new_state: new_state.to_string(),
            timestamp: strata_domain::time::now(),
            sequence: 0,
            payload,
        };
        Ok(self.store.append_event(event).await?)
    }
}
