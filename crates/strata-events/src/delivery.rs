use std::sync::Arc;
use std::time::Duration;

use strata_domain::DeliveryStatus;
use strata_store::{EventsFilter, Store};

/// Fans every event out to every registered legacy webhook. Best-effort,
/// fire-and-forget: a non-2xx response or timeout is logged and otherwise
/// ignored, never retried, never fed back into the event cursor.
pub async fn run_webhook_worker(
    store: Arc<dyn Store>,
    client: reqwest::Client,
    timeout: Duration,
    poll_interval: Duration,
) {
    let mut cursor: u64 = 0;
    loop {
        match deliver_webhook_batch(&store, &client, timeout, cursor).await {
            Ok(next) => cursor = next,
            Err(e) => tracing::warn!(error = %e, "webhook delivery batch failed"),
        }
        tokio::time::sleep(poll_interval).await;
    }
}

async fn deliver_webhook_batch(
    store: &Arc<dyn Store>,
    client: &reqwest::Client,
    timeout: Duration,
    cursor: u64,
) -> Result<u64, strata_store::StoreError> {
    let events = store
        .get_events(&EventsFilter {
            after_sequence: Some(cursor),
            ..Default::default()
        })
        .await?;
    let mut next = cursor;
    for event in &events {
        next = next.max(event.sequence);
        let webhooks = store.get_webhooks(None).await?;
        for webhook in webhooks {
            let body = serde_json::json!({
                "type": event.event_type,
                "subject_id": event.subject_id,
                "old_state": event.old_state,
                "new_state": event.new_state,
                "timestamp": event.timestamp,
            });
            let req = client.post(&webhook.url).timeout(timeout).json(&body).send();
            if let Err(e) = req.await {
                tracing::warn!(webhook = %webhook.id, error = %e, "legacy webhook delivery failed");
            }
        }
    }
    Ok(next)
}

/// Targeted, typed, durable delivery. Failed deliveries back off
/// exponentially (base 5s, capped at 5 minutes) per subscription; after
/// `max_attempts` the subscription is marked `failing` but never deleted.
pub async fn run_subscription_worker(
    store: Arc<dyn Store>,
    client: reqwest::Client,
    timeout: Duration,
    max_attempts: u32,
    poll_interval: Duration,
) {
    let mut cursor: u64 = 0;
    loop {
        match deliver_subscription_batch(&store, &client, timeout, max_attempts, cursor).await {
            Ok(next) => cursor = next,
            Err(e) => tracing::warn!(error = %e, "subscription delivery batch failed"),
        }
        tokio::time::sleep(poll_interval).await;
    }
}

fn backoff_for(attempt_count: u32) -> Duration {
    let secs = 5u64.saturating_mul(1u64 << attempt_count.min(6));
    Duration::from_secs(secs.min(300))
}

async fn deliver_subscription_batch(
    store: &Arc<dyn Store>,
    client: &reqwest::Client,
    timeout: Duration,
    max_attempts: u32,
    cursor: u64,
) -> Result<u64, strata_store::StoreError> {
    let events = store
        .get_events(&EventsFilter {
            after_sequence: Some(cursor),
            ..Default::default()
        })
        .await?;
    let mut next = cursor;
    let now = strata_domain::time::now();
    for event in &events {
        next = next.max(event.sequence);
        let subscriptions = store.get_subscriptions(None).await?;
        for mut sub in subscriptions {
            if sub.event_type != event.event_type {
                continue;
            }
            if sub.last_delivery_status == DeliveryStatus::Failing {
                let elapsed = now - sub.last_delivery_attempt;
                if elapsed < backoff_for(sub.attempt_count).as_nanos() as i64 {
                    continue;
                }
            }
            let body = serde_json::json!({
                "type": event.event_type,
                "subject_id": event.subject_id,
                "old_state": event.old_state,
                "new_state": event.new_state,
                "timestamp": event.timestamp,
            });
            let result = client.post(&sub.url).timeout(timeout).json(&body).send().await;
            sub.last_delivery_attempt = now;
            match result {
                Ok(resp) if resp.status().is_success() => {
                    sub.last_delivery_status = DeliveryStatus::Delivered;
                    sub.attempt_count = 0;
                }
                _ => {
                    sub.attempt_count += 1;
                    sub.last_delivery_status = if sub.attempt_count >= max_attempts {
                        DeliveryStatus::Failing
                    } else {
                        DeliveryStatus::Pending
                    };
                }
            }
            store.update_subscription(&sub).await?;
        }
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strata_domain::{Event, EventId, Subscription, SubscriptionId};
    use strata_store::MemoryStore;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn successful_delivery_resets_attempt_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store: Arc<dyn strata_store::Store> = Arc::new(MemoryStore::new());
        store
            .create_subscription(Subscription {
                id: SubscriptionId::new(),
                owner_id: "o".into(),
                url: server.uri(),
                event_type: "installation".into(),
                last_delivery_status: DeliveryStatus::Pending,
                last_delivery_attempt: 0,
                attempt_count: 3,
                create_at: 0,
                delete_at: 0,
            })
            .await
            .unwrap();
        store
            .append_event(Event {
                id: EventId::new(),
                event_type: "installation".into(),
                subject_id: "i1".into(),
                old_state: "a".into(),
                new_state: "b".into(),
                timestamp: 1,
                sequence: 0,
                payload: serde_json::json!({}),
            })
            .await
            .unwrap();

        let client = reqwest::Client::new();
        deliver_subscription_batch(&store, &client, Duration::from_secs(5), 5, 0)
            .await
            .unwrap();

        let subs = store.get_subscriptions(None).await.unwrap();
        assert_eq!(subs[0].last_delivery_status, DeliveryStatus::Delivered);
        assert_eq!(subs[0].attempt_count, 0);
    }
}
