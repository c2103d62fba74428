//! Domain event fan-out over NATS.

use crate::domain::events::DomainEvent;

pub const EVENT_SUBJECT_PREFIX: &str = "storefront.events";

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn subject(event: &DomainEvent) -> String { format!("{EVENT_SUBJECT_PREFIX}.{}", event.kind()) }

    /// Publishing is best effort; failures are logged and never fail the request.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = Self::subject(&event);
            let Some(nats) = &self.nats else {
                tracing::debug!(%subject, "event not published, no NATS connection");
                continue;
            };
            match serde_json::to_vec(&event) {
                Ok(payload) => {
                    if let Err(e) = nats.publish(subject.clone(), payload.into()).await {
                        tracing::warn!(%subject, error = %e, "failed to publish event");
                    }
                }
                Err(e) => tracing::warn!(%subject, error = %e, "failed to encode event"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::QuoteEvent;
    use uuid::Uuid;

    #[tokio::test]
    async fn subjects_follow_event_kind() {
        let event = DomainEvent::Quote(QuoteEvent::Reviewed { quote_id: Uuid::nil() });
        assert_eq!(EventPublisher::subject(&event), "storefront.events.quote.reviewed");
        EventPublisher::default().publish(vec![event]).await;
    }
}
