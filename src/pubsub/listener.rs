use super::events::{ChangeEvent, EventFilter};
use tokio::sync::broadcast;

/// Receives change events for one collection (or all of them).
pub struct ChangeListener {
    scope: String,
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: Option<EventFilter>,
}

impl ChangeListener {
    pub(crate) fn new(scope: String, receiver: broadcast::Receiver<ChangeEvent>) -> Self {
        Self {
            scope,
            receiver,
            filter: None,
        }
    }

    /// Only events matching the filter will be received
    pub fn filter(mut self, filter: EventFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Waits for the next matching event. A listener that falls behind gets
    /// `RecvError::Lagged` and should reload its view from the store.
    pub async fn recv(&mut self) -> Result<ChangeEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns the next matching event without waiting
    pub fn try_recv(&mut self) -> Result<ChangeEvent, broadcast::error::TryRecvError> {
        loop {
            let event = self.receiver.try_recv()?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Collection name this listener watches, or `*` for all
    pub fn scope(&self) -> &str {
        &self.scope
    }

    fn accepts(&self, event: &ChangeEvent) -> bool {
        self.filter.as_ref().is_none_or(|f| f.matches(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::{ChangeFeed, ChangeType};
    use crate::types::{CollectionId, Key};
    use serde_json::json;

    #[tokio::test]
    async fn test_listener_filter() {
        let feed = ChangeFeed::new(16);
        let mut listener = feed
            .listen(CollectionId::Users)
            .filter(EventFilter::ChangeType(ChangeType::Insert));

        let doc = json!({"id": 1, "name": "Alice"}).as_object().cloned().unwrap();
        feed.publish(ChangeEvent::delete(CollectionId::Users, Key::Id(2), doc.clone()));
        feed.publish(ChangeEvent::insert(CollectionId::Users, Key::Id(1), doc));

        let event = listener.recv().await.unwrap();
        assert_eq!(event.change_type, ChangeType::Insert);
        assert_eq!(event.key, Key::Id(1));
        assert!(listener.try_recv().is_err());
        assert_eq!(listener.scope(), "users");
    }
}
