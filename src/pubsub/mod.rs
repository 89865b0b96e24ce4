pub mod events;
pub mod listener;

pub use events::{ChangeEvent, ChangeType, EventFilter};
pub use listener::ChangeListener;

use crate::types::CollectionId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Fan-out of committed writes to every surface watching the store. Clones share the
/// same channels.
#[derive(Clone)]
pub struct ChangeFeed {
    channels: Arc<DashMap<CollectionId, broadcast::Sender<ChangeEvent>>>,
    global_channel: broadcast::Sender<ChangeEvent>,
    buffer_size: usize,
}

impl ChangeFeed {
    pub fn new(buffer_size: usize) -> Self {
        let (global_tx, _) = broadcast::channel(buffer_size);

        Self {
            channels: Arc::new(DashMap::new()),
            global_channel: global_tx,
            buffer_size,
        }
    }

    /// Sends to the collection's listeners and the global listeners. Having no
    /// listeners is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        if let Some(tx) = self.channels.get(&event.collection) {
            let _ = tx.send(event.clone());
        }
        let _ = self.global_channel.send(event);
    }

    pub fn listen(&self, collection: CollectionId) -> ChangeListener {
        let tx = self
            .channels
            .entry(collection)
            .or_insert_with(|| broadcast::channel(self.buffer_size).0)
            .clone();

        ChangeListener::new(collection.name().to_string(), tx.subscribe())
    }

    pub fn listen_all(&self) -> ChangeListener {
        ChangeListener::new("*".to_string(), self.global_channel.subscribe())
    }

    pub fn listener_count(&self, collection: CollectionId) -> usize {
        self.channels
            .get(&collection)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    pub fn total_listeners(&self) -> usize {
        self.channels
            .iter()
            .map(|entry| entry.value().receiver_count())
            .sum::<usize>()
            + self.global_channel.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Key;
    use serde_json::json;

    fn event(collection: CollectionId, id: u64) -> ChangeEvent {
        let doc = json!({"id": id}).as_object().cloned().unwrap();
        ChangeEvent::insert(collection, Key::Id(id), doc)
    }

    #[tokio::test]
    async fn test_multiple_listeners() {
        let feed = ChangeFeed::new(16);

        let mut listener1 = feed.listen(CollectionId::Orders);
        let mut listener2 = feed.listen(CollectionId::Orders);
        assert_eq!(feed.listener_count(CollectionId::Orders), 2);

        feed.publish(event(CollectionId::Orders, 1));

        assert!(listener1.recv().await.is_ok());
        assert!(listener2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_global_listener() {
        let feed = ChangeFeed::new(16);
        let mut global = feed.listen_all();
        let mut products = feed.listen(CollectionId::Products);

        feed.publish(event(CollectionId::Users, 1));
        feed.publish(event(CollectionId::Products, 2));

        assert_eq!(global.recv().await.unwrap().collection, CollectionId::Users);
        assert_eq!(global.recv().await.unwrap().collection, CollectionId::Products);
        assert_eq!(products.recv().await.unwrap().key, Key::Id(2));
        assert_eq!(feed.total_listeners(), 2);
    }
}
