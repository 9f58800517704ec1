//! Notifications to the external controller
//!
//! Notifications are fire-and-forget. Publishing while nobody is subscribed
//! is a no-op: the controller may attach and detach at any time and a scan
//! must never fail because of it.

use crate::export::ExportSnapshot;
use crate::post::Post;
use crate::store::PostStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Buffered notifications per subscriber before the slowest one starts lagging
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notification {
    #[serde(rename_all = "camelCase")]
    NewPostFound { post_count: usize },

    #[serde(rename_all = "camelCase")]
    ScanProgress {
        post_count: usize,
        elapsed: u64,
        duration: u64,
    },

    #[serde(rename_all = "camelCase")]
    ScanComplete {
        post_count: usize,
        data: ExportSnapshot,
    },
}

/// Broadcast channel for notifications
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Notification>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers, if any
    pub fn publish(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            trace!("No notification subscribers attached");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Insertion path shared by every extractor: dedup through the store, then
/// announce the new post.
#[derive(Clone)]
pub struct PostSink {
    store: Arc<PostStore>,
    events: EventBus,
}

impl PostSink {
    pub fn new(store: Arc<PostStore>, events: EventBus) -> Self {
        Self { store, events }
    }

    pub fn store(&self) -> &PostStore {
        &self.store
    }

    /// Returns `true` if the post was new
    pub fn offer(&self, post: Post) -> bool {
        let post_id = post.post_id.clone();
        let source = post.source;
        if !self.store.insert_if_absent(post) {
            trace!("Duplicate post {} from {}", post_id, source.as_str());
            return false;
        }

        let post_count = self.store.len();
        debug!("New post {} from {} ({} total)", post_id, source.as_str(), post_count);
        self.events.publish(Notification::NewPostFound { post_count });
        true
    }
}
