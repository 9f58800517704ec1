//! Deduplicating post store
//!
//! Keyed by raw `post_id`. The first successful insertion wins; later posts
//! with the same id are dropped no matter which extractor produced them.

use crate::post::{Post, Source};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct StoreInner {
    ids: HashSet<String>,
    /// Insertion order
    posts: Vec<Post>,
}

/// Shared post store. Every method is a single critical section that never
/// spans an await point, so check-then-insert cannot interleave.
#[derive(Default)]
pub struct PostStore {
    inner: Mutex<StoreInner>,
}

impl PostStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        // A panic while holding the guard cannot leave the set and vec out of
        // step, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn has(&self, post_id: &str) -> bool {
        self.lock().ids.contains(post_id)
    }

    /// Insert unless a post with the same `post_id` is already stored.
    /// Returns `true` if the post was inserted.
    pub fn insert_if_absent(&self, post: Post) -> bool {
        let mut inner = self.lock();
        if !inner.ids.insert(post.post_id.clone()) {
            return false;
        }
        inner.posts.push(post);
        true
    }

    /// Snapshot of all posts in insertion order
    pub fn values(&self) -> Vec<Post> {
        self.lock().posts.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.ids.clear();
        inner.posts.clear();
    }

    /// Per-source post counts
    pub fn stats(&self) -> HashMap<Source, usize> {
        let mut counts = HashMap::new();
        for post in self.lock().posts.iter() {
            *counts.entry(post.source).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn post(source: Source, id: &str, text: &str) -> Post {
        Post::new(source, id, text)
    }

    #[test]
    fn test_insert_new() {
        let store = PostStore::new();
        assert!(!store.has("1"));
        assert!(store.insert_if_absent(post(Source::Dom, "1", "first post text")));
        assert!(store.has("1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_across_sources_keeps_first() {
        let store = PostStore::new();
        assert!(store.insert_if_absent(post(Source::GraphQl, "1", "from network")));
        assert!(!store.insert_if_absent(post(Source::Dom, "1", "from dom")));

        let values = store.values();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].source, Source::GraphQl);
        assert_eq!(values[0].text, "from network");
    }

    #[test]
    fn test_values_preserve_insertion_order() {
        let store = PostStore::new();
        for id in ["3", "1", "2"] {
            store.insert_if_absent(post(Source::Relay, id, "text"));
        }
        let ids: Vec<_> = store.values().into_iter().map(|p| p.post_id).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_clear() {
        let store = PostStore::new();
        store.insert_if_absent(post(Source::Dom, "1", "text"));
        store.clear();
        assert!(store.is_empty());
        assert!(!store.has("1"));
        assert!(store.insert_if_absent(post(Source::Dom, "1", "again")));
    }

    #[test]
    fn test_stats() {
        let store = PostStore::new();
        store.insert_if_absent(post(Source::Dom, "1", "a"));
        store.insert_if_absent(post(Source::Dom, "2", "b"));
        store.insert_if_absent(post(Source::Relay, "3", "c"));
        let stats = store.stats();
        assert_eq!(stats.get(&Source::Dom), Some(&2));
        assert_eq!(stats.get(&Source::Relay), Some(&1));
        assert_eq!(stats.get(&Source::GraphQl), None);
    }

    #[test]
    fn test_concurrent_inserts_of_same_id() {
        let store = std::sync::Arc::new(PostStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    store.insert_if_absent(post(Source::Dom, "same", &format!("writer {}", i)))
                })
            })
            .collect();

        let inserted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(inserted, 1);
        assert_eq!(store.len(), 1);
    }

    fn source_strategy() -> impl Strategy<Value = Source> {
        prop_oneof![Just(Source::Relay), Just(Source::GraphQl), Just(Source::Dom)]
    }

    proptest! {
        #[test]
        fn prop_first_writer_wins(
            id in "[0-9]{1,6}",
            first in source_strategy(),
            second in source_strategy(),
            first_text in "[a-z ]{5,40}",
            second_text in "[a-z ]{5,40}",
        ) {
            let store = PostStore::new();
            let a = post(first, &id, &first_text);
            let expected = a.clone();
            prop_assert!(store.insert_if_absent(a));
            prop_assert!(!store.insert_if_absent(post(second, &id, &second_text)));

            let values = store.values();
            prop_assert_eq!(values.len(), 1);
            prop_assert_eq!(&values[0], &expected);
        }
    }
}
