//! Structured payload search.
//!
//! Decoded JSON is walked with an explicit work-list bounded by depth. Each
//! visited value is classified against a closed set of known shapes; the
//! shapes yield candidate post nodes, which [`node`] turns into posts.

pub mod node;
pub mod relay;

pub use relay::RelayPayloadParser;

use crate::config::PayloadConfig;
use crate::events::PostSink;
use crate::post::Source;
use serde_json::Value;
use std::collections::HashSet;
use tracing::trace;

/// Require-entry module name that carries prefetched query results
pub const PREFETCH_MODULE: &str = "RelayPrefetchedStreamCache";

/// Known payload shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PayloadShape<'a> {
    /// `["RelayPrefetchedStreamCache", method, deps, [key, payload, ...]]`,
    /// holding the cached query payloads
    PrefetchEntry(&'a [Value]),
    /// `{ "edges": [ { "node": ... }, ... ] }`
    EdgeList(&'a [Value]),
    /// `{ "story": { "message": ... } }`
    Story(&'a Value),
    /// `{ "node": { "message": ... } }`
    Node(&'a Value),
}

/// Classify a single value. One object may match several shapes.
pub fn classify(value: &Value) -> Vec<PayloadShape<'_>> {
    let mut shapes = Vec::new();

    match value {
        Value::Array(items) => {
            if items.first().and_then(Value::as_str) == Some(PREFETCH_MODULE) {
                if let Some(Value::Array(args)) = items.get(3) {
                    shapes.push(PayloadShape::PrefetchEntry(args));
                }
            }
        }
        Value::Object(map) => {
            if let Some(Value::Array(edges)) = map.get("edges") {
                shapes.push(PayloadShape::EdgeList(edges));
            }
            if let Some(story) = map.get("story").filter(|s| has_message(s)) {
                shapes.push(PayloadShape::Story(story));
            }
            if let Some(node) = map.get("node").filter(|n| has_message(n)) {
                shapes.push(PayloadShape::Node(node));
            }
        }
        _ => {}
    }

    shapes
}

fn has_message(value: &Value) -> bool {
    value.get("message").map(|m| !m.is_null()).unwrap_or(false)
}

/// Unwrap a prefetch argument to its query data
fn prefetch_data(arg: &Value) -> &Value {
    arg.pointer("/__bbox/result/data")
        .or_else(|| arg.pointer("/result/data"))
        .unwrap_or(arg)
}

/// Depth-bounded search for post nodes and payload-to-post capture
#[derive(Debug, Clone)]
pub struct PayloadExtractor {
    max_depth: usize,
    min_text_len: usize,
}

impl PayloadExtractor {
    pub fn new(config: &PayloadConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            min_text_len: config.min_text_len,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Visit every value reachable from `root` within the depth cutoff.
    /// `visit` receives each container value once, with its depth.
    pub fn walk<'a>(&self, root: &'a Value, mut visit: impl FnMut(&'a Value, usize)) {
        let mut work: Vec<(&'a Value, usize)> = vec![(root, 0)];
        let mut visited: HashSet<*const Value> = HashSet::new();

        while let Some((value, depth)) = work.pop() {
            if depth > self.max_depth || !visited.insert(value as *const Value) {
                continue;
            }
            visit(value, depth);

            for shape in classify(value) {
                if let PayloadShape::PrefetchEntry(args) = shape {
                    work.extend(args.iter().map(|arg| (prefetch_data(arg), depth + 1)));
                }
            }

            match value {
                Value::Object(map) => work.extend(
                    map.values()
                        .filter(|v| v.is_object() || v.is_array())
                        .map(|v| (v, depth + 1)),
                ),
                Value::Array(items) => work.extend(
                    items
                        .iter()
                        .filter(|v| v.is_object() || v.is_array())
                        .map(|v| (v, depth + 1)),
                ),
                _ => {}
            }
        }
    }

    /// Candidate post nodes found through the known shapes, deduplicated
    pub fn find_post_nodes<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut found: Vec<&'a Value> = Vec::new();
        let mut seen: HashSet<*const Value> = HashSet::new();
        let mut emit = |node: &'a Value| {
            if node.is_object() && seen.insert(node as *const Value) {
                found.push(node);
            }
        };

        self.walk(root, |value, depth| {
            for shape in classify(value) {
                match shape {
                    PayloadShape::EdgeList(edges) => {
                        for node in edges.iter().filter_map(|e| e.get("node")) {
                            emit(node);
                        }
                    }
                    PayloadShape::Story(story) => emit(story),
                    PayloadShape::Node(node) => emit(node),
                    PayloadShape::PrefetchEntry(_) => {
                        trace!("Prefetch cache entry at depth {}", depth);
                    }
                }
            }
        });

        found
    }

    /// Convert every candidate node under `root` and offer it to the sink.
    /// Returns the number of new posts.
    pub fn capture(&self, root: &Value, source: Source, location: &str, sink: &PostSink) -> usize {
        self.find_post_nodes(root)
            .into_iter()
            .filter_map(|node| node::node_to_post(node, source, location, self.min_text_len))
            .filter(|post| !sink.store().has(&post.post_id))
            .map(|post| sink.offer(post))
            .filter(|inserted| *inserted)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn extractor() -> PayloadExtractor {
        PayloadExtractor::new(&PayloadConfig::default())
    }

    fn ids(nodes: &[&Value]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| n["id"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_classify_shapes() {
        let edges = json!({"edges": [{"node": {"id": "1"}}]});
        assert!(matches!(classify(&edges)[..], [PayloadShape::EdgeList(_)]));

        let story = json!({"story": {"message": {"text": "hi"}}});
        assert!(matches!(classify(&story)[..], [PayloadShape::Story(_)]));

        let node = json!({"node": {"message": {"text": "hi"}}});
        assert!(matches!(classify(&node)[..], [PayloadShape::Node(_)]));

        let bare_node = json!({"node": {"id": "1"}});
        assert!(classify(&bare_node).is_empty());

        let entry = json!([PREFETCH_MODULE, "next", [], ["key", {}]]);
        assert!(matches!(classify(&entry)[..], [PayloadShape::PrefetchEntry(_)]));
    }

    #[test]
    fn test_edge_nodes_found_once() {
        let payload = json!({
            "data": {"group": {"feed": {"edges": [
                {"node": {"id": "1", "message": {"text": "first post"}}},
                {"node": {"id": "2", "message": {"text": "second post"}}}
            ]}}}
        });
        let nodes = extractor().find_post_nodes(&payload);
        let mut found = ids(&nodes);
        found.sort();
        assert_eq!(found, vec!["1", "2"]);
    }

    #[test]
    fn test_prefetch_entry_shortcuts_to_data() {
        let payload = json!({"require": [[
            PREFETCH_MODULE, "next", [],
            ["adp_key", {"__bbox": {"complete": true, "result": {"data": {
                "node": {"id": "42", "message": {"text": "Looking for a video editor, DM me"}}
            }}}}]
        ]]});
        let nodes = extractor().find_post_nodes(&payload);
        assert_eq!(ids(&nodes), vec!["42"]);
    }

    #[test]
    fn test_depth_cutoff_hides_deep_nodes() {
        let mut deep = json!({"node": {"id": "deep", "message": {"text": "too deep to find"}}});
        for _ in 0..20 {
            deep = json!({"wrapper": deep});
        }
        assert!(extractor().find_post_nodes(&deep).is_empty());
    }

    fn nested(depth: usize, use_arrays: bool) -> Value {
        let mut value = json!({"story": {"id": "x", "message": {"text": "bottom"}}});
        for level in 0..depth {
            value = if use_arrays && level % 2 == 0 {
                json!([value, {"node": {"message": null}}])
            } else {
                json!({"a": value, "b": {"edges": []}})
            };
        }
        value
    }

    proptest! {
        #[test]
        fn prop_walk_never_exceeds_cutoff(depth in 0usize..64, use_arrays in any::<bool>(), max_depth in 0usize..20) {
            let payload = nested(depth, use_arrays);
            let search = PayloadExtractor::new(&PayloadConfig { max_depth, min_text_len: 5 });
            let mut deepest = 0;
            search.walk(&payload, |_, d| deepest = deepest.max(d));
            prop_assert!(deepest <= max_depth);
        }
    }
}
