//! Embedded page-state payloads.
//!
//! The initial document carries the first batch of feed stories as JSON in
//! `<script>` blocks. They are parsed once per document load; blocks that
//! arrive later through DOM insertions are parsed individually.

use super::PayloadExtractor;
use crate::config::PayloadConfig;
use crate::dom::{DomAccess, NodeId};
use crate::events::PostSink;
use crate::post::Source;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

pub struct RelayPayloadParser {
    extractor: PayloadExtractor,
    scanned: AtomicBool,
}

impl RelayPayloadParser {
    pub fn new(config: &PayloadConfig) -> Self {
        Self {
            extractor: PayloadExtractor::new(config),
            scanned: AtomicBool::new(false),
        }
    }

    /// `<script type="application/json">` or a script tagged `data-sjs`
    pub fn is_structured_block(dom: &dyn DomAccess, node: NodeId) -> bool {
        if dom.tag_name(node) != Some("script") {
            return false;
        }
        let json_type = dom
            .attr(node, "type")
            .map(|t| t.eq_ignore_ascii_case("application/json"))
            .unwrap_or(false);
        json_type || dom.attr(node, "data-sjs").is_some()
    }

    /// Whether the initial document has already been parsed
    pub fn has_scanned(&self) -> bool {
        self.scanned.load(Ordering::SeqCst)
    }

    /// Allow the next [`capture_initial`](Self::capture_initial) to run again
    pub fn reset(&self) {
        self.scanned.store(false, Ordering::SeqCst);
    }

    /// Parse every structured block in the document, once per load
    pub fn capture_initial(&self, dom: &dyn DomAccess, location: &str, sink: &PostSink) -> usize {
        if self.scanned.swap(true, Ordering::SeqCst) {
            debug!("Initial payloads already parsed for this document");
            return 0;
        }

        let blocks = dom.select(dom.root(), &|n| Self::is_structured_block(dom, n));
        let added: usize = blocks
            .iter()
            .map(|block| self.capture_block(dom, *block, location, sink))
            .sum();

        info!("Parsed {} embedded payload blocks, {} new posts", blocks.len(), added);
        added
    }

    /// Parse a single block. Malformed JSON is skipped.
    pub fn capture_block(&self, dom: &dyn DomAccess, block: NodeId, location: &str, sink: &PostSink) -> usize {
        let raw: String = dom
            .children(block)
            .iter()
            .filter_map(|c| dom.own_text(*c))
            .collect();
        if raw.trim().is_empty() {
            return 0;
        }

        match serde_json::from_str(&raw) {
            Ok(value) => self.extractor.capture(&value, Source::Relay, location, sink),
            Err(e) => {
                debug!("Skipping malformed payload block: {}", e);
                0
            }
        }
    }
}
