//! DOM access port and the heuristics built on top of it.
//!
//! Extraction only ever talks to [`DomAccess`]. The primitive queries are
//! implemented by the host's page mirror ([`DomTree`] here); the capability
//! methods (container lookup, text candidate enumeration, comment-region
//! checks) are provided on top of them so synthetic trees get the same
//! behaviour as live pages. UI chrome filtering lives in [`denylist`].

pub mod denylist;
pub mod extract;
pub mod tree;

pub use extract::{DomExtractor, Permalink};
pub use tree::DomTree;

use crate::config::ExtractionConfig;
use crate::post::normalize_whitespace;

/// Node handle inside a [`DomAccess`] implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// `aria-label` prefixes that mark a comment or reply subtree
const COMMENT_LABEL_PREFIXES: &[&str] = &[
    "comment by",
    "reply by",
    "commentaire de",
    "réponse de",
];

pub trait DomAccess {
    fn root(&self) -> NodeId;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Element and text children in document order
    fn children(&self, node: NodeId) -> &[NodeId];

    /// Lowercase tag name, `None` for text nodes
    fn tag_name(&self, node: NodeId) -> Option<&str>;

    fn attr(&self, node: NodeId, name: &str) -> Option<&str>;

    /// Text of a text node, `None` for elements
    fn own_text(&self, node: NodeId) -> Option<&str>;

    /// Layout height in CSS pixels, when the host knows it
    fn rendered_height(&self, node: NodeId) -> Option<f64>;

    fn is_element(&self, node: NodeId) -> bool {
        self.tag_name(node).is_some()
    }

    /// All nodes below `node` in document order, `node` excluded
    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Element descendants (and `node` itself) accepted by `pred`
    fn select(&self, node: NodeId, pred: &dyn Fn(NodeId) -> bool) -> Vec<NodeId> {
        std::iter::once(node)
            .chain(self.descendants(node))
            .filter(|n| self.is_element(*n) && pred(*n))
            .collect()
    }

    /// Concatenated descendant text, whitespace-collapsed
    fn text_content(&self, node: NodeId) -> String {
        if let Some(text) = self.own_text(node) {
            return normalize_whitespace(text);
        }
        let pieces: Vec<&str> = self
            .descendants(node)
            .into_iter()
            .filter_map(|n| self.own_text(n))
            .collect();
        normalize_whitespace(&pieces.join(" "))
    }

    /// Main-content or feed region, or the application's root mount
    fn is_landmark(&self, node: NodeId) -> bool {
        if self.tag_name(node) == Some("main") {
            return true;
        }
        if matches!(self.attr(node, "role"), Some("main") | Some("feed")) {
            return true;
        }
        self.attr(node, "id")
            .map(|id| id.starts_with("mount_"))
            .unwrap_or(false)
    }

    /// Whether this element itself marks a comment subtree
    fn is_comment_marker(&self, node: NodeId) -> bool {
        if let Some(label) = self.attr(node, "aria-label") {
            let label = label.to_lowercase();
            if COMMENT_LABEL_PREFIXES.iter().any(|p| label.starts_with(p)) {
                return true;
            }
        }
        self.attr(node, "data-testid")
            .map(|id| id.to_lowercase().contains("comment"))
            .unwrap_or(false)
    }

    /// Whether `node` sits in a comment subtree below `scope`
    fn in_comment_region(&self, node: NodeId, scope: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.is_element(n) && self.is_comment_marker(n) {
                return true;
            }
            if n == scope {
                break;
            }
            current = self.parent(n);
        }
        false
    }

    /// Best enclosing post container for `node`.
    ///
    /// Walks up at most `max_ancestor_depth` levels and keeps the last
    /// ancestor whose height and text length fall inside the configured
    /// bounds. Stops at the first landmark.
    fn nearest_container(&self, node: NodeId, limits: &ExtractionConfig) -> Option<NodeId> {
        let mut best = None;
        let mut current = self.parent(node);

        for _ in 0..limits.max_ancestor_depth {
            let Some(ancestor) = current else { break };
            if self.is_landmark(ancestor) {
                break;
            }

            if let Some(height) = self.rendered_height(ancestor) {
                let fits = height >= limits.container_min_height
                    && height <= limits.container_max_height;
                if fits && self.text_content(ancestor).chars().count() > limits.container_min_text {
                    best = Some(ancestor);
                }
            }

            current = self.parent(ancestor);
        }

        best
    }

    /// Direction-marked leaf elements outside comment regions
    fn candidate_text_nodes(&self, container: NodeId) -> Vec<NodeId> {
        let marked = |n: NodeId| self.attr(n, "dir").is_some();
        self.select(container, &|n| {
            marked(n)
                && !self.descendants(n).into_iter().any(|d| self.is_element(d) && marked(d))
                && !self.in_comment_region(n, container)
        })
    }
}
