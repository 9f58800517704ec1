//! Arena-backed page mirror implementing [`DomAccess`].
//!
//! Built either node-by-node or from HTML via `scraper`. Rendered heights
//! are not computed here; the host annotates them with a
//! `data-rendered-height` attribute or an inline `height: Npx` style.

use super::{DomAccess, NodeId};
use lazy_static::lazy_static;
use regex::Regex;
use scraper::Html;

lazy_static! {
    static ref STYLE_HEIGHT: Regex = Regex::new(r"(?:^|;)\s*height\s*:\s*([0-9.]+)px").unwrap();
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct DomNode {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    height: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<DomNode>,
}

impl DomTree {
    /// Empty tree holding only a `#document` root
    pub fn new() -> Self {
        Self {
            nodes: vec![DomNode {
                kind: NodeKind::Element {
                    tag: "#document".to_string(),
                    attrs: Vec::new(),
                },
                parent: None,
                children: Vec::new(),
                height: None,
            }],
        }
    }

    /// Parse a full document
    pub fn parse_html(html: &str) -> Self {
        let mut tree = Self::new();
        let document = Html::parse_document(html);
        let root = tree.root();
        tree.import(&document, root, false);
        tree
    }

    /// Parse `html` as a fragment and append it under `parent`.
    /// Returns the newly inserted top-level nodes.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        let fragment = Html::parse_fragment(html);
        self.import(&fragment, parent, true)
    }

    /// `<body>` if present, else the root
    pub fn body(&self) -> NodeId {
        let root = self.root();
        self.descendants(root)
            .into_iter()
            .find(|n| self.tag_name(*n) == Some("body"))
            .unwrap_or(root)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let attrs: Vec<(String, String)> = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let height = height_from_attrs(&attrs);
        self.push(
            parent,
            NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
                attrs,
            },
            height,
        )
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(parent, NodeKind::Text(text.to_string()), None)
    }

    pub fn set_height(&mut self, node: NodeId, height: f64) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.height = Some(height);
        }
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind, height: Option<f64>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(DomNode {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            height,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Copy a parsed scraper tree under `parent`. Fragment parsing nests
    /// content under a synthetic `<html>`, which `unwrap_html` skips.
    fn import(&mut self, html: &Html, parent: NodeId, unwrap_html: bool) -> Vec<NodeId> {
        let mut top_level = Vec::new();
        let mut stack: Vec<_> = html
            .tree
            .root()
            .children()
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .map(|n| (n, parent, true))
            .collect();

        while let Some((node, target, is_top)) = stack.pop() {
            let inserted = match node.value() {
                scraper::Node::Element(el) => {
                    if unwrap_html && is_top && el.name() == "html" {
                        for child in node.children().collect::<Vec<_>>().into_iter().rev() {
                            stack.push((child, target, true));
                        }
                        continue;
                    }
                    let attrs: Vec<(&str, &str)> = el.attrs().collect();
                    Some(self.append_element(target, el.name(), &attrs))
                }
                scraper::Node::Text(text) => Some(self.append_text(target, text)),
                _ => None,
            };

            if let Some(id) = inserted {
                if is_top {
                    top_level.push(id);
                }
                for child in node.children().collect::<Vec<_>>().into_iter().rev() {
                    stack.push((child, id, false));
                }
            }
        }

        top_level
    }
}

fn height_from_attrs(attrs: &[(String, String)]) -> Option<f64> {
    let lookup = |name: &str| attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str());

    if let Some(h) = lookup("data-rendered-height").and_then(|v| v.trim().parse().ok()) {
        return Some(h);
    }
    lookup("style")
        .and_then(|style| STYLE_HEIGHT.captures(style))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomAccess for DomTree {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    fn own_text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Text(text) => Some(text.as_str()),
            NodeKind::Element { .. } => None,
        }
    }

    fn rendered_height(&self, node: NodeId) -> Option<f64> {
        self.nodes.get(node.0).and_then(|n| n.height)
    }
}
