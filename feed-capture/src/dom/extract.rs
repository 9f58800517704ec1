//! Heuristic post extraction from rendered markup.
//!
//! Posts are found through their permalink anchors (`/posts/{digits}`). For
//! each anchor the enclosing post container is located, then author, text
//! and media are reconstructed from the container's structure.

use super::{DomAccess, NodeId};
use crate::config::ExtractionConfig;
use crate::events::PostSink;
use crate::post::{canonicalize_url, normalize_whitespace, truncate_chars, MediaType, Post, Source};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, trace};
use url::Url;

lazy_static! {
    static ref PERMALINK: Regex = Regex::new(r"/posts/(\d+)").unwrap();
}

/// Query parameters that make a permalink point at a comment
const COMMENT_PARAMS: &[&str] = &["comment_id", "reply_comment_id"];

/// Author names are at least 2 and under 60 characters
const AUTHOR_NAME_RANGE: std::ops::Range<usize> = 2..60;

/// Anchor text longer than this is not a timestamp label
const MAX_TIMESTAMP_LABEL: usize = 60;

/// A top-level post permalink found in the DOM
#[derive(Debug, Clone, PartialEq)]
pub struct Permalink {
    pub anchor: NodeId,
    pub post_id: String,
    /// Canonicalized absolute URL
    pub url: String,
}

/// Parse a permalink href. Returns `(post_id, canonical_url)`, or `None` for
/// non-post links and links into a comment.
pub fn parse_permalink(href: &str, base: Option<&Url>) -> Option<(String, String)> {
    let post_id = PERMALINK.captures(href)?.get(1)?.as_str().to_string();

    let resolved = match base {
        Some(base) => base.join(href).ok(),
        None => Url::parse(href).ok(),
    };
    let targets_comment = match &resolved {
        Some(url) => url
            .query_pairs()
            .any(|(k, _)| COMMENT_PARAMS.contains(&k.as_ref())),
        None => COMMENT_PARAMS.iter().any(|p| href.contains(&format!("{}=", p))),
    };
    if targets_comment {
        return None;
    }

    Some((post_id, canonicalize_url(href, base)))
}

/// Pick post text from candidate strings: longest first, bounded by
/// `candidate_max_len`, with UI chrome removed beforehand.
pub fn select_text(candidates: &[String], config: &ExtractionConfig) -> Option<String> {
    let mut remaining: Vec<String> = candidates
        .iter()
        .map(|c| normalize_whitespace(c))
        .filter(|c| !c.is_empty() && !super::denylist::is_ui_chrome(c))
        .filter(|c| c.chars().count() < config.candidate_max_len)
        .collect();

    remaining.sort_by_key(|c| std::cmp::Reverse(c.chars().count()));
    remaining
        .into_iter()
        .next()
        .map(|text| truncate_chars(&text, config.max_text_len))
}

pub struct DomExtractor {
    config: ExtractionConfig,
}

impl DomExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Permalink anchors at or below `scope`, one per post id
    pub fn find_permalinks(&self, dom: &dyn DomAccess, scope: NodeId, location: &str) -> Vec<Permalink> {
        let base = Url::parse(location).ok();
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for anchor in dom.select(scope, &|n| dom.tag_name(n) == Some("a")) {
            let Some(href) = dom.attr(anchor, "href") else { continue };
            let Some((post_id, url)) = parse_permalink(href, base.as_ref()) else {
                continue;
            };
            if seen.insert(post_id.clone()) {
                links.push(Permalink { anchor, post_id, url });
            }
        }

        links
    }

    /// Rebuild a post around `link`. The caller checks presence in the store
    /// and the minimum text length.
    pub fn extract(&self, dom: &dyn DomAccess, link: &Permalink, location: &str) -> Option<Post> {
        let Some(container) = dom.nearest_container(link.anchor, &self.config) else {
            trace!("No container for post {}", link.post_id);
            return None;
        };

        let base = Url::parse(location).ok();
        let text = self.resolve_text(dom, container)?;
        let (author, profile_url) = match self.resolve_author(dom, container, base.as_ref()) {
            Some((name, url)) => (Some(name), url),
            None => (None, None),
        };

        Some(
            Post::new(Source::Dom, &link.post_id, &text)
                .with_author(author, profile_url)
                .with_timestamp(timestamp_label(dom, link.anchor))
                .with_post_url(Some(link.url.clone()))
                .with_media(resolve_media(dom, container)),
        )
    }

    /// Extract and insert every new post at or below `scope`.
    /// Returns the number of posts inserted.
    pub fn sweep(&self, dom: &dyn DomAccess, scope: NodeId, location: &str, sink: &PostSink) -> usize {
        let links = self.find_permalinks(dom, scope, location);
        self.capture(dom, &links, location, sink)
    }

    /// Extract and insert posts for the given permalinks
    pub fn capture(&self, dom: &dyn DomAccess, links: &[Permalink], location: &str, sink: &PostSink) -> usize {
        let mut inserted = 0;
        for link in links {
            if sink.store().has(&link.post_id) {
                continue;
            }
            let Some(post) = self.extract(dom, link, location) else {
                continue;
            };
            if post.text_len() < self.config.min_dom_text_len {
                debug!("Dropping post {}: text too short ({})", link.post_id, post.text_len());
                continue;
            }
            if sink.offer(post) {
                inserted += 1;
            }
        }
        inserted
    }

    fn resolve_text(&self, dom: &dyn DomAccess, container: NodeId) -> Option<String> {
        let candidates: Vec<String> = dom
            .candidate_text_nodes(container)
            .into_iter()
            .map(|n| dom.text_content(n))
            .collect();
        select_text(&candidates, &self.config)
    }

    fn resolve_author(
        &self,
        dom: &dyn DomAccess,
        container: NodeId,
        base: Option<&Url>,
    ) -> Option<(String, Option<String>)> {
        dom.select(container, &|n| is_profile_link(dom, n))
            .into_iter()
            .filter(|n| !dom.in_comment_region(*n, container))
            .find_map(|n| {
                let name = dom.text_content(n);
                if !is_name_like(&name) {
                    return None;
                }
                let url = dom.attr(n, "href").map(|href| canonicalize_url(href, base));
                Some((name, url))
            })
    }
}

fn is_name_like(name: &str) -> bool {
    AUTHOR_NAME_RANGE.contains(&name.chars().count()) && !name.chars().all(|c| c.is_ascii_digit())
}

fn is_profile_link(dom: &dyn DomAccess, node: NodeId) -> bool {
    if dom.tag_name(node) != Some("a") {
        return false;
    }
    let Some(href) = dom.attr(node, "href") else {
        return false;
    };
    if PERMALINK.is_match(href) {
        return false;
    }
    if href.contains("/user/") || href.contains("profile.php") {
        return true;
    }

    // Author names are rendered as headings or bold links
    let mut current = dom.parent(node);
    for _ in 0..3 {
        let Some(n) = current else { break };
        if matches!(dom.tag_name(n), Some("h2" | "h3" | "h4" | "strong")) {
            return true;
        }
        current = dom.parent(n);
    }
    false
}

fn timestamp_label(dom: &dyn DomAccess, anchor: NodeId) -> Option<String> {
    let label = dom
        .attr(anchor, "aria-label")
        .map(normalize_whitespace)
        .unwrap_or_else(|| dom.text_content(anchor));
    let len = label.chars().count();
    (len > 0 && len <= MAX_TIMESTAMP_LABEL).then_some(label)
}

fn resolve_media(dom: &dyn DomAccess, container: NodeId) -> MediaType {
    let outside_comments = |n: NodeId| !dom.in_comment_region(n, container);

    if !dom
        .select(container, &|n| dom.tag_name(n) == Some("video") && outside_comments(n))
        .is_empty()
    {
        return MediaType::Video;
    }

    let has_image = !dom
        .select(container, &|n| is_content_image(dom, n) && outside_comments(n))
        .is_empty();
    if has_image {
        MediaType::Image
    } else {
        MediaType::None
    }
}

fn is_content_image(dom: &dyn DomAccess, node: NodeId) -> bool {
    if dom.tag_name(node) != Some("img") {
        return false;
    }
    let Some(src) = dom.attr(node, "src") else {
        return false;
    };
    if src.contains("emoji") || src.starts_with("data:") {
        return false;
    }

    // Avatars sit inside profile links or inline svg
    let mut current = dom.parent(node);
    while let Some(n) = current {
        if dom.tag_name(n) == Some("svg") || is_profile_link(dom, n) {
            return false;
        }
        current = dom.parent(n);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomTree;
    use crate::events::EventBus;
    use crate::store::PostStore;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const LOCATION: &str = "https://www.facebook.com/groups/x/";

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// One post container inside a feed, with a comment below it
    fn feed_with_post() -> (DomTree, NodeId) {
        let mut tree = DomTree::new();
        let root = tree.root();
        let feed = tree.append_element(root, "div", &[("role", "feed")]);
        let post = tree.append_element(feed, "div", &[("data-rendered-height", "640")]);

        let header = tree.append_element(post, "h3", &[]);
        let author = tree.append_element(header, "a", &[("href", "/groups/x/user/555/?__cft__[0]=zz")]);
        tree.append_text(author, "Marie Tremblay");
        let when = tree.append_element(post, "a", &[("href", "/groups/x/posts/99/?__tn__=R")]);
        tree.append_text(when, "3h");

        let body = tree.append_element(post, "div", &[("dir", "auto")]);
        tree.append_text(body, "Looking for a wedding photographer this summer, any leads?");
        tree.append_element(post, "img", &[("src", "https://scontent.xx.fbcdn.net/p.jpg")]);

        for label in ["Like", "Comment", "Share"] {
            let span = tree.append_element(post, "span", &[("dir", "auto")]);
            tree.append_text(span, label);
        }

        let comment = tree.append_element(post, "div", &[("aria-label", "Comment by Jean Roy")]);
        let commenter = tree.append_element(comment, "a", &[("href", "/groups/x/user/777/")]);
        tree.append_text(commenter, "Jean Roy");
        let reply = tree.append_element(comment, "div", &[("dir", "auto")]);
        tree.append_text(
            reply,
            "This comment is much longer than the post body and must never be chosen as the text of the post",
        );
        let reply_link = tree.append_element(comment, "a", &[("href", "/groups/x/posts/99/?comment_id=7")]);
        tree.append_text(reply_link, "1h");

        (tree, post)
    }

    #[test]
    fn test_permalink_with_comment_id_is_excluded() {
        let base = Url::parse(LOCATION).unwrap();
        assert_eq!(parse_permalink("/groups/x/posts/99/?comment_id=7", Some(&base)), None);
        assert_eq!(parse_permalink("/groups/x/posts/99/?reply_comment_id=8", Some(&base)), None);
        assert_eq!(
            parse_permalink("/groups/x/posts/99/", Some(&base)),
            Some(("99".to_string(), "https://www.facebook.com/groups/x/posts/99/".to_string()))
        );
        assert_eq!(parse_permalink("/groups/x/about/", Some(&base)), None);
    }

    #[test]
    fn test_sibling_anchors_only_top_level_included() {
        let mut tree = DomTree::new();
        let root = tree.root();
        tree.append_element(root, "a", &[("href", "/groups/x/posts/99/?comment_id=7")]);
        tree.append_element(root, "a", &[("href", "/groups/x/posts/99/")]);

        let extractor = DomExtractor::new(ExtractionConfig::default());
        let links = extractor.find_permalinks(&tree, root, LOCATION);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].post_id, "99");
        assert_eq!(tree.attr(links[0].anchor, "href"), Some("/groups/x/posts/99/"));
    }

    #[test]
    fn test_select_text_skips_chrome() {
        let config = ExtractionConfig::default();
        let candidates = strings(&[
            "Like",
            "Comment",
            "Share",
            "Looking for a wedding photographer this summer, any leads?",
        ]);
        assert_eq!(
            select_text(&candidates, &config).as_deref(),
            Some("Looking for a wedding photographer this summer, any leads?")
        );
    }

    #[test]
    fn test_select_text_respects_ceiling() {
        let config = ExtractionConfig::default();
        let huge = "x".repeat(config.candidate_max_len);
        let candidates = vec![huge, "a shorter but valid body".to_string()];
        assert_eq!(select_text(&candidates, &config).as_deref(), Some("a shorter but valid body"));
        assert_eq!(select_text(&strings(&["Like", "3h"]), &config), None);
    }

    #[test]
    fn test_extract_full_post() {
        let (tree, _) = feed_with_post();
        let extractor = DomExtractor::new(ExtractionConfig::default());
        let links = extractor.find_permalinks(&tree, tree.root(), LOCATION);
        assert_eq!(links.len(), 1);

        let post = extractor.extract(&tree, &links[0], LOCATION).unwrap();
        assert_eq!(post.id, "dom_99");
        assert_eq!(post.source, Source::Dom);
        assert_eq!(post.text, "Looking for a wedding photographer this summer, any leads?");
        assert_eq!(post.author.as_deref(), Some("Marie Tremblay"));
        assert_eq!(
            post.author_profile_url.as_deref(),
            Some("https://www.facebook.com/groups/x/user/555/")
        );
        assert_eq!(post.post_url.as_deref(), Some("https://www.facebook.com/groups/x/posts/99/"));
        assert_eq!(post.timestamp.as_deref(), Some("3h"));
        assert_eq!(post.media_type, MediaType::Image);
    }

    #[test]
    fn test_container_must_fit_height_bounds() {
        let (mut tree, post) = feed_with_post();
        tree.set_height(post, 2400.0);
        let extractor = DomExtractor::new(ExtractionConfig::default());
        let links = extractor.find_permalinks(&tree, tree.root(), LOCATION);
        assert!(extractor.extract(&tree, &links[0], LOCATION).is_none());
    }

    #[test]
    fn test_container_search_stops_at_landmark() {
        let mut tree = DomTree::new();
        let root = tree.root();
        // Qualifying element above the landmark must not be chosen
        let outer = tree.append_element(root, "div", &[("data-rendered-height", "900")]);
        let main = tree.append_element(outer, "div", &[("role", "main")]);
        let anchor = tree.append_element(main, "a", &[("href", "/groups/x/posts/5/")]);
        tree.append_text(anchor, &"long text ".repeat(10));

        let config = ExtractionConfig::default();
        assert_eq!(tree.nearest_container(anchor, &config), None);
    }

    #[test]
    fn test_sweep_inserts_once_and_enforces_min_length() {
        let (mut tree, _) = feed_with_post();
        let root = tree.root();
        let feed = tree.children(root)[0];
        let short = tree.append_element(feed, "div", &[("data-rendered-height", "300")]);
        let link = tree.append_element(short, "a", &[("href", "/groups/x/posts/100/")]);
        tree.append_text(link, "2h");
        let body = tree.append_element(short, "div", &[("dir", "auto")]);
        tree.append_text(body, "Too short");
        let filler = tree.append_element(short, "p", &[]);
        tree.append_text(filler, &"padding text that is not direction marked ".repeat(2));

        let sink = PostSink::new(Arc::new(PostStore::new()), EventBus::new());
        let extractor = DomExtractor::new(ExtractionConfig::default());

        assert_eq!(extractor.sweep(&tree, root, LOCATION, &sink), 1);
        assert_eq!(extractor.sweep(&tree, root, LOCATION, &sink), 0);
        assert!(sink.store().has("99"));
        assert!(!sink.store().has("100"));
    }

    #[test]
    fn test_author_skips_numeric_and_comment_links() {
        let mut tree = DomTree::new();
        let root = tree.root();
        let post = tree.append_element(root, "div", &[("data-rendered-height", "500")]);
        let numeric = tree.append_element(post, "a", &[("href", "/groups/x/user/1/")]);
        tree.append_text(numeric, "12345");
        let comment = tree.append_element(post, "div", &[("data-testid", "UFI2Comment/root")]);
        let commenter = tree.append_element(comment, "a", &[("href", "/groups/x/user/2/")]);
        tree.append_text(commenter, "Commenter Name");
        let real = tree.append_element(post, "a", &[("href", "/profile.php?id=3")]);
        tree.append_text(real, "Real Author");

        let extractor = DomExtractor::new(ExtractionConfig::default());
        let (name, url) = extractor.resolve_author(&tree, post, None).unwrap();
        assert_eq!(name, "Real Author");
        assert_eq!(url.as_deref(), Some("/profile.php?id=3"));
    }
}
