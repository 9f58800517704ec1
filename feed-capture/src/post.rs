//! Post record types shared by every extractor

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Hard ceiling on stored post text, in characters
pub const MAX_TEXT_LEN: usize = 3000;

/// Query parameters that only carry tracking state
const TRACKING_PARAMS: &[&str] = &[
    "__tn__", "ref", "refid", "mibextid", "fbclid", "rdid", "share_url",
];

lazy_static! {
    static ref GROUP_PATH: Regex = Regex::new(r"/groups/([^/?#]+)").unwrap();
}

/// Which extractor produced a post
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Embedded JSON state delivered with the initial page load
    Relay,
    /// Asynchronous API responses seen by the network interceptor
    #[serde(rename = "graphql")]
    GraphQl,
    /// Rendered markup heuristics
    Dom,
    /// Cloud scraping connector (external, merged at export time only)
    Apify,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Relay => "relay",
            Source::GraphQl => "graphql",
            Source::Dom => "dom",
            Source::Apify => "apify",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    #[default]
    None,
}

/// A captured feed post. Built once by an extractor and never mutated after
/// it reaches the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Source-prefixed identifier, e.g. `dom_1234`
    pub id: String,

    /// Raw platform identifier, the dedup key
    pub post_id: String,

    pub author: Option<String>,

    pub author_profile_url: Option<String>,

    /// Creation time as the source reported it (not normalized)
    pub timestamp: Option<String>,

    pub text: String,

    pub post_url: Option<String>,

    pub has_media: bool,

    pub media_type: MediaType,

    pub source: Source,

    pub captured_at: DateTime<Utc>,
}

impl Post {
    /// Create a post with normalized, length-bounded text and no optional fields
    pub fn new(source: Source, post_id: &str, text: &str) -> Self {
        Self {
            id: format!("{}_{}", source.as_str(), post_id),
            post_id: post_id.to_string(),
            author: None,
            author_profile_url: None,
            timestamp: None,
            text: truncate_chars(&normalize_whitespace(text), MAX_TEXT_LEN),
            post_url: None,
            has_media: false,
            media_type: MediaType::None,
            source,
            captured_at: Utc::now(),
        }
    }

    pub fn with_author(mut self, name: Option<String>, profile_url: Option<String>) -> Self {
        self.author = name;
        self.author_profile_url = profile_url;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Option<String>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_post_url(mut self, post_url: Option<String>) -> Self {
        self.post_url = post_url;
        self
    }

    pub fn with_media(mut self, media_type: MediaType) -> Self {
        self.has_media = media_type != MediaType::None;
        self.media_type = media_type;
        self
    }

    /// Length of the text in characters
    pub fn text_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Collapse every whitespace run into a single space and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate on a character boundary
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Resolve `href` against `base` and strip tracking parameters and fragments.
///
/// Unparseable input is returned unchanged rather than dropped.
pub fn canonicalize_url(href: &str, base: Option<&Url>) -> String {
    let parsed = match base {
        Some(base) => base.join(href),
        None => Url::parse(href),
    };

    let mut url = match parsed {
        Ok(url) => url,
        Err(_) => return href.to_string(),
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.set_fragment(None);
    url.to_string()
}

fn is_tracking_param(name: &str) -> bool {
    name.starts_with("__cft__") || TRACKING_PARAMS.contains(&name)
}

/// Group slug from a page location, e.g. `EntrepreneursQc`
pub fn group_slug(location: &str) -> Option<String> {
    GROUP_PATH
        .captures(location)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// `{origin}/groups/{slug}/` for a location inside a group
pub fn group_url(location: &str) -> Option<String> {
    let url = Url::parse(location).ok()?;
    let slug = group_slug(url.path())?;
    Some(format!("{}/groups/{}/", url.origin().ascii_serialization(), slug))
}

/// Permalink built from the current group path when the payload carries none
pub fn synthesize_post_url(location: &str, post_id: &str) -> Option<String> {
    group_url(location).map(|group| format!("{}posts/{}/", group, post_id))
}
