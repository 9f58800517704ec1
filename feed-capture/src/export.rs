//! Export snapshot delivered on stop or scan completion

use crate::config::ExtractionConfig;
use crate::external::ConnectorItem;
use crate::post::{group_slug, group_url, Post, Source};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const TITLE_SUFFIX: &str = " | Facebook";
const UNKNOWN_GROUP: &str = "Unknown Group";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportStats {
    #[serde(rename = "fromRelay")]
    pub from_relay: usize,
    #[serde(rename = "fromGraphQL")]
    pub from_graphql: usize,
    #[serde(rename = "fromDOM")]
    pub from_dom: usize,
    #[serde(rename = "fromApify")]
    pub from_apify: usize,
}

impl ExportStats {
    pub fn count(posts: &[Post]) -> Self {
        let mut stats = Self::default();
        for post in posts {
            stats.record(post.source);
        }
        stats
    }

    fn record(&mut self, source: Source) {
        match source {
            Source::Relay => self.from_relay += 1,
            Source::GraphQl => self.from_graphql += 1,
            Source::Dom => self.from_dom += 1,
            Source::Apify => self.from_apify += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub extracted_at: DateTime<Utc>,
    pub group_url: String,
    pub group_name: String,
    pub posts_count: usize,
    /// Whole seconds between scan start and stop
    pub scan_duration: u64,
    pub stats: ExportStats,
    pub posts: Vec<Post>,
}

impl ExportSnapshot {
    pub fn build(posts: Vec<Post>, location: &str, title: Option<&str>, scan_duration: u64) -> Self {
        Self {
            extracted_at: Utc::now(),
            group_url: group_url(location).unwrap_or_else(|| location.to_string()),
            group_name: group_name(title, location),
            posts_count: posts.len(),
            scan_duration,
            stats: ExportStats::count(&posts),
            posts,
        }
    }

    /// Append posts gathered outside the page. Ids already present are
    /// skipped. Returns how many were added.
    pub fn merge_external(&mut self, posts: Vec<Post>) -> usize {
        let mut known: HashSet<String> = self.posts.iter().map(|p| p.post_id.clone()).collect();
        let mut added = 0;
        for post in posts {
            if known.insert(post.post_id.clone()) {
                self.stats.record(post.source);
                self.posts.push(post);
                added += 1;
            }
        }
        self.posts_count = self.posts.len();
        added
    }

    /// Convert connector dataset items and merge the ones long enough to keep
    pub fn merge_connector_items(
        &mut self,
        items: impl IntoIterator<Item = ConnectorItem>,
        config: &ExtractionConfig,
    ) -> usize {
        let posts: Vec<Post> = items
            .into_iter()
            .filter_map(|item| item.into_post(config.min_external_text_len))
            .collect();
        self.merge_external(posts)
    }
}

/// Display name for the scanned group
pub fn group_name(title: Option<&str>, location: &str) -> String {
    if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
        return title.strip_suffix(TITLE_SUFFIX).unwrap_or(title).trim().to_string();
    }
    group_slug(location)
        .map(|slug| title_case(&slug.replace('-', " ")))
        .unwrap_or_else(|| UNKNOWN_GROUP.to_string())
}

/// Uppercase the first letter of each alphabetic run, lowercase the rest
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
