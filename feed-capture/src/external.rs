//! Boundary types for the cloud scraping connector.
//!
//! The capture engine never calls the connector. These types describe the
//! job request and the dataset items it returns so a caller can fold them
//! into an [`ExportSnapshot`](crate::export::ExportSnapshot).

use crate::post::{MediaType, Post, Source};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorSort {
    #[default]
    Recent,
    Relevant,
    Activity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorRequest {
    pub start_urls: Vec<StartUrl>,
    pub results_limit: usize,
    pub sort: ConnectorSort,
    pub search_query: String,
    pub max_comments: usize,
}

impl ConnectorRequest {
    /// Status polls before a job is given up on
    pub const MAX_POLL_ATTEMPTS: u32 = 60;

    pub const DEFAULT_RESULTS_LIMIT: usize = 50;

    pub fn for_group(group_url: &str) -> Self {
        Self {
            start_urls: vec![StartUrl { url: group_url.to_string() }],
            results_limit: Self::DEFAULT_RESULTS_LIMIT,
            sort: ConnectorSort::default(),
            search_query: String::new(),
            max_comments: 5,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.results_limit = limit;
        self
    }

    pub fn with_sort(mut self, sort: ConnectorSort) -> Self {
        self.sort = sort;
        self
    }
}

/// One dataset item as the connector returns it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorItem {
    pub post_id: Option<Value>,
    #[serde(alias = "authorName")]
    pub profile_name: Option<String>,
    pub profile_url: Option<String>,
    pub timestamp: Option<Value>,
    #[serde(alias = "text")]
    pub post_text: Option<String>,
    #[serde(alias = "url")]
    pub post_url: Option<String>,
    pub media: Option<Value>,
    pub image_urls: Vec<String>,
    pub video_url: Option<String>,
}

fn scalar(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.trim().is_empty()).cloned()
}

impl ConnectorItem {
    pub fn media_type(&self) -> MediaType {
        if non_empty(&self.video_url).is_some() {
            MediaType::Video
        } else if !self.image_urls.is_empty() {
            MediaType::Image
        } else {
            MediaType::None
        }
    }

    fn has_media(&self) -> bool {
        let media = match &self.media {
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Null) | None => false,
            Some(_) => true,
        };
        media || self.media_type() != MediaType::None
    }

    /// Convert into an `apify` post. Items without an id, or whose text is
    /// not longer than `min_text_len` characters, yield `None`.
    pub fn into_post(self, min_text_len: usize) -> Option<Post> {
        let post_id = scalar(&self.post_id)?;
        let text = non_empty(&self.post_text)?;
        if text.trim().chars().count() <= min_text_len {
            return None;
        }

        let mut post = Post::new(Source::Apify, &post_id, &text)
            .with_author(non_empty(&self.profile_name), non_empty(&self.profile_url))
            .with_timestamp(scalar(&self.timestamp))
            .with_post_url(non_empty(&self.post_url))
            .with_media(self.media_type());
        post.has_media = self.has_media();
        Some(post)
    }
}
