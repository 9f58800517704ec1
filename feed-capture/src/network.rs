//! Feed API response interception.
//!
//! Responses from the feed endpoint are newline-delimited JSON documents,
//! sometimes prefixed with an anti-hijacking guard. Each line is parsed on
//! its own so one bad line never hides the rest.

use crate::config::CaptureConfig;
use crate::events::PostSink;
use crate::page::Page;
use crate::payload::PayloadExtractor;
use crate::post::Source;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, trace};

/// Prefix some endpoints prepend to JSON bodies
const JSON_GUARD: &str = "for (;;);";

/// Observer port for completed HTTP responses
pub trait NetworkObserver: Send + Sync {
    fn on_response(&self, url: &str, body: &str);
}

pub struct NetworkInterceptor {
    api_path: String,
    extractor: PayloadExtractor,
    page: Arc<dyn Page>,
    sink: PostSink,
}

impl NetworkInterceptor {
    pub fn new(config: &CaptureConfig, page: Arc<dyn Page>, sink: PostSink) -> Self {
        Self {
            api_path: config.network.api_path.clone(),
            extractor: PayloadExtractor::new(&config.payload),
            page,
            sink,
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        url.contains(&self.api_path)
    }

    /// Capture posts from a response body. Returns the number of new posts.
    pub fn observe(&self, url: &str, body: &str) -> usize {
        if !self.matches(url) {
            return 0;
        }

        let location = self.page.location();
        let mut added = 0;
        for (index, line) in body.lines().enumerate() {
            let line = line.trim();
            let line = line.strip_prefix(JSON_GUARD).unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(value) => {
                    added += self.extractor.capture(&value, Source::GraphQl, &location, &self.sink)
                }
                Err(e) => trace!("Skipping malformed response line {}: {}", index, e),
            }
        }

        if added > 0 {
            debug!("{} new posts from {}", added, url);
        }
        added
    }
}

impl NetworkObserver for NetworkInterceptor {
    fn on_response(&self, url: &str, body: &str) {
        self.observe(url, body);
    }
}
