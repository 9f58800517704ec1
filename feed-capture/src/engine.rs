//! Capture components wired to one page and one store

use crate::config::CaptureConfig;
use crate::dom::{DomAccess, DomExtractor, NodeId};
use crate::events::{EventBus, PostSink};
use crate::export::ExportSnapshot;
use crate::network::NetworkInterceptor;
use crate::page::Page;
use crate::payload::RelayPayloadParser;
use crate::store::PostStore;
use std::sync::Arc;
use tracing::debug;

pub struct Engine {
    page: Arc<dyn Page>,
    sink: PostSink,
    events: EventBus,
    relay: RelayPayloadParser,
    dom: DomExtractor,
    interceptor: NetworkInterceptor,
}

impl Engine {
    pub fn new(config: &CaptureConfig, page: Arc<dyn Page>) -> Self {
        let events = EventBus::new();
        let sink = PostSink::new(Arc::new(PostStore::new()), events.clone());
        Self {
            interceptor: NetworkInterceptor::new(config, Arc::clone(&page), sink.clone()),
            relay: RelayPayloadParser::new(&config.payload),
            dom: DomExtractor::new(config.extraction.clone()),
            page,
            sink,
            events,
        }
    }

    pub fn page(&self) -> &Arc<dyn Page> {
        &self.page
    }

    pub fn store(&self) -> &PostStore {
        self.sink.store()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn relay(&self) -> &RelayPayloadParser {
        &self.relay
    }

    pub fn interceptor(&self) -> &NetworkInterceptor {
        &self.interceptor
    }

    /// Embedded payloads of the current document, once per load
    pub fn capture_initial(&self) -> usize {
        let location = self.page.location();
        let mut added = 0;
        self.page.with_dom(&mut |dom| {
            added = self.relay.capture_initial(dom, &location, &self.sink);
        });
        added
    }

    /// Full-document DOM pass
    pub fn sweep(&self) -> usize {
        let location = self.page.location();
        let mut added = 0;
        self.page.with_dom(&mut |dom| {
            added = self.dom.sweep(dom, dom.root(), &location, &self.sink);
        });
        added
    }

    /// Capture from freshly inserted subtrees
    pub fn process_insertions(&self, batch: &[NodeId]) -> usize {
        let location = self.page.location();
        let mut added = 0;
        self.page.with_dom(&mut |dom| {
            for node in batch {
                added += self.process_inserted(dom, *node, &location);
            }
        });
        if added > 0 {
            debug!("{} new posts from inserted content", added);
        }
        added
    }

    fn process_inserted(&self, dom: &dyn DomAccess, node: NodeId, location: &str) -> usize {
        let blocks = dom.select(node, &|n| RelayPayloadParser::is_structured_block(dom, n));
        let mut added: usize = blocks
            .iter()
            .map(|block| self.relay.capture_block(dom, *block, location, &self.sink))
            .sum();

        let fresh: Vec<_> = self
            .dom
            .find_permalinks(dom, node, location)
            .into_iter()
            .filter(|link| !self.store().has(&link.post_id))
            .collect();
        if !fresh.is_empty() {
            added += self.dom.capture(dom, &fresh, location, &self.sink);
        }
        added
    }

    pub fn snapshot(&self, scan_duration: u64) -> ExportSnapshot {
        let title = self.page.title();
        ExportSnapshot::build(
            self.store().values(),
            &self.page.location(),
            title.as_deref(),
            scan_duration,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::MemoryPage;
    use crate::post::Source;

    const LOCATION: &str = "https://www.facebook.com/groups/EntrepreneursQc/";

    fn post_markup(id: &str, text: &str) -> String {
        format!(
            r#"<div data-rendered-height="400">
                 <h3><a href="/user/1/">Sophie Gagnon</a></h3>
                 <a href="/groups/EntrepreneursQc/posts/{id}/">2h</a>
                 <div dir="auto">{text}</div>
                 <div dir="auto">Like</div>
               </div>"#
        )
    }

    #[tokio::test]
    async fn test_inserted_posts_and_payloads_captured() {
        let page = Arc::new(MemoryPage::new(LOCATION, "<html><body><div role=\"feed\"></div></body></html>"));
        let engine = Engine::new(&CaptureConfig::default(), page.clone());
        let mut rx = page.observe_insertions();

        page.insert_html(&post_markup("101", "Recherche un designer graphique pour un logo de restaurant"));
        page.insert_html(
            r#"<script type="application/json">{"node":{"id":"202","message":{"text":"Injected after load"}}}</script>"#,
        );

        let first = rx.recv().await.unwrap();
        assert_eq!(engine.process_insertions(&first), 1);
        let second = rx.recv().await.unwrap();
        assert_eq!(engine.process_insertions(&second), 1);
        assert_eq!(engine.process_insertions(&first), 0);

        let stats = engine.store().stats();
        assert_eq!(stats.get(&Source::Dom), Some(&1));
        assert_eq!(stats.get(&Source::Relay), Some(&1));
    }

    #[test]
    fn test_snapshot_uses_page_title() {
        let page = Arc::new(
            MemoryPage::new(LOCATION, "<body></body>").with_title("Entrepreneurs du Québec | Facebook"),
        );
        let engine = Engine::new(&CaptureConfig::default(), page);
        let snapshot = engine.snapshot(0);
        assert_eq!(snapshot.group_name, "Entrepreneurs du Québec");
        assert_eq!(snapshot.posts_count, 0);
    }
}
