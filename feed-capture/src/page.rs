//! Page port: location, document access, scrolling and insertion events.
//!
//! [`MemoryPage`] mirrors a browser tab from messages the host receives; it
//! is also what tests drive.

use crate::dom::{DomAccess, DomTree, NodeId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::trace;

pub trait Page: Send + Sync {
    /// Current URL
    fn location(&self) -> String;

    fn title(&self) -> Option<String>;

    /// Run `f` against the current document
    fn with_dom(&self, f: &mut dyn FnMut(&dyn DomAccess));

    fn scroll_by(&self, pixels: u32);

    /// Subscribe to inserted subtrees. A new subscription replaces the
    /// previous one, whose receiver then closes.
    fn observe_insertions(&self) -> mpsc::UnboundedReceiver<Vec<NodeId>>;
}

type ScrollHandler = Box<dyn Fn(u32) + Send + Sync>;

pub struct MemoryPage {
    location: RwLock<String>,
    title: RwLock<Option<String>>,
    dom: RwLock<DomTree>,
    observer: Mutex<Option<mpsc::UnboundedSender<Vec<NodeId>>>>,
    on_scroll: Option<ScrollHandler>,
    scrolled: AtomicU64,
}

impl MemoryPage {
    pub fn new(location: &str, html: &str) -> Self {
        Self {
            location: RwLock::new(location.to_string()),
            title: RwLock::new(None),
            dom: RwLock::new(DomTree::parse_html(html)),
            observer: Mutex::new(None),
            on_scroll: None,
            scrolled: AtomicU64::new(0),
        }
    }

    /// Forward scroll requests, e.g. to the browser
    pub fn with_scroll_handler(mut self, handler: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_scroll = Some(Box::new(handler));
        self
    }

    pub fn with_title(self, title: &str) -> Self {
        self.set_title(Some(title.to_string()));
        self
    }

    /// Replace the whole document after a page load
    pub fn load(&self, location: &str, title: Option<String>, html: &str) {
        *self.dom.write().unwrap_or_else(PoisonError::into_inner) = DomTree::parse_html(html);
        self.navigate(location, title);
    }

    /// In-app navigation: location and title change, document kept
    pub fn navigate(&self, location: &str, title: Option<String>) {
        *self.location.write().unwrap_or_else(PoisonError::into_inner) = location.to_string();
        self.set_title(title);
    }

    fn set_title(&self, title: Option<String>) {
        *self.title.write().unwrap_or_else(PoisonError::into_inner) = title;
    }

    /// Append markup under `<body>` and notify the insertion observer
    pub fn insert_html(&self, html: &str) -> Vec<NodeId> {
        let added = {
            let mut dom = self.dom.write().unwrap_or_else(PoisonError::into_inner);
            let body = dom.body();
            dom.append_html(body, html)
        };

        let mut observer = self.observer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = observer.as_ref() {
            if tx.send(added.clone()).is_err() {
                trace!("Insertion observer gone");
                *observer = None;
            }
        }
        added
    }

    /// Total pixels scrolled so far
    pub fn scrolled_px(&self) -> u64 {
        self.scrolled.load(Ordering::SeqCst)
    }
}

impl Page for MemoryPage {
    fn location(&self) -> String {
        self.location.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn title(&self) -> Option<String> {
        self.title.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn with_dom(&self, f: &mut dyn FnMut(&dyn DomAccess)) {
        let dom = self.dom.read().unwrap_or_else(PoisonError::into_inner);
        f(&*dom);
    }

    fn scroll_by(&self, pixels: u32) {
        self.scrolled.fetch_add(pixels as u64, Ordering::SeqCst);
        if let Some(handler) = &self.on_scroll {
            handler(pixels);
        }
    }

    fn observe_insertions(&self) -> mpsc::UnboundedReceiver<Vec<NodeId>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.observer.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }
}
