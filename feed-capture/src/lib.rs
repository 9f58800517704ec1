//! Feed Capture Library
//!
//! Captures social-feed posts from a live page through three independent
//! paths: embedded page-state payloads, intercepted feed API responses and
//! rendered-markup heuristics. All paths dedupe through one [`PostStore`].
//! Designed to be driven by a browser native-messaging host.

pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod events;
pub mod export;
pub mod external;
pub mod network;
pub mod page;
pub mod payload;
pub mod post;
pub mod protocol;
pub mod scanner;
pub mod scroll;
pub mod session;
pub mod store;
pub mod watcher;

pub use config::CaptureConfig;
pub use error::CaptureError;
pub use events::{EventBus, Notification};
pub use export::ExportSnapshot;
pub use network::NetworkObserver;
pub use page::{MemoryPage, Page};
pub use post::{MediaType, Post, Source};
pub use protocol::{Command, Response, ScanMode, ScanStatus};
pub use scanner::Scanner;
pub use store::PostStore;
