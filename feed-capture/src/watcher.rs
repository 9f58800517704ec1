//! Incremental capture from inserted page content

use crate::engine::Engine;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Owns at most one insertion observer task
#[derive(Default)]
pub struct MutationWatcher {
    handle: Option<JoinHandle<()>>,
}

impl MutationWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to the page, replacing any previous observer
    pub fn start(&mut self, engine: Arc<Engine>) {
        self.stop();

        let mut insertions = engine.page().observe_insertions();
        self.handle = Some(tokio::spawn(async move {
            while let Some(batch) = insertions.recv().await {
                trace!("Processing {} inserted nodes", batch.len());
                engine.process_insertions(&batch);
            }
            debug!("Insertion stream closed");
        }));
        debug!("Mutation watcher attached");
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Mutation watcher detached");
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }
}

impl Drop for MutationWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
