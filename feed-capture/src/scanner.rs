//! Scan orchestration behind the control protocol.
//!
//! [`Scanner`] is cheap to clone; clones share one engine and one session.
//! Commands must be handled inside a tokio runtime because starting a scan
//! spawns the watcher and autoscroll tasks.

use crate::config::CaptureConfig;
use crate::engine::Engine;
use crate::events::Notification;
use crate::export::ExportSnapshot;
use crate::network::NetworkObserver;
use crate::page::Page;
use crate::protocol::{Command, Response, ScanMode, ScanStatus};
use crate::scroll::ScrollDriver;
use crate::session::ScanSession;
use crate::watcher::MutationWatcher;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
pub struct Scanner {
    engine: Arc<Engine>,
    session: Arc<Mutex<ScanSession>>,
    watcher: Arc<Mutex<MutationWatcher>>,
    driver: Arc<Mutex<ScrollDriver>>,
}

impl Scanner {
    pub fn new(config: CaptureConfig, page: Arc<dyn Page>) -> Self {
        Self {
            engine: Arc::new(Engine::new(&config, page)),
            session: Arc::new(Mutex::new(ScanSession::new())),
            watcher: Arc::new(Mutex::new(MutationWatcher::new())),
            driver: Arc::new(Mutex::new(ScrollDriver::new(config.scroll))),
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.engine.events().subscribe()
    }

    /// Port for the host's network interception
    pub fn network_observer(&self) -> &dyn NetworkObserver {
        self.engine.interceptor()
    }

    pub fn handle(&self, command: Command) -> Response {
        match command {
            Command::StartPassive => {
                self.start(ScanMode::Passive, None);
                Response::Started { success: true, mode: ScanMode::Passive }
            }
            Command::StartAuto { duration } => {
                self.start(ScanMode::Auto, Some(duration));
                Response::Started { success: true, mode: ScanMode::Auto }
            }
            Command::StopAndExport => Response::Exported {
                success: true,
                data: self.stop_and_export(),
            },
            Command::GetStatus => Response::Status(self.status()),
            Command::ClearCache => Response::Cleared {
                success: true,
                post_count: self.clear_cache(),
            },
        }
    }

    /// Start or replace a scan. `duration` enables autoscroll.
    pub fn start(&self, mode: ScanMode, duration: Option<u64>) {
        let session_id = lock(&self.session).begin(mode, duration);
        info!("Scan {} started in {:?} mode", session_id, mode);

        lock(&self.watcher).start(Arc::clone(&self.engine));
        let initial = self.engine.capture_initial();
        let swept = self.engine.sweep();
        info!("Initial capture: {} from payloads, {} from DOM", initial, swept);

        let mut driver = lock(&self.driver);
        match duration {
            Some(duration) => {
                let scanner = self.clone();
                driver.start(
                    Arc::clone(&self.engine),
                    Arc::clone(&self.session),
                    session_id,
                    duration,
                    move || scanner.finish(session_id),
                );
            }
            None => driver.stop(),
        }
    }

    /// Halt scanning and export everything captured so far
    pub fn stop_and_export(&self) -> ExportSnapshot {
        let elapsed = lock(&self.session).end();
        lock(&self.watcher).stop();
        lock(&self.driver).stop();

        let snapshot = self.engine.snapshot(elapsed);
        info!("Exported {} posts after {}s", snapshot.posts_count, elapsed);
        snapshot
    }

    /// Autoscroll completion: stop, export and announce
    fn finish(&self, session_id: Uuid) {
        let elapsed = {
            let mut session = lock(&self.session);
            if !session.is_current(session_id) {
                return;
            }
            session.end()
        };
        lock(&self.watcher).stop();

        let snapshot = self.engine.snapshot(elapsed);
        info!("Autoscroll complete: {} posts in {}s", snapshot.posts_count, elapsed);
        self.engine.events().publish(Notification::ScanComplete {
            post_count: snapshot.posts_count,
            data: snapshot,
        });
    }

    pub fn status(&self) -> ScanStatus {
        let session = lock(&self.session);
        ScanStatus {
            is_scanning: session.is_scanning,
            mode: session.mode,
            post_count: self.engine.store().len(),
            elapsed_seconds: session.elapsed_seconds(),
        }
    }

    /// Empty the store and re-arm the initial payload capture
    pub fn clear_cache(&self) -> usize {
        self.engine.store().clear();
        self.engine.relay().reset();
        info!("Post cache cleared");
        self.engine.store().len()
    }

    /// A new document was loaded into the page
    pub fn page_reloaded(&self) {
        self.engine.relay().reset();
        let scanning = lock(&self.session).is_scanning;
        if scanning {
            lock(&self.watcher).start(Arc::clone(&self.engine));
            self.engine.capture_initial();
            self.engine.sweep();
        }
    }
}
