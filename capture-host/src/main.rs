//! Native Messaging Host - binds a browser tab to the feed capture engine
//!
//! The extension streams page state (documents, inserted markup, API
//! responses) and control commands over stdin. Responses, notifications and
//! scroll requests go back over stdout. Logs go to stderr, which the browser
//! leaves alone.

mod framing;
mod messages;

use feed_capture::{CaptureConfig, CaptureError, MemoryPage, Scanner};
use messages::{Inbound, Outbound};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Overrides the default config location
const CONFIG_ENV: &str = "FEED_CAPTURE_CONFIG";

/// How long pending replies may take to flush on shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

fn load_config() -> CaptureConfig {
    // The browser passes the extension origin as the first argument, so
    // only an explicit `--config <path>` is honoured from argv.
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return CaptureConfig::load_from_path(path);
            }
        }
    }
    match std::env::var(CONFIG_ENV) {
        Ok(path) => CaptureConfig::load_from_path(path),
        Err(_) => CaptureConfig::load(),
    }
}

/// Single owner of stdout
fn spawn_writer(mut rx: mpsc::UnboundedReceiver<Outbound>) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let stdout = io::stdout();
        while let Some(message) = rx.blocking_recv() {
            let frames = match message.encode() {
                Ok(frames) => frames,
                Err(e) => {
                    error!("Failed to encode outbound message: {}", e);
                    match Outbound::failure(&e).encode() {
                        Ok(frames) => frames,
                        Err(_) => continue,
                    }
                }
            };
            let mut out = stdout.lock();
            for frame in &frames {
                if let Err(e) = framing::write_frame(&mut out, frame) {
                    error!("Failed to write to extension: {}", e);
                    if matches!(e, CaptureError::Io(_)) {
                        return;
                    }
                }
            }
        }
    })
}

/// Queue a message for the writer
fn send(out: &mpsc::UnboundedSender<Outbound>, message: Outbound) {
    if out.send(message).is_err() {
        debug!("Writer closed, outbound message dropped");
    }
}

/// Blocking stdin reader feeding the dispatch loop
fn spawn_reader(tx: mpsc::UnboundedSender<Vec<u8>>) {
    std::thread::spawn(move || {
        let mut stdin = io::stdin().lock();
        loop {
            match framing::read_frame(&mut stdin) {
                Ok(Some(frame)) => {
                    if tx.send(frame).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    info!("Extension closed the connection");
                    break;
                }
                Err(e) => {
                    error!("Read error: {}", e);
                    break;
                }
            }
        }
    });
}

fn forward_notifications(scanner: &Scanner, out: mpsc::UnboundedSender<Outbound>) {
    let mut notifications = scanner.subscribe();
    tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => {
                    if out.send(Outbound::Notification { notification }).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Dropped {} notifications", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

fn dispatch(
    message: Inbound,
    scanner: &Scanner,
    page: &MemoryPage,
    out: &mpsc::UnboundedSender<Outbound>,
) {
    match message {
        Inbound::Command { command } => {
            debug!("Command {:?}", command);
            let response = scanner.handle(command);
            send(out, Outbound::Response { response });
        }
        Inbound::PageLoaded { url, title, html } => {
            info!("Page loaded: {}", url);
            page.load(&url, title, &html);
            scanner.page_reloaded();
        }
        Inbound::DomInserted { html } => {
            page.insert_html(&html);
        }
        Inbound::NetworkResponse { url, body } => {
            let scanner = scanner.clone();
            tokio::spawn(async move {
                scanner.network_observer().on_response(&url, &body);
            });
        }
        Inbound::Navigated { url, title } => {
            debug!("Navigated to {}", url);
            page.navigate(&url, title);
        }
    }
}

#[tokio::main]
async fn main() {
    let config = load_config();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    info!("Capture host started");

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer = spawn_writer(out_rx);

    let scroll_tx = out_tx.clone();
    let page = Arc::new(
        MemoryPage::new("about:blank", "<html><body></body></html>").with_scroll_handler(move |pixels| {
            send(&scroll_tx, Outbound::Scroll { pixels });
        }),
    );
    let scanner = Scanner::new(config, page.clone());
    forward_notifications(&scanner, out_tx.clone());

    let (in_tx, mut in_rx) = mpsc::unbounded_channel();
    spawn_reader(in_tx);

    while let Some(frame) = in_rx.recv().await {
        match Inbound::parse(&frame) {
            Ok(message) => dispatch(message, &scanner, &page, &out_tx),
            Err(e) => warn!("Ignoring message: {}", e),
        }
    }

    scanner.stop_and_export();
    drop(out_tx);
    if tokio::time::timeout(DRAIN_TIMEOUT, writer).await.is_err() {
        warn!("Writer did not drain before shutdown");
    }
    info!("Capture host stopped");
}
