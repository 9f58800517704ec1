//! Scan session state owned by the scanner.
//!
//! Every start issues a fresh session id. Background tasks remember the id
//! they were started under and stop once it is no longer current.

use crate::protocol::ScanMode;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ScanSession {
    pub id: Uuid,
    pub mode: ScanMode,
    pub is_scanning: bool,
    pub started_at: Option<Instant>,
    /// Requested autoscroll duration in seconds
    pub duration: Option<u64>,
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            mode: ScanMode::Idle,
            is_scanning: false,
            started_at: None,
            duration: None,
        }
    }

    /// Replace any running session. Returns the new session id.
    pub fn begin(&mut self, mode: ScanMode, duration: Option<u64>) -> Uuid {
        self.id = Uuid::new_v4();
        self.mode = mode;
        self.is_scanning = true;
        self.started_at = Some(Instant::now());
        self.duration = duration;
        self.id
    }

    /// Stop scanning. Returns the elapsed whole seconds.
    pub fn end(&mut self) -> u64 {
        let elapsed = self.elapsed_seconds();
        self.is_scanning = false;
        self.mode = ScanMode::Idle;
        self.id = Uuid::new_v4();
        elapsed
    }

    pub fn elapsed_seconds(&self) -> u64 {
        match (self.is_scanning, self.started_at) {
            (true, Some(start)) => start.elapsed().as_secs(),
            _ => 0,
        }
    }

    /// Whether a task started under `id` should keep running
    pub fn is_current(&self, id: Uuid) -> bool {
        self.is_scanning && self.id == id
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_begin_replaces_previous_session() {
        let mut session = ScanSession::new();
        let first = session.begin(ScanMode::Passive, None);
        assert!(session.is_current(first));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(session.elapsed_seconds(), 3);

        let second = session.begin(ScanMode::Auto, Some(10));
        assert!(!session.is_current(first));
        assert!(session.is_current(second));
        assert_eq!(session.elapsed_seconds(), 0);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(session.end(), 2);
        assert!(!session.is_current(second));
        assert_eq!(session.mode, ScanMode::Idle);
        assert_eq!(session.elapsed_seconds(), 0);
    }
}
