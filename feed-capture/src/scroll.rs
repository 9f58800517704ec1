//! Humanized autoscroll.
//!
//! One tick scrolls by a random distance, sweeps the DOM and reports
//! progress, then waits a random delay (occasionally a longer pause). The
//! loop re-checks the owning session before every tick and completes right
//! after the last one.

use crate::config::ScrollConfig;
use crate::engine::Engine;
use crate::events::Notification;
use crate::session::ScanSession;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Scrolling,
    Stopped,
}

/// Random distances and delays drawn from [`ScrollConfig`] ranges
pub struct ScrollCadence {
    config: ScrollConfig,
    rng: StdRng,
}

impl ScrollCadence {
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(config: ScrollConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn distance(&mut self) -> u32 {
        let (min, max) = (self.config.min_distance_px, self.config.max_distance_px);
        if min >= max {
            min
        } else {
            self.rng.gen_range(min..=max)
        }
    }

    /// Delay before the next tick, sometimes an extended pause
    pub fn delay(&mut self) -> Duration {
        let probability = self.config.pause_probability.clamp(0.0, 1.0);
        let (min, max) = if self.rng.gen_bool(probability) {
            (self.config.min_pause_ms, self.config.max_pause_ms)
        } else {
            (self.config.min_delay_ms, self.config.max_delay_ms)
        };
        let ms = if min >= max { min } else { self.rng.gen_range(min..=max) };
        Duration::from_millis(ms)
    }
}

pub struct ScrollDriver {
    config: ScrollConfig,
    state: Arc<Mutex<DriverState>>,
    handle: Option<JoinHandle<()>>,
}

fn set_state(state: &Mutex<DriverState>, next: DriverState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

impl ScrollDriver {
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(DriverState::Idle)),
            handle: None,
        }
    }

    pub fn state(&self) -> DriverState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `duration` ticks for session `session_id`, then call
    /// `on_complete`. Any previous run is aborted first.
    pub fn start<F>(
        &mut self,
        engine: Arc<Engine>,
        session: Arc<Mutex<ScanSession>>,
        session_id: Uuid,
        duration: u64,
        on_complete: F,
    ) where
        F: FnOnce() + Send + 'static,
    {
        self.stop();
        set_state(&self.state, DriverState::Scrolling);

        let state = Arc::clone(&self.state);
        let initial_delay = Duration::from_millis(self.config.initial_delay_ms);
        let mut cadence = ScrollCadence::new(self.config.clone());

        info!("Autoscroll started for {} ticks", duration);
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(initial_delay).await;

            let mut elapsed = 0;
            loop {
                let current = session
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_current(session_id);
                if !current {
                    debug!("Session {} no longer scanning, autoscroll halted", session_id);
                    set_state(&state, DriverState::Stopped);
                    return;
                }
                if elapsed >= duration {
                    info!("Autoscroll finished after {} ticks", elapsed);
                    set_state(&state, DriverState::Stopped);
                    on_complete();
                    return;
                }

                engine.page().scroll_by(cadence.distance());
                engine.sweep();
                elapsed += 1;
                engine.events().publish(Notification::ScanProgress {
                    post_count: engine.store().len(),
                    elapsed,
                    duration,
                });

                // The final tick completes without waiting out another delay
                if elapsed < duration {
                    tokio::time::sleep(cadence.delay()).await;
                }
            }
        }));
    }

    /// Abort the running loop, if any
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            set_state(&self.state, DriverState::Stopped);
        }
    }
}

impl Drop for ScrollDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
