//! Periodic discovery task.
//!
//! [`DiscoveryLoop`] owns the background task that re-runs
//! [`ServerListUpdater::update`] on a fixed period. It is single-use:
//!
//! ```text
//! Idle ──start()──► Running ──stop()──► Stopping ──► Stopped
//!   └──────────────────stop()─────────────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{DiscoveryError, ServerListUpdater};

/// Lifecycle of a [`DiscoveryLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Created, not started.
    Idle,
    /// Background task is ticking.
    Running,
    /// `stop` is waiting for the task to exit.
    Stopping,
    /// Terminal.
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Idle => "idle",
            LoopState::Running => "running",
            LoopState::Stopping => "stopping",
            LoopState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Keeps a selector's server set fresh.
///
/// `start` performs one update before returning, so the selector is
/// populated as soon as DNS answers. `stop` lets an in-flight cycle finish,
/// then waits for the task to exit; once it returns no further update touches
/// the selector. Dropping the loop cancels the task without waiting.
pub struct DiscoveryLoop {
    updater: Arc<ServerListUpdater>,
    interval: Duration,
    state: Mutex<LoopState>,
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
    starting: tokio::sync::Mutex<()>,
}

impl DiscoveryLoop {
    /// Creates an idle loop ticking every `interval`.
    ///
    /// `interval` must be non-zero; [`ClientConfig`](crate::config::ClientConfig)
    /// validation guarantees that for configured clients.
    pub fn new(updater: Arc<ServerListUpdater>, interval: Duration) -> Self {
        Self {
            updater,
            interval,
            state: Mutex::new(LoopState::Idle),
            shutdown: CancellationToken::new(),
            handle: Mutex::new(None),
            starting: tokio::sync::Mutex::new(()),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        *self.state.lock()
    }

    /// Tick period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The updater run on every tick.
    pub fn updater(&self) -> &Arc<ServerListUpdater> {
        &self.updater
    }

    /// Runs one update, then spawns the periodic task.
    ///
    /// A failed initial update is logged and does not fail `start`; the
    /// selector stays empty until a later tick succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotRestartable`] unless the loop is idle.
    pub async fn start(&self) -> Result<(), DiscoveryError> {
        // Held until the task is spawned so a concurrent stop() waits for it
        let _starting = {
            let mut state = self.state.lock();
            if *state != LoopState::Idle {
                return Err(DiscoveryError::NotRestartable(*state));
            }
            let starting = self
                .starting
                .try_lock()
                .map_err(|_| DiscoveryError::NotRestartable(*state))?;
            *state = LoopState::Running;
            starting
        };

        let name = self.updater.name().to_string();
        info!(
            name = %name,
            source = %self.updater.resolver().describe(),
            interval_secs = self.interval.as_secs_f64(),
            "Discovery loop starting"
        );

        if let Err(e) = self.updater.update().await {
            error!(name = %name, error = %e, "Initial server discovery failed");
        }

        if self.shutdown.is_cancelled() {
            debug!(name = %name, "Stopped during initial update");
        } else {
            *self.handle.lock() = Some(tokio::spawn(run(
                Arc::clone(&self.updater),
                self.interval,
                self.shutdown.clone(),
            )));
        }
        Ok(())
    }

    /// Stops the task and waits for it to exit.
    ///
    /// Stopping an idle loop moves it straight to [`LoopState::Stopped`].
    /// Calling `stop` again is a no-op.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock();
            match *state {
                LoopState::Idle => {
                    *state = LoopState::Stopped;
                    self.shutdown.cancel();
                    return;
                }
                LoopState::Running => *state = LoopState::Stopping,
                LoopState::Stopping | LoopState::Stopped => return,
            }
        }

        self.shutdown.cancel();
        // Wait out an initial update still running in start()
        drop(self.starting.lock().await);

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(name = %self.updater.name(), error = %e, "Discovery task ended abnormally");
            }
        }

        *self.state.lock() = LoopState::Stopped;
        info!(name = %self.updater.name(), "Discovery loop stopped");
    }
}

impl Drop for DiscoveryLoop {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run(updater: Arc<ServerListUpdater>, period: Duration, shutdown: CancellationToken) {
    // First tick one period out; start() already ran the initial update
    let Some(first_tick) = Instant::now().checked_add(period) else {
        warn!(
            name = %updater.name(),
            interval_secs = period.as_secs(),
            "Update interval out of range, periodic discovery disabled"
        );
        shutdown.cancelled().await;
        return;
    };
    let mut ticker = interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            _ = ticker.tick() => {
                // Not raced against shutdown: an in-flight cycle always completes
                if let Err(e) = updater.update().await {
                    warn!(name = %updater.name(), error = %e, "Server discovery failed, keeping previous servers");
                }
            }
        }
    }

    debug!(name = %updater.name(), "Discovery task exiting");
}
