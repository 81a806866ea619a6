//! Periodic session reaper
//!
//! Each sweep first expires sessions idle longer than the session timeout,
//! then, if the store still holds more sessions than the configured
//! ceiling, evicts the least recently active ones down to 80% of it.

use crate::memory::store::MemoryStore;
use chrono::Duration;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions removed for inactivity
    pub expired: Vec<String>,
    /// Sessions removed to get back under the ceiling, oldest first
    pub evicted: Vec<String>,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.expired.len() + self.evicted.len()
    }
}

pub struct Reaper {
    store: Arc<MemoryStore>,
    session_timeout: Duration,
    interval: std::time::Duration,
}

impl Reaper {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        let config = store.config();
        let session_timeout = config.session_timeout();
        let interval = config.cleanup_interval();

        Self {
            store,
            session_timeout,
            interval,
        }
    }

    pub fn with_interval(mut self, interval: std::time::Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one expiry pass followed by one capacity pass.
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport {
            expired: self.expire_idle(),
            ..SweepReport::default()
        };

        let max_active = self.store.config().max_active_sessions;
        if self.store.active_session_count() > max_active {
            report.evicted = self.evict_oldest();
        }

        if report.removed() > 0 {
            info!(
                expired = report.expired.len(),
                evicted = report.evicted.len(),
                remaining = self.store.active_session_count(),
                "Session sweep finished"
            );
        } else {
            debug!("Session sweep finished with nothing to remove");
        }

        report
    }

    fn expire_idle(&self) -> Vec<String> {
        let Some(threshold) = self.store.now().checked_sub_signed(self.session_timeout) else {
            return Vec::new();
        };
        let mut expired = Vec::new();

        for (session_id, last_active) in self.store.activity_snapshot() {
            if last_active >= threshold {
                continue;
            }

            // Re-checked under the entry lock; a concurrent touch keeps it alive.
            if self.store.clear_session_if_idle(&session_id, threshold) {
                debug!(session_id = %session_id, %last_active, "Expired idle session");
                expired.push(session_id);
            } else {
                debug!(session_id = %session_id, "Session became active during sweep");
            }
        }

        expired.sort();
        expired
    }

    fn evict_oldest(&self) -> Vec<String> {
        let target = self.store.config().eviction_target();
        let active = self.store.active_session_count();
        let excess = active.saturating_sub(target);

        // Window-less records do not count toward the ceiling.
        let mut candidates = self.store.active_activity_snapshot();
        candidates.sort_by(|(a_id, a_time), (b_id, b_time)| {
            a_time.cmp(b_time).then_with(|| a_id.cmp(b_id))
        });

        warn!(
            active,
            target,
            "Active sessions over ceiling, evicting {} oldest",
            excess
        );

        let mut evicted = Vec::with_capacity(excess);
        for (session_id, _) in candidates.into_iter().take(excess) {
            if self.store.clear_session(&session_id) {
                evicted.push(session_id);
            } else {
                debug!(session_id = %session_id, "Session already gone during eviction");
            }
        }

        evicted
    }

    /// Spawn the periodic sweep. It stops when `shutdown` is cancelled;
    /// a sweep in progress always finishes first.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                interval_secs = self.interval.as_secs(),
                timeout_minutes = self.session_timeout.num_minutes(),
                "Session reaper started"
            );

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Session reaper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.sweep();
                    }
                }
            }
        })
    }
}
