//! Run control shared between the tick loop and whoever steers it.
//!
//! The engine binary stops the loop on Ctrl-C; tests and embedding hosts
//! pause, resume, or retime it. Control flags are atomics so the loop reads
//! them without locking.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};

use crate::config::WorldConfig;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEndReason {
    /// Reached `max_ticks`.
    MaxTicksReached,
    /// Reached `max_real_time_seconds`.
    MaxRealTimeReached,
    /// [`RunControl::request_stop`] was called.
    Stopped,
    /// No agent and no animal is alive.
    Extinction,
}

/// Shared run control.
#[derive(Debug)]
pub struct RunControl {
    paused: AtomicBool,
    resume_notify: Notify,
    stop_requested: AtomicBool,
    tick_interval_ms: AtomicU64,
    started_at: DateTime<Utc>,
    max_ticks: u64,
    max_real_time_seconds: u64,
    end_reason: Mutex<Option<RunEndReason>>,
}

impl RunControl {
    /// Control for a run bounded by `world.max_ticks` and
    /// `world.max_real_time_seconds` (0 = unlimited).
    pub fn new(world: &WorldConfig) -> Self {
        Self {
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            stop_requested: AtomicBool::new(false),
            tick_interval_ms: AtomicU64::new(world.tick_interval_ms),
            started_at: Utc::now(),
            max_ticks: world.max_ticks,
            max_real_time_seconds: world.max_real_time_seconds,
            end_reason: Mutex::new(None),
        }
    }

    /// Whether the loop is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause before the next tick.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume and wake the loop.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Wait until not paused. Returns immediately if running.
    pub async fn wait_if_paused(&self) {
        while self.paused.load(Ordering::Acquire) {
            self.resume_notify.notified().await;
        }
    }

    /// Ask the loop to stop before its next tick. Also releases a pause.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        self.resume();
    }

    /// Whether a stop was requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Record why the run ended.
    pub async fn set_end_reason(&self, reason: RunEndReason) {
        *self.end_reason.lock().await = Some(reason);
    }

    /// Why the run ended, once it has.
    pub async fn end_reason(&self) -> Option<RunEndReason> {
        *self.end_reason.lock().await
    }

    /// Real-time milliseconds slept between ticks.
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.load(Ordering::Acquire)
    }

    /// Change the tick interval. Returns the previous value.
    pub fn set_tick_interval_ms(&self, ms: u64) -> u64 {
        self.tick_interval_ms.swap(ms, Ordering::AcqRel)
    }

    /// Whether `completed_ticks` has reached the tick limit.
    pub const fn tick_limit_reached(&self, completed_ticks: u64) -> bool {
        self.max_ticks > 0 && completed_ticks >= self.max_ticks
    }

    /// Whether the wall-clock limit has passed.
    pub fn time_limit_reached(&self) -> bool {
        self.max_real_time_seconds > 0 && self.elapsed_seconds() >= self.max_real_time_seconds
    }

    /// Wall-clock seconds since the control was created.
    pub fn elapsed_seconds(&self) -> u64 {
        let elapsed = Utc::now().signed_duration_since(self.started_at).num_seconds();
        u64::try_from(elapsed.max(0)).unwrap_or(u64::MAX)
    }

    /// Configured tick limit (0 = unlimited).
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    /// Configured wall-clock limit in seconds (0 = unlimited).
    pub const fn max_real_time_seconds(&self) -> u64 {
        self.max_real_time_seconds
    }
}
