//! On-screen overlay of recent log messages
//!
//! The overlay keeps a top-to-bottom list of visible entries. Each entry
//! carries an expiry time taken from the injected [`Clock`]; the host calls
//! [`ScreenOverlay::sweep`] once per scheduler tick to drop expired ones.

use devlog_core::config::{Config, ScreenConfig, SweepPolicy};
use devlog_core::{Clock, LogEntry, LogKind};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// RGBA colour of an overlay line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const YELLOW: Color = Color::rgb(1.0, 0.92, 0.016);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const ORANGE: Color = Color::rgb(0.8, 0.2, 0.0);
    pub const MAGENTA: Color = Color::rgb(1.0, 0.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Visual treatment of a severity kind
    pub fn for_kind(kind: LogKind) -> Self {
        match kind {
            LogKind::Warning => Self::YELLOW,
            LogKind::Error => Self::RED,
            LogKind::Exception => Self::ORANGE,
            LogKind::Assert => Self::MAGENTA,
            LogKind::Info => Self::WHITE,
        }
    }
}

/// A visible overlay line
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenEntry {
    pub text: String,
    pub color: Color,
    pub font_size: u32,
    /// Clock time after which the sweep removes the line
    pub expires_at: Duration,
}

/// The overlay region, created on first use
#[derive(Debug)]
struct OverlayRegion {
    resolution: [u32; 2],
    entries: Vec<ScreenEntry>,
}

enum RegionState {
    /// Nothing shown yet this session
    Pending,
    Open(OverlayRegion),
    /// Torn down; later records are dropped
    Closed,
}

/// Sink keeping recent messages visible for a bounded time
pub struct ScreenOverlay {
    config: ScreenConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<RegionState>,
}

impl ScreenOverlay {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: config.screen.clone(),
            clock,
            state: Mutex::new(RegionState::Pending),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn lock_state(&self) -> MutexGuard<'_, RegionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn show_time(&self) -> Duration {
        Duration::try_from_secs_f32(self.config.show_time).unwrap_or(Duration::ZERO)
    }

    /// Append an entry that expires `show_time` seconds from now
    ///
    /// Dropped once the overlay has been shut down.
    pub fn emit(&self, entry: &LogEntry) {
        if !self.config.enabled {
            return;
        }

        let expires_at = self.clock.now() + self.show_time();
        let mut state = self.lock_state();
        if let RegionState::Pending = *state {
            debug!(resolution = ?self.config.resolution, "Created screen overlay region");
            *state = RegionState::Open(OverlayRegion {
                resolution: self.config.resolution,
                entries: Vec::new(),
            });
        }

        let region = match &mut *state {
            RegionState::Open(region) => region,
            _ => {
                debug!("Screen overlay closed, dropping record");
                return;
            }
        };

        region.entries.push(ScreenEntry {
            text: entry.message.clone(),
            color: Color::for_kind(entry.kind),
            font_size: self.config.font_size,
            expires_at,
        });
    }

    /// Remove expired entries according to the configured policy
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.lock_state();
        let RegionState::Open(region) = &mut *state else {
            return 0;
        };

        let removed = match self.config.sweep {
            SweepPolicy::Drain => {
                let before = region.entries.len();
                region.entries.retain(|entry| entry.expires_at > now);
                before - region.entries.len()
            }
            SweepPolicy::Throttled => {
                match region.entries.iter().position(|entry| entry.expires_at <= now) {
                    Some(index) => {
                        region.entries.remove(index);
                        1
                    }
                    None => 0,
                }
            }
        };

        if removed > 0 {
            debug!(removed, remaining = region.entries.len(), "Swept screen overlay");
        }
        removed
    }

    /// Snapshot of the visible entries, top to bottom
    pub fn visible(&self) -> Vec<ScreenEntry> {
        match &*self.lock_state() {
            RegionState::Open(region) => region.entries.clone(),
            _ => Vec::new(),
        }
    }

    /// Whether the overlay region currently exists
    pub fn is_constructed(&self) -> bool {
        matches!(*self.lock_state(), RegionState::Open(_))
    }

    /// Reference resolution of the region, once created
    pub fn resolution(&self) -> Option<[u32; 2]> {
        match &*self.lock_state() {
            RegionState::Open(region) => Some(region.resolution),
            _ => None,
        }
    }

    /// Tear the region down; the overlay stays closed afterwards
    pub fn shutdown(&self) {
        *self.lock_state() = RegionState::Closed;
    }
}
