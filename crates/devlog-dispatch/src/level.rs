//! Effective level resolution per source
//!
//! A source's effective level is the global level, raised to the expanded
//! floor when one is set, and then replaced outright by any override
//! registered for that source. The first resolution of a source is cached for
//! the rest of the process.

use devlog_core::config::LevelsConfig;
use devlog_core::LogLevel;
use devlog_output::ConsoleSink;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Value of `expanded_log_level` that disables the floor
pub const EXPANDED_DISABLED: i32 = -1;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A type that logs under its own name and may carry a level override
///
/// Set at most one of the constants. When both are set the raw integer wins
/// and a warning is printed the first time the source is resolved.
///
/// ```
/// use devlog_core::LogLevel;
/// use devlog_dispatch::LogSource;
///
/// struct SwordController;
///
/// impl LogSource for SwordController {
///     const LOG_LEVEL_ENUM: Option<LogLevel> = Some(LogLevel::Verbose);
/// }
/// ```
pub trait LogSource {
    /// Raw integer override
    const LOG_LEVEL: Option<i32> = None;

    /// Enumerated override
    const LOG_LEVEL_ENUM: Option<LogLevel> = None;

    /// Key the source is cached and registered under
    fn source_key() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Overrides attached to one source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Overrides {
    raw: Option<i32>,
    named: Option<LogLevel>,
}

/// Explicit registry of per-source level overrides
#[derive(Debug, Default)]
pub struct LevelRegistry {
    overrides: Mutex<HashMap<String, Overrides>>,
}

impl LevelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed raw overrides from the `[levels.overrides]` table
    pub fn from_config(config: &LevelsConfig) -> Self {
        let registry = Self::new();
        for (source, level) in &config.overrides {
            registry.register_raw(source.clone(), *level);
        }
        registry
    }

    /// Record the constants of a typed source
    pub fn register<T: LogSource + ?Sized>(&self) {
        let mut overrides = lock(&self.overrides);
        let entry = overrides.entry(T::source_key().to_string()).or_default();
        if let Some(raw) = T::LOG_LEVEL {
            entry.raw = Some(raw);
        }
        if let Some(named) = T::LOG_LEVEL_ENUM {
            entry.named = Some(named);
        }
    }

    /// Whether any override is known for `source`
    pub fn contains(&self, source: &str) -> bool {
        lock(&self.overrides).contains_key(source)
    }

    /// Attach a raw integer override to a source
    pub fn register_raw(&self, source: impl Into<String>, level: i32) {
        lock(&self.overrides).entry(source.into()).or_default().raw = Some(level);
    }

    /// Attach an enumerated override to a source
    pub fn register_level(&self, source: impl Into<String>, level: LogLevel) {
        lock(&self.overrides).entry(source.into()).or_default().named = Some(level);
    }

    fn lookup(&self, source: &str) -> Option<Overrides> {
        lock(&self.overrides).get(source).copied()
    }
}

#[derive(Debug, Clone, Copy)]
struct GlobalLevels {
    global: i32,
    expanded: i32,
}

/// Computes and caches the effective level of each source
pub struct LevelResolver {
    levels: Mutex<GlobalLevels>,
    cache: Mutex<HashMap<String, i32>>,
    unresolved_reported: AtomicBool,
}

impl LevelResolver {
    pub fn new(config: &LevelsConfig) -> Self {
        Self {
            levels: Mutex::new(GlobalLevels {
                global: config.global_log_level,
                expanded: config.expanded_log_level,
            }),
            cache: Mutex::new(HashMap::new()),
            unresolved_reported: AtomicBool::new(false),
        }
    }

    /// Change the global levels used for sources resolved from now on
    ///
    /// Sources already cached keep their level.
    pub fn set_global_levels(&self, global: i32, expanded: i32) {
        *lock(&self.levels) = GlobalLevels { global, expanded };
    }

    /// Effective level of `source`
    ///
    /// Returns `None` when the source cannot be identified (blank key). That
    /// case is reported once per process.
    pub fn resolve(&self, source: &str, registry: &LevelRegistry) -> Option<i32> {
        if source.trim().is_empty() {
            if !self.unresolved_reported.swap(true, Ordering::SeqCst) {
                ConsoleSink::error("Unable to determine source of logging call.");
            }
            return None;
        }

        let mut cache = lock(&self.cache);
        if let Some(level) = cache.get(source) {
            return Some(*level);
        }

        let level = self.compute(source, registry);
        cache.insert(source.to_string(), level);
        debug!(source, level, "Resolved source log level");
        Some(level)
    }

    /// Whether a message at `message_level` from `source` passes the gate
    ///
    /// Unidentifiable sources fail open.
    pub fn should_log(&self, source: &str, message_level: i32, registry: &LevelRegistry) -> bool {
        match self.resolve(source, registry) {
            Some(effective) => message_level <= effective,
            None => true,
        }
    }

    /// Number of sources resolved so far
    pub fn cached_sources(&self) -> usize {
        lock(&self.cache).len()
    }

    fn compute(&self, source: &str, registry: &LevelRegistry) -> i32 {
        let levels = *lock(&self.levels);
        let mut level = levels.global;
        if levels.expanded != EXPANDED_DISABLED && levels.expanded > level {
            level = levels.expanded;
        }

        match registry.lookup(source) {
            Some(Overrides {
                raw: Some(raw),
                named: Some(named),
            }) => {
                ConsoleSink::warning(&format!(
                    "Source '{}' has both an integer and a LogLevel override ({} and {}); using the integer",
                    source, raw, named
                ));
                raw
            }
            Some(Overrides { raw: Some(raw), .. }) => raw,
            Some(Overrides {
                named: Some(named), ..
            }) => named.as_i32(),
            _ => level,
        }
    }
}
