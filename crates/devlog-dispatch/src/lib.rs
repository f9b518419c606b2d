//! devlog Dispatch
//!
//! Level resolution and fan-out for the devlog diagnostic logger, plus the
//! process-wide dispatcher behind the `log!` family of macros.
//!
//! ```no_run
//! use devlog_core::Config;
//!
//! devlog_dispatch::init(Config::default()).unwrap();
//! devlog_dispatch::log!("Hello");
//! devlog_dispatch::log_warning!(level = 3, "{} hp left", 12);
//! devlog_dispatch::tick();
//! devlog_dispatch::shutdown().unwrap();
//! ```

pub mod dispatcher;
pub mod level;
#[macro_use]
mod macros;

pub use devlog_core::{LogKind, LogLevel, Message};
pub use dispatcher::{Dispatcher, DispatcherBuilder, DEFAULT_LEVEL};
pub use level::{LevelRegistry, LevelResolver, LogSource};

use devlog_core::{Config, DevlogError, Result};
use std::error::Error as StdError;
use std::sync::{Arc, RwLock};
use tracing::info;

static GLOBAL: RwLock<Option<Arc<Dispatcher>>> = RwLock::new(None);

fn current() -> Option<Arc<Dispatcher>> {
    GLOBAL
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Build the process-wide dispatcher from configuration
pub fn init(config: Config) -> Result<()> {
    init_with(Dispatcher::builder(config))
}

/// Build the process-wide dispatcher from a prepared builder
///
/// Fails with [`DevlogError::AlreadyInitialized`] until [`shutdown`] is called.
pub fn init_with(builder: DispatcherBuilder) -> Result<()> {
    let mut slot = GLOBAL.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    if slot.is_some() {
        return Err(DevlogError::AlreadyInitialized);
    }
    *slot = Some(Arc::new(builder.build()?));
    info!("Global dispatcher installed");
    Ok(())
}

/// Tear the process-wide dispatcher down
///
/// Closes file streams, clears the overlay and detaches remote delivery.
/// Logging calls made afterwards are ignored until the next [`init`].
pub fn shutdown() -> Result<()> {
    let dispatcher = GLOBAL
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take()
        .ok_or(DevlogError::NotInitialized)?;
    dispatcher.shutdown();
    Ok(())
}

/// The process-wide dispatcher, if initialized
pub fn dispatcher() -> Option<Arc<Dispatcher>> {
    current()
}

pub fn is_initialized() -> bool {
    current().is_some()
}

/// Drive one scheduler tick of the process-wide dispatcher
///
/// Returns the number of overlay entries swept.
pub fn tick() -> usize {
    current().map(|dispatcher| dispatcher.tick()).unwrap_or(0)
}

/// Log through the process-wide dispatcher; a no-op before [`init`]
pub fn emit(
    source: &str,
    kind: LogKind,
    level: i32,
    context: Option<&str>,
    message: impl Into<Message>,
) -> bool {
    match current() {
        Some(dispatcher) => dispatcher.log(source, message, context, kind, level),
        None => false,
    }
}

/// Log an error value through the process-wide dispatcher
pub fn emit_exception(
    source: &str,
    level: i32,
    context: Option<&str>,
    error: &(dyn StdError + 'static),
) -> bool {
    match current() {
        Some(dispatcher) => dispatcher.log_exception(source, error, context, level),
        None => false,
    }
}

#[doc(hidden)]
pub fn __context<S: AsRef<str> + ?Sized>(context: &S) -> Option<&str> {
    Some(context.as_ref())
}
