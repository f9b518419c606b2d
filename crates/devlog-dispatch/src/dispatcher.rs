use crate::level::{LevelRegistry, LevelResolver, LogSource};
use devlog_core::{Clock, Config, LogEntry, LogKind, LogLevel, Message, Result, SystemClock};
use devlog_output::{ConsoleSink, FileSink, RemoteSink, ScreenOverlay, Transport};
use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Level used when a call does not name one
pub const DEFAULT_LEVEL: i32 = LogLevel::Common as i32;

/// Builder for a [`Dispatcher`]
pub struct DispatcherBuilder {
    config: Config,
    clock: Option<Arc<dyn Clock>>,
    transport: Option<Arc<dyn Transport>>,
}

impl DispatcherBuilder {
    /// Clock driving overlay expiry (defaults to the system clock)
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Transport used by the remote sink (defaults to HTTP)
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<Dispatcher> {
        let config = self.config;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()));

        let remote = match self.transport {
            Some(transport) => RemoteSink::new(&config, transport)?,
            None => RemoteSink::from_config(&config)?,
        };

        info!(
            global_level = config.levels.global_log_level,
            expanded_level = config.levels.expanded_log_level,
            file = config.file.enabled,
            screen = config.screen.enabled,
            remote = remote.is_active(),
            "Dispatcher initialized"
        );

        Ok(Dispatcher {
            registry: LevelRegistry::from_config(&config.levels),
            resolver: LevelResolver::new(&config.levels),
            console: ConsoleSink::new(),
            file: FileSink::new(&config),
            screen: ScreenOverlay::new(&config, clock),
            remote,
            file_failed: AtomicBool::new(false),
        })
    }
}

/// Single entry point fanning log calls out to the sinks
///
/// Each call is gated by the effective level of its source. Calls that pass
/// go to the console, then to the file, overlay and remote sinks, each of
/// which checks its own enable flag. No call ever returns an error.
pub struct Dispatcher {
    registry: LevelRegistry,
    resolver: LevelResolver,
    console: ConsoleSink,
    file: FileSink,
    screen: ScreenOverlay,
    remote: RemoteSink,
    file_failed: AtomicBool,
}

impl Dispatcher {
    pub fn builder(config: Config) -> DispatcherBuilder {
        DispatcherBuilder {
            config,
            clock: None,
            transport: None,
        }
    }

    /// Per-source override registry
    pub fn registry(&self) -> &LevelRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &LevelResolver {
        &self.resolver
    }

    pub fn file_sink(&self) -> &FileSink {
        &self.file
    }

    pub fn screen(&self) -> &ScreenOverlay {
        &self.screen
    }

    pub fn remote(&self) -> &RemoteSink {
        &self.remote
    }

    /// Effective level of a source
    pub fn resolve(&self, source: &str) -> Option<i32> {
        self.resolver.resolve(source, &self.registry)
    }

    /// Whether a call from `source` at `level` would be emitted
    pub fn should_log(&self, source: &str, level: i32) -> bool {
        self.resolver.should_log(source, level, &self.registry)
    }

    /// Log a message of any kind
    ///
    /// Returns whether the call passed the level gate and reached the sinks.
    pub fn log(
        &self,
        source: &str,
        message: impl Into<Message>,
        context: Option<&str>,
        kind: LogKind,
        level: i32,
    ) -> bool {
        if !self.should_log(source, level) {
            debug!(source, level, "Filtered log call");
            return false;
        }

        let mut entry = LogEntry::new(kind, level, source, message.into());
        if let Some(context) = context {
            entry = entry.with_context(context);
        }

        self.console.emit(&entry);
        self.emit_to_file(&entry);
        self.screen.emit(&entry);
        self.remote.emit(&entry);
        true
    }

    pub fn log_warning(
        &self,
        source: &str,
        message: impl Into<Message>,
        context: Option<&str>,
        level: i32,
    ) -> bool {
        self.log(source, message, context, LogKind::Warning, level)
    }

    pub fn log_error(
        &self,
        source: &str,
        message: impl Into<Message>,
        context: Option<&str>,
        level: i32,
    ) -> bool {
        self.log(source, message, context, LogKind::Error, level)
    }

    pub fn log_assertion(
        &self,
        source: &str,
        message: impl Into<Message>,
        context: Option<&str>,
        level: i32,
    ) -> bool {
        self.log(source, message, context, LogKind::Assert, level)
    }

    /// Log an error value, including its source chain
    pub fn log_exception(
        &self,
        source: &str,
        error: &(dyn StdError + 'static),
        context: Option<&str>,
        level: i32,
    ) -> bool {
        self.log(source, Message::from_error(error), context, LogKind::Exception, level)
    }

    /// Log a message followed by an error, at the default level
    pub fn log_exception_with(
        &self,
        source: &str,
        message: &str,
        error: &(dyn StdError + 'static),
        context: Option<&str>,
    ) -> bool {
        let rendered = Message::from_error(error);
        let text = format!("{}\n{}", message, rendered.as_str());
        self.log(
            source,
            Message::Exception(text),
            context,
            LogKind::Exception,
            DEFAULT_LEVEL,
        )
    }

    /// Log under a typed source, registering its overrides on first use
    pub fn log_from<T: LogSource + ?Sized>(
        &self,
        message: impl Into<Message>,
        context: Option<&str>,
        kind: LogKind,
        level: i32,
    ) -> bool {
        let source = T::source_key();
        if !self.registry.contains(source) {
            self.registry.register::<T>();
        }
        self.log(source, message, context, kind, level)
    }

    /// One scheduler tick: sweep expired overlay entries
    pub fn tick(&self) -> usize {
        self.screen.sweep()
    }

    /// Close files, tear the overlay down and stop remote delivery
    pub fn shutdown(&self) {
        self.file.shutdown();
        self.screen.shutdown();
        self.remote.shutdown();
        info!("Dispatcher shut down");
    }

    fn emit_to_file(&self, entry: &LogEntry) {
        if self.file_failed.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.file.emit(entry) {
            if !self.file_failed.swap(true, Ordering::SeqCst) {
                ConsoleSink::error(&format!(
                    "File logging disabled for this session: {}",
                    e
                ));
            }
        }
    }
}
