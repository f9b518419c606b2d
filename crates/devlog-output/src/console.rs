use devlog_core::{LogEntry, LogKind};
use tracing::{error, info, warn};

/// Target every console line is emitted under
pub const CONSOLE_TARGET: &str = "devlog";

/// Console channel a record is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleChannel {
    Info,
    Warning,
    Error,
    Assertion,
    Exception,
}

impl ConsoleChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleChannel::Info => "info",
            ConsoleChannel::Warning => "warning",
            ConsoleChannel::Error => "error",
            ConsoleChannel::Assertion => "assertion",
            ConsoleChannel::Exception => "exception",
        }
    }
}

/// Mirrors records to the host console
///
/// The host console is the process-wide `tracing` subscriber. Warnings map to
/// `WARN`; errors, assertion failures and exceptions map to `ERROR` with a
/// `channel` field telling them apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }

    /// Pick the channel and the text for an entry
    ///
    /// An Exception-kind entry whose message did not come from an error value
    /// is routed to the error channel with a note about the misuse.
    pub fn format_entry(&self, entry: &LogEntry) -> (ConsoleChannel, String) {
        match entry.kind {
            LogKind::Info => (ConsoleChannel::Info, entry.message.clone()),
            LogKind::Warning => (ConsoleChannel::Warning, entry.message.clone()),
            LogKind::Error => (ConsoleChannel::Error, entry.message.clone()),
            LogKind::Assert => (ConsoleChannel::Assertion, entry.message.clone()),
            LogKind::Exception if entry.is_exception_payload => {
                (ConsoleChannel::Exception, entry.message.clone())
            }
            LogKind::Exception => (
                ConsoleChannel::Error,
                format!(
                    "log_exception called with a non-exception message: message follows \n {}",
                    entry.message
                ),
            ),
        }
    }

    /// Write an entry to its console channel
    pub fn emit(&self, entry: &LogEntry) {
        let (channel, text) = self.format_entry(entry);
        let context = entry.context.as_deref().unwrap_or("-");
        let source = entry.source.as_str();

        match channel {
            ConsoleChannel::Info => {
                info!(target: CONSOLE_TARGET, source, context, log_level = entry.level, "{}", text)
            }
            ConsoleChannel::Warning => {
                warn!(target: CONSOLE_TARGET, source, context, log_level = entry.level, "{}", text)
            }
            ConsoleChannel::Error | ConsoleChannel::Assertion | ConsoleChannel::Exception => {
                error!(
                    target: CONSOLE_TARGET,
                    channel = channel.as_str(),
                    source,
                    context,
                    log_level = entry.level,
                    "{}",
                    text
                )
            }
        }
    }

    /// Internal warning of the logging subsystem itself
    pub fn warning(text: &str) {
        warn!(target: CONSOLE_TARGET, "{}", text);
    }

    /// Internal error of the logging subsystem itself
    pub fn error(text: &str) {
        error!(target: CONSOLE_TARGET, "{}", text);
    }
}
