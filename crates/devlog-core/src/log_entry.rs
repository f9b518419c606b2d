use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt::Write as _;

/// Severity kind of a log call
///
/// Not to be confused with [`LogLevel`], which is the advisory verbosity used
/// for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogKind {
    Info,
    Warning,
    Error,
    Assert,
    Exception,
}

impl LogKind {
    /// Every kind, in file-category order
    pub const ALL: [LogKind; 5] = [
        LogKind::Info,
        LogKind::Warning,
        LogKind::Error,
        LogKind::Assert,
        LogKind::Exception,
    ];

    /// Lowercase name used in per-kind file names
    pub fn category(&self) -> &'static str {
        match self {
            LogKind::Info => "info",
            LogKind::Warning => "warning",
            LogKind::Error => "error",
            LogKind::Assert => "assert",
            LogKind::Exception => "exception",
        }
    }
}

impl std::fmt::Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogKind::Info => write!(f, "Info"),
            LogKind::Warning => write!(f, "Warning"),
            LogKind::Error => write!(f, "Error"),
            LogKind::Assert => write!(f, "Assert"),
            LogKind::Exception => write!(f, "Exception"),
        }
    }
}

/// Advisory log level bands
///
/// Smaller values are more important. A message is emitted when its level is
/// less than or equal to the effective level of its source. Values above
/// `Verbose` are allowed for finer granularity, which is why levels travel as
/// plain `i32` everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Mutes everything above it
    None = 0,
    /// Only the most important information
    Minimal = 1,
    /// Common debug info
    Common = 2,
    /// Detailed debug info, variable values and function calls
    Verbose = 3,
}

impl LogLevel {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<LogLevel> for i32 {
    fn from(level: LogLevel) -> Self {
        level.as_i32()
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Common
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::None => write!(f, "NONE"),
            LogLevel::Minimal => write!(f, "MINIMAL"),
            LogLevel::Common => write!(f, "COMMON"),
            LogLevel::Verbose => write!(f, "VERBOSE"),
        }
    }
}

/// Payload handed to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Plain text
    Text(String),
    /// Rendering of a real error value, including its source chain
    Exception(String),
}

impl Message {
    /// Render an error and its `source()` chain
    pub fn from_error(error: &(dyn StdError + 'static)) -> Self {
        let mut text = error.to_string();
        let mut cause = error.source();
        while let Some(inner) = cause {
            let _ = write!(text, "\nCaused by: {}", inner);
            cause = inner.source();
        }
        Message::Exception(text)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Message::Text(text) | Message::Exception(text) => text,
        }
    }

    pub fn is_exception(&self) -> bool {
        matches!(self, Message::Exception(_))
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Text(text)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Text(text.to_string())
    }
}

impl From<&String> for Message {
    fn from(text: &String) -> Self {
        Message::Text(text.clone())
    }
}

/// A single log record
///
/// Serializes to the persisted/remote schema: `timestamp`, `type`, `level`,
/// `context`, `message`, `stacktrace`. The source and the exception flag stay
/// in memory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the call was made
    pub timestamp: DateTime<Utc>,

    /// Severity kind
    #[serde(rename = "type")]
    pub kind: LogKind,

    /// Advisory level the call was made at
    pub level: i32,

    /// Optional context identifier supplied by the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Message text
    pub message: String,

    /// Stack trace, only captured for remote-bound records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<String>,

    /// Logical origin of the call
    #[serde(skip)]
    pub source: String,

    /// Whether `message` was rendered from a real error value
    #[serde(skip)]
    pub is_exception_payload: bool,
}

impl LogEntry {
    /// Create a new entry stamped with the current time
    pub fn new(kind: LogKind, level: i32, source: impl Into<String>, message: Message) -> Self {
        let is_exception_payload = message.is_exception();
        let message = match message {
            Message::Text(text) | Message::Exception(text) => text,
        };

        Self {
            timestamp: Utc::now(),
            kind,
            level,
            context: None,
            message,
            stacktrace: None,
            source: source.into(),
            is_exception_payload,
        }
    }

    /// Attach a context identifier
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attach a stack trace
    pub fn with_stacktrace(mut self, stacktrace: impl Into<String>) -> Self {
        self.stacktrace = Some(stacktrace.into());
        self
    }

    /// Serialize as a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Inner;

    impl std::fmt::Display for Inner {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "disk full")
        }
    }

    impl StdError for Inner {}

    #[derive(Debug)]
    struct Outer(Inner);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "save failed")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_record_schema() {
        let entry = LogEntry::new(LogKind::Warning, 2, "game::player", "low health".into())
            .with_context("Player(1)");
        let json: serde_json::Value = serde_json::from_str(&entry.to_json_line().unwrap()).unwrap();

        assert_eq!(json["type"], "Warning");
        assert_eq!(json["level"], 2);
        assert_eq!(json["context"], "Player(1)");
        assert_eq!(json["message"], "low health");
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
        assert!(json.get("stacktrace").is_none());
        assert!(json.get("source").is_none());
    }

    #[test]
    fn test_absent_context_is_omitted() {
        let entry = LogEntry::new(LogKind::Info, 1, "src", "hello".into());
        let line = entry.to_json_line().unwrap();
        assert!(!line.contains("context"));
    }

    #[test]
    fn test_message_from_error_chain() {
        let message = Message::from_error(&Outer(Inner));
        assert!(message.is_exception());
        assert_eq!(message.as_str(), "save failed\nCaused by: disk full");

        let entry = LogEntry::new(LogKind::Exception, 2, "src", message);
        assert!(entry.is_exception_payload);
    }

    #[test]
    fn test_level_bands() {
        assert_eq!(i32::from(LogLevel::None), 0);
        assert_eq!(i32::from(LogLevel::Minimal), 1);
        assert_eq!(LogLevel::default().as_i32(), 2);
        assert_eq!(LogLevel::Verbose.as_i32(), 3);
    }

    #[test]
    fn test_kind_categories() {
        let categories: Vec<_> = LogKind::ALL.iter().map(|k| k.category()).collect();
        assert_eq!(categories, vec!["info", "warning", "error", "assert", "exception"]);
    }
}
