use chrono::{DateTime, Local};
use devlog_core::config::{Config, FileConfig, StorageStrategy};
use devlog_core::{LogEntry, LogKind, OutputError};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// File extension of every log file
const EXTENSION: &str = "jsonl";

/// Which stream a record lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// Every kind in one file
    Combined,
    /// One file per severity kind
    Kind(LogKind),
}

impl Category {
    /// Suffix inserted after the base file name
    fn suffix(&self) -> String {
        match self {
            Category::Combined => String::new(),
            Category::Kind(kind) => format!("_{}", kind.category()),
        }
    }
}

/// An open, auto-flushing stream for one category
struct OpenLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

enum WriterState {
    /// Nothing opened yet this session
    Pending,
    Open(BTreeMap<Category, OpenLog>),
    /// Opening failed; rotation is never attempted again this session
    Failed(String),
    /// Shut down; later records are dropped
    Closed,
}

/// Appends records as JSON lines, applying the storage strategy once per session
///
/// Nothing touches the disk until the first record arrives. At that point the
/// log directory is created and every category stream is rotated and opened
/// in one go.
pub struct FileSink {
    config: FileConfig,
    directory: PathBuf,
    session_started: DateTime<Local>,
    state: Mutex<WriterState>,
    entries_written: AtomicU64,
}

impl FileSink {
    /// Create a file sink from configuration, stamping the session with the current time
    pub fn new(config: &Config) -> Self {
        Self::with_session_start(config, Local::now())
    }

    /// Create a file sink with an explicit session start time
    pub fn with_session_start(config: &Config, session_started: DateTime<Local>) -> Self {
        Self {
            config: config.file.clone(),
            directory: config.log_directory(),
            session_started,
            state: Mutex::new(WriterState::Pending),
            entries_written: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Directory the log files live in
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn lock_state(&self) -> MutexGuard<'_, WriterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Categories active for this configuration
    fn categories(&self) -> Vec<Category> {
        if self.config.single_combined_log {
            vec![Category::Combined]
        } else {
            LogKind::ALL.iter().map(|kind| Category::Kind(*kind)).collect()
        }
    }

    /// Path of the live file for a category, without any session stamp
    pub fn current_path(&self, category: Category) -> PathBuf {
        self.directory.join(format!(
            "{}{}.{}",
            self.config.log_file_name,
            category.suffix(),
            EXTENSION
        ))
    }

    /// Path the previous session's file is kept under
    pub fn previous_path(&self, category: Category) -> PathBuf {
        self.directory.join(format!(
            "{}{}_previous.{}",
            self.config.log_file_name,
            category.suffix(),
            EXTENSION
        ))
    }

    /// Path of this session's file for the generational strategy
    pub fn generational_path(&self, category: Category) -> PathBuf {
        self.directory.join(format!(
            "{}{}_{}.{}",
            self.config.log_file_name,
            category.suffix(),
            session_stamp(&self.session_started),
            EXTENSION
        ))
    }

    /// Open every category stream, rotating old files first
    ///
    /// Idempotent: only the first call of the session does any work. Creating
    /// the directory or opening a file can fail; the caller decides whether
    /// that is fatal. A failed attempt is remembered and returned again, so
    /// files rotated before the failure are not rotated twice.
    pub fn ensure_initialized(&self) -> Result<(), OutputError> {
        if !self.config.enabled {
            return Ok(());
        }
        let mut state = self.lock_state();
        self.initialize_locked(&mut state)
    }

    fn initialize_locked(&self, state: &mut WriterState) -> Result<(), OutputError> {
        match state {
            WriterState::Pending => {}
            WriterState::Failed(reason) => return Err(OutputError::File(reason.clone())),
            WriterState::Open(_) | WriterState::Closed => return Ok(()),
        }

        match self.open_all() {
            Ok(logs) => {
                info!(
                    directory = %self.directory.display(),
                    strategy = ?self.config.storage_strategy,
                    streams = logs.len(),
                    "File logging initialized"
                );
                *state = WriterState::Open(logs);
                Ok(())
            }
            Err(e) => {
                warn!(
                    directory = %self.directory.display(),
                    error = %e,
                    "File logging failed to initialize"
                );
                *state = WriterState::Failed(format!(
                    "initialization failed earlier this session: {}",
                    e
                ));
                Err(e)
            }
        }
    }

    fn open_all(&self) -> Result<BTreeMap<Category, OpenLog>, OutputError> {
        if !self.directory.exists() {
            fs::create_dir_all(&self.directory)
                .map_err(|e| OutputError::File(format!("Failed to create directory: {}", e)))?;
        }

        let mut logs = BTreeMap::new();
        for category in self.categories() {
            let log = self.open_category(category)?;
            logs.insert(category, log);
        }
        Ok(logs)
    }

    /// Apply the storage strategy for one category and open its stream
    fn open_category(&self, category: Category) -> Result<OpenLog, OutputError> {
        let (path, append) = match self.config.storage_strategy {
            StorageStrategy::Monolithic => (self.current_path(category), true),
            StorageStrategy::Generational => (self.generational_path(category), true),
            StorageStrategy::CurrentSessionOnly => (self.current_path(category), false),
            StorageStrategy::KeepPrevious => {
                let current = self.current_path(category);
                let previous = self.previous_path(category);

                if previous.exists() {
                    fs::remove_file(&previous).map_err(|e| {
                        OutputError::File(format!("Failed to remove {:?}: {}", previous, e))
                    })?;
                }
                if current.exists() {
                    fs::rename(&current, &previous).map_err(|e| {
                        OutputError::File(format!("Failed to rotate {:?}: {}", current, e))
                    })?;
                    debug!(
                        from = %current.display(),
                        to = %previous.display(),
                        "Kept previous session log"
                    );
                }
                (current, false)
            }
        };

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .map_err(|e| OutputError::File(format!("Failed to open file {:?}: {}", path, e)))?;

        debug!(path = %path.display(), append, "Opened log file for writing");

        Ok(OpenLog {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Write an entry to its stream
    ///
    /// A no-op when file logging is disabled or the sink has been shut down.
    pub fn emit(&self, entry: &LogEntry) -> Result<(), OutputError> {
        if !self.config.enabled {
            return Ok(());
        }

        let line = entry
            .to_json_line()
            .map_err(|e| OutputError::Serialization(e.to_string()))?;

        let mut state = self.lock_state();
        self.initialize_locked(&mut state)?;

        let logs = match &mut *state {
            WriterState::Open(logs) => logs,
            _ => {
                debug!("File sink closed, dropping record");
                return Ok(());
            }
        };

        let category = if self.config.single_combined_log {
            Category::Combined
        } else {
            Category::Kind(entry.kind)
        };

        let log = logs
            .get_mut(&category)
            .ok_or_else(|| OutputError::File(format!("No stream for {:?}", category)))?;

        log.writer
            .write_all(line.as_bytes())
            .map_err(|e| OutputError::File(format!("Failed to write to file: {}", e)))?;
        log.writer
            .write_all(b"\n")
            .map_err(|e| OutputError::File(format!("Failed to write newline: {}", e)))?;
        // Every record must be on disk once emit returns
        log.writer
            .flush()
            .map_err(|e| OutputError::File(format!("Failed to flush file: {}", e)))?;

        self.entries_written.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    /// Files opened this session, in category order
    pub fn open_paths(&self) -> Vec<PathBuf> {
        match &*self.lock_state() {
            WriterState::Open(logs) => logs.values().map(|log| log.path.clone()).collect(),
            _ => Vec::new(),
        }
    }

    /// Get the number of entries written
    pub fn entries_written(&self) -> u64 {
        self.entries_written.load(Ordering::Relaxed)
    }

    /// Flush and close every stream
    ///
    /// Streams are closed exactly once; calling this again does nothing.
    pub fn shutdown(&self) {
        let mut state = self.lock_state();
        let previous = std::mem::replace(&mut *state, WriterState::Closed);

        if let WriterState::Open(logs) = previous {
            for (category, mut log) in logs {
                if let Err(e) = log.writer.flush() {
                    warn!(?category, error = %e, "Failed to flush log file on shutdown");
                }
            }
            info!(entries = self.entries_written(), "File logging closed");
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Session stamp appended by the generational strategy, `YYYYMMDD_HHmmss`
pub fn session_stamp(at: &DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use devlog_core::Message;
    use tempfile::TempDir;

    fn test_config(dir: &Path, strategy: StorageStrategy, combined: bool) -> Config {
        let mut config = Config::default();
        config.general.data_root = Some(dir.to_path_buf());
        config.file.storage_strategy = strategy;
        config.file.single_combined_log = combined;
        config
    }

    fn create_entry(kind: LogKind, content: &str) -> LogEntry {
        LogEntry::new(kind, 2, "tests", Message::Text(content.to_string()))
    }

    fn read_messages(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str::<LogEntry>(line).unwrap().message)
            .collect()
    }

    fn run_session(config: &Config, messages: &[&str]) {
        let sink = FileSink::new(config);
        for message in messages {
            sink.emit(&create_entry(LogKind::Info, message)).unwrap();
        }
        sink.shutdown();
    }

    #[test]
    fn test_session_stamp() {
        let at = Local.with_ymd_and_hms(2024, 1, 15, 9, 5, 3).unwrap();
        assert_eq!(session_stamp(&at), "20240115_090503");
    }

    #[test]
    fn test_disabled_sink_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path(), StorageStrategy::Monolithic, true);
        config.file.enabled = false;

        let sink = FileSink::new(&config);
        for _ in 0..10 {
            sink.emit(&create_entry(LogKind::Error, "dropped")).unwrap();
        }
        sink.ensure_initialized().unwrap();

        assert!(!sink.directory().exists());
        assert_eq!(sink.entries_written(), 0);
    }

    #[test]
    fn test_nothing_created_before_first_record() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), StorageStrategy::KeepPrevious, true);

        let sink = FileSink::new(&config);
        assert!(!sink.directory().exists());

        sink.emit(&create_entry(LogKind::Info, "first")).unwrap();
        assert!(sink.directory().exists());
        assert_eq!(sink.open_paths(), vec![dir.path().join("Logs").join("debug_log.jsonl")]);
    }

    #[test]
    fn test_record_visible_without_shutdown() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), StorageStrategy::Monolithic, true);

        let sink = FileSink::new(&config);
        sink.emit(&create_entry(LogKind::Warning, "flushed")).unwrap();

        let content = fs::read_to_string(sink.current_path(Category::Combined)).unwrap();
        assert!(content.contains("\"message\":\"flushed\""));
        assert!(content.contains("\"type\":\"Warning\""));
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_keep_previous_across_sessions() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), StorageStrategy::KeepPrevious, true);
        let logs = dir.path().join("Logs");

        run_session(&config, &["a1", "a2", "a3"]);
        run_session(&config, &["b1", "b2"]);

        assert_eq!(read_messages(&logs.join("debug_log.jsonl")), vec!["b1", "b2"]);
        assert_eq!(
            read_messages(&logs.join("debug_log_previous.jsonl")),
            vec!["a1", "a2", "a3"]
        );

        run_session(&config, &["c1"]);

        // Session A must not survive as a previous-previous file
        assert_eq!(read_messages(&logs.join("debug_log.jsonl")), vec!["c1"]);
        assert_eq!(read_messages(&logs.join("debug_log_previous.jsonl")), vec!["b1", "b2"]);
        assert_eq!(fs::read_dir(&logs).unwrap().count(), 2);
    }

    #[test]
    fn test_monolithic_appends() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), StorageStrategy::Monolithic, true);

        run_session(&config, &["one"]);
        run_session(&config, &["two"]);

        let path = dir.path().join("Logs").join("debug_log.jsonl");
        assert_eq!(read_messages(&path), vec!["one", "two"]);
    }

    #[test]
    fn test_current_session_only_truncates() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), StorageStrategy::CurrentSessionOnly, true);

        run_session(&config, &["old", "older"]);
        run_session(&config, &["new"]);

        let logs = dir.path().join("Logs");
        assert_eq!(read_messages(&logs.join("debug_log.jsonl")), vec!["new"]);
        assert_eq!(fs::read_dir(&logs).unwrap().count(), 1);
    }

    #[test]
    fn test_generational_names() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), StorageStrategy::Generational, true);
        let first = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let second = Local.with_ymd_and_hms(2024, 3, 1, 13, 30, 15).unwrap();

        let sink = FileSink::with_session_start(&config, first);
        sink.emit(&create_entry(LogKind::Info, "first")).unwrap();
        sink.shutdown();

        let sink = FileSink::with_session_start(&config, second);
        sink.emit(&create_entry(LogKind::Info, "second")).unwrap();
        sink.shutdown();

        let logs = dir.path().join("Logs");
        assert_eq!(
            read_messages(&logs.join("debug_log_20240301_120000.jsonl")),
            vec!["first"]
        );
        assert_eq!(
            read_messages(&logs.join("debug_log_20240301_133015.jsonl")),
            vec!["second"]
        );
    }

    #[test]
    fn test_split_per_kind() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), StorageStrategy::KeepPrevious, false);

        let sink = FileSink::new(&config);
        sink.emit(&create_entry(LogKind::Error, "bad")).unwrap();
        sink.emit(&create_entry(LogKind::Assert, "assumption")).unwrap();
        sink.emit(&create_entry(LogKind::Error, "worse")).unwrap();

        assert_eq!(sink.open_paths().len(), 5);

        let logs = dir.path().join("Logs");
        assert_eq!(read_messages(&logs.join("debug_log_error.jsonl")), vec!["bad", "worse"]);
        assert_eq!(read_messages(&logs.join("debug_log_assert.jsonl")), vec!["assumption"]);
        assert!(read_messages(&logs.join("debug_log_info.jsonl")).is_empty());
        assert!(logs.join("debug_log_exception.jsonl").exists());
        assert!(logs.join("debug_log_warning.jsonl").exists());
    }

    #[test]
    fn test_shutdown_closes_once() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), StorageStrategy::Monolithic, true);

        let sink = FileSink::new(&config);
        sink.emit(&create_entry(LogKind::Info, "kept")).unwrap();
        sink.shutdown();
        sink.shutdown();

        sink.emit(&create_entry(LogKind::Info, "after shutdown")).unwrap();
        assert_eq!(sink.entries_written(), 1);
        assert!(sink.open_paths().is_empty());
    }

    #[test]
    fn test_unwritable_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        // A plain file where the log directory should be
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "not a directory").unwrap();

        let mut config = test_config(&blocker, StorageStrategy::Monolithic, true);
        config.file.log_file_path = "Logs".to_string();

        let sink = FileSink::new(&config);
        assert!(matches!(sink.ensure_initialized(), Err(OutputError::File(_))));
    }

    #[test]
    fn test_concurrent_writers_are_all_counted() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), StorageStrategy::CurrentSessionOnly, true);
        let sink = std::sync::Arc::new(FileSink::new(&config));

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let text = format!("worker {} line {}", worker, i);
                        sink.emit(&create_entry(LogKind::Info, &text)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(sink.entries_written(), 100);
        assert_eq!(read_messages(&sink.current_path(Category::Combined)).len(), 100);
    }

    #[test]
    fn test_failed_initialization_does_not_rotate_twice() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), StorageStrategy::KeepPrevious, false);
        let logs = dir.path().join("Logs");

        let first = FileSink::new(&config);
        first.emit(&create_entry(LogKind::Info, "a1")).unwrap();
        first.shutdown();

        // The last category cannot be rotated: its previous file is a directory
        fs::create_dir(logs.join("debug_log_exception_previous.jsonl")).unwrap();

        let second = FileSink::new(&config);
        assert!(second.ensure_initialized().is_err());
        assert_eq!(read_messages(&logs.join("debug_log_info_previous.jsonl")), vec!["a1"]);

        // Later calls report the same failure without touching the files again
        assert!(matches!(
            second.emit(&create_entry(LogKind::Info, "b1")),
            Err(OutputError::File(_))
        ));
        assert!(second.ensure_initialized().is_err());
        assert_eq!(read_messages(&logs.join("debug_log_info_previous.jsonl")), vec!["a1"]);
        assert_eq!(second.entries_written(), 0);
        assert!(second.open_paths().is_empty());
    }
}
