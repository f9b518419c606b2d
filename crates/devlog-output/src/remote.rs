//! Fire-and-forget delivery of records to a remote HTTP collector
//!
//! Every record becomes one POST, spawned as an independent task that the
//! caller never waits on. Failures are reported as console warnings and
//! otherwise discarded: no retry, no queue.

use crate::console::ConsoleSink;
use devlog_core::config::{Config, RemoteConfig};
use devlog_core::{LogEntry, OutputError};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::backtrace::Backtrace;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Outcome of one delivery attempt
pub type DeliveryFuture = Pin<Box<dyn Future<Output = Result<(), OutputError>> + Send + 'static>>;

/// Wire used by the remote sink
pub trait Transport: Send + Sync {
    /// Start a POST of `body` (a JSON record) to `endpoint`
    fn post(&self, endpoint: &str, body: String) -> DeliveryFuture;
}

/// HTTP transport backed by `reqwest`
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, OutputError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OutputError::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post(&self, endpoint: &str, body: String) -> DeliveryFuture {
        let request = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        Box::pin(async move {
            let response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    OutputError::Network(format!("request timed out: {}", e))
                } else {
                    OutputError::Network(e.to_string())
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(OutputError::Network(format!("collector returned {}", status)));
            }
            Ok(())
        })
    }
}

/// Where delivery tasks run
enum WorkerRuntime {
    /// The runtime that was current when the sink was built
    Shared(Handle),
    /// A dedicated runtime for hosts without one
    Owned(Runtime),
}

impl WorkerRuntime {
    fn handle(&self) -> Handle {
        match self {
            WorkerRuntime::Shared(handle) => handle.clone(),
            WorkerRuntime::Owned(runtime) => runtime.handle().clone(),
        }
    }
}

/// Sink posting each record to a collector endpoint
pub struct RemoteSink {
    config: RemoteConfig,
    transport: Arc<dyn Transport>,
    runtime: Mutex<Option<WorkerRuntime>>,
    permits: Option<Arc<Semaphore>>,
}

impl RemoteSink {
    /// Create a remote sink using the HTTP transport
    pub fn from_config(config: &Config) -> Result<Self, OutputError> {
        let timeout = Duration::from_secs(config.remote.timeout_seconds);
        let transport = Arc::new(HttpTransport::new(timeout)?);
        Self::new(config, transport)
    }

    /// Create a remote sink with a custom transport
    ///
    /// A worker runtime is only set up when remote logging is enabled and an
    /// endpoint is configured.
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Result<Self, OutputError> {
        let config = config.remote.clone();
        let active = config.enabled && !config.endpoint.trim().is_empty();

        let runtime = if active {
            let runtime = match Handle::try_current() {
                Ok(handle) => WorkerRuntime::Shared(handle),
                Err(_) => WorkerRuntime::Owned(
                    Builder::new_multi_thread()
                        .worker_threads(1)
                        .thread_name("devlog-remote")
                        .enable_all()
                        .build()
                        .map_err(|e| {
                            OutputError::Runtime(format!("Failed to start remote worker: {}", e))
                        })?,
                ),
            };
            info!(
                endpoint = %config.endpoint,
                timeout_seconds = config.timeout_seconds,
                "Remote logging enabled"
            );
            Some(runtime)
        } else {
            None
        };

        let permits = (config.max_in_flight > 0)
            .then(|| Arc::new(Semaphore::new(config.max_in_flight)));

        Ok(Self {
            config,
            transport,
            runtime: Mutex::new(runtime),
            permits,
        })
    }

    fn lock_runtime(&self) -> MutexGuard<'_, Option<WorkerRuntime>> {
        self.runtime.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether records are currently being forwarded
    pub fn is_active(&self) -> bool {
        self.lock_runtime().is_some()
    }

    /// Forward a record without waiting for the outcome
    pub fn emit(&self, entry: &LogEntry) {
        let Some(handle) = self.lock_runtime().as_ref().map(WorkerRuntime::handle) else {
            return;
        };

        let record = entry
            .clone()
            .with_stacktrace(Backtrace::force_capture().to_string());
        let body = match record.to_json_line() {
            Ok(body) => body,
            Err(e) => {
                ConsoleSink::warning(&format!("Remote log exception: {}", e));
                return;
            }
        };

        let permit = match &self.permits {
            Some(permits) => match Arc::clone(permits).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    ConsoleSink::warning(&format!(
                        "Remote log dropped: {} deliveries already in flight",
                        self.config.max_in_flight
                    ));
                    return;
                }
            },
            None => None,
        };

        let delivery = self.transport.post(&self.config.endpoint, body);
        let timeout = Duration::from_secs(self.config.timeout_seconds);

        handle.spawn(async move {
            let _permit = permit;
            match tokio::time::timeout(timeout, delivery).await {
                Ok(Ok(())) => debug!("Delivered record to remote collector"),
                Ok(Err(e)) => ConsoleSink::warning(&format!("Remote log failed: {}", e)),
                Err(_) => ConsoleSink::warning(&format!(
                    "Remote log failed: timed out after {}s",
                    timeout.as_secs()
                )),
            }
        });
    }

    /// Stop forwarding and detach the worker runtime
    ///
    /// Deliveries already in flight are not awaited.
    pub fn shutdown(&self) {
        if let Some(WorkerRuntime::Owned(runtime)) = self.lock_runtime().take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for RemoteSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devlog_core::{LogKind, Message};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records calls instead of touching the network
    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
        bodies: Mutex<Vec<String>>,
        fail: bool,
        hang: bool,
    }

    impl CountingTransport {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for CountingTransport {
        fn post(&self, _endpoint: &str, body: String) -> DeliveryFuture {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bodies.lock().unwrap().push(body);
            let (fail, hang) = (self.fail, self.hang);
            Box::pin(async move {
                if hang {
                    std::future::pending::<()>().await;
                }
                if fail {
                    Err(OutputError::Network("collector returned 500".to_string()))
                } else {
                    Ok(())
                }
            })
        }
    }

    fn enabled_config() -> Config {
        let mut config = Config::default();
        config.remote.enabled = true;
        config.remote.endpoint = "http://127.0.0.1:9/logs".to_string();
        config
    }

    fn entry() -> LogEntry {
        LogEntry::new(LogKind::Error, 2, "tests", Message::Text("remote".to_string()))
            .with_context("Arena")
    }

    #[test]
    fn test_disabled_makes_no_calls() {
        let transport = Arc::new(CountingTransport::default());
        let sink = RemoteSink::new(&Config::default(), transport.clone()).unwrap();

        for _ in 0..100 {
            sink.emit(&entry());
        }

        assert!(!sink.is_active());
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_empty_endpoint_is_inactive() {
        let mut config = enabled_config();
        config.remote.endpoint = "  ".to_string();
        let transport = Arc::new(CountingTransport::default());
        let sink = RemoteSink::new(&config, transport.clone()).unwrap();

        sink.emit(&entry());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_body_carries_stacktrace() {
        let transport = Arc::new(CountingTransport::default());
        let sink = RemoteSink::new(&enabled_config(), transport.clone()).unwrap();

        sink.emit(&entry());
        assert_eq!(transport.calls(), 1);

        let body = transport.bodies.lock().unwrap()[0].clone();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["type"], "Error");
        assert_eq!(json["message"], "remote");
        assert_eq!(json["context"], "Arena");
        assert!(json["stacktrace"].is_string());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_is_swallowed() {
        let transport = Arc::new(CountingTransport {
            fail: true,
            ..Default::default()
        });
        let sink = RemoteSink::new(&enabled_config(), transport.clone()).unwrap();

        for _ in 0..3 {
            sink.emit(&entry());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(transport.calls(), 3);
        assert!(sink.is_active());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_emit_does_not_wait_for_delivery() {
        let transport = Arc::new(CountingTransport {
            hang: true,
            ..Default::default()
        });
        let sink = RemoteSink::new(&enabled_config(), transport.clone()).unwrap();

        let started = std::time::Instant::now();
        for _ in 0..5 {
            sink.emit(&entry());
        }

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(transport.calls(), 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_max_in_flight_drops_excess() {
        let mut config = enabled_config();
        config.remote.max_in_flight = 1;
        let transport = Arc::new(CountingTransport {
            hang: true,
            ..Default::default()
        });
        let sink = RemoteSink::new(&config, transport.clone()).unwrap();

        sink.emit(&entry());
        sink.emit(&entry());
        sink.emit(&entry());

        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_owned_runtime_without_host_runtime() {
        let transport = Arc::new(CountingTransport::default());
        let sink = RemoteSink::new(&enabled_config(), transport.clone()).unwrap();
        assert!(sink.is_active());

        sink.emit(&entry());
        assert_eq!(transport.calls(), 1);

        sink.shutdown();
        assert!(!sink.is_active());

        sink.emit(&entry());
        assert_eq!(transport.calls(), 1);
    }
}
