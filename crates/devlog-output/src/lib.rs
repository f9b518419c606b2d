//! devlog Output
//!
//! Output sinks for the devlog diagnostic logger.
//! Supports the host console, rotating files, an on-screen overlay and a remote collector.

pub mod console;
pub mod file;
pub mod remote;
pub mod screen;

pub use console::{ConsoleChannel, ConsoleSink};
pub use file::{Category, FileSink};
pub use remote::{DeliveryFuture, HttpTransport, RemoteSink, Transport};
pub use screen::{Color, ScreenEntry, ScreenOverlay};
