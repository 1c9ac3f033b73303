//! Centralized logging configuration for the emulator.
//!
//! Provides a structured, low-overhead logging system shared by the core
//! and the system crates.
//!
//! # Architecture
//!
//! - **LogConfig**: Thread-safe global configuration using atomic operations
//! - **LogLevel**: Hierarchical log levels (Off < Error < Warn < Info < Debug < Trace)
//! - **LogCategory**: Per-component categories (Scheduler, Video, Mapper, ...)
//! - **log()**: Common logging function with async file I/O
//!
//! # Performance
//!
//! Logging is designed to be non-blocking:
//! - Messages go to a background thread via a channel
//! - File I/O happens asynchronously, preventing emulation slowdown
//! - Zero overhead when logging is disabled (message closures are lazy)
//!
//! # Usage
//!
//! ```rust
//! use emu_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Scheduler, LogLevel::Debug, || {
//!     format!("frame complete, {} master cycles", 896_040)
//! });
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Log category for different emulator components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Frame scheduler (line loop, interrupt delivery, cycle accounting)
    Scheduler,
    /// Video generator context (registers, viewport, DMA)
    Video,
    /// Cartridge mapper (control register writes, page remaps)
    Mapper,
    /// Sound synchronizer and chips
    Sound,
    /// Savestate serialization
    State,
    /// I/O ports and controllers
    Io,
}

const CATEGORY_COUNT: usize = 6;

impl LogCategory {
    fn index(self) -> usize {
        match self {
            LogCategory::Scheduler => 0,
            LogCategory::Video => 1,
            LogCategory::Mapper => 2,
            LogCategory::Sound => 3,
            LogCategory::State => 4,
            LogCategory::Io => 5,
        }
    }

    fn name(self) -> &'static str {
        match self {
            LogCategory::Scheduler => "SCHED",
            LogCategory::Video => "VIDEO",
            LogCategory::Mapper => "MAPPER",
            LogCategory::Sound => "SOUND",
            LogCategory::State => "STATE",
            LogCategory::Io => "IO",
        }
    }
}

/// Per-category rate limiter (fixed one-second window).
struct RateLimiter {
    max_per_second: AtomicUsize,
    windows: Mutex<[(Option<Instant>, usize, usize); CATEGORY_COUNT]>,
}

impl RateLimiter {
    fn new(max_per_second: usize) -> Self {
        Self {
            max_per_second: AtomicUsize::new(max_per_second),
            windows: Mutex::new([(None, 0, 0); CATEGORY_COUNT]),
        }
    }

    /// Returns (allowed, dropped-since-last-report).
    fn should_allow(&self, category: LogCategory) -> (bool, usize) {
        let now = Instant::now();
        let max = self.max_per_second.load(Ordering::Relaxed);
        let mut windows = self.windows.lock().unwrap();
        let (start, count, dropped) = &mut windows[category.index()];

        let expired = match start {
            Some(s) => now.duration_since(*s) >= Duration::from_secs(1),
            None => true,
        };
        if expired {
            *start = Some(now);
            *count = 0;
        }

        if *count < max {
            *count += 1;
            let report = std::mem::take(dropped);
            (true, report)
        } else {
            *dropped += 1;
            (false, 0)
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    /// Global log level (applies to all categories unless overridden)
    global_level: AtomicU8,
    /// Per-category overrides (Off = fall back to global)
    category_levels: [AtomicU8; CATEGORY_COUNT],
    /// Channel for sending log messages to the background thread
    log_sender: Mutex<Option<Sender<String>>>,
    /// Flag indicating if logging to file is enabled
    file_logging_enabled: AtomicBool,
    /// Rate limiter for controlling log output frequency
    rate_limiter: RateLimiter,
}

impl LogConfig {
    fn new() -> Self {
        const OFF: AtomicU8 = AtomicU8::new(0);
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            category_levels: [OFF; CATEGORY_COUNT],
            log_sender: Mutex::new(None),
            file_logging_enabled: AtomicBool::new(false),
            rate_limiter: RateLimiter::new(60),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        use std::sync::OnceLock;
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    /// Set the global log level (applies to all categories unless overridden)
    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level.to_u8(), Ordering::Relaxed);
    }

    /// Get the global log level
    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    /// Set log level for a specific category
    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.category_levels[category.index()].store(level.to_u8(), Ordering::Relaxed);
    }

    /// Get log level for a specific category
    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.category_levels[category.index()].load(Ordering::Relaxed))
    }

    /// Check if a message should be logged for the given category and level.
    ///
    /// The category-specific level wins when set; otherwise the global level
    /// applies.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        let category_level = self.get_level(category);
        if category_level != LogLevel::Off {
            level <= category_level
        } else {
            level <= self.get_global_level()
        }
    }

    /// Reset all logging to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for level in &self.category_levels {
            level.store(LogLevel::Off as u8, Ordering::Relaxed);
        }
    }

    /// Set the maximum logs per second per category (rate limit)
    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter
            .max_per_second
            .store(max_logs_per_second, Ordering::Relaxed);
    }

    /// Set the log file path.
    ///
    /// Starts a background thread for async file I/O so file writes never
    /// stall the emulation timeline.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                let mut file = file;
                while let Ok(message) = receiver.recv() {
                    // Logging must never crash the app; drop write errors.
                    let _ = writeln!(file, "{}", message);
                    let _ = file.flush();
                }
                let _ = file.flush();
            })?;

        let mut log_sender = self.log_sender.lock().unwrap();
        *log_sender = Some(sender);
        self.file_logging_enabled.store(true, Ordering::Relaxed);

        Ok(())
    }

    /// Close the log file and stop logging to file.
    pub fn clear_log_file(&self) {
        let mut log_sender = self.log_sender.lock().unwrap();
        *log_sender = None;
        self.file_logging_enabled.store(false, Ordering::Relaxed);
        // Writer thread stops when the sender is dropped.
    }

    fn write_message(&self, message: &str) {
        if self.file_logging_enabled.load(Ordering::Relaxed) {
            let log_sender = self.log_sender.lock().unwrap();
            if let Some(ref sender) = *log_sender {
                if sender.send(message.to_string()).is_err() {
                    eprintln!("{}", message);
                }
                return;
            }
        }
        eprintln!("{}", message);
    }
}

/// Log a message with lazy evaluation.
///
/// The closure is only invoked when the category/level combination is
/// enabled, so disabled call sites cost one atomic load.
pub fn log<F>(category: LogCategory, level: LogLevel, message: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }

    let (allowed, dropped) = config.rate_limiter.should_allow(category);
    if dropped > 0 {
        config.write_message(&format!(
            "[{}] ... {} messages dropped by rate limit",
            category.name(),
            dropped
        ));
    }
    if !allowed {
        return;
    }

    config.write_message(&format!("[{}] {}", category.name(), message()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!(LogLevel::from_str("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("WARN"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("3"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("bogus"), None);
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Error < LogLevel::Trace);
        assert!(LogLevel::Off < LogLevel::Error);
    }

    #[test]
    fn test_category_fallback_to_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Info);
        assert!(config.should_log(LogCategory::Scheduler, LogLevel::Info));
        assert!(!config.should_log(LogCategory::Scheduler, LogLevel::Debug));

        // Category override wins over global.
        config.set_level(LogCategory::Scheduler, LogLevel::Trace);
        assert!(config.should_log(LogCategory::Scheduler, LogLevel::Trace));
        assert!(!config.should_log(LogCategory::Mapper, LogLevel::Trace));
    }

    #[test]
    fn test_rate_limiter_drops_over_limit() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.should_allow(LogCategory::Video).0);
        assert!(limiter.should_allow(LogCategory::Video).0);
        assert!(!limiter.should_allow(LogCategory::Video).0);
        // Other categories keep their own windows.
        assert!(limiter.should_allow(LogCategory::Sound).0);
    }
}
