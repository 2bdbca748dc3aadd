//! Ring buffer log capture for fallback diagnostics.
//!
//! A tracing Layer keeps recent events from the view and core crates so a
//! CE fallback notice can carry the log that led up to it.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt::Write as FmtWrite;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Maximum number of log entries to keep.
const MAX_ENTRIES: usize = 200;

/// Target prefixes to capture: explicit `tategaki::*` targets and module paths.
const CAPTURED_PREFIXES: &[&str] = &["tategaki", "markdown_weaver"];

/// Minimum level to buffer.
const BUFFER_MIN_LEVEL: Level = Level::DEBUG;

thread_local! {
    static LOG_BUFFER: RefCell<VecDeque<String>> = RefCell::new(VecDeque::with_capacity(MAX_ENTRIES));
}

/// A tracing Layer that captures log messages to a ring buffer.
pub struct LogCaptureLayer;

impl<S: Subscriber> Layer<S> for LogCaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = metadata.level();
        let target = metadata.target();

        let ours = CAPTURED_PREFIXES.iter().any(|prefix| target.starts_with(prefix));
        if !ours || *level > BUFFER_MIN_LEVEL {
            return;
        }

        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        let formatted = format!("[{}] {}: {}", level_str(level), target, message);

        LOG_BUFFER.with(|buf| {
            let mut buf = buf.borrow_mut();
            if buf.len() >= MAX_ENTRIES {
                buf.pop_front();
            }
            buf.push_back(formatted);
        });
    }
}

/// Visitor that extracts the message and fields from a tracing event.
struct MessageVisitor<'a>(&'a mut String);

impl MessageVisitor<'_> {
    fn separate(&mut self) {
        if !self.0.is_empty() {
            self.0.push_str(", ");
        }
    }
}

impl Visit for MessageVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.0, "{:?}", value);
        } else {
            self.separate();
            let _ = write!(self.0, "{}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0.push_str(value);
        } else {
            self.separate();
            let _ = write!(self.0, "{}={}", field.name(), value);
        }
    }
}

fn level_str(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARN",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

/// All captured entries, oldest first, one per line.
pub fn get_logs() -> String {
    LOG_BUFFER.with(|buf| {
        let buf = buf.borrow();
        buf.iter().cloned().collect::<Vec<_>>().join("\n")
    })
}

pub fn clear_logs() {
    LOG_BUFFER.with(|buf| buf.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_captures_our_targets_only() {
        clear_logs();
        let subscriber = tracing_subscriber::registry().with(LogCaptureLayer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(target: "tategaki::ce", failures = 2, "verify mismatch");
            tracing::debug!(target: "other_crate", "ignored");
            tracing::trace!(target: "tategaki::pipeline", "too verbose");
        });
        let logs = get_logs();
        assert_eq!(logs, "[DEBUG] tategaki::ce: verify mismatch, failures=2");
        clear_logs();
        assert!(get_logs().is_empty());
    }
}
