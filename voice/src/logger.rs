//! Logging collaborator.
//!
//! Library components never log through a global. The router, each stream
//! task, the transcoder and the player hold an `Arc<dyn Logger>` handed to
//! them at construction; by default it forwards to `tracing` tagged with
//! the component name.

use std::sync::Arc;

/// Sink for the log lines of one component.
pub trait Logger: Send + Sync {
    fn error(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn info(&self, msg: &str);
    fn debug(&self, msg: &str);
}

/// Returns a logger that emits `tracing` events carrying a `component`
/// field, e.g. `component="router"`.
pub fn component_logger(component: &'static str) -> Arc<dyn Logger> {
    Arc::new(TracingLogger { component })
}

struct TracingLogger {
    component: &'static str,
}

impl Logger for TracingLogger {
    fn error(&self, msg: &str) {
        tracing::error!(component = self.component, "{}", msg);
    }

    fn warn(&self, msg: &str) {
        tracing::warn!(component = self.component, "{}", msg);
    }

    fn info(&self, msg: &str) {
        tracing::info!(component = self.component, "{}", msg);
    }

    fn debug(&self, msg: &str) {
        tracing::debug!(component = self.component, "{}", msg);
    }
}

/// Discards everything. For embedders that route diagnostics elsewhere.
pub struct NopLogger;

impl Logger for NopLogger {
    fn error(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
    fn info(&self, _msg: &str) {}
    fn debug(&self, _msg: &str) {}
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.error(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
    };
}
