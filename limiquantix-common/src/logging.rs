//! # Quantix Control Plane Logging
//!
//! Structured, emoji-accented logging shared by the control plane and its
//! test harnesses: console initialization, message macros for lifecycle
//! milestones, and a timer for node-agent RPCs.

use anyhow::Result;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

// ============================================================================
// Logging Macros
// ============================================================================

/// Log a successful operation
#[macro_export]
macro_rules! log_success {
    ($component:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, status = "success", "✅ {}", format!($($arg)*))
    };
}

/// Log an error with context
#[macro_export]
macro_rules! log_error {
    ($component:expr, $err:expr, $($arg:tt)*) => {
        tracing::error!(
            component = $component,
            error = %$err,
            "❌ {} | Error: {}",
            format!($($arg)*),
            $err
        )
    };
}

/// Log a warning
#[macro_export]
macro_rules! log_warn {
    ($component:expr, $($arg:tt)*) => {
        tracing::warn!(component = $component, "⚠️ {}", format!($($arg)*))
    };
}

/// Log VM lifecycle event
#[macro_export]
macro_rules! log_vm {
    ($action:expr, $vm_id:expr, $($arg:tt)*) => {
        tracing::info!(
            component = "vm",
            vm_id = $vm_id,
            action = $action,
            "🖥️ [{}] {} | {}",
            $action.to_uppercase(),
            $vm_id,
            format!($($arg)*)
        )
    };
}

// ============================================================================
// Timed Operation Helper
// ============================================================================

/// Times a remote operation and logs how it ended.
///
/// Wrap a node-agent RPC in one of these, then finish it with
/// [`success`](TimedOperation::success) or
/// [`failure`](TimedOperation::failure); dropping it unfinished logs a
/// warning so lost outcomes are visible.
pub struct TimedOperation {
    operation: String,
    start: std::time::Instant,
}

impl TimedOperation {
    pub fn new(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        tracing::debug!("⏱️ Starting: {}", operation);
        Self {
            operation,
            start: std::time::Instant::now(),
        }
    }

    pub fn success(self) {
        let ms = self.start.elapsed().as_millis();
        let emoji = if ms < 100 {
            "⚡"
        } else if ms < 1000 {
            "✅"
        } else {
            "⚠️"
        };
        tracing::info!(
            component = "perf",
            operation = %self.operation,
            duration_ms = %ms,
            "{} {} completed in {}ms",
            emoji,
            self.operation,
            ms
        );
        std::mem::forget(self); // Don't run Drop
    }

    pub fn failure(self, error: &str) {
        let ms = self.start.elapsed().as_millis();
        tracing::error!(
            component = "perf",
            operation = %self.operation,
            duration_ms = %ms,
            error = error,
            "❌ {} failed after {}ms: {}",
            self.operation,
            ms,
            error
        );
        std::mem::forget(self); // Don't run Drop
    }
}

impl Drop for TimedOperation {
    fn drop(&mut self) {
        let ms = self.start.elapsed().as_millis();
        tracing::warn!(
            component = "perf",
            operation = %self.operation,
            duration_ms = %ms,
            "⚠️ {} ended without explicit success/failure after {}ms",
            self.operation,
            ms
        );
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize logging with colorful console output.
///
/// # Example
/// ```
/// limiquantix_common::init_logging("info").unwrap();
/// ```
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
                .with_span_events(FmtSpan::CLOSE),
        )
        .init();

    tracing::info!("🌅 ═══════════════════════════════════════════════════════════");
    tracing::info!("🌅  QUANTIX CONTROL PLANE STARTING");
    tracing::info!("🌅  Log Level: {}", level);
    tracing::info!("🌅 ═══════════════════════════════════════════════════════════");

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_operation() {
        // Just ensure it compiles and doesn't panic
        let op = TimedOperation::new("test_operation");
        op.success();
    }

    #[test]
    fn test_timed_operation_failure() {
        let op = TimedOperation::new("test_operation");
        op.failure("remote refused");
    }
}
