//! Telemetry and logging infrastructure
//!
//! Provides structured logging with tracing and tick timing statistics.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogGuard};
pub use metrics::{EffectMetrics, FrameProfiler, FrameStats};
