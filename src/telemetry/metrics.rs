//! Performance metrics and tick timing
//!
//! Provides tick timing statistics and the compositor metrics snapshot.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Tick timing statistics
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    /// Average tick time in milliseconds
    pub avg_ms: f64,
    /// Minimum tick time in milliseconds
    pub min_ms: f64,
    /// Maximum tick time in milliseconds
    pub max_ms: f64,
    /// 50th percentile (median) tick time
    pub p50_ms: f64,
    /// 95th percentile tick time
    pub p95_ms: f64,
    /// 99th percentile tick time
    pub p99_ms: f64,
    /// Number of samples in the statistics
    pub sample_count: usize,
}

/// Rolling profiler for per-tick work
///
/// Keeps the last `max_samples` tick durations (5 seconds at 60fps by
/// default) and the tick start times for rate calculation.
pub struct FrameProfiler {
    /// Tick durations
    frame_times: VecDeque<Duration>,
    /// Maximum samples to keep
    max_samples: usize,
    /// Start of the tick in progress
    current_start: Option<Instant>,
    /// Tick start times for rate calculation
    frame_starts: VecDeque<Instant>,
}

impl Default for FrameProfiler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameProfiler {
    /// Create a new profiler with the default window
    pub fn new() -> Self {
        Self::with_capacity(300)
    }

    /// Create a profiler keeping at most `max_samples` samples
    pub fn with_capacity(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            frame_times: VecDeque::with_capacity(max_samples),
            max_samples,
            current_start: None,
            frame_starts: VecDeque::with_capacity(max_samples),
        }
    }

    /// Mark the beginning of a tick
    pub fn begin_frame(&mut self) {
        let now = Instant::now();
        self.current_start = Some(now);

        self.frame_starts.push_back(now);
        if self.frame_starts.len() > self.max_samples {
            self.frame_starts.pop_front();
        }
    }

    /// Mark the end of the tick started by `begin_frame`
    ///
    /// Returns the recorded duration, None if no tick was in progress.
    pub fn end_frame(&mut self) -> Option<Duration> {
        let start = self.current_start.take()?;
        let duration = start.elapsed();
        self.record(duration);
        Some(duration)
    }

    /// Record a tick duration measured elsewhere
    pub fn record(&mut self, duration: Duration) {
        self.frame_times.push_back(duration);
        if self.frame_times.len() > self.max_samples {
            self.frame_times.pop_front();
        }
    }

    /// Get tick timing statistics
    pub fn stats(&self) -> FrameStats {
        if self.frame_times.is_empty() {
            return FrameStats::default();
        }

        let mut times: Vec<f64> = self
            .frame_times
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();
        times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let sum: f64 = times.iter().sum();
        let count = times.len() as f64;

        FrameStats {
            avg_ms: sum / count,
            min_ms: times.first().copied().unwrap_or(0.0),
            max_ms: times.last().copied().unwrap_or(0.0),
            p50_ms: percentile(&times, 0.50),
            p95_ms: percentile(&times, 0.95),
            p99_ms: percentile(&times, 0.99),
            sample_count: times.len(),
        }
    }

    /// Tick rate from tick start times
    pub fn fps(&self) -> f64 {
        let (Some(first), Some(last)) = (self.frame_starts.front(), self.frame_starts.back()) else {
            return 0.0;
        };
        let duration = last.duration_since(*first).as_secs_f64();

        if duration > 0.0 {
            (self.frame_starts.len() - 1) as f64 / duration
        } else {
            0.0
        }
    }

    /// Get the last tick time in milliseconds
    pub fn last_frame_time_ms(&self) -> f64 {
        self.frame_times
            .back()
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

/// Calculate percentile from sorted array
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p) as usize;
    sorted[idx]
}

/// Compositor metrics snapshot
#[derive(Debug, Clone, Default)]
pub struct EffectMetrics {
    /// Tick timing statistics
    pub frame_stats: FrameStats,
    /// Current tick rate
    pub fps: f64,
    /// Target frame rate from settings
    pub target_fps: u32,
    /// Ticks completed
    pub frame_count: u64,
    /// Configured passes
    pub pass_count: usize,
    /// Passes not bypassed
    pub active_pass_count: usize,
}

impl EffectMetrics {
    /// Share of the frame budget used by the average tick
    pub fn budget_usage(&self) -> f64 {
        if self.target_fps == 0 {
            return 0.0;
        }
        let budget_ms = 1000.0 / self.target_fps as f64;
        self.frame_stats.avg_ms / budget_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_profiler() {
        let mut profiler = FrameProfiler::new();

        for _ in 0..5 {
            profiler.begin_frame();
            std::thread::sleep(Duration::from_millis(2));
            assert!(profiler.end_frame().is_some());
        }

        let stats = profiler.stats();
        assert!(stats.avg_ms > 0.0);
        assert_eq!(stats.sample_count, 5);
        assert!(profiler.fps() > 0.0);
    }

    #[test]
    fn test_end_without_begin() {
        let mut profiler = FrameProfiler::new();
        assert_eq!(profiler.end_frame(), None);
        assert_eq!(profiler.stats().sample_count, 0);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut profiler = FrameProfiler::with_capacity(3);
        for ms in [1, 2, 3, 4] {
            profiler.record(Duration::from_millis(ms));
        }
        let stats = profiler.stats();
        assert_eq!(stats.sample_count, 3);
        assert_eq!(stats.min_ms, 2.0);
        assert_eq!(stats.max_ms, 4.0);
        assert_eq!(profiler.last_frame_time_ms(), 4.0);
    }

    #[test]
    fn test_percentile() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(percentile(&values, 0.5), 5.0); // Median
        assert_eq!(percentile(&values, 0.0), 1.0); // Min
        assert_eq!(percentile(&values, 1.0), 10.0); // Max
    }

    #[test]
    fn test_budget_usage() {
        let metrics = EffectMetrics {
            frame_stats: FrameStats {
                avg_ms: 8.0,
                ..Default::default()
            },
            target_fps: 50,
            ..Default::default()
        };
        assert!((metrics.budget_usage() - 0.4).abs() < 1e-9);
        assert_eq!(EffectMetrics::default().budget_usage(), 0.0);
    }
}
