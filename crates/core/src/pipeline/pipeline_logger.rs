use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-stage instrumentation for the detection loop.
///
/// Keeps timing collection out of the loop body so callers choose whether
/// to report (periodic log summary) or stay silent (tests, one-shot runs).
pub trait PipelineLogger: Send {
    /// Record how long a named stage took in one cycle.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces per cycle).
    fn metric(&mut self, name: &str, value: f64);

    /// Mark the end of one detection cycle.
    fn cycle_complete(&mut self);

    /// Emit whatever has been collected so far. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn cycle_complete(&mut self) {}
}

/// Collects stage timings and metrics and logs a summary every `interval`,
/// then starts a new window.
pub struct PeriodicPipelineLogger {
    interval: Duration,
    window_start: Instant,
    cycles: usize,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
}

impl PeriodicPipelineLogger {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_start: Instant::now(),
            cycles: 0,
            timings: HashMap::new(),
            metrics: HashMap::new(),
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.window_start.elapsed().as_secs_f64() * 1000.0;
        let cycles = self.cycles;
        let mut lines = Vec::new();

        lines.push(format!(
            "Detection summary ({cycles} cycles, {:.1}s):",
            elapsed_ms / 1000.0
        ));

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = if durations.is_empty() {
                0.0
            } else {
                total_ms / durations.len() as f64
            };
            let max_ms = durations.iter().copied().fold(0.0, f64::max);
            lines.push(format!(
                "  {stage:8}: avg {avg_ms:6.1}ms  max {max_ms:6.1}ms"
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            let values = &self.metrics[name];
            let avg = if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            };
            lines.push(format!("  {name}: avg {avg:.1}"));
        }

        if cycles > 0 && elapsed_ms > 0.0 {
            let rate = cycles as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {rate:.1} cycles/s"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    fn reset_window(&mut self) {
        self.window_start = Instant::now();
        self.cycles = 0;
        self.timings.clear();
        self.metrics.clear();
    }
}

impl Default for PeriodicPipelineLogger {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl PipelineLogger for PeriodicPipelineLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn cycle_complete(&mut self) {
        self.cycles += 1;
        if self.window_start.elapsed() >= self.interval {
            self.summary();
            self.reset_window();
        }
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullPipelineLogger;
        logger.timing("detect", 5.0);
        logger.metric("faces", 3.0);
        logger.cycle_complete();
        logger.summary();
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = PeriodicPipelineLogger::new(Duration::from_secs(3600));
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("encode", 5.0);

        let detect = logger.timings_for("detect").unwrap();
        assert_eq!(detect.len(), 2);
        assert!((detect[1] - 30.0).abs() < f64::EPSILON);
        assert_eq!(logger.timings_for("encode").unwrap().len(), 1);
    }

    #[test]
    fn test_summary_includes_stages_and_metrics() {
        let mut logger = PeriodicPipelineLogger::new(Duration::from_secs(3600));
        logger.timing("detect", 20.0);
        logger.timing("detect", 40.0);
        logger.metric("faces", 3.0);
        logger.metric("faces", 4.0);
        logger.cycle_complete();

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Detection summary (1 cycles"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("max   40.0ms"));
        assert!(summary.contains("faces: avg 3.5"));
        assert!(summary.contains("cycles/s"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        let logger = PeriodicPipelineLogger::default();
        assert!(logger.summary_string().is_none());
    }

    #[test]
    fn test_window_resets_after_interval() {
        let mut logger = PeriodicPipelineLogger::new(Duration::ZERO);
        logger.timing("detect", 10.0);
        logger.cycle_complete();

        assert!(logger.timings_for("detect").is_none());
        assert_eq!(logger.cycles, 0);
    }

    #[test]
    fn test_window_accumulates_before_interval() {
        let mut logger = PeriodicPipelineLogger::new(Duration::from_secs(3600));
        for _ in 0..3 {
            logger.timing("track", 1.0);
            logger.cycle_complete();
        }
        assert_eq!(logger.cycles, 3);
        assert_eq!(logger.timings_for("track").unwrap().len(), 3);
    }
}
