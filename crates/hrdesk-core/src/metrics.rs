//! Answer latency metrics with rolling averages.
//!
//! Each [`Assistant`](crate::assistant::Assistant) owns one
//! [`AssistantMetrics`]; surfaces read it through
//! [`snapshot`](AssistantMetrics::snapshot).
//!
//! ## Metrics Categories
//!
//! - **Stage timings**: question embedding, memory lookup, policy lookup,
//!   generation, and end-to-end cascade latency
//! - **Answer counters**: answers per [`AnswerSource`], failures
//! - **Ingestion**: chunks stored and time taken by the last run

use crate::cascade::AnswerSource;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Default window for rolling averages (5 minutes).
/// Questions arrive far less often than once per second, so a short window
/// would mostly report nothing.
const DEFAULT_WINDOW_SECS: u64 = 300;

/// Maximum samples to keep per metric (prevents unbounded growth).
const MAX_SAMPLES: usize = 1000;

#[derive(Clone, Debug)]
struct TimingSample {
    timestamp: Instant,
    duration_ms: f64,
}

/// Rolling statistics for a single metric.
#[derive(Debug, Default)]
struct MetricData {
    samples: VecDeque<TimingSample>,
    total_count: u64,
}

impl MetricData {
    fn record(&mut self, duration_ms: f64) {
        self.total_count += 1;
        self.samples.push_back(TimingSample {
            timestamp: Instant::now(),
            duration_ms,
        });
        while self.samples.len() > MAX_SAMPLES {
            self.samples.pop_front();
        }
    }

    /// Average over samples younger than `window`.
    fn rolling_avg(&self, window: Duration) -> Option<f64> {
        // checked_sub: the window may reach back before the process started
        let cutoff = Instant::now().checked_sub(window);

        let (sum, count) = self
            .samples
            .iter()
            .filter(|s| cutoff.map_or(true, |c| s.timestamp >= c))
            .fold((0.0, 0usize), |(sum, count), s| (sum + s.duration_ms, count + 1));

        if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        }
    }
}

/// Per-stage durations of one cascade run.
///
/// Stages that didn't run (policy lookup after a memory hit, etc.) are `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerTimings {
    pub embed: Option<Duration>,
    pub memory_lookup: Option<Duration>,
    pub policy_lookup: Option<Duration>,
    pub generation: Option<Duration>,
    pub total: Duration,
}

/// Point-in-time copy of the collected metrics.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MetricsSnapshot {
    pub embed_avg_ms: Option<f64>,
    pub memory_lookup_avg_ms: Option<f64>,
    pub policy_lookup_avg_ms: Option<f64>,
    pub generation_avg_ms: Option<f64>,
    pub total_avg_ms: Option<f64>,

    /// Answers served since startup, per source.
    pub memory_answers: u64,
    pub policy_answers: u64,
    pub fallback_answers: u64,
    pub failed_answers: u64,

    /// Chunks stored by the last ingestion run in this process.
    pub last_ingestion_chunks: Option<usize>,
    pub last_ingestion_ms: Option<f64>,
}

impl MetricsSnapshot {
    pub fn total_answers(&self) -> u64 {
        self.memory_answers + self.policy_answers + self.fallback_answers
    }
}

#[derive(Default)]
struct MetricsInner {
    embed: MetricData,
    memory_lookup: MetricData,
    policy_lookup: MetricData,
    generation: MetricData,
    total: MetricData,

    memory_answers: u64,
    policy_answers: u64,
    fallback_answers: u64,
    failed_answers: u64,

    last_ingestion: Option<(usize, f64)>,
}

/// Thread-safe collector; clones share the same data.
#[derive(Clone)]
pub struct AssistantMetrics {
    inner: Arc<RwLock<MetricsInner>>,
    window: Duration,
}

impl Default for AssistantMetrics {
    fn default() -> Self {
        Self::with_window(DEFAULT_WINDOW_SECS)
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

impl AssistantMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(window_secs: u64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MetricsInner::default())),
            window: Duration::from_secs(window_secs),
        }
    }

    /// Records a completed cascade run.
    pub fn record_answer(&self, source: AnswerSource, timings: &AnswerTimings) {
        if let Ok(mut inner) = self.inner.write() {
            if let Some(d) = timings.embed {
                inner.embed.record(millis(d));
            }
            if let Some(d) = timings.memory_lookup {
                inner.memory_lookup.record(millis(d));
            }
            if let Some(d) = timings.policy_lookup {
                inner.policy_lookup.record(millis(d));
            }
            if let Some(d) = timings.generation {
                inner.generation.record(millis(d));
            }
            inner.total.record(millis(timings.total));

            match source {
                AnswerSource::Memory => inner.memory_answers += 1,
                AnswerSource::Policy => inner.policy_answers += 1,
                AnswerSource::Fallback => inner.fallback_answers += 1,
            }
        }
    }

    /// Records a cascade run that ended in an error.
    pub fn record_failure(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.failed_answers += 1;
        }
    }

    pub fn record_ingestion(&self, chunks: usize, elapsed: Duration) {
        if let Ok(mut inner) = self.inner.write() {
            inner.last_ingestion = Some((chunks, millis(elapsed)));
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let Ok(inner) = self.inner.read() else {
            return MetricsSnapshot::default();
        };

        MetricsSnapshot {
            embed_avg_ms: inner.embed.rolling_avg(self.window),
            memory_lookup_avg_ms: inner.memory_lookup.rolling_avg(self.window),
            policy_lookup_avg_ms: inner.policy_lookup.rolling_avg(self.window),
            generation_avg_ms: inner.generation.rolling_avg(self.window),
            total_avg_ms: inner.total.rolling_avg(self.window),
            memory_answers: inner.memory_answers,
            policy_answers: inner.policy_answers,
            fallback_answers: inner.fallback_answers,
            failed_answers: inner.failed_answers,
            last_ingestion_chunks: inner.last_ingestion.map(|(chunks, _)| chunks),
            last_ingestion_ms: inner.last_ingestion.map(|(_, ms)| ms),
        }
    }

    /// Lifetime number of recorded cascade runs (successful ones).
    pub fn total_runs(&self) -> u64 {
        self.inner.read().map(|i| i.total.total_count).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let metrics = AssistantMetrics::new();
        let snapshot = metrics.snapshot();
        assert!(snapshot.total_avg_ms.is_none());
        assert_eq!(snapshot.total_answers(), 0);
    }

    #[test]
    fn test_memory_hit_skips_later_stages() {
        let metrics = AssistantMetrics::new();
        metrics.record_answer(
            AnswerSource::Memory,
            &AnswerTimings {
                embed: Some(Duration::from_millis(4)),
                memory_lookup: Some(Duration::from_millis(2)),
                total: Duration::from_millis(6),
                ..Default::default()
            },
        );
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.memory_answers, 1);
        assert!(snapshot.policy_lookup_avg_ms.is_none());
        assert!(snapshot.generation_avg_ms.is_none());
        assert!((snapshot.total_avg_ms.unwrap() - 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_rolling_average_and_counters() {
        let metrics = AssistantMetrics::new();
        for (source, ms) in [(AnswerSource::Policy, 10), (AnswerSource::Fallback, 30)] {
            metrics.record_answer(
                source,
                &AnswerTimings {
                    generation: Some(Duration::from_millis(ms)),
                    total: Duration::from_millis(ms),
                    ..Default::default()
                },
            );
        }
        metrics.record_failure();

        let snapshot = metrics.snapshot();
        assert!((snapshot.generation_avg_ms.unwrap() - 20.0).abs() < 1e-6);
        assert_eq!(snapshot.policy_answers, 1);
        assert_eq!(snapshot.fallback_answers, 1);
        assert_eq!(snapshot.failed_answers, 1);
        assert_eq!(metrics.total_runs(), 2);
    }

    #[test]
    fn test_clones_share_data() {
        let metrics = AssistantMetrics::new();
        let clone = metrics.clone();
        clone.record_ingestion(12, Duration::from_millis(250));
        assert_eq!(metrics.snapshot().last_ingestion_chunks, Some(12));
    }

    #[test]
    fn test_samples_bounded() {
        let mut data = MetricData::default();
        for i in 0..(MAX_SAMPLES + 10) {
            data.record(i as f64);
        }
        assert_eq!(data.samples.len(), MAX_SAMPLES);
        assert_eq!(data.total_count as usize, MAX_SAMPLES + 10);
    }
}
