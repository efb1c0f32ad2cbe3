//! Usage tracking for completed turns
//!
//! Keeps a bounded rolling window of per-turn usage statistics (oldest
//! evicted first) and mirrors every record into the `metrics` facade.
//!
//! # Metrics
//!
//! - `acervo_turns_total`: Counter of completed turns by model
//! - `acervo_turn_tokens`: Histogram of estimated tokens per turn
//! - `acervo_turn_latency_seconds`: Histogram of turn wall-clock latency
//! - `acervo_turn_errors_total`: Counter of failed turns by error kind

use chrono::Local;
use metrics::{histogram, increment_counter};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Number of statistics kept when nothing else is configured
pub const DEFAULT_USAGE_WINDOW: usize = 20;

/// Usage of one completed turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStat {
    /// Local completion time, `HH:MM:SS`
    pub label: String,
    /// Estimated tokens of the response
    pub tokens: usize,
    /// Wall-clock time from request start to stream exhaustion
    #[serde(with = "latency_millis")]
    pub latency: Duration,
    /// Model that served the turn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

mod latency_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}

impl UsageStat {
    /// A statistic labeled with the current local time
    ///
    /// # Examples
    ///
    /// ```
    /// use acervo::agent::usage::UsageStat;
    /// use std::time::Duration;
    ///
    /// let stat = UsageStat::now(12, Duration::from_millis(850));
    /// assert_eq!(stat.label.len(), 8);
    /// assert_eq!(stat.tokens, 12);
    /// ```
    pub fn now(tokens: usize, latency: Duration) -> Self {
        Self {
            label: Local::now().format("%H:%M:%S").to_string(),
            tokens,
            latency,
            model: None,
        }
    }

    /// Records the serving model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Rolling window of the most recent usage statistics
#[derive(Debug, Clone)]
pub struct UsageTracker {
    stats: VecDeque<UsageStat>,
    capacity: usize,
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new(DEFAULT_USAGE_WINDOW)
    }
}

impl UsageTracker {
    /// Creates a tracker keeping at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            stats: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a statistic, evicting the oldest beyond capacity
    pub fn record(&mut self, stat: UsageStat) {
        let model = stat.model.clone().unwrap_or_else(|| "unknown".to_string());

        increment_counter!("acervo_turns_total", "model" => model.clone());
        histogram!("acervo_turn_tokens", stat.tokens as f64, "model" => model.clone());
        histogram!(
            "acervo_turn_latency_seconds",
            stat.latency.as_secs_f64(),
            "model" => model
        );

        tracing::debug!(
            tokens = stat.tokens,
            latency_ms = stat.latency.as_millis() as u64,
            "Recorded turn usage"
        );

        self.stats.push_back(stat);
        while self.stats.len() > self.capacity {
            self.stats.pop_front();
        }
    }

    /// Current window, oldest first
    pub fn snapshot(&self) -> Vec<UsageStat> {
        self.stats.iter().cloned().collect()
    }

    /// Number of retained statistics
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Maximum retained statistics
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total estimated tokens in the window
    pub fn total_tokens(&self) -> usize {
        self.stats.iter().map(|s| s.tokens).sum()
    }

    /// Mean latency over the window
    pub fn average_latency(&self) -> Option<Duration> {
        if self.stats.is_empty() {
            return None;
        }
        let total: Duration = self.stats.iter().map(|s| s.latency).sum();
        Some(total / self.stats.len() as u32)
    }

    /// Drops every statistic
    pub fn clear(&mut self) {
        self.stats.clear();
    }
}

/// Counts a failed turn
pub fn record_turn_error(kind: &str) {
    increment_counter!("acervo_turn_errors_total", "kind" => kind.to_string());
}

/// Initializes the metrics exporter for Prometheus
///
/// A no-op unless built with the `prometheus` feature.
pub fn init_metrics_exporter() {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let _ = builder.install().map_err(|e| {
            tracing::warn!("Failed to install Prometheus exporter: {}", e);
        });
    }
}
