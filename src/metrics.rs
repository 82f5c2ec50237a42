//! Usage metrics.
//!
//! A small, self-contained registry: labeled counters for request, feedback,
//! and token accounting plus one latency histogram, rendered in the
//! Prometheus text exposition format for `GET /metrics`. Recording is
//! fire-and-forget and never fails a request.

use std::collections::HashMap;
use std::sync::RwLock;

/// Counter with a fixed label set. Values are `f64` so the same type covers
/// event counts and dollar amounts.
pub struct LabeledCounter {
    name: &'static str,
    help: &'static str,
    labels: &'static [&'static str],
    series: RwLock<HashMap<Vec<String>, f64>>,
}

impl LabeledCounter {
    fn new(name: &'static str, help: &'static str, labels: &'static [&'static str]) -> Self {
        Self {
            name,
            help,
            labels,
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Increments the series for `values` by 1.
    pub fn inc(&self, values: &[&str]) {
        self.inc_by(values, 1.0);
    }

    /// Increments the series for `values` by `amount`.
    pub fn inc_by(&self, values: &[&str], amount: f64) {
        debug_assert_eq!(values.len(), self.labels.len());
        let key: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        *self.series.write().unwrap().entry(key).or_insert(0.0) += amount;
    }

    /// Current value of one series; 0 if it has never been incremented.
    pub fn get(&self, values: &[&str]) -> f64 {
        let key: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        self.series.read().unwrap().get(&key).copied().unwrap_or(0.0)
    }

    fn render(&self, out: &mut String) {
        out.push_str(&format!("# HELP {} {}\n", self.name, self.help));
        out.push_str(&format!("# TYPE {} counter\n", self.name));
        let series = self.series.read().unwrap();
        let mut rows: Vec<(&Vec<String>, &f64)> = series.iter().collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        for (values, value) in rows {
            let labels = self
                .labels
                .iter()
                .zip(values.iter())
                .map(|(name, value)| format!("{}=\"{}\"", name, escape_label(value)))
                .collect::<Vec<_>>()
                .join(",");
            out.push_str(&format!("{}{{{}}} {}\n", self.name, labels, value));
        }
    }
}

/// Histogram with fixed bucket bounds. Bucket counts are cumulative, as the
/// exposition format expects.
pub struct Histogram {
    name: &'static str,
    help: &'static str,
    bounds: Vec<f64>,
    inner: RwLock<HistogramInner>,
}

struct HistogramInner {
    count: u64,
    sum: f64,
    buckets: Vec<u64>,
}

impl Histogram {
    fn new(name: &'static str, help: &'static str) -> Self {
        let bounds = vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
        let buckets = vec![0; bounds.len()];
        Self {
            name,
            help,
            bounds,
            inner: RwLock::new(HistogramInner {
                count: 0,
                sum: 0.0,
                buckets,
            }),
        }
    }

    /// Records one observation.
    pub fn observe(&self, value: f64) {
        let mut inner = self.inner.write().unwrap();
        inner.count += 1;
        inner.sum += value;
        for (i, bound) in self.bounds.iter().enumerate() {
            if value <= *bound {
                inner.buckets[i] += 1;
            }
        }
    }

    /// Number of observations so far.
    pub fn count(&self) -> u64 {
        self.inner.read().unwrap().count
    }

    fn render(&self, out: &mut String) {
        out.push_str(&format!("# HELP {} {}\n", self.name, self.help));
        out.push_str(&format!("# TYPE {} histogram\n", self.name));
        let inner = self.inner.read().unwrap();
        for (bound, count) in self.bounds.iter().zip(inner.buckets.iter()) {
            out.push_str(&format!(
                "{}_bucket{{le=\"{}\"}} {}\n",
                self.name, bound, count
            ));
        }
        out.push_str(&format!(
            "{}_bucket{{le=\"+Inf\"}} {}\n",
            self.name, inner.count
        ));
        out.push_str(&format!("{}_sum {}\n", self.name, inner.sum));
        out.push_str(&format!("{}_count {}\n", self.name, inner.count));
    }
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// The service's metric registry.
pub struct Metrics {
    /// `/ask-it` requests by caller.
    pub requests: LabeledCounter,
    /// 👍/👎 feedback tallies.
    pub helpful: LabeledCounter,
    /// Prompt/completion token usage by user and model.
    pub ai_tokens: LabeledCounter,
    /// Spend accounting by user and model.
    pub ai_cost_usd: LabeledCounter,
    /// End-to-end `/ask-it` latency.
    pub latency: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests: LabeledCounter::new(
                "askdesk_requests_total",
                "Total /ask-it requests",
                &["user", "channel"],
            ),
            helpful: LabeledCounter::new(
                "askdesk_helpful_total",
                "Feedback helpful true/false",
                &["helpful"],
            ),
            ai_tokens: LabeledCounter::new(
                "ai_tokens_total",
                "AI tokens by user and model",
                &["user", "model", "type"],
            ),
            ai_cost_usd: LabeledCounter::new(
                "ai_cost_usd_total",
                "AI USD cost by user and model",
                &["user", "model"],
            ),
            latency: Histogram::new("askdesk_latency_seconds", "Latency of /ask-it end-to-end"),
        }
    }

    /// Renders every metric in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.requests.render(&mut out);
        self.helpful.render(&mut out);
        self.ai_tokens.render(&mut out);
        self.ai_cost_usd.render(&mut out);
        self.latency.render(&mut out);
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
