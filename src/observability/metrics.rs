//! Metric registry and instruments.
//!
//! # Responsibilities
//! - Hold named counters, histograms and gauges
//! - Lazily create one series per label-value tuple
//! - Render a Prometheus-compatible text exposition snapshot
//!
//! # Metrics
//! Instruments are plain handles (`Clone`, `Arc` inside). Registering an
//! instrument stores a handle in the registry; observations made through any
//! clone are visible in the next snapshot.
//!
//! # Design Decisions
//! - Snapshot order is registration order, series order is first-observation order
//! - Label arity is checked on every observation and never truncated
//! - One mutex per instrument; nothing awaits while holding it

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;

use thiserror::Error;

/// Content type served alongside [`MetricRegistry::snapshot`].
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Errors raised by the registry and its instruments.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    #[error("metric `{0}` is already registered")]
    DuplicateName(String),

    #[error("metric `{metric}` expects {expected} label values, got {actual}")]
    LabelArity {
        metric: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid metric name `{0}`")]
    InvalidName(String),

    #[error("invalid label name `{label}` on metric `{metric}`")]
    InvalidLabelName { metric: String, label: String },

    #[error("histogram `{0}` buckets must be non-empty, finite and strictly ascending")]
    InvalidBuckets(String),
}

/// Instrument type as written in the `# TYPE` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Histogram,
    Gauge,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
            MetricKind::Gauge => "gauge",
        }
    }
}

#[derive(Debug)]
struct Descriptor {
    name: String,
    help: String,
    label_names: Vec<String>,
}

impl Descriptor {
    fn new(
        name: &str,
        help: &str,
        label_names: &[&str],
        kind: MetricKind,
    ) -> Result<Self, MetricsError> {
        if !is_valid_metric_name(name) {
            return Err(MetricsError::InvalidName(name.to_string()));
        }

        let mut seen = HashSet::new();
        for label in label_names {
            let reserved =
                label.starts_with("__") || (kind == MetricKind::Histogram && *label == "le");
            if reserved || !is_valid_label_name(label) || !seen.insert(*label) {
                return Err(MetricsError::InvalidLabelName {
                    metric: name.to_string(),
                    label: label.to_string(),
                });
            }
        }

        Ok(Self {
            name: name.to_string(),
            help: help.to_string(),
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
        })
    }

    fn check_arity(&self, values: &[&str]) -> Result<(), MetricsError> {
        if values.len() != self.label_names.len() {
            return Err(MetricsError::LabelArity {
                metric: self.name.clone(),
                expected: self.label_names.len(),
                actual: values.len(),
            });
        }
        Ok(())
    }

    fn write_header(&self, out: &mut String, kind: MetricKind) {
        let _ = writeln!(out, "# HELP {} {}", self.name, escape_help(&self.help));
        let _ = writeln!(out, "# TYPE {} {}", self.name, kind.as_str());
    }
}

/// Series keyed by label values, iterated in first-observation order.
#[derive(Debug)]
struct SeriesMap<V> {
    index: HashMap<Vec<String>, usize>,
    entries: Vec<(Vec<String>, V)>,
}

impl<V> SeriesMap<V> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn entry(&mut self, labels: &[&str], init: impl FnOnce() -> V) -> &mut V {
        let key: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        let position = match self.index.get(&key) {
            Some(&position) => position,
            None => {
                let position = self.entries.len();
                self.entries.push((key.clone(), init()));
                self.index.insert(key, position);
                position
            }
        };
        &mut self.entries[position].1
    }

    fn get(&self, labels: &[&str]) -> Option<&V> {
        let key: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        self.index.get(&key).map(|&position| &self.entries[position].1)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

/// Monotonic counter, one value per label tuple.
#[derive(Debug, Clone)]
pub struct Counter {
    inner: Arc<CounterInner>,
}

#[derive(Debug)]
struct CounterInner {
    desc: Descriptor,
    series: Mutex<SeriesMap<u64>>,
}

impl Counter {
    pub fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Self, MetricsError> {
        let desc = Descriptor::new(name, help, label_names, MetricKind::Counter)?;
        Ok(Self {
            inner: Arc::new(CounterInner {
                desc,
                series: Mutex::new(SeriesMap::new()),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.desc.name
    }

    /// Add 1 to the series for `labels`.
    pub fn inc(&self, labels: &[&str]) -> Result<(), MetricsError> {
        self.inc_by(labels, 1)
    }

    /// Add `delta` to the series for `labels`, creating it on first use.
    pub fn inc_by(&self, labels: &[&str], delta: u64) -> Result<(), MetricsError> {
        self.inner.desc.check_arity(labels)?;
        let mut series = lock(&self.inner.series);
        let value = series.entry(labels, || 0);
        *value = value.saturating_add(delta);
        Ok(())
    }

    /// Current value, `None` if the series was never observed.
    pub fn get(&self, labels: &[&str]) -> Option<u64> {
        lock(&self.inner.series).get(labels).copied()
    }

    pub fn series_count(&self) -> usize {
        lock(&self.inner.series).len()
    }

    fn render(&self, out: &mut String) {
        let desc = &self.inner.desc;
        desc.write_header(out, MetricKind::Counter);

        let series = lock(&self.inner.series);
        if series.entries.is_empty() && desc.label_names.is_empty() {
            write_sample(out, &desc.name, &desc.label_names, &[], None, "0");
        }
        for (values, value) in &series.entries {
            write_sample(out, &desc.name, &desc.label_names, values, None, &value.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Histogram with fixed bucket boundaries and an implicit `+Inf` bucket.
#[derive(Debug, Clone)]
pub struct Histogram {
    inner: Arc<HistogramInner>,
}

#[derive(Debug)]
struct HistogramInner {
    desc: Descriptor,
    buckets: Vec<f64>,
    series: Mutex<SeriesMap<HistogramSeries>>,
}

/// State of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSeries {
    /// Per-bucket counts, not cumulative. The last slot is `+Inf`.
    bucket_counts: Vec<u64>,
    sum: f64,
    count: u64,
}

impl HistogramSeries {
    fn new(bucket_len: usize) -> Self {
        Self {
            bucket_counts: vec![0; bucket_len + 1],
            sum: 0.0,
            count: 0,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Cumulative counts per boundary, ending with the `+Inf` bucket.
    pub fn cumulative(&self) -> Vec<u64> {
        self.bucket_counts
            .iter()
            .scan(0u64, |acc, n| {
                *acc += n;
                Some(*acc)
            })
            .collect()
    }
}

impl Histogram {
    pub fn new(
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: &[f64],
    ) -> Result<Self, MetricsError> {
        let desc = Descriptor::new(name, help, label_names, MetricKind::Histogram)?;
        let ascending = buckets.windows(2).all(|w| w[0] < w[1]);
        if buckets.is_empty() || !ascending || buckets.iter().any(|b| !b.is_finite()) {
            return Err(MetricsError::InvalidBuckets(name.to_string()));
        }

        Ok(Self {
            inner: Arc::new(HistogramInner {
                desc,
                buckets: buckets.to_vec(),
                series: Mutex::new(SeriesMap::new()),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.desc.name
    }

    /// Record `value` into the first bucket whose boundary is `>= value`.
    pub fn observe(&self, labels: &[&str], value: f64) -> Result<(), MetricsError> {
        self.inner.desc.check_arity(labels)?;
        let bucket_len = self.inner.buckets.len();
        let slot = self
            .inner
            .buckets
            .iter()
            .position(|boundary| value <= *boundary)
            .unwrap_or(bucket_len);

        let mut series = lock(&self.inner.series);
        let entry = series.entry(labels, || HistogramSeries::new(bucket_len));
        entry.bucket_counts[slot] += 1;
        entry.sum += value;
        entry.count += 1;
        Ok(())
    }

    /// Start timing; the elapsed seconds are observed when the timer is
    /// stopped or dropped.
    pub fn start_timer(&self, labels: &[&str]) -> HistogramTimer {
        HistogramTimer {
            histogram: self.clone(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            start: Instant::now(),
            observed: false,
        }
    }

    pub fn series(&self, labels: &[&str]) -> Option<HistogramSeries> {
        lock(&self.inner.series).get(labels).cloned()
    }

    fn render(&self, out: &mut String) {
        let desc = &self.inner.desc;
        desc.write_header(out, MetricKind::Histogram);

        let bucket_name = format!("{}_bucket", desc.name);
        let sum_name = format!("{}_sum", desc.name);
        let count_name = format!("{}_count", desc.name);

        let series = lock(&self.inner.series);
        for (values, state) in &series.entries {
            let cumulative = state.cumulative();
            let bounds = self
                .inner
                .buckets
                .iter()
                .map(|b| format_value(*b))
                .chain(std::iter::once("+Inf".to_string()));
            for (bound, count) in bounds.zip(cumulative) {
                write_sample(
                    out,
                    &bucket_name,
                    &desc.label_names,
                    values,
                    Some(("le", bound.as_str())),
                    &count.to_string(),
                );
            }
            write_sample(out, &sum_name, &desc.label_names, values, None, &format_value(state.sum));
            write_sample(out, &count_name, &desc.label_names, values, None, &state.count.to_string());
        }
    }
}

/// Guard returned by [`Histogram::start_timer`].
#[derive(Debug)]
pub struct HistogramTimer {
    histogram: Histogram,
    labels: Vec<String>,
    start: Instant,
    observed: bool,
}

impl HistogramTimer {
    /// Stop the timer and record the elapsed seconds.
    pub fn observe_duration(mut self) -> Result<f64, MetricsError> {
        self.observed = true;
        self.record()
    }

    fn record(&self) -> Result<f64, MetricsError> {
        let seconds = self.start.elapsed().as_secs_f64();
        let labels: Vec<&str> = self.labels.iter().map(String::as_str).collect();
        self.histogram.observe(&labels, seconds)?;
        Ok(seconds)
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        if self.observed {
            return;
        }
        self.observed = true;
        if let Err(e) = self.record() {
            tracing::warn!(metric = %self.histogram.name(), error = %e, "Dropped timer observation");
        }
    }
}

// ---------------------------------------------------------------------------
// Gauge
// ---------------------------------------------------------------------------

/// Gauge holding one scalar per label tuple.
#[derive(Debug, Clone)]
pub struct Gauge {
    inner: Arc<GaugeInner>,
}

#[derive(Debug)]
struct GaugeInner {
    desc: Descriptor,
    series: Mutex<SeriesMap<f64>>,
}

impl Gauge {
    pub fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Self, MetricsError> {
        let desc = Descriptor::new(name, help, label_names, MetricKind::Gauge)?;
        Ok(Self {
            inner: Arc::new(GaugeInner {
                desc,
                series: Mutex::new(SeriesMap::new()),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.desc.name
    }

    pub fn inc(&self, labels: &[&str]) -> Result<(), MetricsError> {
        self.add(labels, 1.0)
    }

    pub fn dec(&self, labels: &[&str]) -> Result<(), MetricsError> {
        self.add(labels, -1.0)
    }

    pub fn add(&self, labels: &[&str], delta: f64) -> Result<(), MetricsError> {
        self.inner.desc.check_arity(labels)?;
        *lock(&self.inner.series).entry(labels, || 0.0) += delta;
        Ok(())
    }

    pub fn set(&self, labels: &[&str], value: f64) -> Result<(), MetricsError> {
        self.inner.desc.check_arity(labels)?;
        *lock(&self.inner.series).entry(labels, || 0.0) = value;
        Ok(())
    }

    pub fn get(&self, labels: &[&str]) -> Option<f64> {
        lock(&self.inner.series).get(labels).copied()
    }

    fn render(&self, out: &mut String) {
        let desc = &self.inner.desc;
        desc.write_header(out, MetricKind::Gauge);

        let series = lock(&self.inner.series);
        if series.entries.is_empty() && desc.label_names.is_empty() {
            write_sample(out, &desc.name, &desc.label_names, &[], None, "0");
        }
        for (values, value) in &series.entries {
            write_sample(out, &desc.name, &desc.label_names, values, None, &format_value(*value));
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Any registrable instrument.
#[derive(Debug, Clone)]
pub enum Instrument {
    Counter(Counter),
    Histogram(Histogram),
    Gauge(Gauge),
}

impl Instrument {
    pub fn name(&self) -> &str {
        match self {
            Instrument::Counter(c) => c.name(),
            Instrument::Histogram(h) => h.name(),
            Instrument::Gauge(g) => g.name(),
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Instrument::Counter(c) => c.render(out),
            Instrument::Histogram(h) => h.render(out),
            Instrument::Gauge(g) => g.render(out),
        }
    }
}

impl From<Counter> for Instrument {
    fn from(counter: Counter) -> Self {
        Instrument::Counter(counter)
    }
}

impl From<Histogram> for Instrument {
    fn from(histogram: Histogram) -> Self {
        Instrument::Histogram(histogram)
    }
}

impl From<Gauge> for Instrument {
    fn from(gauge: Gauge) -> Self {
        Instrument::Gauge(gauge)
    }
}

/// Ordered collection of uniquely named instruments.
#[derive(Debug, Default)]
pub struct MetricRegistry {
    instruments: RwLock<Vec<Instrument>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instrument under its name. Fails if the name is taken.
    pub fn register(&self, instrument: impl Into<Instrument>) -> Result<(), MetricsError> {
        let instrument = instrument.into();
        let mut instruments = self
            .instruments
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if instruments.iter().any(|i| i.name() == instrument.name()) {
            return Err(MetricsError::DuplicateName(instrument.name().to_string()));
        }
        instruments.push(instrument);
        Ok(())
    }

    pub fn counter(&self, name: &str, help: &str, labels: &[&str]) -> Result<Counter, MetricsError> {
        let counter = Counter::new(name, help, labels)?;
        self.register(counter.clone())?;
        Ok(counter)
    }

    pub fn histogram(
        &self,
        name: &str,
        help: &str,
        labels: &[&str],
        buckets: &[f64],
    ) -> Result<Histogram, MetricsError> {
        let histogram = Histogram::new(name, help, labels, buckets)?;
        self.register(histogram.clone())?;
        Ok(histogram)
    }

    pub fn gauge(&self, name: &str, help: &str, labels: &[&str]) -> Result<Gauge, MetricsError> {
        let gauge = Gauge::new(name, help, labels)?;
        self.register(gauge.clone())?;
        Ok(gauge)
    }

    pub fn len(&self) -> usize {
        self.instruments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render every instrument in registration order.
    ///
    /// Output is byte-identical across calls when no observation happened in
    /// between.
    pub fn snapshot(&self) -> String {
        let instruments = self
            .instruments
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let mut out = String::new();
        for (i, instrument) in instruments.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            instrument.render(&mut out);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Exposition helpers
// ---------------------------------------------------------------------------

fn write_sample(
    out: &mut String,
    name: &str,
    label_names: &[String],
    label_values: &[String],
    extra: Option<(&str, &str)>,
    value: &str,
) {
    out.push_str(name);

    let has_labels = extra.is_some() || !label_names.is_empty();
    if has_labels {
        out.push('{');
        let mut first = true;
        let pairs = extra
            .into_iter()
            .chain(label_names.iter().map(String::as_str).zip(label_values.iter().map(String::as_str)));
        for (label, label_value) in pairs {
            if !first {
                out.push(',');
            }
            first = false;
            let _ = write!(out, "{}=\"{}\"", label, escape_label_value(label_value));
        }
        out.push('}');
    }

    let _ = writeln!(out, " {}", value);
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTTP_LABELS: [&str; 3] = ["method", "route", "status_code"];

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = MetricRegistry::new();
        registry.counter("requests_total", "Requests", &[]).unwrap();

        let err = registry.gauge("requests_total", "Again", &[]).unwrap_err();
        assert_eq!(err, MetricsError::DuplicateName("requests_total".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_label_arity_mismatch() {
        let counter = Counter::new("hits_total", "Hits", &HTTP_LABELS).unwrap();

        let err = counter.inc(&["GET", "/"]).unwrap_err();
        assert_eq!(
            err,
            MetricsError::LabelArity {
                metric: "hits_total".into(),
                expected: 3,
                actual: 2,
            }
        );
        assert_eq!(counter.series_count(), 0);
    }

    #[test]
    fn test_counter_counts_per_label_tuple() {
        let counter = Counter::new("hits_total", "Hits", &HTTP_LABELS).unwrap();
        for _ in 0..3 {
            counter.inc(&["GET", "/a", "200"]).unwrap();
        }
        counter.inc(&["POST", "/a", "201"]).unwrap();
        counter.inc_by(&["GET", "/a", "200"], 5).unwrap();

        assert_eq!(counter.get(&["GET", "/a", "200"]), Some(8));
        assert_eq!(counter.get(&["POST", "/a", "201"]), Some(1));
        assert_eq!(counter.get(&["GET", "/b", "200"]), None);
    }

    #[test]
    fn test_histogram_bucket_assignment() {
        let histogram = Histogram::new("latency_seconds", "Latency", &[], &[0.1, 0.5, 1.0]).unwrap();
        histogram.observe(&[], 0.1).unwrap(); // on the boundary
        histogram.observe(&[], 0.3).unwrap();
        histogram.observe(&[], 0.7).unwrap();
        histogram.observe(&[], 3.0).unwrap(); // +Inf only

        let series = histogram.series(&[]).unwrap();
        assert_eq!(series.cumulative(), vec![1, 2, 3, 4]);
        assert_eq!(series.count(), 4);
        assert!((series.sum() - 4.1).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_cumulative_is_monotonic() {
        let histogram = Histogram::new("d_seconds", "D", &["op"], &[0.001, 0.01, 0.1, 1.0]).unwrap();
        for i in 0..200 {
            histogram.observe(&["read"], (i as f64) * 0.0137).unwrap();
        }

        let series = histogram.series(&["read"]).unwrap();
        let cumulative = series.cumulative();
        assert!(cumulative.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*cumulative.last().unwrap(), series.count());
    }

    #[test]
    fn test_invalid_buckets() {
        assert!(matches!(
            Histogram::new("h", "H", &[], &[1.0, 0.5]),
            Err(MetricsError::InvalidBuckets(_))
        ));
        assert!(matches!(
            Histogram::new("h", "H", &[], &[]),
            Err(MetricsError::InvalidBuckets(_))
        ));
        assert!(matches!(
            Histogram::new("h", "H", &[], &[0.1, f64::INFINITY]),
            Err(MetricsError::InvalidBuckets(_))
        ));
    }

    #[test]
    fn test_invalid_names() {
        assert!(matches!(
            Counter::new("1bad", "x", &[]),
            Err(MetricsError::InvalidName(_))
        ));
        assert!(matches!(
            Histogram::new("h", "x", &["le"], &[1.0]),
            Err(MetricsError::InvalidLabelName { .. })
        ));
        assert!(matches!(
            Gauge::new("g", "x", &["a", "a"]),
            Err(MetricsError::InvalidLabelName { .. })
        ));
    }

    #[test]
    fn test_gauge_operations() {
        let gauge = Gauge::new("active", "Active", &[]).unwrap();
        gauge.inc(&[]).unwrap();
        gauge.inc(&[]).unwrap();
        gauge.dec(&[]).unwrap();
        assert_eq!(gauge.get(&[]), Some(1.0));

        gauge.set(&[], 42.5).unwrap();
        assert_eq!(gauge.get(&[]), Some(42.5));
        assert!(gauge.inc(&["extra"]).is_err());
    }

    #[test]
    fn test_snapshot_format_and_order() {
        let registry = MetricRegistry::new();
        let requests = registry
            .counter("http_requests_total", "Total number of HTTP requests", &HTTP_LABELS)
            .unwrap();
        let active = registry
            .gauge("http_active_connections", "Number of active HTTP connections", &[])
            .unwrap();
        let duration = registry
            .histogram("req_seconds", "Request duration", &["method"], &[0.5, 1.0])
            .unwrap();

        requests.inc(&["POST", "/b", "201"]).unwrap();
        requests.inc(&["GET", "/a", "200"]).unwrap();
        active.inc(&[]).unwrap();
        duration.observe(&["GET"], 0.75).unwrap();

        let expected = "\
# HELP http_requests_total Total number of HTTP requests
# TYPE http_requests_total counter
http_requests_total{method=\"POST\",route=\"/b\",status_code=\"201\"} 1
http_requests_total{method=\"GET\",route=\"/a\",status_code=\"200\"} 1

# HELP http_active_connections Number of active HTTP connections
# TYPE http_active_connections gauge
http_active_connections 1

# HELP req_seconds Request duration
# TYPE req_seconds histogram
req_seconds_bucket{le=\"0.5\",method=\"GET\"} 0
req_seconds_bucket{le=\"1\",method=\"GET\"} 1
req_seconds_bucket{le=\"+Inf\",method=\"GET\"} 1
req_seconds_sum{method=\"GET\"} 0.75
req_seconds_count{method=\"GET\"} 1
";
        assert_eq!(registry.snapshot(), expected);
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let registry = MetricRegistry::new();
        let counter = registry.counter("c_total", "C", &["k"]).unwrap();
        counter.inc(&["x"]).unwrap();
        counter.inc(&["y"]).unwrap();

        let first = registry.snapshot();
        let second = registry.snapshot();
        assert_eq!(first, second);

        counter.inc(&["x"]).unwrap();
        assert_ne!(registry.snapshot(), first);
    }

    #[test]
    fn test_unlabelled_instruments_render_zero() {
        let registry = MetricRegistry::new();
        registry.counter("created_total", "Created", &[]).unwrap();
        registry.counter("by_endpoint_total", "By endpoint", &["endpoint"]).unwrap();

        let snapshot = registry.snapshot();
        assert!(snapshot.contains("\ncreated_total 0\n"));
        assert!(!snapshot.contains("by_endpoint_total{"));
    }

    #[test]
    fn test_label_values_are_escaped() {
        let registry = MetricRegistry::new();
        let counter = registry.counter("paths_total", "Paths", &["path"]).unwrap();
        counter.inc(&["/a\"b\\c\nd"]).unwrap();

        assert!(registry
            .snapshot()
            .contains("paths_total{path=\"/a\\\"b\\\\c\\nd\"} 1"));
    }

    #[test]
    fn test_timer_observes_once() {
        let histogram = Histogram::new("op_seconds", "Op", &["op"], &[0.001, 1.0]).unwrap();

        let timer = histogram.start_timer(&["read"]);
        let elapsed = timer.observe_duration().unwrap();
        assert!(elapsed >= 0.0);

        {
            let _timer = histogram.start_timer(&["read"]);
        }

        assert_eq!(histogram.series(&["read"]).unwrap().count(), 2);
    }
}
