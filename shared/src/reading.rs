use std::collections::BTreeMap;

/// Prometheus metric type of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// Which exposition block a reading belongs to.
/// Device readings share one block; each peer gets its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Device,
    /// Position of the peer in the station list. MACs can repeat or be
    /// missing, positions cannot.
    Peer(usize),
}

/// One sample produced by a scrape. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricReading {
    /// Metric name, e.g. "airos_signal_dbm"
    pub name: String,

    /// HELP text
    pub help: String,

    /// Label name to label value
    pub labels: BTreeMap<String, String>,

    pub value: f64,

    pub kind: MetricKind,

    pub scope: Scope,
}

impl MetricReading {
    pub fn gauge(
        name: impl Into<String>,
        help: impl Into<String>,
        labels: BTreeMap<String, String>,
        value: f64,
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            labels,
            value,
            kind: MetricKind::Gauge,
            scope: Scope::Device,
        }
    }

    pub fn counter(
        name: impl Into<String>,
        help: impl Into<String>,
        labels: BTreeMap<String, String>,
        value: f64,
    ) -> Self {
        Self {
            kind: MetricKind::Counter,
            ..Self::gauge(name, help, labels, value)
        }
    }

    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }
}
