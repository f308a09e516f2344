pub mod device;
pub mod fields;
pub mod peer;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use shared::protocol::ERROR_METRIC;
use shared::{MetricReading, Scope};
use crate::cache::{Clock, SystemClock};
use crate::config::{Config, DeviceConfig};
use crate::error::ScrapeError;
use crate::session::{CachedSession, Connector, RemoteSession, SessionFactory, Transport};

const ERROR_HELP: &str = "1 if the last scrape of this target failed";

/// Readings that share a label set and scope.
pub struct Readings {
    labels: BTreeMap<String, String>,
    scope: Scope,
    readings: Vec<MetricReading>,
}

impl Readings {
    pub fn new(labels: BTreeMap<String, String>, scope: Scope) -> Self {
        Self {
            labels,
            scope,
            readings: Vec::new(),
        }
    }

    pub fn gauge(&mut self, name: &str, help: &str, value: f64) {
        let reading = MetricReading::gauge(name, help, self.labels.clone(), value)
            .in_scope(self.scope.clone());
        self.readings.push(reading);
    }

    /// Counters start from zero every scrape, so the value is the device's
    /// absolute total.
    pub fn counter(&mut self, name: &str, help: &str, total: f64) {
        let reading = MetricReading::counter(name, help, self.labels.clone(), total)
            .in_scope(self.scope.clone());
        self.readings.push(reading);
    }

    pub fn into_vec(self) -> Vec<MetricReading> {
        self.readings
    }
}

/// What the HTTP layer needs: readings for one target, never an error.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn collect(&self, target: &str) -> Vec<MetricReading>;
}

/// Connects to a target, derives its readings, and folds every failure into
/// the error-indicator reading.
pub struct Collector<C> {
    factory: SessionFactory<C>,
    device: Arc<DeviceConfig>,
    scrape_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl<C: Connector> Collector<C> {
    pub fn new(connector: C, config: &Config) -> Self {
        Self {
            factory: SessionFactory::new(connector, config.retry.policy()),
            device: Arc::new(config.device.clone()),
            scrape_timeout: config.server.scrape_timeout(),
            clock: Arc::new(SystemClock),
        }
    }

    async fn scrape(&self, target: &str) -> Result<Vec<MetricReading>, ScrapeError> {
        let transport = self.factory.connect(target).await?;
        let remote = RemoteSession::new(target, transport, self.device.command_timeout());
        let mut session = self
            .device
            .cache_ttl_overrides()
            .fold(
                CachedSession::new(remote, self.device.cache_ttl(), self.clock.clone()),
                |session, (id, ttl)| session.with_ttl(id, ttl),
            );

        let result = derive(&mut session).await;
        session.close().await;
        result
    }
}

#[async_trait]
impl<C: Connector> Scraper for Collector<C> {
    async fn collect(&self, target: &str) -> Vec<MetricReading> {
        let outcome = tokio::time::timeout(self.scrape_timeout, self.scrape(target))
            .await
            .unwrap_or(Err(ScrapeError::Timeout(self.scrape_timeout)));

        match outcome {
            Ok(readings) => {
                tracing::debug!(host = %target, readings = readings.len(), "scrape complete");
                readings
            }
            Err(err) => {
                tracing::warn!(host = %target, "scrape failed: {}", err);
                vec![error_reading(&err)]
            }
        }
    }
}

/// The single reading reported for a failed scrape.
pub fn error_reading(err: &ScrapeError) -> MetricReading {
    let labels = BTreeMap::from([("error".to_string(), err.to_string())]);
    MetricReading::gauge(ERROR_METRIC, ERROR_HELP, labels, 1.0)
}

/// All readings for one connected device: device block, one block per peer,
/// then the success indicator.
pub async fn derive<T: Transport>(
    session: &mut CachedSession<T>,
) -> Result<Vec<MetricReading>, ScrapeError> {
    let aggregate = session.aggregate().await?;
    let status = session.status().await?;
    let peers = session.peers().await?;

    let labels = device::device_labels(&aggregate);
    let mut out = Readings::new(labels.clone(), Scope::Device);
    device::derive(&aggregate, &status, &peers, &mut out)?;
    let mut readings = out.into_vec();

    // Peer fan-out reads through the cache again; within the TTL these are
    // the snapshots taken above.
    let peers = session.peers().await?;
    let aggregate = session.aggregate().await?;
    let device_uptime = fields::integer(&*aggregate, "uptime")?;
    for (position, (_, peer)) in peers.iter().enumerate() {
        readings.extend(peer::derive(position, &peer, &labels, device_uptime)?.into_vec());
    }

    readings.push(MetricReading::gauge(ERROR_METRIC, ERROR_HELP, labels, 0.0));
    Ok(readings)
}
