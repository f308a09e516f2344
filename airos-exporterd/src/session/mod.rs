pub mod cached;
pub mod factory;
pub mod ssh;

use std::time::Duration;
use async_trait::async_trait;
use shared::protocol::{AGGREGATE_COMMAND, PEERS_COMMAND, STATUS_COMMAND};
use shared::Store;
use crate::error::SessionError;

pub use cached::CachedSession;
pub use factory::{Connector, SessionFactory};

/// Raw command execution over an established, authenticated connection.
#[async_trait]
pub trait Transport: Send {
    /// Run `command` and return its stdout.
    async fn execute(&mut self, command: &str, timeout: Duration) -> Result<Vec<u8>, SessionError>;

    /// Close the connection. Errors are logged, not returned.
    async fn close(&mut self);
}

/// The remote queries a scrape needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryId {
    Status,
    Peers,
    Aggregate,
}

impl QueryId {
    /// Name used for the query in configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "status" => Some(QueryId::Status),
            "peers" => Some(QueryId::Peers),
            "aggregate" => Some(QueryId::Aggregate),
            _ => None,
        }
    }

    pub fn command(self) -> &'static str {
        match self {
            QueryId::Status => STATUS_COMMAND,
            QueryId::Peers => PEERS_COMMAND,
            QueryId::Aggregate => AGGREGATE_COMMAND,
        }
    }
}

/// One authenticated connection to a device.
pub struct RemoteSession<T> {
    host: String,
    transport: T,
    command_timeout: Duration,
}

impl<T: Transport> RemoteSession<T> {
    pub fn new(host: impl Into<String>, transport: T, command_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            transport,
            command_timeout,
        }
    }

    /// Run a query and decode its output.
    pub async fn query(&mut self, id: QueryId) -> Result<Store, SessionError> {
        let command = id.command();
        let raw = self.transport.execute(command, self.command_timeout).await?;
        tracing::debug!(host = %self.host, command, bytes = raw.len(), "query complete");
        match id {
            QueryId::Status | QueryId::Peers => decode_json(command, &raw),
            QueryId::Aggregate => decode_key_values(command, &raw),
        }
    }

    pub async fn close(mut self) {
        self.transport.close().await;
    }
}

/// Parse JSON output into a store.
pub fn decode_json(command: &str, raw: &[u8]) -> Result<Store, SessionError> {
    let value: serde_json::Value =
        serde_json::from_slice(raw).map_err(|e| SessionError::Malformed {
            command: command.to_string(),
            reason: e.to_string(),
        })?;
    Ok(Store::from_json(&value))
}

/// Parse `k=v` segments separated by any run of `\r`, `\n` or `,`.
/// Only the first `=` splits; the rest belongs to the value.
pub fn decode_key_values(command: &str, raw: &[u8]) -> Result<Store, SessionError> {
    let text = std::str::from_utf8(raw).map_err(|e| SessionError::Malformed {
        command: command.to_string(),
        reason: e.to_string(),
    })?;

    let pairs = text
        .trim()
        .split(['\r', '\n', ','])
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            segment.split_once('=').ok_or_else(|| SessionError::Malformed {
                command: command.to_string(),
                reason: format!("segment without '=': {segment:?}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Store::from_pairs(pairs))
}
