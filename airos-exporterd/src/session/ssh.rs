use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use tokio::time::timeout;
use crate::config::DeviceConfig;
use crate::error::SessionError;
use super::{Connector, Transport};

/// Accepts whatever host key the device presents; radios are addressed by IP
/// and regenerate keys on reflash.
struct DeviceHandler {
    host: String,
}

#[async_trait]
impl client::Handler for DeviceHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        tracing::debug!(
            host = %self.host,
            fingerprint = %server_public_key.fingerprint(),
            "accepting host key"
        );
        Ok(true)
    }
}

/// Password-authenticated SSH connections to airOS devices.
pub struct SshConnector {
    device: Arc<DeviceConfig>,
    ssh: Arc<client::Config>,
}

impl SshConnector {
    pub fn new(device: Arc<DeviceConfig>) -> Self {
        let ssh = Arc::new(client::Config {
            inactivity_timeout: Some(device.command_timeout() + device.connect_timeout()),
            ..Default::default()
        });
        Self { device, ssh }
    }
}

fn transport_error(context: &str, err: impl std::fmt::Display) -> SessionError {
    SessionError::Transport(format!("{context}: {err}"))
}

#[async_trait]
impl Connector for SshConnector {
    type Transport = SshTransport;

    async fn connect(&self, host: &str) -> Result<SshTransport, SessionError> {
        let limit = self.device.connect_timeout();
        let handler = DeviceHandler { host: host.to_string() };

        let mut handle = timeout(
            limit,
            client::connect(self.ssh.clone(), (host, self.device.ssh_port), handler),
        )
        .await
        .map_err(|_| transport_error("connect", format!("timed out after {limit:?}")))?
        .map_err(|e| transport_error("connect", e))?;

        let authenticated = timeout(
            limit,
            handle.authenticate_password(self.device.username.as_str(), self.device.password.as_str()),
        )
        .await
        .map_err(|_| transport_error("authenticate", format!("timed out after {limit:?}")))?
        .map_err(|e| transport_error("authenticate", e))?;

        if !authenticated {
            return Err(SessionError::Authentication {
                host: host.to_string(),
            });
        }

        tracing::debug!(host, user = %self.device.username, "ssh session established");
        Ok(SshTransport {
            host: host.to_string(),
            handle,
        })
    }
}

/// An authenticated SSH connection. Dropping it closes the connection.
pub struct SshTransport {
    host: String,
    handle: Handle<DeviceHandler>,
}

impl SshTransport {
    async fn run(&mut self, command: &str) -> Result<Vec<u8>, SessionError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| transport_error("open channel", e))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| transport_error("exec", e))?;

        let mut stdout = Vec::new();
        let mut exit_status = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                _ => {}
            }
        }

        if let Some(status) = exit_status.filter(|status| *status != 0) {
            tracing::debug!(host = %self.host, command, status, "command exited non-zero");
        }
        Ok(stdout)
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn execute(&mut self, command: &str, limit: Duration) -> Result<Vec<u8>, SessionError> {
        timeout(limit, self.run(command))
            .await
            .map_err(|_| transport_error(command, format!("timed out after {limit:?}")))?
    }

    async fn close(&mut self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            tracing::debug!(host = %self.host, "disconnect failed: {}", e);
        }
    }
}
