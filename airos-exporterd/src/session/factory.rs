use std::time::Duration;
use async_trait::async_trait;
use crate::config::{RetryConfig, RetryStrategy};
use crate::error::SessionError;
use super::Transport;

/// Opens one authenticated connection to a host, no retries.
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    async fn connect(&self, host: &str) -> Result<Self::Transport, SessionError>;
}

/// Decides how many connection attempts to make and how long to wait between
/// them.
pub trait RetryPolicy: Send + Sync {
    /// Total attempts, including the final one whose failure propagates.
    fn max_attempts(&self) -> u32;

    /// Wait after failed attempt number `attempt` (1-based).
    fn delay(&self, attempt: u32) -> Duration;

    fn is_retryable(&self, err: &SessionError) -> bool {
        err.is_retryable()
    }
}

/// Same wait between every attempt.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy for FixedDelay {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Doubling wait, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub max_attempts: u32,
    pub initial: Duration,
    pub max: Duration,
}

impl RetryPolicy for ExponentialBackoff {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

impl RetryConfig {
    pub fn policy(&self) -> Box<dyn RetryPolicy> {
        let max_attempts = self.max_attempts.max(1);
        match self.strategy {
            RetryStrategy::Fixed => Box::new(FixedDelay {
                max_attempts,
                delay: Duration::from_millis(self.delay_ms),
            }),
            RetryStrategy::Exponential => Box::new(ExponentialBackoff {
                max_attempts,
                initial: Duration::from_millis(self.delay_ms),
                max: Duration::from_millis(self.max_delay_ms.max(self.delay_ms)),
            }),
        }
    }
}

/// Connects to devices, retrying transient transport failures.
///
/// Per attempt: `Connecting -> Connected | RetryWait -> Connecting | Failed`.
/// Authentication failures fail at once. Retryable failures on the last
/// attempt become [`SessionError::Exhausted`].
pub struct SessionFactory<C> {
    connector: C,
    policy: Box<dyn RetryPolicy>,
}

impl<C: Connector> SessionFactory<C> {
    pub fn new(connector: C, policy: Box<dyn RetryPolicy>) -> Self {
        Self { connector, policy }
    }

    #[cfg(test)]
    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub async fn connect(&self, host: &str) -> Result<C::Transport, SessionError> {
        let max_attempts = self.policy.max_attempts().max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::debug!(host, attempt, "connecting");

            let err = match self.connector.connect(host).await {
                Ok(transport) => {
                    tracing::debug!(host, attempt, "connected");
                    return Ok(transport);
                }
                Err(err) => err,
            };

            if !self.policy.is_retryable(&err) {
                tracing::warn!(host, attempt, "connection failed: {}", err);
                return Err(err);
            }

            if attempt >= max_attempts {
                return Err(SessionError::Exhausted {
                    host: host.to_string(),
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.policy.delay(attempt);
            tracing::warn!(host, attempt, ?delay, "connection attempt failed, retrying: {}", err);
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
pub mod scripted {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use crate::session::fake::{FakeDevice, FakeTransport};

    /// Connector that fails with scripted errors, then connects to a fake
    /// device once the script runs out.
    pub struct ScriptedConnector {
        failures: Mutex<VecDeque<SessionError>>,
        attempts: AtomicU32,
        device: FakeDevice,
    }

    impl ScriptedConnector {
        pub fn new(device: FakeDevice, failures: impl IntoIterator<Item = SessionError>) -> Self {
            Self {
                failures: Mutex::new(failures.into_iter().collect()),
                attempts: AtomicU32::new(0),
                device,
            }
        }

        pub fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        type Transport = FakeTransport;

        async fn connect(&self, _host: &str) -> Result<FakeTransport, SessionError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match self.failures.lock().unwrap().pop_front() {
                Some(err) => Err(err),
                None => Ok(self.device.transport()),
            }
        }
    }

    pub fn transport_failures(n: usize) -> Vec<SessionError> {
        (0..n)
            .map(|i| SessionError::Transport(format!("handshake timeout #{i}")))
            .collect()
    }
}
