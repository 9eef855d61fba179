// Trait seams between the polling core and its collaborators
use crate::domain::data_point::DataPoint;
use async_trait::async_trait;
use thiserror::Error;

/// Failure modes of the login handshake. None of these escape the
/// authenticator boundary as panics; callers observe an error value and a
/// still-invalid session.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{endpoint}: {source}")]
    Network {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned status {status}")]
    Status { endpoint: &'static str, status: u16 },
    #[error("{endpoint}: {detail}")]
    Protocol {
        endpoint: &'static str,
        detail: String,
    },
    #[error("server signature mismatch")]
    SignatureMismatch,
    #[error("crypto failure: {0}")]
    Crypto(&'static str),
}

/// Failure modes of authenticated telemetry calls. `Unauthorized` is the
/// only variant the polling cycle reacts to specially.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("session rejected with 401")]
    Unauthorized,
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Supplies the secret password used in the handshake.
pub trait CredentialSource: Send + Sync {
    fn password(&self) -> &str;
}

/// Executes one complete login handshake against the device.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, password: &str) -> Result<String, AuthError>;
}

/// Fetches the current measurements using an established session.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn fetch_current(&self, session_id: &str) -> Result<DataPoint, FetchError>;
}

/// Durable append log for data points.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn append(&self, point: &DataPoint) -> anyhow::Result<()>;
}

/// Relays data points to the remote collector.
#[async_trait]
pub trait DownstreamForwarder: Send + Sync {
    async fn forward(&self, point: &DataPoint, session_id: &str) -> Result<(), FetchError>;
}
