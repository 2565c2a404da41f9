//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use super::error::GatewayError;

/// Gateway configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address
    pub host: IpAddr,
    /// Bind port; 0 picks a free port
    pub port: u16,
    /// Largest accepted request body in bytes
    pub max_request_size: usize,
    /// Largest accepted JSON-RPC batch
    pub max_batch_size: usize,
    /// How long in-flight requests get to finish on shutdown
    #[serde(with = "duration_secs")]
    pub shutdown_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 26657,
            max_request_size: 8 * 1024 * 1024,
            max_batch_size: 100,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl GatewayConfig {
    /// Loopback on a free port.
    pub fn for_testing() -> Self {
        Self {
            port: 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.max_request_size == 0 {
            return Err(GatewayError::Config("max_request_size cannot be 0".into()));
        }
        if self.max_batch_size == 0 {
            return Err(GatewayError::Config("max_batch_size cannot be 0".into()));
        }
        Ok(())
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
