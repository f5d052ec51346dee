
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::error::*;
use crate::resolver::{DEFAULT_LOOKUP_TIMEOUT, DEFAULT_LOOKUP_URL};

/// Lower bound of the relay port range when none is configured.
pub const DEFAULT_MIN_PORT: u16 = 49152;
/// Upper bound (inclusive) of the relay port range when none is configured.
pub const DEFAULT_MAX_PORT: u16 = 50175;
/// Bind attempts per allocation when `max_retries` is left at 0.
pub const DEFAULT_MAX_RETRIES: u16 = 10;

/// `RelayConfig` is the bag of values a
/// [`RelayAddressGeneratorDynamic`](crate::RelayAddressGeneratorDynamic) is
/// constructed with. Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// `min_port` the minimum port to allocate.
    pub min_port: u16,
    /// `max_port` the maximum (inclusive) port to allocate.
    pub max_port: u16,
    /// `max_retries` the amount of tries to allocate a random port in the
    /// range. 0 means [`DEFAULT_MAX_RETRIES`].
    pub max_retries: u16,
    /// `address` is passed to the network when binding the relay conn.
    pub address: String,
    /// `lookup_url` is the IP echo endpoint used to discover the public address.
    pub lookup_url: String,
    /// `lookup_timeout` bounds a single lookup, in seconds.
    pub lookup_timeout: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            min_port: DEFAULT_MIN_PORT,
            max_port: DEFAULT_MAX_PORT,
            max_retries: 0,
            address: "0.0.0.0".to_owned(),
            lookup_url: DEFAULT_LOOKUP_URL.to_owned(),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT.as_secs(),
        }
    }
}

impl RelayConfig {
    /// Parses a JSON document into a config.
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|err| Error::Other(format!("relay config: {err}")))
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout)
    }
}
