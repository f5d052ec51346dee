
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use util::vnet::net::Net;
use util::Conn;

use crate::error::*;

/// `RelayNet` is the socket-binding capability a relay address generator
/// needs. It is implemented for [`Net`], so both the host network stack and a
/// virtual network can back a generator, and tests can supply a fake.
#[async_trait]
pub trait RelayNet {
    /// Makes a single attempt to bind a datagram conn at `address`
    /// (`host:port`). A bind failure is returned as is.
    async fn listen_packet(
        &self,
        use_ipv4: bool,
        address: &str,
    ) -> Result<Arc<dyn Conn + Send + Sync>>;
}

#[async_trait]
impl RelayNet for Net {
    async fn listen_packet(
        &self,
        use_ipv4: bool,
        address: &str,
    ) -> Result<Arc<dyn Conn + Send + Sync>> {
        let addr = self.resolve_addr(use_ipv4, address).await?;
        Ok(self.bind(addr).await?)
    }
}

/// Maps a network name to the address family it binds with. `udp` follows
/// the family of `bind_address`; names outside the udp/tcp families are
/// rejected.
pub fn parse_network(network: &str, bind_address: &str) -> Result<bool> {
    match network {
        "udp4" | "tcp4" => Ok(true),
        "udp6" | "tcp6" => Ok(false),
        "udp" | "tcp" => Ok(!matches!(
            bind_address.parse::<IpAddr>(),
            Ok(IpAddr::V6(_))
        )),
        _ => Err(Error::ErrUnsupportedNetwork(network.to_owned())),
    }
}

/// Reports whether `network` names a datagram network.
pub fn is_packet_network(network: &str) -> bool {
    matches!(network, "udp" | "udp4" | "udp6")
}
