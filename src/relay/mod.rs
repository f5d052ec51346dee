pub mod relay_dynamic;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use util::conn::Listener;
use util::Conn;

use crate::error::Result;

/// `RelayAddressGenerator` is used to generate a RelayAddress when creating an allocation.
/// You can use the provided dynamic generator or provide your own.
#[async_trait]
pub trait RelayAddressGenerator {
    /// Confirms that the RelayAddressGenerator is properly initialized,
    /// filling in defaults for anything left unset. Must succeed before the
    /// generator is used.
    async fn validate(&mut self) -> Result<()>;

    /// Allocates a PacketConn (UDP) RelayAddress.
    async fn allocate_packet_conn(
        &self,
        network: &str,
        requested_port: u16,
    ) -> Result<(Arc<dyn Conn + Send + Sync>, SocketAddr)>;

    /// Allocates a Conn (TCP) RelayAddress.
    async fn allocate_conn(
        &self,
        network: &str,
        requested_port: u16,
    ) -> Result<(Arc<dyn Listener + Send + Sync>, SocketAddr)>;
}
