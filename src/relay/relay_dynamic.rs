
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use util::conn::Listener;
use util::vnet::net::Net;
use util::Conn;

use super::*;
use crate::config::{RelayConfig, DEFAULT_MAX_RETRIES};
use crate::error::*;
use crate::net::{is_packet_network, parse_network, RelayNet};
use crate::randutil::{MathRandomGenerator, RandomGenerator};
use crate::resolver::{AddressResolver, HttpIpLookup, IpLookup};

/// `RelayAddressGeneratorDynamic` allocates relay conns inside a port range
/// and advertises the public address of this host, looked up through an IP
/// echo service and refreshed once it goes stale.
///
/// The port range, retry budget and bind address are taken from the
/// [`RelayConfig`] and cannot change once the generator is built.
pub struct RelayAddressGeneratorDynamic {
    min_port: u16,
    max_port: u16,
    max_retries: u16,
    address: String,
    config: RelayConfig,
    lookup: Option<Arc<dyn IpLookup + Send + Sync>>,
    resolver: Option<AddressResolver>,
    rand: Option<Arc<dyn RandomGenerator + Send + Sync>>,
    net: Option<Arc<dyn RelayNet + Send + Sync>>,
}

impl RelayAddressGeneratorDynamic {
    /// Creates a generator from `config`. Collaborators that are not supplied
    /// through the `with_*` methods are created by
    /// [`validate`](RelayAddressGenerator::validate).
    pub fn new(config: RelayConfig) -> Self {
        RelayAddressGeneratorDynamic {
            min_port: config.min_port,
            max_port: config.max_port,
            max_retries: config.max_retries,
            address: config.address.clone(),
            config,
            lookup: None,
            resolver: None,
            rand: None,
            net: None,
        }
    }

    pub fn with_net(mut self, net: Arc<dyn RelayNet + Send + Sync>) -> Self {
        self.net = Some(net);
        self
    }

    pub fn with_rand(mut self, rand: Arc<dyn RandomGenerator + Send + Sync>) -> Self {
        self.rand = Some(rand);
        self
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn IpLookup + Send + Sync>) -> Self {
        self.lookup = Some(lookup);
        self.resolver = None;
        self
    }

    /// `min_port` the minimum port to allocate.
    pub fn min_port(&self) -> u16 {
        self.min_port
    }

    /// `max_port` the maximum (inclusive) port to allocate.
    pub fn max_port(&self) -> u16 {
        self.max_port
    }

    /// `max_retries` the amount of tries to allocate a random port in the
    /// range. Reads [`DEFAULT_MAX_RETRIES`] after validation when unset.
    pub fn max_retries(&self) -> u16 {
        self.max_retries
    }

    /// `address` is passed to the network when binding the relay conn.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the resolver backing this generator, once validated.
    pub fn resolver(&self) -> Option<&AddressResolver> {
        self.resolver.as_ref()
    }

    fn bind_address(&self, port: u16) -> String {
        match self.address.parse::<IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, port).to_string(),
            Err(_) => format!("{}:{}", self.address, port),
        }
    }

    fn check_config(&self) -> Result<()> {
        if self.min_port == 0 {
            Err(Error::ErrMinPortNotZero)
        } else if self.max_port == 0 {
            Err(Error::ErrMaxPortNotZero)
        } else if self.address.is_empty() {
            Err(Error::ErrListeningAddressInvalid)
        } else if self.max_port < self.min_port {
            Err(Error::ErrMaxPortLessThanMinPort)
        } else {
            Ok(())
        }
    }
}

/// Rewrites the IP of the conn's local address to `relay_ip`, keeping the
/// port. A conn without a usable local address is closed.
async fn relay_conn_addr(
    conn: Arc<dyn Conn + Send + Sync>,
    use_ipv4: bool,
    relay_ip: IpAddr,
) -> Result<(Arc<dyn Conn + Send + Sync>, SocketAddr)> {
    let mut relay_addr = match conn.local_addr() {
        Ok(addr) if addr.port() != 0 && addr.is_ipv4() == use_ipv4 => addr,
        _ => {
            if let Err(err) = conn.close().await {
                log::debug!("failed to close relay conn with unusable local address: {err}");
            }
            return Err(Error::ErrRelayConnAddr);
        }
    };

    relay_addr.set_ip(relay_ip);
    Ok((conn, relay_addr))
}

#[async_trait]
impl RelayAddressGenerator for RelayAddressGeneratorDynamic {
    async fn validate(&mut self) -> Result<()> {
        if self.net.is_none() {
            self.net = Some(Arc::new(Net::new(None)));
        }

        if self.rand.is_none() {
            self.rand = Some(Arc::new(MathRandomGenerator::new()));
        }

        if self.max_retries == 0 {
            self.max_retries = DEFAULT_MAX_RETRIES;
        }

        self.check_config()?;

        if self.resolver.is_none() {
            let lookup = match &self.lookup {
                Some(lookup) => Arc::clone(lookup),
                None => {
                    let lookup: Arc<dyn IpLookup + Send + Sync> = Arc::new(HttpIpLookup::new(
                        &self.config.lookup_url,
                        self.config.lookup_timeout(),
                    )?);
                    self.lookup = Some(Arc::clone(&lookup));
                    lookup
                }
            };
            self.resolver = Some(AddressResolver::new(lookup));
        }

        if let Some(resolver) = &self.resolver {
            let relay_ip = resolver.refresh().await;
            log::debug!(
                "relay address generator ready: {} ports {}-{}, advertising {}",
                self.address,
                self.min_port,
                self.max_port,
                relay_ip
            );
        }

        Ok(())
    }

    async fn allocate_packet_conn(
        &self,
        network: &str,
        requested_port: u16,
    ) -> Result<(Arc<dyn Conn + Send + Sync>, SocketAddr)> {
        let (net, rand, resolver) = match (&self.net, &self.rand, &self.resolver) {
            (Some(net), Some(rand), Some(resolver)) => (net, rand, resolver),
            _ => return Err(Error::ErrNotValidated),
        };

        if !is_packet_network(network) {
            return Err(Error::ErrUnsupportedNetwork(network.to_owned()));
        }
        let use_ipv4 = parse_network(network, &self.address)?;

        let relay_ip = resolver.resolve().await;

        if requested_port != 0 {
            let conn = net
                .listen_packet(use_ipv4, &self.bind_address(requested_port))
                .await?;
            return relay_conn_addr(conn, use_ipv4, relay_ip).await;
        }

        let span = match self.max_port.checked_sub(self.min_port) {
            Some(diff) => u32::from(diff) + 1,
            None => return Err(Error::ErrMaxPortLessThanMinPort),
        };

        for attempt in 0..self.max_retries {
            // a draw outside [0, span) is folded back into the range
            let port = self.min_port + (rand.intn(span) % span) as u16;
            let address = self.bind_address(port);
            let conn = match net.listen_packet(use_ipv4, &address).await {
                Ok(conn) => conn,
                Err(err) => {
                    log::debug!("relay bind {address} attempt {} failed: {err}", attempt + 1);
                    continue;
                }
            };

            let (conn, relay_addr) = relay_conn_addr(conn, use_ipv4, relay_ip).await?;
            log::trace!("allocated relay {relay_addr} on port {port}");
            return Ok((conn, relay_addr));
        }

        Err(Error::ErrMaxRetriesExceeded)
    }

    async fn allocate_conn(
        &self,
        _network: &str,
        _requested_port: u16,
    ) -> Result<(Arc<dyn Listener + Send + Sync>, SocketAddr)> {
        Err(Error::ErrNotImplemented)
    }
}
