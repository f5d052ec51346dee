
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::error::*;

/// Maximum age of a resolved relay address before it is looked up again.
pub const ADDRESS_STALENESS: Duration = Duration::from_secs(300);

/// Address advertised when the public address cannot be looked up.
pub const FALLBACK_RELAY_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// IP echo service queried by default. It answers with the caller's public
/// address as a plain-text body.
pub const DEFAULT_LOOKUP_URL: &str = "https://api.ipify.org";

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// `IpLookup` discovers the public address of this host.
#[async_trait]
pub trait IpLookup {
    /// Performs one outbound round trip and returns the raw response body.
    async fn lookup(&self) -> Result<String>;
}

/// `HttpIpLookup` issues an HTTP GET to an IP echo endpoint.
pub struct HttpIpLookup {
    client: reqwest::Client,
    url: String,
}

impl HttpIpLookup {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url))
    }

    /// Uses a preconfigured client, e.g. one with custom proxy settings.
    pub fn with_client(client: reqwest::Client, url: &str) -> Self {
        HttpIpLookup {
            client,
            url: url.to_owned(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl IpLookup for HttpIpLookup {
    async fn lookup(&self) -> Result<String> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

#[derive(Debug)]
struct CachedAddress {
    address: IpAddr,
    resolved_at: Instant,
}

/// `AddressResolver` caches the public relay address and refreshes it lazily
/// once it is older than [`ADDRESS_STALENESS`].
///
/// The cache is an immutable snapshot swapped atomically, so readers never
/// see an address paired with another address's timestamp. Refreshes are
/// serialized; callers that queued behind a refresh reuse its result.
///
/// Resolution never fails. When the lookup fails or its body is not an IP
/// address, [`FALLBACK_RELAY_ADDRESS`] is returned and the cache is left
/// untouched, so the next call looks up again.
pub struct AddressResolver {
    lookup: Arc<dyn IpLookup + Send + Sync>,
    cache: ArcSwapOption<CachedAddress>,
    refresh_lock: Mutex<()>,
}

impl AddressResolver {
    pub fn new(lookup: Arc<dyn IpLookup + Send + Sync>) -> Self {
        AddressResolver {
            lookup,
            cache: ArcSwapOption::empty(),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Returns the cached address, fresh or not, without any lookup.
    pub fn cached(&self) -> Option<IpAddr> {
        self.cache.load_full().map(|c| c.address)
    }

    /// Returns the current relay address, looking it up when the cache is
    /// empty or stale.
    pub async fn resolve(&self) -> IpAddr {
        if let Some(address) = self.fresh() {
            return address;
        }

        let _guard = self.refresh_lock.lock().await;
        if let Some(address) = self.fresh() {
            log::trace!("relay address {address} refreshed by a concurrent caller");
            return address;
        }

        self.update().await
    }

    /// Looks the address up regardless of the cache age.
    pub async fn refresh(&self) -> IpAddr {
        let _guard = self.refresh_lock.lock().await;
        self.update().await
    }

    fn fresh(&self) -> Option<IpAddr> {
        match self.cache.load_full() {
            Some(c) if c.resolved_at.elapsed() <= ADDRESS_STALENESS => Some(c.address),
            _ => None,
        }
    }

    async fn update(&self) -> IpAddr {
        match self.lookup_address().await {
            Ok(address) => {
                log::trace!("relay address resolved to {address}");
                self.cache.store(Some(Arc::new(CachedAddress {
                    address,
                    resolved_at: Instant::now(),
                })));
                address
            }
            Err(err) => {
                log::warn!(
                    "relay address lookup failed, advertising {FALLBACK_RELAY_ADDRESS}: {err}"
                );
                FALLBACK_RELAY_ADDRESS
            }
        }
    }

    async fn lookup_address(&self) -> Result<IpAddr> {
        let body = self.lookup.lookup().await?;
        Ok(body.trim().parse()?)
    }
}
