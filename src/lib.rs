#![warn(rust_2018_idioms)]

//! Relay address generation for TURN servers.
//!
//! [`RelayAddressGeneratorDynamic`] binds relay sockets inside a configured
//! port range and advertises a public IP address discovered through an
//! external lookup service, refreshing it once it is older than
//! [`ADDRESS_STALENESS`].

pub mod config;
mod error;
pub mod net;
pub mod randutil;
pub mod relay;
pub mod resolver;

pub use config::RelayConfig;
pub use error::{Error, IoError, Result};
pub use relay::relay_dynamic::RelayAddressGeneratorDynamic;
pub use relay::RelayAddressGenerator;
pub use resolver::{AddressResolver, ADDRESS_STALENESS, FALLBACK_RELAY_ADDRESS};
