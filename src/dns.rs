//! Pluggable DNS resolution.
//!
//! The transport resolves hostnames through a [`DnsResolver`] so tests can run
//! against loopback servers or canned answers without touching real DNS. The
//! trait takes `&self` and resolvers are plain owned values; nothing here is
//! shared across threads.

use crate::errors::DnsError;
use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs};

/// Trait for DNS resolution.
pub trait DnsResolver {
    /// Resolves a hostname and port to socket addresses.
    ///
    /// # Errors
    ///
    /// Returns `DnsError` if resolution fails or yields no addresses.
    fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>, DnsError>;
}

/// System DNS resolver backed by `std::net::ToSocketAddrs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDnsResolver;

impl SystemDnsResolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DnsResolver for SystemDnsResolver {
    fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>, DnsError> {
        if host.is_empty() {
            return Err(DnsError::InvalidHost(host.to_string()));
        }

        let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
        if addrs.is_empty() {
            Err(DnsError::NoAddressesFound(host.to_string()))
        } else {
            Ok(addrs)
        }
    }
}

/// Resolver that answers every lookup with one fixed address.
///
/// Useful when a test wants to point an arbitrary hostname at a local server.
#[derive(Debug, Clone, Copy)]
pub struct StaticResolver {
    addr: SocketAddr,
}

impl StaticResolver {
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl DnsResolver for StaticResolver {
    fn resolve(&self, _host: &str, _port: u16) -> Result<Vec<SocketAddr>, DnsError> {
        Ok(vec![self.addr])
    }
}

/// Mock resolver with per-hostname canned answers.
///
/// Answers are fixed at construction through the builder methods; unknown
/// hosts resolve to `NoAddressesFound`.
#[derive(Debug, Default)]
pub struct MockDnsResolver {
    answers: HashMap<String, Result<Vec<SocketAddr>, DnsError>>,
}

impl MockDnsResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a successful answer for a hostname.
    #[must_use]
    pub fn with_response(mut self, host: &str, addrs: Vec<SocketAddr>) -> Self {
        self.answers.insert(host.to_string(), Ok(addrs));
        self
    }

    /// Adds an error answer for a hostname.
    #[must_use]
    pub fn with_error(mut self, host: &str, error: DnsError) -> Self {
        self.answers.insert(host.to_string(), Err(error));
        self
    }
}

impl DnsResolver for MockDnsResolver {
    fn resolve(&self, host: &str, _port: u16) -> Result<Vec<SocketAddr>, DnsError> {
        self.answers
            .get(host)
            .cloned()
            .unwrap_or_else(|| Err(DnsError::NoAddressesFound(host.to_string())))
    }
}
