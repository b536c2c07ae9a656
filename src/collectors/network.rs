//! Network-address discovery collector
//!
//! Starts a peer-connection negotiation against one STUN relay and records
//! the IPv4 address embedded in each ICE candidate. Host candidates carry
//! LAN addresses, server-reflexive ones the public address, which is what
//! leaks a real address behind a proxy or VPN.
//!
//! The wait is bounded by the discovery window. Whatever was gathered when
//! the window closes is reported; there is no retry.

use async_trait::async_trait;
use futures::future::{select, Either};
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::Ipv4Addr;
use std::rc::Rc;
use std::time::Duration;

use super::Collector;
use crate::error::AuditError;
use crate::host::{millis_u32, Capability, CapabilityHost, PeerHost, Timer};
use crate::probe::probe;
use crate::signal::{Category, CollectionStatus, LocalAddressSet, Signal, SignalValue};

static IPV4_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]{1,3}(\.[0-9]{1,3}){3})").expect("valid IPv4 regex")
});

/// First well-formed IPv4 address in a candidate line.
pub fn extract_ipv4(candidate: &str) -> Option<String> {
    IPV4_PATTERN
        .find_iter(candidate)
        .map(|m| m.as_str())
        .find(|s| s.parse::<Ipv4Addr>().is_ok())
        .map(str::to_string)
}

pub struct NetworkCollector<H> {
    host: Rc<H>,
    stun_server: String,
    window: Duration,
}

impl<H: CapabilityHost + PeerHost + Timer> NetworkCollector<H> {
    pub fn new(host: Rc<H>, stun_server: impl Into<String>, window: Duration) -> Self {
        Self {
            host,
            stun_server: stun_server.into(),
            window,
        }
    }

    /// Gather addresses until the candidates end or the window closes.
    pub async fn discover(&self) -> (CollectionStatus, LocalAddressSet) {
        let mut addresses = LocalAddressSet::new();

        if !probe(self.host.as_ref(), Capability::PeerConnection).is_available() {
            return (CollectionStatus::Unavailable, addresses);
        }

        let mut session = match self.host.open_peer_session(&self.stun_server) {
            Ok(session) => session,
            Err(e) => {
                log::debug!("network: peer session refused ({})", e);
                return (CollectionStatus::Unavailable, addresses);
            }
        };

        let mut deadline = self.host.sleep(self.window);
        let status = loop {
            match select(&mut deadline, session.candidates().next()).await {
                Either::Left(((), _)) => {
                    let err = AuditError::DiscoveryTimedOut {
                        window_ms: millis_u32(self.window),
                    };
                    log::debug!("network: {}", err);
                    break CollectionStatus::TimedOut;
                }
                Either::Right((Some(candidate), _)) => {
                    if let Some(address) = extract_ipv4(&candidate) {
                        if addresses.insert(&address) {
                            log::debug!("network: candidate address {}", address);
                        }
                    }
                }
                Either::Right((None, _)) => break CollectionStatus::Collected,
            }
        };

        drop(session);
        log::info!("network: {} local address(es) discovered", addresses.len());
        (status, addresses)
    }
}

#[async_trait(?Send)]
impl<H: CapabilityHost + PeerHost + Timer> Collector for NetworkCollector<H> {
    fn category(&self) -> Category {
        Category::Network
    }

    async fn collect(&self) -> Signal {
        let (status, addresses) = self.discover().await;
        Signal::new(status, SignalValue::Network(addresses))
    }
}
