//! UDP listener
//!
//! Receives datagrams, hands each one to its own task for
//! parse → dispatch → pack, and sends the bytes back to the sender. Every
//! per-query failure is logged and counted here and never ends the loop.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, trace, warn};

use crate::config::MixinConfig;
use crate::dns::codec::{Message, Record};
use crate::dns::dispatcher::QueryDispatcher;
use crate::dns::error::QueryError;
use crate::stats::Stats;

/// Largest datagram accepted (mDNS allows up to 9000 bytes)
const MAX_DATAGRAM_SIZE: usize = 9000;

/// Pause after a socket receive error
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// mDNS multicast groups
const MDNS_GROUP_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
const MDNS_GROUP_V6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);

pub struct DnsServer {
    socket: Arc<UdpSocket>,
    dispatcher: Arc<QueryDispatcher>,
    stats: Arc<Stats>,
}

impl DnsServer {
    /// Bind the listening socket described by the configuration
    pub async fn bind(
        config: &MixinConfig,
        dispatcher: Arc<QueryDispatcher>,
        stats: Arc<Stats>,
    ) -> anyhow::Result<Self> {
        let addr = SocketAddr::new(config.listen_address, config.port);
        let socket = create_socket(addr, config.multicast)?;
        let socket = UdpSocket::from_std(socket)?;

        info!("🌐 DNS responder listening on {}", socket.local_addr()?);

        Ok(Self {
            socket: Arc::new(socket),
            dispatcher,
            stats,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serve queries until the task is dropped
    pub async fn run(self) -> anyhow::Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            let (len, src) = match self.socket.recv_from(&mut buf).await {
                Ok(r) => r,
                Err(e) => {
                    error!("DNS socket error: {}", e);
                    tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                    continue;
                }
            };

            Stats::inc(&self.stats.received);
            trace!("Received {} bytes from {}", len, src);

            let request = buf[..len].to_vec();
            let socket = self.socket.clone();
            let dispatcher = self.dispatcher.clone();
            let stats = self.stats.clone();

            tokio::spawn(async move {
                let Some(response) = handle_datagram(&request, src, &dispatcher, &stats) else {
                    return;
                };

                match socket.send_to(&response, src).await {
                    Ok(_) => Stats::inc(&stats.answered),
                    Err(e) => {
                        Stats::inc(&stats.send_errors);
                        debug!("Failed to send response to {}: {}", src, e);
                    }
                }
            });
        }
    }
}

/// Turn one datagram into response bytes, or `None` when nothing is sent
pub fn handle_datagram(
    packet: &[u8],
    src: SocketAddr,
    dispatcher: &QueryDispatcher,
    stats: &Stats,
) -> Option<Vec<u8>> {
    let request = match Message::parse(packet) {
        Ok(m) => m,
        Err(e) => {
            Stats::inc(&stats.malformed);
            debug!("Dropping packet from {}: {}", src, e);
            return None;
        }
    };

    let response = match dispatcher.dispatch(&request) {
        Ok(r) => r,
        Err(QueryError::NoAnswerableQuestion) => {
            Stats::inc(&stats.unanswerable);
            trace!("No answerable question from {} (id={})", src, request.header.id);
            return None;
        }
        Err(QueryError::InvalidKeyEncoding(e)) => {
            Stats::inc(&stats.invalid_keys);
            info!("Invalid key query from {}: {}", src, e);
            return None;
        }
        Err(e) => {
            warn!("Query from {} failed: {}", src, e);
            return None;
        }
    };

    if let Some(address) = response.answers.first().and_then(Record::aaaa_address) {
        debug!("Answering {} for {} with {}", src, response.answers[0].name, address);
    }

    match response.pack() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            Stats::inc(&stats.encoding_errors);
            error!("Failed to encode response for {}: {}", src, e);
            None
        }
    }
}

fn create_socket(addr: SocketAddr, multicast: bool) -> anyhow::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;

    // Other mDNS responders usually hold the port too.
    socket.set_reuse_address(true)?;
    #[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
    socket.set_reuse_port(true)?;

    let dual_stack = addr.is_ipv6()
        && match socket.set_only_v6(false) {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not enable dual-stack socket: {}", e);
                false
            }
        };

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    if multicast {
        for group in mdns_groups(addr, dual_stack) {
            let joined = match group {
                IpAddr::V6(group) => socket.join_multicast_v6(&group, 0),
                IpAddr::V4(group) => socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED),
            };
            match joined {
                Ok(()) => info!("📡 Joined mDNS group {}", group),
                Err(e) => warn!("Could not join mDNS group {}: {}", group, e),
            }
        }
    }

    Ok(socket.into())
}

/// mDNS groups for a socket bound to `addr`. A dual-stack wildcard socket
/// also receives IPv4 traffic, so it joins both.
fn mdns_groups(addr: SocketAddr, dual_stack: bool) -> Vec<IpAddr> {
    match addr {
        SocketAddr::V4(_) => vec![IpAddr::V4(MDNS_GROUP_V4)],
        SocketAddr::V6(v6) if dual_stack && v6.ip().is_unspecified() => {
            vec![IpAddr::V6(MDNS_GROUP_V6), IpAddr::V4(MDNS_GROUP_V4)]
        }
        SocketAddr::V6(_) => vec![IpAddr::V6(MDNS_GROUP_V6)],
    }
}
