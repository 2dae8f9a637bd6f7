use std::net::{Ipv4Addr, SocketAddr};

use hickory_proto::op::Message;

/// Where queries get forwarded, and what to answer when every upstream path
/// fails.  Built once at startup and passed by reference into the pipeline
/// and the CNAME resolver; nothing mutates it afterwards.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ForwardingConfig {
    /// Primary nameserver, contacted first for every query.
    pub upstream: SocketAddr,
    /// Secondary nameserver, contacted only when the primary yields no
    /// usable answer.
    pub failover: SocketAddr,
    /// Answer of last resort.
    pub default_ip: Ipv4Addr,
}

/// A reply from a remote nameserver, kept in both forms: parsed for
/// inspection, and the octets exactly as they arrived so the reply can be
/// relayed to a client unmodified.
#[derive(Debug, Clone)]
pub struct NameserverReply {
    pub bytes: Vec<u8>,
    pub message: Message,
}
