//! Client IP extraction for the IP filter.
//!
//! # Source Priority
//!
//! 1. `X-Forwarded-For` (first entry of the comma-separated chain)
//! 2. `X-Real-IP`
//! 3. The socket peer address (`ConnectInfo<SocketAddr>`), when the server
//!    was started with `into_make_service_with_connect_info`
//!
//! The first source present wins, even when its value turns out to be
//! unparsable: a garbled `X-Forwarded-For` is an invalid client IP, not a
//! reason to fall through to the peer address.
//!
//! # Security Warning: IP Spoofing Risk
//!
//! Forwarding headers are client-controlled unless a reverse proxy
//! overwrites them. Deploy behind a proxy that sets them unconditionally
//! (e.g. nginx `proxy_set_header X-Forwarded-For $remote_addr;`) and block
//! direct access, otherwise a blacklisted client can simply claim another
//! address.
//!
//! # IPv6
//!
//! Range matching is IPv4-only. IPv4-mapped IPv6 addresses
//! (`::ffff:a.b.c.d`) are unwrapped; any other IPv6 address is reported as
//! invalid and handled by the filter's invalid-IP policy.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;

/// Where the client address was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpSource {
    ForwardedFor,
    RealIp,
    Peer,
}

/// Result of looking for a client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientIp {
    /// A usable IPv4 address.
    Valid(Ipv4Addr, IpSource),
    /// A source was present but did not hold an IPv4 address.
    Invalid(IpSource),
    /// No source at all.
    Missing,
}

impl ClientIp {
    pub fn addr(&self) -> Option<Ipv4Addr> {
        match self {
            ClientIp::Valid(ip, _) => Some(*ip),
            ClientIp::Invalid(_) | ClientIp::Missing => None,
        }
    }
}

/// Raw client address string from the forwarding headers, if any.
///
/// Returns borrowed slices pointing into the request headers.
#[inline]
fn ip_from_headers<B>(req: &Request<B>) -> Option<(&str, IpSource)> {
    // Format: "client, proxy1, proxy2" - we want the first (client) IP
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first_ip) = value.split(',').next()
    {
        return Some((first_ip.trim(), IpSource::ForwardedFor));
    }

    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
    {
        return Some((value.trim(), IpSource::RealIp));
    }

    None
}

/// Reduce an address to IPv4, unwrapping IPv4-mapped IPv6.
#[inline]
fn to_ipv4(ip: IpAddr) -> Option<Ipv4Addr> {
    match ip {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    }
}

/// Determine the client's IPv4 address.
pub fn extract_client_ip<B>(req: &Request<B>) -> ClientIp {
    if let Some((raw, source)) = ip_from_headers(req) {
        return match raw.parse::<IpAddr>().ok().and_then(to_ipv4) {
            Some(ip) => ClientIp::Valid(ip, source),
            None => ClientIp::Invalid(source),
        };
    }

    match req.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => match to_ipv4(addr.ip()) {
            Some(ip) => ClientIp::Valid(ip, IpSource::Peer),
            None => ClientIp::Invalid(IpSource::Peer),
        },
        None => ClientIp::Missing,
    }
}
