use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use actix_web::http::header::HeaderMap;

/// IPv4 network in CIDR notation. Host bits in the written address are
/// ignored, so `203.82.42.2/24` covers `203.82.42.0` - `203.82.42.255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: u32,
    mask: u32,
}

impl Cidr {
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        u32::from(ip) & self.mask == self.network
    }
}

impl FromStr for Cidr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, bits) = s.split_once('/').unwrap_or((s, "32"));
        let addr: Ipv4Addr = addr
            .trim()
            .parse()
            .map_err(|e| format!("bad address in {s}: {e}"))?;
        let bits: u32 = bits
            .trim()
            .parse()
            .map_err(|e| format!("bad prefix in {s}: {e}"))?;
        if bits > 32 {
            return Err(format!("prefix /{bits} out of range"));
        }

        let mask = if bits == 0 { 0 } else { u32::MAX << (32 - bits) };
        Ok(Self {
            network: u32::from(addr) & mask,
            mask,
        })
    }
}

/// Static origin and network allowlists. An empty list disables its check.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    origins: Vec<String>,
    cidrs: Vec<Cidr>,
}

impl AccessPolicy {
    pub fn new(origins: Vec<String>, cidrs: Vec<Cidr>) -> Self {
        Self { origins, cidrs }
    }

    /// Requests without an `Origin` header (same-origin form posts, curl) pass.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(_) if self.origins.is_empty() => true,
            Some(origin) => self.origins.iter().any(|o| o == origin),
        }
    }

    pub fn ip_allowed(&self, ip: &str) -> bool {
        if self.cidrs.is_empty() {
            return true;
        }

        let v4 = match ip.parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) => v4,
            Ok(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
                Some(v4) => v4,
                None => return false,
            },
            Err(_) => return false,
        };

        self.cidrs.iter().any(|c| c.contains(v4))
    }
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`, then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next().map(str::trim) {
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }

    header("x-real-ip")
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.ip().to_string()))
}
