//! Self-identity: hostname-derived datacenter/rack, server-id, and
//! classification of this node's local endpoints.
//!
//! Enumerating OS network interfaces is a host concern (§6 of the spec); this
//! module only classifies whatever candidate addresses the host hands it.

use std::collections::HashSet;
use std::net::IpAddr;

use crate::peer_info::NetInfo;

/// Public NAT-domain key. Stored internally instead of `""` so logs and maps
/// read clearly.
pub const PUBLIC_DOMAIN: &str = "public";

fn private_ranges() -> &'static [ipnet::IpNet] {
    use std::sync::OnceLock;
    static RANGES: OnceLock<Vec<ipnet::IpNet>> = OnceLock::new();
    RANGES.get_or_init(|| {
        [
            "10.0.0.0/8",
            "172.16.0.0/12",
            "192.168.0.0/16",
            "fc00::/7",
        ]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect()
    })
}

fn private_block_containing(ip: IpAddr) -> Option<&'static ipnet::IpNet> {
    private_ranges().iter().find(|net| net.contains(&ip))
}

/// `true` for RFC 1918 / RFC 4193 ranges.
pub fn is_private_ip(ip: IpAddr) -> bool {
    private_block_containing(ip).is_some()
}

/// Remove a trailing `.local` suffix, as mDNS-advertised hostnames often carry one.
pub fn normalize_hostname(host: &str) -> String {
    host.strip_suffix(".local").unwrap_or(host).to_string()
}

/// Parse the datacenter from a cleaned hostname of the form `name.dc.domain...`.
///
/// Requires at least 3 dot-separated components; the datacenter is the second one.
pub fn parse_datacenter(clean_host: &str) -> String {
    let parts: Vec<&str> = clean_host.split('.').collect();
    if parts.len() > 2 {
        parts[1].to_string()
    } else {
        String::new()
    }
}

/// Parse the rack from a cleaned hostname of the form `name-r<rack>.rest...`.
pub fn parse_rack(clean_host: &str) -> String {
    let Some(start) = clean_host.find("-r") else {
        return String::new();
    };
    let after = &clean_host[start + 2..];
    match after.find('.') {
        Some(end) => after[..end].to_string(),
        None => after.to_string(),
    }
}

/// Build the `"<sys>[/<env>/<port>]@<host>"` server id.
pub fn server_id(system: &str, env: &str, port: u16, clean_host: &str) -> String {
    let mut id = system.to_string();
    if env != "prod" && !env.is_empty() {
        id.push('/');
        id.push_str(env);
        id.push('/');
        id.push_str(&port.to_string());
    }
    id.push('@');
    id.push_str(clean_host);
    id
}

/// Classify one candidate local address into a `NetInfo`, given this node's
/// configured datacenter (used as the private-range label, falling back to
/// the containing CIDR block when no datacenter is configured).
pub fn classify_local_addr(ip: IpAddr, port: u16, datacenter: &str) -> NetInfo {
    let addr = match ip {
        IpAddr::V4(v4) => format!("{v4}:{port}"),
        IpAddr::V6(v6) => format!("[{v6}]:{port}"),
    };

    let natdom = match private_block_containing(ip) {
        Some(block) if !datacenter.is_empty() => datacenter.to_string(),
        Some(block) => block.to_string(),
        None => String::new(),
    };

    NetInfo { addr, natdom }
}

/// This node's static identity: hostname, topology, server-id, and the set of
/// local endpoints it must never probe itself on.
#[derive(Debug, Clone)]
pub struct SelfIdentity {
    pub hostname: String,
    pub datacenter: String,
    pub rack: String,
    pub server_id: String,
    pub net_info: Vec<NetInfo>,
    own_addrs: HashSet<String>,
    own_domains: HashSet<String>,
}

impl SelfIdentity {
    /// Build identity from configuration overrides and host-supplied candidate
    /// addresses (see [`classify_local_addr`]).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        system: &str,
        env: &str,
        port: u16,
        hostname_override: Option<&str>,
        dc_override: Option<&str>,
        rack_override: Option<&str>,
        id_override: Option<&str>,
        local_addrs: &[IpAddr],
    ) -> SelfIdentity {
        let raw_host = hostname_override
            .map(str::to_string)
            .unwrap_or_else(|| "localhost".to_string());
        let clean_host = normalize_hostname(&raw_host);

        let datacenter = dc_override
            .map(str::to_string)
            .unwrap_or_else(|| parse_datacenter(&clean_host));
        let rack = rack_override
            .map(str::to_string)
            .unwrap_or_else(|| parse_rack(&clean_host));

        let server_id = id_override
            .map(str::to_string)
            .unwrap_or_else(|| server_id(system, env, port, &clean_host));

        let net_info: Vec<NetInfo> = local_addrs
            .iter()
            .filter(|ip| !ip.is_loopback())
            .map(|ip| classify_local_addr(*ip, port, &datacenter))
            .collect();

        let own_addrs = net_info.iter().map(|ni| ni.addr.clone()).collect();
        let own_domains = net_info
            .iter()
            .map(|ni| {
                if ni.natdom.is_empty() {
                    PUBLIC_DOMAIN.to_string()
                } else {
                    ni.natdom.clone()
                }
            })
            .collect();

        SelfIdentity {
            hostname: clean_host,
            datacenter,
            rack,
            server_id,
            net_info,
            own_addrs,
            own_domains,
        }
    }

    /// All NAT domains this node itself participates in (used to seed the
    /// [`crate::netmon::NetworkMonitor`]).
    pub fn own_domains(&self) -> &HashSet<String> {
        &self.own_domains
    }

    /// Is `dom` a domain this node itself participates in?
    pub fn dom_ok(&self, dom: &str) -> bool {
        self.own_domains.contains(dom)
    }

    /// Is `addr` one of our own local endpoints? Consulted before every probe
    /// to prevent self-gossip.
    pub fn is_own_addr(&self, addr: &str) -> bool {
        self.own_addrs.contains(addr)
    }
}
