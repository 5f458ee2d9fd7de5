//! Host-supplied configuration for a [`crate::db::GossipDb`].

use std::net::IpAddr;
use std::sync::Arc;

use crate::error::GossipError;
use crate::transport::{Notifier, Transport};

/// Configuration accepted by [`crate::db::GossipDb::new`].
///
/// This is a plain struct, not a file-format parser: loading it from TOML,
/// environment variables, or flags is the host's CLI/config layer and is out
/// of scope for this crate.
pub struct GossipConfig {
    /// Required. Subsystem name; identifies the gossip group.
    pub system: String,
    /// Defaults to `"dev"`. Segregates gossip between environments.
    pub environment: String,
    /// Overrides the detected hostname.
    pub hostname: Option<String>,
    /// Overrides the hostname-derived datacenter.
    pub datacenter: Option<String>,
    /// Overrides the hostname-derived rack.
    pub rack: Option<String>,
    /// Overrides the derived server-id.
    pub id: Option<String>,
    /// TCP port embedded in local endpoint strings.
    pub port: u16,
    /// Bootstrap / partition-healing seed addresses (`host:port`).
    pub seeds: Vec<String>,
    /// If true, accept peer reports with differing subsystems into
    /// `allpeers` (never into `kibitzers`).
    pub promiscuous: bool,
    /// Host-supplied candidate local addresses; OS interface enumeration
    /// itself is an external concern (§6 of the spec).
    pub local_addrs: Vec<IpAddr>,
    /// The transport capability used to probe peers.
    pub transport: Arc<dyn Transport>,
    /// The edge-notification callback.
    pub notifier: Arc<dyn Notifier>,
}

impl GossipConfig {
    /// Start building a config for subsystem `system`, using `transport` to
    /// probe peers and `notifier` to report status edges.
    pub fn new(system: impl Into<String>, transport: Arc<dyn Transport>, notifier: Arc<dyn Notifier>) -> Self {
        GossipConfig {
            system: system.into(),
            environment: "dev".to_string(),
            hostname: None,
            datacenter: None,
            rack: None,
            id: None,
            port: 0,
            seeds: Vec::new(),
            promiscuous: false,
            local_addrs: Vec::new(),
            transport,
            notifier,
        }
    }

    pub fn environment(mut self, env: impl Into<String>) -> Self {
        self.environment = env.into();
        self
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn datacenter(mut self, dc: impl Into<String>) -> Self {
        self.datacenter = Some(dc.into());
        self
    }

    pub fn rack(mut self, rack: impl Into<String>) -> Self {
        self.rack = Some(rack.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn seeds(mut self, seeds: Vec<String>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn promiscuous(mut self, promiscuous: bool) -> Self {
        self.promiscuous = promiscuous;
        self
    }

    pub fn local_addrs(mut self, addrs: Vec<IpAddr>) -> Self {
        self.local_addrs = addrs;
        self
    }

    /// Validate the config. Currently only checks that `system` is non-empty;
    /// kept as its own step so future required fields have a home.
    pub fn build(self) -> Result<GossipConfig, GossipError> {
        if self.system.is_empty() {
            return Err(GossipError::MissingSystem);
        }
        Ok(self)
    }
}
