//! Tracks liveness of each NAT domain this node participates in, based on
//! observed successful probes that used an address in that domain.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::STALE;
use crate::identity::PUBLIC_DOMAIN;

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos() as u64
}

fn net_name(dom: &str) -> String {
    if dom.is_empty() {
        PUBLIC_DOMAIN.to_string()
    } else {
        dom.to_string()
    }
}

/// `natdom -> last-successful-probe-time (wall nanoseconds)`.
#[derive(Debug, Default)]
pub struct NetworkMonitor {
    last_up: RwLock<HashMap<String, u64>>,
}

impl NetworkMonitor {
    pub fn new() -> Self {
        NetworkMonitor {
            last_up: RwLock::new(HashMap::new()),
        }
    }

    /// Register a domain we belong to. It starts out considered up.
    pub fn add(&self, dom: &str) {
        let dom = net_name(dom);
        tracing::debug!(domain = %dom, "registering local NAT domain");
        self.last_up.write().unwrap().insert(dom, now_nanos());
    }

    /// Refresh `dom`'s last-up time, but only if we already track it.
    pub fn set_up(&self, dom: &str) {
        let dom = net_name(dom);
        let mut map = self.last_up.write().unwrap();
        if let Some(t) = map.get_mut(&dom) {
            *t = now_nanos();
        }
    }

    /// Returns `(is_up, is_known)`. An unknown domain is never considered up.
    pub fn is_up(&self, dom: &str) -> (bool, bool) {
        let dom = net_name(dom);
        let map = self.last_up.read().unwrap();
        match map.get(&dom) {
            Some(&t) => {
                let up = now_nanos().saturating_sub(t) <= STALE.as_nanos() as u64;
                (up, true)
            }
            None => (false, false),
        }
    }
}
