//! Probe-target selection: weighted reservoir sampling over peer categories,
//! then best-address selection within the chosen peer.
//!
//! Grounded in the original `getRandomPeer`/`useAddr` (see
//! `examples/original_source/kibitz.go`) and structurally inspired by the
//! teacher's `CandidateSet`: classify candidates into disjoint categories in
//! one pass under a read lock, then pick without awaiting anything.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::constants::OLDTIMER;
use crate::netmon::NetworkMonitor;
use crate::peer::{Peer, PeerStatus};
use crate::sampling::{random_n, Reservoir};

/// A concrete probe target: an address, the NAT domain it lives in, and the
/// peer id it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub addr: String,
    pub natdom: String,
    pub peer_id: String,
}

/// Pick one peer to probe this cycle, per §4.6.1. `kibitzers` are our
/// same-subsystem gossip partners; `skeptical` are peers that contacted us
/// directly but are not yet corroborated.
pub fn choose_peer(
    kibitzers: &HashMap<String, Arc<Peer>>,
    skeptical: &HashMap<String, Arc<Peer>>,
    self_dc: &str,
) -> Option<Arc<Peer>> {
    let old_limit = Instant::now().checked_sub(OLDTIMER);

    let mut check: Reservoir<Arc<Peer>> = Reservoir::new();
    let mut old: Reservoir<Arc<Peer>> = Reservoir::new();
    let mut local: Reservoir<Arc<Peer>> = Reservoir::new();
    let mut away: Reservoir<Arc<Peer>> = Reservoir::new();
    let mut skept: Reservoir<Arc<Peer>> = Reservoir::new();

    let mut n_all = 0u32;

    for p in kibitzers.values() {
        n_all += 1;

        if p.status() == PeerStatus::MaybeDown {
            check.consider(p.clone());
        }

        let is_old = match (p.last_try(), old_limit) {
            (Some(last_try), Some(limit)) => last_try < limit,
            (None, _) => true,
            (Some(_), None) => false,
        };
        if is_old {
            old.consider(p.clone());
        }

        if p.datacenter() == self_dc {
            local.consider(p.clone());
        } else {
            away.consider(p.clone());
        }
    }

    for p in skeptical.values() {
        skept.consider(p.clone());
    }

    // 1. sceptical peers take top priority: verify suspected new peers promptly.
    let mut chosen = skept.into_inner();

    // 2. maybe something pending reconnection
    if chosen.is_none() {
        if let Some(p) = check.into_inner() {
            if random_n(5) {
                chosen = Some(p);
            }
        }
    }

    // 3. maybe something about to expire
    if chosen.is_none() {
        if let Some(p) = old.into_inner() {
            if random_n(5) {
                chosen = Some(p);
            }
        }
    }

    // 4. maybe something far away (more often if we don't have many local peers)
    if chosen.is_none() {
        let k = if local.len() >= 5 { 5 } else { 2 };
        if let Some(p) = away.into_inner() {
            if random_n(k) {
                chosen = Some(p);
            }
        }
    }

    // 5. otherwise prefer local
    if chosen.is_none() {
        chosen = local.into_inner();
    }

    // 6. occasionally bypass everything, so the driver falls back to a seed
    //    and the cluster can heal a partition.
    if random_n(2 * n_all + 2) {
        chosen = None;
    }

    chosen
}

/// Pick a concrete address to probe on `peer`, per §4.6.1's `useAddr`.
/// Addresses on an unknown NAT domain are skipped entirely: we cannot route
/// to a private network we don't participate in.
pub fn choose_addr(peer: &Peer, netmon: &NetworkMonitor) -> Option<ProbeTarget> {
    let mut private: Reservoir<crate::peer_info::NetInfo> = Reservoir::new();
    let mut public: Reservoir<crate::peer_info::NetInfo> = Reservoir::new();
    let mut down: Reservoir<crate::peer_info::NetInfo> = Reservoir::new();

    for ni in peer.net_info() {
        let (is_up, known) = netmon.is_up(&ni.natdom);
        if !known {
            continue;
        }
        if is_up {
            if ni.natdom.is_empty() {
                public.consider(ni);
            } else {
                private.consider(ni);
            }
        } else {
            down.consider(ni);
        }
    }

    let mut prefer = private.into_inner();
    if prefer.is_none() || random_n(20) {
        if let Some(p) = public.into_inner() {
            prefer = Some(p);
        }
    }
    if prefer.is_none() || random_n(20) {
        if let Some(d) = down.into_inner() {
            prefer = Some(d);
        }
    }

    prefer.map(|ni| ProbeTarget {
        addr: ni.addr,
        natdom: ni.natdom,
        peer_id: peer.id.clone(),
    })
}
