//! A single remote peer's in-memory record: status, merge logic, and the
//! liveness state machine.
//!
//! Each record owns its own mutex — set-membership questions ("is this peer
//! in `kibitzers`?") belong to [`crate::db::GossipDb`], not here. See the
//! crate's lock-order note: the DB lock is always acquired before a peer
//! lock, never the reverse.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Instant;

use crate::clock::LogicalTime;
use crate::constants::MAXFAIL;
use crate::export::Export;
use crate::peer_info::PeerInfo;
use crate::transport::PeerCarrier;

/// Liveness classification. Numeric values mirror the wire `status_code`
/// convention the original implementation used (kept contiguous-but-gapped
/// for compatibility with hosts that serialise the raw code).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(i32)]
pub enum PeerStatus {
    Unknown = 0,
    Up = 2,
    MaybeDown = 3,
    Down = 4,
    Sceptical = 5,
    Dead = 6,
}

impl std::fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PeerStatus::Unknown => "UNKNOWN",
            PeerStatus::Up => "UP",
            PeerStatus::MaybeDown => "MaybeDOWN",
            PeerStatus::Down => "DOWN",
            PeerStatus::Sceptical => "SCEPTICAL",
            PeerStatus::Dead => "DEAD",
        };
        f.write_str(s)
    }
}

impl PeerStatus {
    pub fn from_code(code: i32) -> PeerStatus {
        match code {
            2 => PeerStatus::Up,
            3 => PeerStatus::MaybeDown,
            4 => PeerStatus::Down,
            5 => PeerStatus::Sceptical,
            6 => PeerStatus::Dead,
            _ => PeerStatus::Unknown,
        }
    }
}

/// A status edge worth telling the host about. Only fired on transitions
/// into `Up`, `Down`, or `Dead` — never for a mere config change.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StatusEdge {
    Up,
    Down,
    Dead,
}

struct PeerInner {
    status: PeerStatus,
    num_fail: u32,
    last_try: Option<Instant>,
    best_addr: String,
    info: PeerInfo,
    user_data: Option<Box<dyn PeerCarrier>>,
}

/// In-memory peer record. `id` is immutable and duplicated from `info` for
/// lock-free access.
pub struct Peer {
    pub id: String,
    inner: Mutex<PeerInner>,
}

impl Peer {
    /// Construct a new record from a freshly-received [`PeerInfo`] in the
    /// given starting status (`Unknown` for third-party reports, `Sceptical`
    /// for direct self-introduction).
    pub fn new(info: PeerInfo, status: PeerStatus) -> Peer {
        let id = info.server_id.clone();
        Peer {
            id,
            inner: Mutex::new(PeerInner {
                status,
                num_fail: 0,
                last_try: None,
                best_addr: String::new(),
                info,
                user_data: None,
            }),
        }
    }

    /// Current liveness status.
    pub fn status(&self) -> PeerStatus {
        self.inner.lock().unwrap().status
    }

    pub fn last_try(&self) -> Option<Instant> {
        self.inner.lock().unwrap().last_try
    }

    pub fn datacenter(&self) -> String {
        self.inner.lock().unwrap().info.datacenter.clone()
    }

    pub fn subsystem(&self) -> String {
        self.inner.lock().unwrap().info.subsystem.clone()
    }

    pub fn net_info(&self) -> Vec<crate::peer_info::NetInfo> {
        self.inner.lock().unwrap().info.net_info.clone()
    }

    pub fn info(&self) -> PeerInfo {
        self.inner.lock().unwrap().info.clone()
    }

    /// Merge an incoming third-party (or self-reported) report, carried by
    /// `carrier`.
    ///
    /// Returns the status edge to notify the host of, if any. `own_domains`
    /// and `self_id` come from this node's [`crate::identity::SelfIdentity`]
    /// and are read-only, so calling this while holding no other lock is safe
    /// per the crate's lock-order rule.
    ///
    /// A `time_created` that is not strictly newer than the stored value is
    /// always a no-op, independent of `time_checked` or the record's current
    /// status. There is no `Unknown`-status exception.
    pub fn update(
        &self,
        mut carrier: Box<dyn PeerCarrier>,
        own_domains: &HashSet<String>,
        self_id: &str,
    ) -> Option<StatusEdge> {
        let mut new_info = carrier.peer_info();
        let mut inner = self.inner.lock().unwrap();

        if new_info.time_created <= inner.info.time_created {
            tracing::trace!(peer = %self.id, "discarding stale or duplicate update");
            return None;
        }

        let mut changed = new_info.time_conf > inner.info.time_conf;

        let best = figure_best_addr(&new_info, own_domains);
        if best != inner.best_addr {
            inner.best_addr = best;
            changed = true;
        }

        new_info.append_via(self_id);
        let incoming_status = PeerStatus::from_code(new_info.status_code);
        inner.info = new_info;

        carrier.set_peer_info(None);
        inner.user_data = Some(carrier);

        change_status(&mut inner, incoming_status, changed, &self.id)
    }

    /// Record a successful probe.
    pub fn set_is_up(&self, now: LogicalTime) -> Option<StatusEdge> {
        let mut inner = self.inner.lock().unwrap();
        let was_up = inner.status == PeerStatus::Up && inner.info.time_up_since != 0;

        inner.num_fail = 0;
        inner.last_try = Some(Instant::now());
        inner.info.time_last_up = now;
        inner.info.time_checked = now;
        if !was_up {
            inner.info.time_up_since = now;
        }

        change_status(&mut inner, PeerStatus::Up, false, &self.id)
    }

    /// Record a failed probe.
    pub fn set_maybe_dn(&self, now: LogicalTime) -> Option<StatusEdge> {
        let mut inner = self.inner.lock().unwrap();
        inner.num_fail += 1;
        inner.last_try = Some(Instant::now());
        inner.info.time_checked = now;
        inner.info.time_up_since = now;

        let next = if inner.num_fail > MAXFAIL || inner.status == PeerStatus::Down {
            PeerStatus::Down
        } else {
            PeerStatus::MaybeDown
        };
        change_status(&mut inner, next, false, &self.id)
    }

    /// Force this record to `Dead`. Always produces a `Dead` edge.
    pub fn kill(&self) -> Option<StatusEdge> {
        let mut inner = self.inner.lock().unwrap();
        change_status(&mut inner, PeerStatus::Dead, false, &self.id)
    }

    pub fn export(&self, self_rack: &str, self_dc: &str) -> Export {
        let inner = self.inner.lock().unwrap();
        Export {
            id: self.id.clone(),
            net_info: inner.info.net_info.clone(),
            subsystem: inner.info.subsystem.clone(),
            environment: inner.info.environment.clone(),
            hostname: inner.info.hostname.clone(),
            rack: inner.info.rack.clone(),
            datacenter: inner.info.datacenter.clone(),
            best_addr: inner.best_addr.clone(),
            time_up: inner.info.time_last_up,
            is_up: inner.status == PeerStatus::Up,
            is_same_rack: inner.info.rack == self_rack,
            is_same_dc: inner.info.datacenter == self_dc,
        }
    }
}

/// Recompute the best address for `info` given which NAT domains we can
/// reach. Last private match wins; a public entry only fills an empty slot.
fn figure_best_addr(info: &PeerInfo, own_domains: &HashSet<String>) -> String {
    let mut best = String::new();
    for ni in &info.net_info {
        if !ni.natdom.is_empty() {
            if own_domains.contains(&ni.natdom) {
                best = ni.addr.clone();
            }
        } else if best.is_empty() {
            best = ni.addr.clone();
        }
    }
    best
}

fn change_status(
    inner: &mut PeerInner,
    new_status: PeerStatus,
    config_changed: bool,
    id: &str,
) -> Option<StatusEdge> {
    let old_status = inner.status;
    inner.status = new_status;

    if matches!(new_status, PeerStatus::Up | PeerStatus::Down) {
        inner.info.set_status(new_status);
    }

    if old_status != new_status {
        tracing::debug!(peer = %id, from = %old_status, to = %new_status, "peer status changed");
    }

    if old_status == new_status && !config_changed {
        return None;
    }

    match new_status {
        PeerStatus::Up => Some(StatusEdge::Up),
        PeerStatus::Down => Some(StatusEdge::Down),
        PeerStatus::Dead => Some(StatusEdge::Dead),
        _ => None,
    }
}
