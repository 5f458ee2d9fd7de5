//! The replicated wire record and its pieces.

use serde::{Deserialize, Serialize};

use crate::clock::LogicalTime;
use crate::constants::MAXVIA;
use crate::peer::PeerStatus;

/// A single address this peer can be reached at, tagged with its NAT domain.
///
/// `natdom` is empty for a public address; otherwise it names the datacenter
/// (or, failing that, the CIDR block) the address lives behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetInfo {
    pub addr: String,
    pub natdom: String,
}

/// The full per-peer record as it travels over the wire.
///
/// All timestamps are [`LogicalTime`] values, not wall-clock time: they are
/// only ever compared to each other, never interpreted as a duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub server_id: String,
    pub subsystem: String,
    pub environment: String,
    pub hostname: String,
    pub datacenter: String,
    pub rack: String,
    pub net_info: Vec<NetInfo>,
    pub status_code: i32,
    pub time_created: LogicalTime,
    pub time_checked: LogicalTime,
    pub time_last_up: LogicalTime,
    pub time_up_since: LogicalTime,
    pub time_conf: LogicalTime,
    pub via: String,
}

impl PeerInfo {
    /// Set `status_code` from a [`PeerStatus`], mirroring `changeStatus`'s
    /// "only UP/DOWN are gossiped" rule is enforced by the caller, not here.
    pub fn set_status(&mut self, status: PeerStatus) {
        self.status_code = status as i32;
    }

    /// Append `forwarder_id` to the via-trail, truncating at [`MAXVIA`] bytes
    /// from the left.
    pub fn append_via(&mut self, forwarder_id: &str) {
        if self.via.is_empty() {
            self.via = forwarder_id.to_string();
        } else {
            self.via.push(' ');
            self.via.push_str(forwarder_id);
        }
        if self.via.len() > MAXVIA {
            // truncate on a char boundary at or before the cap
            let mut cut = MAXVIA;
            while !self.via.is_char_boundary(cut) {
                cut -= 1;
            }
            self.via.truncate(cut);
        }
    }
}
