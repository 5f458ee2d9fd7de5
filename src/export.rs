//! The read-only `Export` view used by hosts that want a flattened summary of
//! a peer (or of this node itself) instead of the raw wire `PeerInfo`.

use crate::clock::LogicalTime;
use crate::peer_info::NetInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub id: String,
    pub net_info: Vec<NetInfo>,
    pub subsystem: String,
    pub environment: String,
    pub hostname: String,
    pub rack: String,
    pub datacenter: String,
    pub best_addr: String,
    pub time_up: LogicalTime,
    pub is_up: bool,
    pub is_same_rack: bool,
    pub is_same_dc: bool,
}
