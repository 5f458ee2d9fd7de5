//! Capabilities the host must supply: how to talk to a peer, how to learn
//! about status-edge transitions, and how peer reports are carried inside the
//! host's own wire payload type.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::BoxError;
use crate::peer_info::PeerInfo;

/// A peer report as carried inside the host's payload type. The core only
/// ever touches the embedded [`PeerInfo`]; everything else about the
/// carrier (sample application data, protocol envelopes, ...) is opaque.
pub trait PeerCarrier: Send + Sync + fmt::Debug {
    /// Read the embedded peer info.
    fn peer_info(&self) -> PeerInfo;

    /// Attach fresh info, or clear it (`None`) to trap accidental reuse of a
    /// carrier after the core has taken ownership of its data.
    fn set_peer_info(&mut self, info: Option<PeerInfo>);
}

/// The pluggable transport used to probe a peer.
///
/// Implementations decide the wire format (JSON/HTTP, an RPC framework,
/// anything else); the core only needs a bounded async call that sends this
/// node's info and returns whatever third-party reports the peer is willing
/// to share.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `my_info` to `addr`, bounded by `timeout`. On success, returns the
    /// peer's list of third-party reports.
    async fn send(
        &self,
        addr: &str,
        timeout: Duration,
        my_info: PeerInfo,
    ) -> Result<Vec<Box<dyn PeerCarrier>>, BoxError>;
}

/// Edge-notification callback, fired exactly on transitions into `Up`,
/// `Down`, or `Dead`.
///
/// Implementations may block; the core always invokes this from a spawned
/// task, never while holding a peer or DB lock.
pub trait Notifier: Send + Sync {
    fn notify(&self, id: &str, is_up: bool, is_same_subsystem: bool);
}
