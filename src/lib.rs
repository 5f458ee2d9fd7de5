//! Gossip-based peer membership and liveness core.
//!
//! A host embeds [`GossipDb`] to track which peers in its subsystem are
//! reachable, without a central coordinator: each node periodically probes
//! one other peer (or, if none are known yet, a configured seed), merges
//! whatever third-party reports come back, and ages out peers that stop
//! checking in. See `SPEC_FULL.md` for the full design.
//!
//! The crate supplies no networking of its own — [`Transport`] and
//! [`Notifier`] are host-implemented capabilities, wired in via
//! [`GossipConfig`].

mod candidate;
mod clock;
mod config;
mod constants;
mod db;
mod driver;
mod error;
mod export;
mod identity;
mod netmon;
mod peer;
mod peer_info;
mod sampling;
mod transport;

pub use clock::LogicalTime;
pub use config::GossipConfig;
pub use db::GossipDb;
pub use error::{BoxError, GossipError};
pub use export::Export;
pub use peer::{Peer, PeerStatus};
pub use peer_info::{NetInfo, PeerInfo};
pub use transport::{Notifier, PeerCarrier, Transport};
