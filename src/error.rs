//! Error types.
//!
//! Steady-state gossip operation has no user-visible error path: transport
//! failures become `PeerDn`, bad reports are silently dropped by `is_ok`. This
//! type only covers configuration-time mistakes.

use thiserror::Error;

/// A type-erased error, for use by host-supplied [`crate::transport::Transport`]
/// implementations that may fail for arbitrary reasons.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Configuration or setup failure.
#[derive(Debug, Error)]
pub enum GossipError {
    /// `system` is required and was left empty.
    #[error("GossipConfig::system must not be empty")]
    MissingSystem,

    /// A seed address could not be parsed.
    #[error("invalid seed address {0:?}")]
    InvalidSeed(String),
}
