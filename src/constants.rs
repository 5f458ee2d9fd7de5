//! Timing and size constants shared across the gossip core.

use std::time::Duration;

/// Timeout for a single probe's `Transport::send` call.
pub const TIMEOUT: Duration = Duration::from_secs(15);

/// A peer whose `last_try` is older than this is eligible for the `old` candidate category.
///
/// Must stay strictly less than [`KEEPLOST`], or peers would be re-probed and
/// expired on the same tick.
pub const OLDTIMER: Duration = Duration::from_secs(9 * 60);

/// How long a `DOWN` peer's data is kept around before `Cleanup` removes it.
pub const KEEPDOWN: Duration = Duration::from_secs(10 * 60);

/// How long we keep data about a peer we have not heard about at all.
pub const KEEPLOST: Duration = Duration::from_secs(10 * 60);

/// A NAT domain is considered "up" if a probe used it within this window.
pub const STALE: Duration = Duration::from_secs(2 * 60);

/// Consecutive probe failures before a `MAYBEDN` peer is marked `DOWN`.
pub const MAXFAIL: u32 = 3;

/// Maximum size in bytes of the `via` forwarding trail.
pub const MAXVIA: usize = 1024;

/// Normal gossip cadence once we have kibitzers and nothing is pending verification.
pub const GOSSIP_INTERVAL: Duration = Duration::from_secs(5);

/// Accelerated cadence during bootstrap or while sceptical peers await verification.
pub const FAST_INTERVAL: Duration = Duration::from_secs(1);

const _: () = assert!(OLDTIMER.as_nanos() < KEEPLOST.as_nanos());
