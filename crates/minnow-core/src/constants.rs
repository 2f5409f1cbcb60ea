//! Protocol constants. All monetary values in satoshis (1 coin = 10^8 satoshis).

/// Satoshis per coin.
pub const COIN: u64 = 100_000_000;

/// Minimum output value worth carrying as change.
///
/// A change output at or below this threshold costs more in fee bytes than
/// it returns, so it is folded into the fee instead.
pub const DUST_THRESHOLD: u64 = 546;

/// Default relay fee rate in satoshis per byte, used when the network
/// provider does not supply one.
pub const DEFAULT_RELAY_FEE_PER_BYTE: f64 = 1.0;

/// Maximum NFT commitment length in bytes.
pub const MAX_COMMITMENT_LEN: usize = 40;

/// Transaction version emitted by the builder.
pub const TX_VERSION: u64 = 2;

/// Lock time emitted by the builder (no time lock).
pub const TX_LOCK_TIME: u64 = 0;
