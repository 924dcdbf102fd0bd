//! Driver constants.
//!
//! Values shared across the DMA, stream and facade layers.

// =============================================================================
// DMA Controller
// =============================================================================

/// Number of channels in the DMA controller pool
pub const DMA_CHANNELS: usize = 8;

/// Largest byte count one hardware descriptor can carry (16-bit length field)
pub const DMA_MAX_LEN: usize = 0xFFFF;

/// Bytes per word-unit beat
pub const WORD_SIZE: usize = 4;

/// Beats per burst when bursting is possible
pub const BURST_BEATS: usize = 4;

/// Poll interval while waiting for a free channel (microseconds)
pub const CHANNEL_POLL_US: u32 = 10;

/// Default wait budget for a channel request (microseconds)
pub const DEFAULT_CHANNEL_TIMEOUT_US: u32 = 1_000;

/// Poll interval while waiting for a channel to halt (microseconds)
pub const HALT_POLL_US: u32 = 1;

/// Upper bound on the time a channel may take to halt (microseconds)
pub const HALT_TIMEOUT_US: u32 = 1_000;

// =============================================================================
// Rings
// =============================================================================

/// Deepest ring the 7-bit cursor encoding allows
pub const MAX_RING_DEPTH: usize = 128;

/// Tag written into every RX packet so foreign or corrupted packets are
/// rejected on release
pub const RX_PACKET_MAGIC: u32 = 0x5258_4E42;

/// Default RX packet size in bytes
pub const DEFAULT_PACKET_SIZE: usize = 1024;

/// Default number of RX packets the user may hold before the stream stops
pub const DEFAULT_PENDING_THRESHOLD: usize = 8;

// =============================================================================
// Locking
// =============================================================================

/// Spin budget for acquiring a device mutex
pub const DEFAULT_LOCK_SPINS: u32 = 10_000;
