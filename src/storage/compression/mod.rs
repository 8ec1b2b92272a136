//! Columnar compression core: the Gorilla codec, its bit-level substrates,
//! the algorithm registry that dispatches on-disk algorithm IDs to codec
//! implementations, and per-segment min/max tracking.

pub mod bitstream;
pub mod gorilla;
pub mod registry;
pub mod segment_stats;

/// Maximum number of uncompressed rows folded into one compressed row.
pub const MAX_ROWS_PER_COMPRESSION: usize = 1000;

/// Validation ceiling: a compressed row's `count` metadata must never exceed
/// this, even for rows produced by a relaxed/test configuration.
pub const GLOBAL_MAX_ROWS_PER_COMPRESSION: usize = 1015;

/// Gap left between consecutive `sequence_num` values within a segment, to
/// leave room for later in-place insertions without renumbering.
pub const SEQUENCE_NUM_GAP: i32 = 10;

/// Width of each `leading_zeros` bit-array entry in the Gorilla blob.
pub const BITS_PER_LEADING_ZEROS: u32 = 6;

/// Largest serialized blob a codec will ever produce. Mirrors postgres'
/// `MaxAllocSize` (`0x3FFFFFFF`, 1 GiB minus one byte), which the upstream
/// Gorilla serializer checks the assembled compressed size against before
/// allocating it.
pub const MAX_COMPRESSED_BLOB_SIZE: usize = 0x3FFF_FFFF;

pub const ALGORITHM_ID_ARRAY: u8 = 1;
pub const ALGORITHM_ID_DICTIONARY: u8 = 2;
pub const ALGORITHM_ID_GORILLA: u8 = 3;
pub const ALGORITHM_ID_DELTA_DELTA: u8 = 4;

crate::utils::static_assert!(MAX_ROWS_PER_COMPRESSION <= GLOBAL_MAX_ROWS_PER_COMPRESSION);
