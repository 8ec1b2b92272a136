mod compression;
mod batch;
mod row_compressor;
mod row_decompressor;
mod schema;

pub use batch::{heap::{BatchQueueHeap, SortKey}, Batch, BatchExecutor, ScanDirection};
pub use compression::*;
pub use row_compressor::{CompressedRow, RowCompressor};
pub use row_decompressor::RowDecompressor;
pub use schema::{ColumnInfo, ColumnKind, OrderBySpec, RowCompressorConfig, SortDirection};

/// Little-endian fixed-width byte readers shared by the bit-level codecs.
pub struct FileReaderUtils;

impl FileReaderUtils {
    #[inline]
    pub fn read_u64_8(buf: &[u8]) -> u64 {
        u64::from_le_bytes(buf.try_into().unwrap())
    }
}
