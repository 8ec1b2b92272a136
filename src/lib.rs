#![allow(dead_code)]

//! Columnar compression core for a time-series storage engine: the Gorilla
//! codec, the row compressor/decompressor built on top of it, and a
//! streaming batch executor (with an optional k-way sorted merge across
//! segments) that reverses the transformation at scan time.

pub mod error;

mod storage;
mod utils;

pub use error::CompressionError;

pub use storage::{
    Batch, BatchExecutor, BatchQueueHeap, ColumnInfo, ColumnKind, CompressedRow, OrderBySpec,
    RowCompressor, RowCompressorConfig, RowDecompressor, ScanDirection, SortDirection, SortKey,
};

pub use storage::gorilla::{
    bulk as gorilla_bulk, iter_forward as gorilla_iter_forward, iter_reverse as gorilla_iter_reverse,
    GorillaCompressor, GorillaElement,
};
pub use storage::registry::{
    algorithm_id_of, datum_partial_cmp, lookup as lookup_algorithm, AlgorithmEntry, Compressor, Datum,
    DatumKind, ToastStoragePreference,
};
pub use storage::segment_stats::{SegmentStatsBuilder, SegmentStatValue};

pub use storage::{
    ALGORITHM_ID_ARRAY, ALGORITHM_ID_DELTA_DELTA, ALGORITHM_ID_DICTIONARY, ALGORITHM_ID_GORILLA,
    BITS_PER_LEADING_ZEROS, GLOBAL_MAX_ROWS_PER_COMPRESSION, MAX_ROWS_PER_COMPRESSION, SEQUENCE_NUM_GAP,
};
