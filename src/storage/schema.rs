//! Column-role metadata shared between the row compressor and the row
//! decompressor: both need to agree, for a given compressed table, on which
//! input column plays which role and where it lands in the compressed
//! tuple.

use crate::storage::compression::registry::DatumKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBySpec {
    pub nulls_first: bool,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    SegmentBy,
    OrderBy(OrderBySpec),
    Value,
}

/// One uncompressed column's role, type, and position in the compressed
/// tuple it's projected into. `offset_in_compressed_tuple` is the index a
/// row compressor/decompressor uses to read/write that column's slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnInfo {
    pub kind: ColumnKind,
    pub datum_kind: DatumKind,
    pub offset_in_compressed_tuple: usize,
}

impl ColumnInfo {
    pub fn segment_by(datum_kind: DatumKind, offset_in_compressed_tuple: usize) -> Self {
        Self {
            kind: ColumnKind::SegmentBy,
            datum_kind,
            offset_in_compressed_tuple,
        }
    }

    pub fn order_by(datum_kind: DatumKind, offset_in_compressed_tuple: usize, spec: OrderBySpec) -> Self {
        Self {
            kind: ColumnKind::OrderBy(spec),
            datum_kind,
            offset_in_compressed_tuple,
        }
    }

    pub fn value(datum_kind: DatumKind, offset_in_compressed_tuple: usize) -> Self {
        Self {
            kind: ColumnKind::Value,
            datum_kind,
            offset_in_compressed_tuple,
        }
    }
}

/// Per-compression-run configuration: which columns play which role, and
/// (for recompression) the `sequence_num` to resume from instead of
/// restarting each segment at `SEQUENCE_NUM_GAP`.
#[derive(Debug, Clone)]
pub struct RowCompressorConfig {
    pub columns: Vec<ColumnInfo>,
    pub starting_sequence_num: Option<i32>,
}

impl RowCompressorConfig {
    pub fn new(columns: Vec<ColumnInfo>) -> Self {
        Self {
            columns,
            starting_sequence_num: None,
        }
    }

    pub fn segment_by_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| c.kind == ColumnKind::SegmentBy)
    }

    pub fn order_by_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns
            .iter()
            .filter(|c| matches!(c.kind, ColumnKind::OrderBy(_)))
    }

    pub fn value_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| c.kind == ColumnKind::Value)
    }

    /// Every column whose values are themselves compressed into a blob:
    /// both `ORDER_BY` and `VALUE` columns, in schema order. `SEGMENT_BY`
    /// columns are stored verbatim instead and excluded here.
    pub fn data_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns
            .iter()
            .filter(|c| !matches!(c.kind, ColumnKind::SegmentBy))
    }
}
