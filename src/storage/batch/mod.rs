//! Turns a stream of compressed rows into a stream of decompressed rows.
//!
//! Each compressed row becomes one [`Batch`]: columns the Gorilla bulk arrow
//! path covers (32/64-bit element widths) are materialized up front into a
//! dense `Vec`; every other column (16-bit Gorilla, or any other algorithm)
//! is driven lazily, one row at a time, from an owned per-row iterator that
//! outlives the compressed row it was built from — so a column nobody reads
//! to the end never pays to decode rows past where the caller stopped.
//! `SEGMENT_BY` columns are held as a single scalar repeated for every row.
//! A `Batch`'s buffers are dropped — the per-batch "arena" — the moment the
//! executor moves on to the next compressed row.

pub mod heap;

use crate::error::CompressionError;
use crate::storage::compression::gorilla::bulk;
use crate::storage::compression::registry::{algorithm_id_of, lookup, Datum, DatumIter, DatumKind};
use crate::storage::compression::ALGORITHM_ID_GORILLA;
use crate::storage::row_compressor::CompressedRow;
use crate::storage::schema::{ColumnKind, RowCompressorConfig};
use arrow_array::Array;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Forward,
    Reverse,
}

/// Drives one non-bulk-eligible column one row at a time. The first value is
/// prefetched at construction so `current()` can stay a plain, non-mutating
/// read; `advance()` (called alongside the batch cursor) pulls the next one.
struct LazyColumn {
    iter: DatumIter,
    cached: Option<Result<Option<Datum>, CompressionError>>,
}

impl LazyColumn {
    fn new(mut iter: DatumIter) -> Self {
        let cached = iter.next();
        Self { iter, cached }
    }

    fn current(&self) -> Result<Option<Datum>, CompressionError> {
        match &self.cached {
            Some(r) => r.clone(),
            None => Err(CompressionError::out_of_sync(
                "lazy column iterator exhausted before batch cursor reached the end",
            )),
        }
    }

    fn advance(&mut self) {
        self.cached = self.iter.next();
    }
}

enum ColumnValues {
    SegmentBy(Option<Datum>),
    Dense(Vec<Option<Datum>>),
    Lazy(LazyColumn),
}

/// The in-memory expansion of one compressed row. Holds a 0-based row
/// cursor that walks forward or backward depending on scan direction.
pub struct Batch {
    columns: Vec<ColumnValues>,
    total_rows: usize,
    cursor: isize,
}

impl Batch {
    pub fn from_compressed_row(
        config: &RowCompressorConfig,
        row: &CompressedRow,
        direction: ScanDirection,
    ) -> Result<Self, CompressionError> {
        let count = row.count as usize;
        let mut columns = Vec::with_capacity(config.columns.len());
        let mut segment_by_idx = 0;
        let mut value_idx = 0;

        for col in &config.columns {
            match col.kind {
                ColumnKind::SegmentBy => {
                    columns.push(ColumnValues::SegmentBy(row.segment_by[segment_by_idx]));
                    segment_by_idx += 1;
                }
                ColumnKind::OrderBy(_) | ColumnKind::Value => {
                    let blob = &row.value_blobs[value_idx];
                    value_idx += 1;
                    columns.push(decode_column(col.datum_kind, blob, count, direction)?);
                }
            }
        }

        let cursor = match direction {
            ScanDirection::Forward => 0,
            ScanDirection::Reverse => count as isize - 1,
        };
        Ok(Self {
            columns,
            total_rows: count,
            cursor,
        })
    }

    /// The row at the current cursor position, or `None` if the cursor has
    /// run off either end. `Err` surfaces a lazy column's decode failure
    /// (corrupted blob, or an iterator running dry early) at read time.
    pub fn current_row(&self) -> Result<Option<Vec<Option<Datum>>>, CompressionError> {
        if self.cursor < 0 || self.cursor as usize >= self.total_rows {
            return Ok(None);
        }
        let idx = self.cursor as usize;
        let mut out = Vec::with_capacity(self.columns.len());
        for c in &self.columns {
            let v = match c {
                ColumnValues::SegmentBy(v) => *v,
                ColumnValues::Dense(vals) => vals[idx],
                ColumnValues::Lazy(lc) => lc.current()?,
            };
            out.push(v);
        }
        Ok(Some(out))
    }

    pub fn advance(&mut self, direction: ScanDirection) {
        match direction {
            ScanDirection::Forward => self.cursor += 1,
            ScanDirection::Reverse => self.cursor -= 1,
        }
        for c in &mut self.columns {
            if let ColumnValues::Lazy(lc) = c {
                lc.advance();
            }
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor < 0 || self.cursor as usize >= self.total_rows
    }
}

fn dense_from_arrow(kind: DatumKind, blob: &[u8], count: usize) -> Result<Vec<Option<Datum>>, CompressionError> {
    match kind {
        DatumKind::I32 => {
            let arr = bulk::decode_i32(blob, count)?;
            Ok((0..count)
                .map(|i| (!arr.is_null(i)).then(|| Datum::I32(arr.value(i))))
                .collect())
        }
        DatumKind::I64 => {
            let arr = bulk::decode_i64(blob, count)?;
            Ok((0..count)
                .map(|i| (!arr.is_null(i)).then(|| Datum::I64(arr.value(i))))
                .collect())
        }
        DatumKind::F32 => {
            let arr = bulk::decode_f32(blob, count)?;
            Ok((0..count)
                .map(|i| (!arr.is_null(i)).then(|| Datum::F32(arr.value(i))))
                .collect())
        }
        DatumKind::F64 => {
            let arr = bulk::decode_f64(blob, count)?;
            Ok((0..count)
                .map(|i| (!arr.is_null(i)).then(|| Datum::F64(arr.value(i))))
                .collect())
        }
        DatumKind::I16 => unreachable!("caller only reaches here for bulk-eligible kinds"),
    }
}

/// Builds the `ColumnValues` for one non-`SEGMENT_BY` column: the Gorilla
/// bulk arrow path (32/64-bit widths) eagerly materializes into `Dense`;
/// everything else — Gorilla `i16`, or any other algorithm — gets a `Lazy`
/// column driven by the registry's owned per-row iterator, so a caller that
/// doesn't read the column to the end never pays to decode every row.
fn decode_column(
    kind: DatumKind,
    blob: &[u8],
    count: usize,
    direction: ScanDirection,
) -> Result<ColumnValues, CompressionError> {
    let algorithm_id = algorithm_id_of(blob)?;
    let bulk_eligible = algorithm_id == ALGORITHM_ID_GORILLA && !matches!(kind, DatumKind::I16);
    if bulk_eligible {
        return Ok(ColumnValues::Dense(dense_from_arrow(kind, blob, count)?));
    }

    let entry = lookup(algorithm_id)?;
    let iter: DatumIter = match direction {
        ScanDirection::Forward => (entry.iter_forward_owned)(kind, blob, count)?,
        ScanDirection::Reverse => (entry.iter_reverse_owned)(kind, blob, count)?,
    };
    Ok(ColumnValues::Lazy(LazyColumn::new(iter)))
}

/// Drives a stream of compressed rows into a stream of decompressed rows,
/// one `Batch` at a time.
pub struct BatchExecutor<'a, I: Iterator<Item = CompressedRow>> {
    config: &'a RowCompressorConfig,
    source: I,
    direction: ScanDirection,
    current: Option<Batch>,
}

impl<'a, I: Iterator<Item = CompressedRow>> BatchExecutor<'a, I> {
    pub fn new(config: &'a RowCompressorConfig, source: I, direction: ScanDirection) -> Self {
        Self {
            config,
            source,
            direction,
            current: None,
        }
    }

    /// Draws the next decompressed row, pulling and materializing a new
    /// batch from `source` whenever the current one is exhausted. Returns
    /// `Ok(None)` once `source` itself is exhausted.
    pub fn next_row(&mut self) -> Result<Option<Vec<Option<Datum>>>, CompressionError> {
        loop {
            if self.current.is_none() {
                let Some(row) = self.source.next() else {
                    return Ok(None);
                };
                let count = row.count;
                let batch = Batch::from_compressed_row(self.config, &row, self.direction)?;
                log::debug!("batch transition: rows={count}, direction={:?}", self.direction);
                self.current = Some(batch);
            }

            let batch = self.current.as_mut().expect("set just above");
            match batch.current_row()? {
                Some(values) => {
                    batch.advance(self.direction);
                    return Ok(Some(values));
                }
                None => {
                    self.current = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::compression::registry::DatumKind;
    use crate::storage::row_compressor::RowCompressor;
    use crate::storage::schema::{ColumnInfo, OrderBySpec, SortDirection};

    fn config() -> RowCompressorConfig {
        RowCompressorConfig::new(vec![
            ColumnInfo::segment_by(DatumKind::I32, 0),
            ColumnInfo::order_by(
                DatumKind::I64,
                1,
                OrderBySpec {
                    nulls_first: false,
                    direction: SortDirection::Ascending,
                },
            ),
            ColumnInfo::value(DatumKind::F64, 2),
        ])
    }

    fn compress(rows: &[Vec<Option<Datum>>]) -> Vec<CompressedRow> {
        let mut rc = RowCompressor::new(config());
        for row in rows {
            rc.push_row(row).unwrap();
        }
        rc.finish().unwrap()
    }

    #[test]
    fn test_forward_scan_materializes_every_row() {
        let inputs: Vec<Vec<Option<Datum>>> = (0..30)
            .map(|i| vec![Some(Datum::I32(1)), Some(Datum::I64(i)), Some(Datum::F64(i as f64))])
            .collect();
        let compressed = compress(&inputs);
        let cfg = config();
        let mut exec = BatchExecutor::new(&cfg, compressed.into_iter(), ScanDirection::Forward);
        let mut out = Vec::new();
        while let Some(row) = exec.next_row().unwrap() {
            out.push(row);
        }
        assert_eq!(out, inputs);
    }

    #[test]
    fn test_reverse_scan_yields_rows_backwards_within_batch() {
        let inputs: Vec<Vec<Option<Datum>>> = (0..10)
            .map(|i| vec![Some(Datum::I32(1)), Some(Datum::I64(i)), Some(Datum::F64(i as f64))])
            .collect();
        let compressed = compress(&inputs);
        let cfg = config();
        let mut exec = BatchExecutor::new(&cfg, compressed.into_iter(), ScanDirection::Reverse);
        let mut out = Vec::new();
        while let Some(row) = exec.next_row().unwrap() {
            out.push(row);
        }
        let mut expected = inputs;
        expected.reverse();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_multiple_segments_yield_in_producer_order() {
        let mut inputs = Vec::new();
        for seg in [0, 1] {
            for i in 0..5 {
                inputs.push(vec![Some(Datum::I32(seg)), Some(Datum::I64(i)), Some(Datum::F64(i as f64))]);
            }
        }
        let compressed = compress(&inputs);
        assert_eq!(compressed.len(), 2);
        let cfg = config();
        let mut exec = BatchExecutor::new(&cfg, compressed.into_iter(), ScanDirection::Forward);
        let mut out = Vec::new();
        while let Some(row) = exec.next_row().unwrap() {
            out.push(row);
        }
        assert_eq!(out, inputs);
    }
}
