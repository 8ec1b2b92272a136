//! Given one compressed row, drives a per-column iterator (or a verbatim
//! segment-by scalar) and reconstructs uncompressed tuples one at a time.

use crate::error::CompressionError;
use crate::storage::compression::registry::{algorithm_id_of, lookup, Datum};
use crate::storage::row_compressor::CompressedRow;
use crate::storage::schema::RowCompressorConfig;

enum ColumnSource {
    SegmentByScalar(Option<Datum>),
    Values(std::vec::IntoIter<Result<Option<Datum>, CompressionError>>),
}

/// Draws rows one at a time out of a single compressed row. Each column's
/// source is either the verbatim segment-by scalar or a fully-materialized
/// per-row value list from that column's blob. Values are copied out of the
/// compressed row up front, so this holds no borrow on it.
pub struct RowDecompressor {
    sources: Vec<ColumnSource>,
    count: usize,
    emitted: usize,
}

impl RowDecompressor {
    pub fn new(config: &RowCompressorConfig, row: &CompressedRow) -> Result<Self, CompressionError> {
        let count = row.count as usize;
        let mut sources = Vec::with_capacity(config.columns.len());
        let mut segment_by_idx = 0;
        let mut value_idx = 0;

        for col in &config.columns {
            match col.kind {
                crate::storage::schema::ColumnKind::SegmentBy => {
                    let v = row.segment_by[segment_by_idx];
                    segment_by_idx += 1;
                    sources.push(ColumnSource::SegmentByScalar(v));
                }
                crate::storage::schema::ColumnKind::OrderBy(_) | crate::storage::schema::ColumnKind::Value => {
                    let blob = &row.value_blobs[value_idx];
                    value_idx += 1;
                    let entry = lookup(algorithm_id_of(blob)?)?;
                    let values = (entry.decompress_all_forward)(col.datum_kind, blob, count)?;
                    sources.push(ColumnSource::Values(values.into_iter()));
                }
            }
        }

        Ok(Self {
            sources,
            count,
            emitted: 0,
        })
    }

    /// Draws the next uncompressed row, or `None` once `count` rows have
    /// been produced. Returns `OUT_OF_SYNC` if a column's iterator disagrees
    /// with `count` about how many rows remain.
    pub fn next_row(&mut self) -> Result<Option<Vec<Option<Datum>>>, CompressionError> {
        if self.emitted >= self.count {
            for source in &mut self.sources {
                if let ColumnSource::Values(it) = source {
                    if it.next().is_some() {
                        return Err(CompressionError::out_of_sync(
                            "column iterator produced more rows than the compressed row's count",
                        ));
                    }
                }
            }
            return Ok(None);
        }

        let mut row = Vec::with_capacity(self.sources.len());
        for source in &mut self.sources {
            let v = match source {
                ColumnSource::SegmentByScalar(v) => *v,
                ColumnSource::Values(it) => it.next().ok_or_else(|| {
                    CompressionError::out_of_sync("column iterator exhausted before count was reached")
                })??,
            };
            row.push(v);
        }
        self.emitted += 1;
        Ok(Some(row))
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

    #[test]
    fn test_round_trip_through_compressor_and_decompressor() {
        let cfg = config();
        let mut rc = RowCompressor::new(cfg.clone());
        let inputs: Vec<Vec<Option<Datum>>> = (0..20)
            .map(|i| {
                vec![
                    Some(Datum::I32(7)),
                    Some(Datum::I64(i)),
                    if i % 5 == 0 { None } else { Some(Datum::F64(i as f64 * 1.5)) },
                ]
            })
            .collect();
        for row in &inputs {
            rc.push_row(row).unwrap();
        }
        let compressed = rc.finish().unwrap();
        assert_eq!(compressed.len(), 1);

        let mut decompressor = RowDecompressor::new(&cfg, &compressed[0]).unwrap();
        let mut out = Vec::new();
        while let Some(row) = decompressor.next_row().unwrap() {
            out.push(row);
        }
        assert_eq!(out, inputs);
        assert!(decompressor.next_row().unwrap().is_none());
    }
}
