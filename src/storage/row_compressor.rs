//! Groups a sorted stream of input tuples into segments by `SEGMENT_BY` key
//! and flushes each accumulated group of up to [`MAX_ROWS_PER_COMPRESSION`]
//! rows into one compressed row.

use crate::error::CompressionError;
use crate::storage::compression::registry::{lookup, Compressor, Datum};
use crate::storage::compression::segment_stats::SegmentStatsBuilder;
use crate::storage::compression::{ALGORITHM_ID_GORILLA, MAX_ROWS_PER_COMPRESSION, SEQUENCE_NUM_GAP};
use crate::storage::schema::RowCompressorConfig;

/// One compressed row: the `SEGMENT_BY` scalars verbatim, one finished blob
/// per non-`SEGMENT_BY` column (both `ORDER_BY` and `VALUE` columns are
/// themselves compressed — min/max is metadata for pruning, not a
/// substitute for the real per-row values), and the metadata columns
/// `count`/`sequence_num` plus a `(min, max)` pair per `ORDER_BY` column.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedRow {
    pub segment_by: Vec<Option<Datum>>,
    pub value_blobs: Vec<Vec<u8>>,
    pub count: i32,
    pub sequence_num: i32,
    pub order_by_min_max: Vec<Option<(Datum, Datum)>>,
}

struct OpenSegment {
    key: Vec<Option<Datum>>,
    value_compressors: Vec<Box<dyn Compressor>>,
    order_by_stats: Vec<SegmentStatsBuilder<Datum>>,
    row_count: i32,
    sequence_num: i32,
}

pub struct RowCompressor {
    config: RowCompressorConfig,
    segment: Option<OpenSegment>,
    output: Vec<CompressedRow>,
}

impl RowCompressor {
    pub fn new(config: RowCompressorConfig) -> Self {
        Self {
            config,
            segment: None,
            output: Vec::new(),
        }
    }

    fn new_segment(&self, key: Vec<Option<Datum>>) -> Result<OpenSegment, CompressionError> {
        let value_compressors = self
            .config
            .data_columns()
            .map(|col| (lookup(ALGORITHM_ID_GORILLA)?.make_compressor)(col.datum_kind))
            .collect::<Result<Vec<_>, _>>()?;
        let order_by_stats = self.config.order_by_columns().map(|_| SegmentStatsBuilder::new()).collect();
        Ok(OpenSegment {
            key,
            value_compressors,
            order_by_stats,
            row_count: 0,
            sequence_num: self.config.starting_sequence_num.unwrap_or(SEQUENCE_NUM_GAP),
        })
    }

    /// Feeds one input row, keyed by the same column order as
    /// `config.columns`. Rows must already arrive sorted by
    /// `(segment_by_cols…, order_by_cols…)`.
    pub fn push_row(&mut self, row: &[Option<Datum>]) -> Result<(), CompressionError> {
        let segment_by_key: Vec<Option<Datum>> = self
            .config
            .segment_by_columns()
            .map(|c| row[c.offset_in_compressed_tuple])
            .collect();

        let needs_new_segment = match &self.segment {
            None => true,
            Some(seg) => seg.key != segment_by_key,
        };
        if needs_new_segment {
            self.close_segment()?;
            self.segment = Some(self.new_segment(segment_by_key)?);
        }

        let seg = self.segment.as_mut().expect("segment just initialized above");

        for (compressor, col) in seg.value_compressors.iter_mut().zip(self.config.data_columns()) {
            match row[col.offset_in_compressed_tuple] {
                Some(v) => compressor.append_value(v)?,
                None => compressor.append_null(),
            }
        }

        for (stats, col) in seg.order_by_stats.iter_mut().zip(self.config.order_by_columns()) {
            match row[col.offset_in_compressed_tuple] {
                Some(v) => stats.observe(v),
                None => stats.observe_null(),
            }
        }

        seg.row_count += 1;
        if seg.row_count as usize >= MAX_ROWS_PER_COMPRESSION {
            let key = seg.key.clone();
            let next_sequence_num = seg.sequence_num + SEQUENCE_NUM_GAP;
            self.close_segment()?;
            let mut reopened = self.new_segment(key)?;
            reopened.sequence_num = next_sequence_num;
            self.segment = Some(reopened);
        }
        Ok(())
    }

    /// Flushes the open segment, if any, without reopening it.
    fn close_segment(&mut self) -> Result<(), CompressionError> {
        let Some(seg) = self.segment.take() else {
            return Ok(());
        };
        if seg.row_count == 0 {
            return Ok(());
        }
        log::debug!(
            "flushing segment: count={}, sequence_num={}",
            seg.row_count,
            seg.sequence_num
        );
        let value_blobs = seg
            .value_compressors
            .into_iter()
            .map(|c| c.finish())
            .collect::<Result<Vec<_>, _>>()?;
        let order_by_min_max = seg.order_by_stats.into_iter().map(|s| s.finish()).collect();
        self.output.push(CompressedRow {
            segment_by: seg.key,
            value_blobs,
            count: seg.row_count,
            sequence_num: seg.sequence_num,
            order_by_min_max,
        });
        Ok(())
    }

    /// Flushes any partially filled segment and returns all compressed rows
    /// produced so far.
    pub fn finish(mut self) -> Result<Vec<CompressedRow>, CompressionError> {
        self.close_segment()?;
        Ok(self.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::compression::registry::DatumKind;
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
    fn test_count_conservation_single_segment() {
        let mut rc = RowCompressor::new(config());
        for i in 0..250 {
            rc.push_row(&[
                Some(Datum::I32(1)),
                Some(Datum::I64(i)),
                Some(Datum::F64(i as f64)),
            ])
            .unwrap();
        }
        let rows = rc.finish().unwrap();
        let total: i32 = rows.iter().map(|r| r.count).sum();
        assert_eq!(total, 250);
    }

    #[test]
    fn test_segment_boundary_flushes_at_limit() {
        let mut rc = RowCompressor::new(config());
        for seg in 0..3 {
            for i in 0..1000 {
                rc.push_row(&[
                    Some(Datum::I32(seg)),
                    Some(Datum::I64(i)),
                    Some(Datum::F64(i as f64)),
                ])
                .unwrap();
            }
        }
        let rows = rc.finish().unwrap();
        assert_eq!(rows.len(), 3);
        for r in &rows {
            assert_eq!(r.count, 1000);
            assert_eq!(r.sequence_num, SEQUENCE_NUM_GAP);
        }
    }

    #[test]
    fn test_sequence_monotonic_within_same_segment_key_but_row_limit() {
        let mut rc = RowCompressor::new(config());
        for i in 0..2500 {
            rc.push_row(&[
                Some(Datum::I32(1)),
                Some(Datum::I64(i)),
                Some(Datum::F64(i as f64)),
            ])
            .unwrap();
        }
        let rows = rc.finish().unwrap();
        assert_eq!(rows.iter().map(|r| r.count).collect::<Vec<_>>(), vec![1000, 1000, 500]);
        assert_eq!(
            rows.iter().map(|r| r.sequence_num).collect::<Vec<_>>(),
            vec![10, 20, 30]
        );
    }

    #[test]
    fn test_scenario_s4_segment_boundary_resets_sequence() {
        // 2000 rows of one segment (two row-count-limit flushes), then 500
        // rows of a different segment (one key-change flush at `finish`).
        let mut rc = RowCompressor::new(config());
        for i in 0..2000 {
            rc.push_row(&[
                Some(Datum::I32(0)),
                Some(Datum::I64(i)),
                Some(Datum::F64(i as f64)),
            ])
            .unwrap();
        }
        for i in 0..500 {
            rc.push_row(&[
                Some(Datum::I32(1)),
                Some(Datum::I64(i)),
                Some(Datum::F64(i as f64)),
            ])
            .unwrap();
        }
        let rows = rc.finish().unwrap();
        assert_eq!(rows.iter().map(|r| r.count).collect::<Vec<_>>(), vec![1000, 1000, 500]);
        assert_eq!(
            rows.iter().map(|r| r.sequence_num).collect::<Vec<_>>(),
            vec![10, 20, 10]
        );
    }

    #[test]
    fn test_order_by_min_max_tracked() {
        let mut rc = RowCompressor::new(config());
        for v in [5i64, -3, 100, 2] {
            rc.push_row(&[Some(Datum::I32(1)), Some(Datum::I64(v)), Some(Datum::F64(v as f64))])
                .unwrap();
        }
        let rows = rc.finish().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].order_by_min_max[0],
            Some((Datum::I64(-3), Datum::I64(100)))
        );
    }
}
