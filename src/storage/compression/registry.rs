//! Fixed table mapping an on-disk algorithm id to the codec that reads and
//! writes it. A column's compressed blobs always carry their algorithm id
//! as the first byte, so decompression never needs to know in advance which
//! codec produced a given row — it dispatches through this table.

use crate::error::CompressionError;
use crate::storage::compression::gorilla::{
    self, iter_forward, iter_forward_owned, iter_reverse, iter_reverse_owned, GorillaCompressor, GorillaElement,
};
use crate::storage::compression::{
    ALGORITHM_ID_ARRAY, ALGORITHM_ID_DELTA_DELTA, ALGORITHM_ID_DICTIONARY, ALGORITHM_ID_GORILLA,
};

/// Scalar value exchanged with a compressor/decompressor, independent of
/// which concrete Rust type backs a given column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Datum {
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Datum {
    pub fn kind(&self) -> DatumKind {
        match self {
            Datum::I16(_) => DatumKind::I16,
            Datum::I32(_) => DatumKind::I32,
            Datum::I64(_) => DatumKind::I64,
            Datum::F32(_) => DatumKind::F32,
            Datum::F64(_) => DatumKind::F64,
        }
    }
}

/// Orders two datums of the same kind using that type's natural ordering
/// (the "default btree operator class" in the terms this format borrows
/// from). `None` for a kind mismatch or a float comparison against NaN.
pub fn datum_partial_cmp(a: &Datum, b: &Datum) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Datum::I16(x), Datum::I16(y)) => Some(x.cmp(y)),
        (Datum::I32(x), Datum::I32(y)) => Some(x.cmp(y)),
        (Datum::I64(x), Datum::I64(y)) => Some(x.cmp(y)),
        (Datum::F32(x), Datum::F32(y)) => x.partial_cmp(y),
        (Datum::F64(x), Datum::F64(y)) => x.partial_cmp(y),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatumKind {
    I16,
    I32,
    I64,
    F32,
    F64,
}

/// Mirrors postgres' TOAST storage classes well enough to decide whether a
/// compressed column's blob should ever be pushed out-of-line: `Gorilla`
/// blobs are usually small enough to stay inline, dictionary/array blobs
/// can grow large with high cardinality and prefer being toastable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastStoragePreference {
    Plain,
    Extended,
}

/// A single column's in-progress compressor. Implementations own their
/// sub-stream builders and are consumed by `finish`.
pub trait Compressor {
    fn append_value(&mut self, value: Datum) -> Result<(), CompressionError>;
    fn append_null(&mut self);
    fn finish(self: Box<Self>) -> Result<Vec<u8>, CompressionError>;
}

/// A type a `Datum` can be narrowed to (or widened from) for one algorithm's
/// generic codec. Kept separate from `GorillaElement` since other codecs
/// (dictionary, delta-delta) may support types Gorilla doesn't.
trait DatumScalar: GorillaElement {
    const KIND: DatumKind;
    fn from_datum(value: Datum) -> Option<Self>;
    fn into_datum(self) -> Datum;
}

impl DatumScalar for i16 {
    const KIND: DatumKind = DatumKind::I16;
    fn from_datum(value: Datum) -> Option<Self> {
        match value {
            Datum::I16(v) => Some(v),
            _ => None,
        }
    }
    fn into_datum(self) -> Datum {
        Datum::I16(self)
    }
}

impl DatumScalar for i32 {
    const KIND: DatumKind = DatumKind::I32;
    fn from_datum(value: Datum) -> Option<Self> {
        match value {
            Datum::I32(v) => Some(v),
            _ => None,
        }
    }
    fn into_datum(self) -> Datum {
        Datum::I32(self)
    }
}

impl DatumScalar for i64 {
    const KIND: DatumKind = DatumKind::I64;
    fn from_datum(value: Datum) -> Option<Self> {
        match value {
            Datum::I64(v) => Some(v),
            _ => None,
        }
    }
    fn into_datum(self) -> Datum {
        Datum::I64(self)
    }
}

impl DatumScalar for f32 {
    const KIND: DatumKind = DatumKind::F32;
    fn from_datum(value: Datum) -> Option<Self> {
        match value {
            Datum::F32(v) => Some(v),
            _ => None,
        }
    }
    fn into_datum(self) -> Datum {
        Datum::F32(self)
    }
}

impl DatumScalar for f64 {
    const KIND: DatumKind = DatumKind::F64;
    fn from_datum(value: Datum) -> Option<Self> {
        match value {
            Datum::F64(v) => Some(v),
            _ => None,
        }
    }
    fn into_datum(self) -> Datum {
        Datum::F64(self)
    }
}

struct GorillaDatumCompressor<T: DatumScalar> {
    inner: GorillaCompressor<T>,
}

impl<T: DatumScalar> Compressor for GorillaDatumCompressor<T> {
    fn append_value(&mut self, value: Datum) -> Result<(), CompressionError> {
        let v = T::from_datum(value).ok_or_else(|| {
            CompressionError::corrupted("datum kind does not match column's declared type")
        })?;
        self.inner.append_value(v);
        Ok(())
    }

    fn append_null(&mut self) {
        self.inner.append_null();
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, CompressionError> {
        self.inner.finish()
    }
}

/// A single column's worth of lazily-decoded values, yielded one row at a
/// time. Boxed so the registry can hand back a uniform type regardless of
/// which concrete iterator (forward/reverse, owned/borrowed) backs it.
pub type DatumIter = Box<dyn Iterator<Item = Result<Option<Datum>, CompressionError>>>;

/// The per-algorithm operations a column's codec must support. Analogous to
/// a `CompressionAlgorithmDefinition` vtable: looked up once by algorithm id
/// and then called through directly, rather than re-dispatching per row.
pub struct AlgorithmEntry {
    pub algorithm_id: u8,
    pub name: &'static str,
    pub make_compressor: fn(DatumKind) -> Result<Box<dyn Compressor>, CompressionError>,
    pub decompress_all_forward:
        fn(DatumKind, &[u8], usize) -> Result<Vec<Result<Option<Datum>, CompressionError>>, CompressionError>,
    pub decompress_all_reverse:
        fn(DatumKind, &[u8], usize) -> Result<Vec<Result<Option<Datum>, CompressionError>>, CompressionError>,
    /// Builds an owned, lazily-evaluated per-row iterator (no lifetime tied
    /// to `blob`), used for columns the bulk arrow path can't cover.
    pub iter_forward_owned: fn(DatumKind, &[u8], usize) -> Result<DatumIter, CompressionError>,
    pub iter_reverse_owned: fn(DatumKind, &[u8], usize) -> Result<DatumIter, CompressionError>,
    pub toast_storage_preference: ToastStoragePreference,
    /// Wire send/recv pair (see §6): `send` serializes the blob for
    /// cross-version exchange, `recv` reconstructs this crate's internal
    /// blob representation from that wire form.
    pub send: fn(&[u8]) -> Result<Vec<u8>, CompressionError>,
    pub recv: fn(&[u8]) -> Result<Vec<u8>, CompressionError>,
}

fn gorilla_make_compressor(kind: DatumKind) -> Result<Box<dyn Compressor>, CompressionError> {
    Ok(match kind {
        DatumKind::I16 => Box::new(GorillaDatumCompressor::<i16> { inner: GorillaCompressor::new() }),
        DatumKind::I32 => Box::new(GorillaDatumCompressor::<i32> { inner: GorillaCompressor::new() }),
        DatumKind::I64 => Box::new(GorillaDatumCompressor::<i64> { inner: GorillaCompressor::new() }),
        DatumKind::F32 => Box::new(GorillaDatumCompressor::<f32> { inner: GorillaCompressor::new() }),
        DatumKind::F64 => Box::new(GorillaDatumCompressor::<f64> { inner: GorillaCompressor::new() }),
    })
}

fn collect_forward<T: DatumScalar>(
    blob: &[u8],
    count: usize,
) -> Result<Vec<Result<Option<Datum>, CompressionError>>, CompressionError> {
    Ok(iter_forward::<T>(blob, count)?
        .map(|r| r.map(|opt| opt.map(DatumScalar::into_datum)))
        .collect())
}

fn collect_reverse<T: DatumScalar>(
    blob: &[u8],
    count: usize,
) -> Result<Vec<Result<Option<Datum>, CompressionError>>, CompressionError> {
    Ok(iter_reverse::<T>(blob, count)?
        .map(|r| r.map(|opt| opt.map(DatumScalar::into_datum)))
        .collect())
}

fn make_forward_owned<T: DatumScalar + 'static>(blob: &[u8], count: usize) -> Result<DatumIter, CompressionError> {
    let it = iter_forward_owned::<T>(blob, count)?
        .map(|r| r.map(|opt| opt.map(DatumScalar::into_datum)));
    Ok(Box::new(it))
}

fn make_reverse_owned<T: DatumScalar + 'static>(blob: &[u8], count: usize) -> Result<DatumIter, CompressionError> {
    let it = iter_reverse_owned::<T>(blob, count)?
        .map(|r| r.map(|opt| opt.map(DatumScalar::into_datum)));
    Ok(Box::new(it))
}

fn gorilla_iter_forward_owned(kind: DatumKind, blob: &[u8], count: usize) -> Result<DatumIter, CompressionError> {
    match kind {
        DatumKind::I16 => make_forward_owned::<i16>(blob, count),
        DatumKind::I32 => make_forward_owned::<i32>(blob, count),
        DatumKind::I64 => make_forward_owned::<i64>(blob, count),
        DatumKind::F32 => make_forward_owned::<f32>(blob, count),
        DatumKind::F64 => make_forward_owned::<f64>(blob, count),
    }
}

fn gorilla_iter_reverse_owned(kind: DatumKind, blob: &[u8], count: usize) -> Result<DatumIter, CompressionError> {
    match kind {
        DatumKind::I16 => make_reverse_owned::<i16>(blob, count),
        DatumKind::I32 => make_reverse_owned::<i32>(blob, count),
        DatumKind::I64 => make_reverse_owned::<i64>(blob, count),
        DatumKind::F32 => make_reverse_owned::<f32>(blob, count),
        DatumKind::F64 => make_reverse_owned::<f64>(blob, count),
    }
}

fn gorilla_decompress_all_forward(
    kind: DatumKind,
    blob: &[u8],
    count: usize,
) -> Result<Vec<Result<Option<Datum>, CompressionError>>, CompressionError> {
    match kind {
        DatumKind::I16 => collect_forward::<i16>(blob, count),
        DatumKind::I32 => collect_forward::<i32>(blob, count),
        DatumKind::I64 => collect_forward::<i64>(blob, count),
        DatumKind::F32 => collect_forward::<f32>(blob, count),
        DatumKind::F64 => collect_forward::<f64>(blob, count),
    }
}

fn gorilla_decompress_all_reverse(
    kind: DatumKind,
    blob: &[u8],
    count: usize,
) -> Result<Vec<Result<Option<Datum>, CompressionError>>, CompressionError> {
    match kind {
        DatumKind::I16 => collect_reverse::<i16>(blob, count),
        DatumKind::I32 => collect_reverse::<i32>(blob, count),
        DatumKind::I64 => collect_reverse::<i64>(blob, count),
        DatumKind::F32 => collect_reverse::<f32>(blob, count),
        DatumKind::F64 => collect_reverse::<f64>(blob, count),
    }
}

fn unsupported_make_compressor(
    algorithm_id: u8,
) -> impl Fn(DatumKind) -> Result<Box<dyn Compressor>, CompressionError> {
    move |_kind| Err(CompressionError::unsupported(algorithm_id, "make_compressor"))
}

macro_rules! stub_entry {
    ($fn_name:ident, $id:expr, $name:expr) => {
        fn $fn_name(
            _kind: DatumKind,
            _blob: &[u8],
            _count: usize,
        ) -> Result<Vec<Result<Option<Datum>, CompressionError>>, CompressionError> {
            Err(CompressionError::unsupported($id, "decompress_all"))
        }
    };
}

stub_entry!(array_decompress_forward, ALGORITHM_ID_ARRAY, "array");
stub_entry!(array_decompress_reverse, ALGORITHM_ID_ARRAY, "array");
stub_entry!(dictionary_decompress_forward, ALGORITHM_ID_DICTIONARY, "dictionary");
stub_entry!(dictionary_decompress_reverse, ALGORITHM_ID_DICTIONARY, "dictionary");
stub_entry!(delta_delta_decompress_forward, ALGORITHM_ID_DELTA_DELTA, "delta_delta");
stub_entry!(delta_delta_decompress_reverse, ALGORITHM_ID_DELTA_DELTA, "delta_delta");

macro_rules! stub_iter {
    ($fn_name:ident, $id:expr) => {
        fn $fn_name(_kind: DatumKind, _blob: &[u8], _count: usize) -> Result<DatumIter, CompressionError> {
            Err(CompressionError::unsupported($id, "iter_owned"))
        }
    };
}

stub_iter!(array_iter_forward_owned, ALGORITHM_ID_ARRAY);
stub_iter!(array_iter_reverse_owned, ALGORITHM_ID_ARRAY);
stub_iter!(dictionary_iter_forward_owned, ALGORITHM_ID_DICTIONARY);
stub_iter!(dictionary_iter_reverse_owned, ALGORITHM_ID_DICTIONARY);
stub_iter!(delta_delta_iter_forward_owned, ALGORITHM_ID_DELTA_DELTA);
stub_iter!(delta_delta_iter_reverse_owned, ALGORITHM_ID_DELTA_DELTA);

macro_rules! stub_wire {
    ($send_fn:ident, $recv_fn:ident, $id:expr) => {
        fn $send_fn(_blob: &[u8]) -> Result<Vec<u8>, CompressionError> {
            Err(CompressionError::unsupported($id, "send"))
        }
        fn $recv_fn(_buf: &[u8]) -> Result<Vec<u8>, CompressionError> {
            Err(CompressionError::unsupported($id, "recv"))
        }
    };
}

stub_wire!(array_send, array_recv, ALGORITHM_ID_ARRAY);
stub_wire!(dictionary_send, dictionary_recv, ALGORITHM_ID_DICTIONARY);
stub_wire!(delta_delta_send, delta_delta_recv, ALGORITHM_ID_DELTA_DELTA);

fn array_make_compressor(kind: DatumKind) -> Result<Box<dyn Compressor>, CompressionError> {
    unsupported_make_compressor(ALGORITHM_ID_ARRAY)(kind)
}

fn dictionary_make_compressor(kind: DatumKind) -> Result<Box<dyn Compressor>, CompressionError> {
    unsupported_make_compressor(ALGORITHM_ID_DICTIONARY)(kind)
}

fn delta_delta_make_compressor(kind: DatumKind) -> Result<Box<dyn Compressor>, CompressionError> {
    unsupported_make_compressor(ALGORITHM_ID_DELTA_DELTA)(kind)
}

const REGISTRY: &[AlgorithmEntry] = &[
    AlgorithmEntry {
        algorithm_id: ALGORITHM_ID_ARRAY,
        name: "array",
        make_compressor: array_make_compressor,
        decompress_all_forward: array_decompress_forward,
        decompress_all_reverse: array_decompress_reverse,
        iter_forward_owned: array_iter_forward_owned,
        iter_reverse_owned: array_iter_reverse_owned,
        toast_storage_preference: ToastStoragePreference::Extended,
        send: array_send,
        recv: array_recv,
    },
    AlgorithmEntry {
        algorithm_id: ALGORITHM_ID_DICTIONARY,
        name: "dictionary",
        make_compressor: dictionary_make_compressor,
        decompress_all_forward: dictionary_decompress_forward,
        decompress_all_reverse: dictionary_decompress_reverse,
        iter_forward_owned: dictionary_iter_forward_owned,
        iter_reverse_owned: dictionary_iter_reverse_owned,
        toast_storage_preference: ToastStoragePreference::Extended,
        send: dictionary_send,
        recv: dictionary_recv,
    },
    AlgorithmEntry {
        algorithm_id: ALGORITHM_ID_GORILLA,
        name: "gorilla",
        make_compressor: gorilla_make_compressor,
        decompress_all_forward: gorilla_decompress_all_forward,
        decompress_all_reverse: gorilla_decompress_all_reverse,
        iter_forward_owned: gorilla_iter_forward_owned,
        iter_reverse_owned: gorilla_iter_reverse_owned,
        toast_storage_preference: ToastStoragePreference::Plain,
        send: gorilla::send,
        recv: gorilla::recv,
    },
    AlgorithmEntry {
        algorithm_id: ALGORITHM_ID_DELTA_DELTA,
        name: "delta_delta",
        make_compressor: delta_delta_make_compressor,
        decompress_all_forward: delta_delta_decompress_forward,
        decompress_all_reverse: delta_delta_decompress_reverse,
        iter_forward_owned: delta_delta_iter_forward_owned,
        iter_reverse_owned: delta_delta_iter_reverse_owned,
        toast_storage_preference: ToastStoragePreference::Plain,
        send: delta_delta_send,
        recv: delta_delta_recv,
    },
];

pub fn lookup(algorithm_id: u8) -> Result<&'static AlgorithmEntry, CompressionError> {
    REGISTRY
        .iter()
        .find(|e| e.algorithm_id == algorithm_id)
        .ok_or_else(|| CompressionError::corrupted(format!("unknown algorithm id {algorithm_id}")))
}

/// Reads the algorithm id a blob claims to be encoded with, without
/// otherwise interpreting it.
pub fn algorithm_id_of(blob: &[u8]) -> Result<u8, CompressionError> {
    blob.first()
        .copied()
        .ok_or_else(|| CompressionError::corrupted("empty compressed blob"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::compression::gorilla::GorillaCompressor;

    #[test]
    fn test_lookup_known_ids() {
        for id in [
            ALGORITHM_ID_ARRAY,
            ALGORITHM_ID_DICTIONARY,
            ALGORITHM_ID_GORILLA,
            ALGORITHM_ID_DELTA_DELTA,
        ] {
            assert_eq!(lookup(id).unwrap().algorithm_id, id);
        }
    }

    #[test]
    fn test_lookup_unknown_id_errors() {
        assert!(lookup(255).is_err());
    }

    #[test]
    fn test_gorilla_roundtrip_through_registry() {
        let entry = lookup(ALGORITHM_ID_GORILLA).unwrap();
        let mut compressor = (entry.make_compressor)(DatumKind::I64).unwrap();
        compressor.append_value(Datum::I64(10)).unwrap();
        compressor.append_null();
        compressor.append_value(Datum::I64(20)).unwrap();
        let blob = compressor.finish().unwrap();

        let rows = (entry.decompress_all_forward)(DatumKind::I64, &blob, 3).unwrap();
        let values: Vec<Option<Datum>> = rows.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            values,
            vec![Some(Datum::I64(10)), None, Some(Datum::I64(20))]
        );
    }

    #[test]
    fn test_stub_algorithms_are_unsupported() {
        let entry = lookup(ALGORITHM_ID_ARRAY).unwrap();
        assert!((entry.make_compressor)(DatumKind::I64).is_err());
        assert!((entry.send)(&[]).is_err());
        assert!((entry.recv)(&[]).is_err());
        assert!((entry.iter_forward_owned)(DatumKind::I64, &[], 0).is_err());
    }

    #[test]
    fn test_compressor_rejects_mismatched_datum_kind() {
        let mut c = GorillaCompressor::<i64>::new();
        c.append_value(1);
        let blob = c.finish().unwrap();
        let mut boxed: Box<dyn Compressor> = Box::new(GorillaDatumCompressor::<i64> {
            inner: GorillaCompressor::new(),
        });
        assert!(boxed.append_value(Datum::F64(1.0)).is_err());
        let _ = blob;
    }

    #[test]
    fn test_gorilla_send_recv_through_registry() {
        let entry = lookup(ALGORITHM_ID_GORILLA).unwrap();
        let mut compressor = (entry.make_compressor)(DatumKind::F64).unwrap();
        compressor.append_value(Datum::F64(1.5)).unwrap();
        compressor.append_null();
        let blob = compressor.finish().unwrap();

        let wire = (entry.send)(&blob).unwrap();
        let roundtripped = (entry.recv)(&wire).unwrap();
        let rows = (entry.decompress_all_forward)(DatumKind::F64, &roundtripped, 2).unwrap();
        let values: Vec<Option<Datum>> = rows.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![Some(Datum::F64(1.5)), None]);
    }

    #[test]
    fn test_gorilla_iter_owned_matches_borrowed() {
        let entry = lookup(ALGORITHM_ID_GORILLA).unwrap();
        let mut compressor = (entry.make_compressor)(DatumKind::I32).unwrap();
        compressor.append_value(Datum::I32(7)).unwrap();
        compressor.append_null();
        compressor.append_value(Datum::I32(-3)).unwrap();
        let blob = compressor.finish().unwrap();

        let owned: Vec<Option<Datum>> = (entry.iter_forward_owned)(DatumKind::I32, &blob, 3)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        let borrowed = (entry.decompress_all_forward)(DatumKind::I32, &blob, 3).unwrap();
        let borrowed: Vec<Option<Datum>> = borrowed.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(owned, borrowed);
    }
}
