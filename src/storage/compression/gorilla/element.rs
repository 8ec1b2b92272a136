/// A scalar type the Gorilla codec knows how to XOR-compress: its bit
/// pattern is reinterpreted as a `u64` for the purposes of leading/trailing
/// zero tracking, irrespective of whether the type is an integer or a float.
pub trait GorillaElement: Copy + PartialEq + std::fmt::Debug {
    const BITS: u32;

    fn to_raw(self) -> u64;
    fn from_raw(raw: u64) -> Self;
}

impl GorillaElement for i16 {
    const BITS: u32 = 16;

    #[inline]
    fn to_raw(self) -> u64 {
        self as u16 as u64
    }

    #[inline]
    fn from_raw(raw: u64) -> Self {
        raw as u16 as i16
    }
}

impl GorillaElement for i32 {
    const BITS: u32 = 32;

    #[inline]
    fn to_raw(self) -> u64 {
        self as u32 as u64
    }

    #[inline]
    fn from_raw(raw: u64) -> Self {
        raw as u32 as i32
    }
}

impl GorillaElement for i64 {
    const BITS: u32 = 64;

    #[inline]
    fn to_raw(self) -> u64 {
        self as u64
    }

    #[inline]
    fn from_raw(raw: u64) -> Self {
        raw as i64
    }
}

impl GorillaElement for f32 {
    const BITS: u32 = 32;

    #[inline]
    fn to_raw(self) -> u64 {
        self.to_bits() as u64
    }

    #[inline]
    fn from_raw(raw: u64) -> Self {
        f32::from_bits(raw as u32)
    }
}

impl GorillaElement for f64 {
    const BITS: u32 = 64;

    #[inline]
    fn to_raw(self) -> u64 {
        self.to_bits()
    }

    #[inline]
    fn from_raw(raw: u64) -> Self {
        f64::from_bits(raw)
    }
}
