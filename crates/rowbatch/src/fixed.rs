//! Decoding of fixed-length values stored inline in row slots.
//!
//! All fixed-width values are little-endian in the slot; only the leading
//! `width` bytes of the 8-byte slot are meaningful.

use rowbatch_error::{rowbatch_ensure, RowbatchResult};

pub(crate) trait FromSlice {
    fn from_slice(slice: &[u8]) -> Self;
}

impl<const N: usize> FromSlice for [u8; N] {
    #[inline]
    fn from_slice(slice: &[u8]) -> Self {
        slice.try_into().unwrap()
    }
}

/// A native value readable from the leading bytes of a slot.
pub(crate) trait FixedLengthValue: Copy {
    fn from_slot(slot: &[u8]) -> Self;
}

macro_rules! fixed_le {
    ($n:expr, $t:ty) => {
        impl FixedLengthValue for $t {
            #[inline]
            fn from_slot(slot: &[u8]) -> Self {
                <$t>::from_le_bytes(<[u8; $n]>::from_slice(&slot[..$n]))
            }
        }
    };
}

fixed_le!(1, i8);
fixed_le!(2, i16);
fixed_le!(4, i32);
fixed_le!(8, i64);
fixed_le!(8, u64);
fixed_le!(4, f32);
fixed_le!(8, f64);

#[inline]
pub(crate) fn read_bool(slot: &[u8]) -> bool {
    slot[0] != 0
}

/// An inline decimal: the unscaled integer stored as an i64, widened.
#[inline]
pub(crate) fn read_inline_decimal(slot: &[u8]) -> i128 {
    i64::from_slot(slot) as i128
}

/// The 8-byte slot of `ordinal` within `region`, bounds-checked.
#[inline]
pub(crate) fn slot_bytes<'a>(region: &'a [u8], offset: usize) -> RowbatchResult<&'a [u8]> {
    rowbatch_ensure!(
        offset + 8 <= region.len(),
        LayoutMismatch: "slot at {} overruns a {}-byte region", offset, region.len()
    );
    Ok(&region[offset..offset + 8])
}
