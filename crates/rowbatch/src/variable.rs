//! Parsing of the variable-length side of the row format: packed
//! offset+length words and the nested list/map/struct region shapes.
//!
//! Every offset+length pair read from a slot is range-checked against the
//! governing region before any slice is taken, so corrupt buffers surface as
//! `LayoutMismatch` instead of undefined behavior.

use rowbatch_error::{rowbatch_bail, rowbatch_ensure, RowbatchResult};

use crate::fixed::{slot_bytes, FixedLengthValue};
use crate::layout::{is_bit_set, null_bitmap_bytes};

/// Split a slot word into (byte offset, byte length). The offset is relative
/// to the start of the governing region.
#[inline]
pub(crate) fn unpack_offset_and_size(word: u64) -> (usize, usize) {
    ((word >> 32) as usize, word as u32 as usize)
}

/// Bounds-checked sub-span of a region.
pub(crate) fn sub_region<'a>(
    region: &'a [u8],
    offset: usize,
    length: usize,
) -> RowbatchResult<&'a [u8]> {
    let end = offset.checked_add(length);
    rowbatch_ensure!(
        end.is_some_and(|end| end <= region.len()),
        LayoutMismatch: "span {}..+{} overruns a {}-byte region", offset, length, region.len()
    );
    Ok(&region[offset..offset + length])
}

/// The bytes referenced by the variable-length slot at `slot_offset`.
pub(crate) fn referenced_bytes<'a>(
    region: &'a [u8],
    slot_offset: usize,
) -> RowbatchResult<&'a [u8]> {
    let word = u64::from_slot(slot_bytes(region, slot_offset)?);
    let (offset, length) = unpack_offset_and_size(word);
    sub_region(region, offset, length)
}

/// A large decimal's unscaled integer: big-endian two's complement, at most
/// 16 bytes.
pub(crate) fn read_unscaled_be(bytes: &[u8]) -> RowbatchResult<i128> {
    rowbatch_ensure!(
        !bytes.is_empty() && bytes.len() <= 16,
        LayoutMismatch: "unscaled decimal of {} bytes", bytes.len()
    );
    let mut word = if bytes[0] & 0x80 != 0 {
        [0xFFu8; 16]
    } else {
        [0u8; 16]
    };
    word[16 - bytes.len()..].copy_from_slice(bytes);
    Ok(i128::from_be_bytes(word))
}

/// A parsed list region: `[u64 count][element bitmap][count × 8-byte slots]`
/// followed by the elements' variable sub-region. Element slot offsets are
/// relative to the region start.
#[derive(Debug)]
pub(crate) struct ListRegion<'a> {
    region: &'a [u8],
    len: usize,
    bitmap_offset: usize,
}

impl<'a> ListRegion<'a> {
    pub(crate) fn parse(region: &'a [u8]) -> RowbatchResult<Self> {
        rowbatch_ensure!(
            region.len() >= 8,
            LayoutMismatch: "list region of {} bytes has no element count", region.len()
        );
        let len = u64::from_slot(region);
        let len = usize::try_from(len).ok().filter(|len| {
            len.checked_mul(8)
                .and_then(|slots| slots.checked_add(8 + null_bitmap_bytes(*len)))
                .is_some_and(|end| end <= region.len())
        });
        let Some(len) = len else {
            rowbatch_bail!(
                LayoutMismatch: "list region of {} bytes cannot hold its declared elements",
                region.len()
            )
        };
        Ok(ListRegion {
            region,
            len,
            bitmap_offset: 8,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn region(&self) -> &'a [u8] {
        self.region
    }

    pub(crate) fn is_null(&self, index: usize) -> bool {
        is_bit_set(&self.region[self.bitmap_offset..], index)
    }

    pub(crate) fn slot_offset(&self, index: usize) -> usize {
        self.bitmap_offset + null_bitmap_bytes(self.len) + index * 8
    }
}

/// A parsed struct region: shaped like a row, scoped to the struct's own
/// field count, bitmap and variable sub-region.
pub(crate) struct StructRegion<'a> {
    region: &'a [u8],
    bitmap_bytes: usize,
}

impl<'a> StructRegion<'a> {
    pub(crate) fn parse(region: &'a [u8], field_count: usize) -> RowbatchResult<Self> {
        let bitmap_bytes = null_bitmap_bytes(field_count);
        rowbatch_ensure!(
            bitmap_bytes + field_count * 8 <= region.len(),
            LayoutMismatch: "struct region of {} bytes cannot hold {} fields",
            region.len(), field_count
        );
        Ok(StructRegion {
            region,
            bitmap_bytes,
        })
    }

    pub(crate) fn region(&self) -> &'a [u8] {
        self.region
    }

    pub(crate) fn is_null(&self, ordinal: usize) -> bool {
        is_bit_set(self.region, ordinal)
    }

    pub(crate) fn slot_offset(&self, ordinal: usize) -> usize {
        self.bitmap_bytes + ordinal * 8
    }
}

/// A parsed map region: `[u64 key-region byte length][key list][value list]`,
/// the two lists sharing one entry count.
pub(crate) struct MapRegion<'a> {
    pub(crate) keys: ListRegion<'a>,
    pub(crate) values: ListRegion<'a>,
}

impl<'a> MapRegion<'a> {
    pub(crate) fn parse(region: &'a [u8]) -> RowbatchResult<Self> {
        rowbatch_ensure!(
            region.len() >= 8,
            LayoutMismatch: "map region of {} bytes has no key-region length", region.len()
        );
        let key_bytes = u64::from_slot(region);
        let key_bytes = usize::try_from(key_bytes)
            .ok()
            .filter(|len| len.checked_add(8).is_some_and(|end| end <= region.len()));
        let Some(key_bytes) = key_bytes else {
            rowbatch_bail!(
                LayoutMismatch: "map region of {} bytes cannot hold its key region", region.len()
            )
        };
        let keys = ListRegion::parse(&region[8..8 + key_bytes])?;
        let values = ListRegion::parse(&region[8 + key_bytes..])?;
        rowbatch_ensure!(
            keys.len() == values.len(),
            LayoutMismatch: "map with {} keys but {} values", keys.len(), values.len()
        );
        Ok(MapRegion { keys, values })
    }
}
