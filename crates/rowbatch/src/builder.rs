//! Column builders: one per schema field, accumulating decoded values across
//! rows and freezing into the embedded engine's arrays.
//!
//! [`ColumnBuilder`] is a closed union over the supported type categories,
//! dispatched by exhaustive matching; the translator can only produce types
//! with a matching arm, so the unsupported fallback lives in construction,
//! not decoding.

use arrow::array::{
    BinaryArray, BooleanArray, FixedSizeBinaryArray, ListArray, MapArray, NullArray,
    PrimitiveArray, StructArray, Utf8Array,
};
use arrow::bitmap::{Bitmap, MutableBitmap};
use arrow::buffer::Buffer;
use arrow::datatypes::{ArrowDataType, Field};
use arrow::offset::OffsetsBuffer;
use arrow::types::NativeType;
use bytemuck::Zeroable;
use rowbatch_error::{rowbatch_bail, rowbatch_ensure, rowbatch_err, RowbatchResult};

use crate::fixed::{read_bool, read_inline_decimal, slot_bytes, FixedLengthValue};
use crate::layout::MAX_INLINE_DECIMAL_PRECISION;
use crate::variable::{read_unscaled_be, referenced_bytes, ListRegion, MapRegion, StructRegion};
use crate::ArrayRef;

#[derive(Debug)]
struct ValidityBuilder {
    bits: MutableBitmap,
    null_count: usize,
}

impl ValidityBuilder {
    fn new() -> Self {
        ValidityBuilder {
            bits: MutableBitmap::new(),
            null_count: 0,
        }
    }

    fn push(&mut self, valid: bool) {
        self.bits.push(valid);
        if !valid {
            self.null_count += 1;
        }
    }

    fn freeze(self) -> Option<Bitmap> {
        if self.null_count == 0 {
            None
        } else {
            Some(self.bits.into())
        }
    }
}

#[derive(Debug)]
pub struct PrimitiveBuilder<T: NativeType> {
    dtype: ArrowDataType,
    values: Vec<T>,
    validity: ValidityBuilder,
}

impl<T: NativeType + FixedLengthValue> PrimitiveBuilder<T> {
    fn new(dtype: ArrowDataType) -> Self {
        PrimitiveBuilder {
            dtype,
            values: Vec::new(),
            validity: ValidityBuilder::new(),
        }
    }

    fn push_slot(&mut self, slot: &[u8]) {
        self.values.push(T::from_slot(slot));
        self.validity.push(true);
    }

    fn push_null(&mut self) {
        self.values.push(T::zeroed());
        self.validity.push(false);
    }

    fn freeze(self) -> RowbatchResult<ArrayRef> {
        let array =
            PrimitiveArray::try_new(self.dtype, self.values.into(), self.validity.freeze())?;
        Ok(array.boxed())
    }
}

#[derive(Debug)]
pub struct BooleanBuilder {
    values: MutableBitmap,
    validity: ValidityBuilder,
}

#[derive(Debug)]
pub struct DecimalBuilder {
    dtype: ArrowDataType,
    inline: bool,
    values: Vec<i128>,
    validity: ValidityBuilder,
}

#[derive(Debug)]
pub struct BinaryBuilder {
    dtype: ArrowDataType,
    offsets: Vec<i64>,
    values: Vec<u8>,
    validity: ValidityBuilder,
}

impl BinaryBuilder {
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.values.extend_from_slice(bytes);
        self.offsets.push(self.values.len() as i64);
        self.validity.push(true);
    }

    fn push_null(&mut self) {
        self.offsets.push(*self.offsets.last().unwrap());
        self.validity.push(false);
    }
}

#[derive(Debug)]
pub struct FixedSizeBinaryBuilder {
    size: usize,
    values: Vec<u8>,
    validity: ValidityBuilder,
}

#[derive(Debug)]
pub struct ListBuilder {
    item: Field,
    offsets: Vec<i64>,
    inner: Box<ColumnBuilder>,
    validity: ValidityBuilder,
}

#[derive(Debug)]
pub struct MapBuilder {
    entries: Field,
    offsets: Vec<i32>,
    keys: Box<ColumnBuilder>,
    values: Box<ColumnBuilder>,
    /// A Nothing-typed key: the map decodes as empty no matter what the row
    /// stores.
    empty_key: bool,
    validity: ValidityBuilder,
}

#[derive(Debug)]
pub struct StructBuilder {
    dtype: ArrowDataType,
    children: Vec<ColumnBuilder>,
    length: usize,
    validity: ValidityBuilder,
}

/// One column's accumulator, matching the field's translated type.
#[derive(Debug)]
pub enum ColumnBuilder {
    Null { length: usize },
    Boolean(BooleanBuilder),
    Int8(PrimitiveBuilder<i8>),
    Int16(PrimitiveBuilder<i16>),
    Int32(PrimitiveBuilder<i32>),
    Int64(PrimitiveBuilder<i64>),
    Float32(PrimitiveBuilder<f32>),
    Float64(PrimitiveBuilder<f64>),
    Decimal(DecimalBuilder),
    Binary(BinaryBuilder),
    FixedSizeBinary(FixedSizeBinaryBuilder),
    List(ListBuilder),
    Map(MapBuilder),
    Struct(StructBuilder),
}

impl ColumnBuilder {
    pub fn try_new(field: &Field) -> RowbatchResult<Self> {
        use ArrowDataType as D;
        Ok(match field.dtype() {
            D::Null => ColumnBuilder::Null { length: 0 },
            D::Boolean => ColumnBuilder::Boolean(BooleanBuilder {
                values: MutableBitmap::new(),
                validity: ValidityBuilder::new(),
            }),
            D::Int8 => ColumnBuilder::Int8(PrimitiveBuilder::new(D::Int8)),
            D::Int16 => ColumnBuilder::Int16(PrimitiveBuilder::new(D::Int16)),
            dt @ (D::Int32 | D::Date32) => ColumnBuilder::Int32(PrimitiveBuilder::new(dt.clone())),
            dt @ (D::Int64 | D::Timestamp(_, _)) => {
                ColumnBuilder::Int64(PrimitiveBuilder::new(dt.clone()))
            },
            D::Float32 => ColumnBuilder::Float32(PrimitiveBuilder::new(D::Float32)),
            D::Float64 => ColumnBuilder::Float64(PrimitiveBuilder::new(D::Float64)),
            dt @ D::Decimal(precision, _) => ColumnBuilder::Decimal(DecimalBuilder {
                dtype: dt.clone(),
                inline: *precision <= MAX_INLINE_DECIMAL_PRECISION,
                values: Vec::new(),
                validity: ValidityBuilder::new(),
            }),
            dt @ (D::LargeUtf8 | D::LargeBinary) => ColumnBuilder::Binary(BinaryBuilder {
                dtype: dt.clone(),
                offsets: vec![0],
                values: Vec::new(),
                validity: ValidityBuilder::new(),
            }),
            D::FixedSizeBinary(size) => ColumnBuilder::FixedSizeBinary(FixedSizeBinaryBuilder {
                size: *size,
                values: Vec::new(),
                validity: ValidityBuilder::new(),
            }),
            D::LargeList(item) => ColumnBuilder::List(ListBuilder {
                item: item.as_ref().clone(),
                offsets: vec![0],
                inner: Box::new(ColumnBuilder::try_new(item)?),
                validity: ValidityBuilder::new(),
            }),
            D::Map(entries, _) => {
                let D::Struct(kv) = entries.dtype() else {
                    rowbatch_bail!(
                        UnsupportedType: "map entries must be a struct, got {:?}", entries.dtype()
                    )
                };
                rowbatch_ensure!(
                    kv.len() == 2,
                    UnsupportedType: "map entries must have 2 fields, got {}", kv.len()
                );
                ColumnBuilder::Map(MapBuilder {
                    entries: entries.as_ref().clone(),
                    offsets: vec![0],
                    keys: Box::new(ColumnBuilder::try_new(&kv[0])?),
                    values: Box::new(ColumnBuilder::try_new(&kv[1])?),
                    empty_key: matches!(kv[0].dtype(), D::Null),
                    validity: ValidityBuilder::new(),
                })
            },
            dt @ D::Struct(fields) => ColumnBuilder::Struct(StructBuilder {
                dtype: dt.clone(),
                children: fields
                    .iter()
                    .map(ColumnBuilder::try_new)
                    .collect::<RowbatchResult<Vec<_>>>()?,
                length: 0,
                validity: ValidityBuilder::new(),
            }),
            dt => rowbatch_bail!(UnsupportedType: "no column builder for {:?}", dt),
        })
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnBuilder::Null { length } => *length,
            ColumnBuilder::Boolean(b) => b.values.len(),
            ColumnBuilder::Int8(b) => b.values.len(),
            ColumnBuilder::Int16(b) => b.values.len(),
            ColumnBuilder::Int32(b) => b.values.len(),
            ColumnBuilder::Int64(b) => b.values.len(),
            ColumnBuilder::Float32(b) => b.values.len(),
            ColumnBuilder::Float64(b) => b.values.len(),
            ColumnBuilder::Decimal(b) => b.values.len(),
            ColumnBuilder::Binary(b) => b.offsets.len() - 1,
            ColumnBuilder::FixedSizeBinary(b) => {
                if b.size == 0 {
                    b.validity.bits.len()
                } else {
                    b.values.len() / b.size
                }
            },
            ColumnBuilder::List(b) => b.offsets.len() - 1,
            ColumnBuilder::Map(b) => b.offsets.len() - 1,
            ColumnBuilder::Struct(b) => b.length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push_null(&mut self) {
        match self {
            ColumnBuilder::Null { length } => *length += 1,
            ColumnBuilder::Boolean(b) => {
                b.values.push(false);
                b.validity.push(false);
            },
            ColumnBuilder::Int8(b) => b.push_null(),
            ColumnBuilder::Int16(b) => b.push_null(),
            ColumnBuilder::Int32(b) => b.push_null(),
            ColumnBuilder::Int64(b) => b.push_null(),
            ColumnBuilder::Float32(b) => b.push_null(),
            ColumnBuilder::Float64(b) => b.push_null(),
            ColumnBuilder::Decimal(b) => {
                b.values.push(0);
                b.validity.push(false);
            },
            ColumnBuilder::Binary(b) => b.push_null(),
            ColumnBuilder::FixedSizeBinary(b) => {
                b.values.resize(b.values.len() + b.size, 0);
                b.validity.push(false);
            },
            ColumnBuilder::List(b) => {
                b.offsets.push(*b.offsets.last().unwrap());
                b.validity.push(false);
            },
            ColumnBuilder::Map(b) => {
                b.offsets.push(*b.offsets.last().unwrap());
                b.validity.push(false);
            },
            ColumnBuilder::Struct(b) => {
                for child in &mut b.children {
                    child.push_null();
                }
                b.length += 1;
                b.validity.push(false);
            },
        }
    }

    /// Decode the non-null slot at `slot_offset` within `region` and append
    /// the value. For variable-length types the packed offset+length word is
    /// resolved relative to `region`, exactly as for a row.
    pub fn push_slot(&mut self, region: &[u8], slot_offset: usize) -> RowbatchResult<()> {
        match self {
            // The empty type has no values; whatever the slot holds, the
            // decoded value is null.
            ColumnBuilder::Null { length } => *length += 1,
            ColumnBuilder::Boolean(b) => {
                let slot = slot_bytes(region, slot_offset)?;
                b.values.push(read_bool(slot));
                b.validity.push(true);
            },
            ColumnBuilder::Int8(b) => b.push_slot(slot_bytes(region, slot_offset)?),
            ColumnBuilder::Int16(b) => b.push_slot(slot_bytes(region, slot_offset)?),
            ColumnBuilder::Int32(b) => b.push_slot(slot_bytes(region, slot_offset)?),
            ColumnBuilder::Int64(b) => b.push_slot(slot_bytes(region, slot_offset)?),
            ColumnBuilder::Float32(b) => b.push_slot(slot_bytes(region, slot_offset)?),
            ColumnBuilder::Float64(b) => b.push_slot(slot_bytes(region, slot_offset)?),
            ColumnBuilder::Decimal(b) => {
                let unscaled = if b.inline {
                    read_inline_decimal(slot_bytes(region, slot_offset)?)
                } else {
                    read_unscaled_be(referenced_bytes(region, slot_offset)?)?
                };
                b.values.push(unscaled);
                b.validity.push(true);
            },
            ColumnBuilder::Binary(b) => b.push_bytes(referenced_bytes(region, slot_offset)?),
            ColumnBuilder::FixedSizeBinary(b) => {
                let bytes = referenced_bytes(region, slot_offset)?;
                rowbatch_ensure!(
                    bytes.len() == b.size,
                    LayoutMismatch: "fixed binary of {} bytes, expected {}", bytes.len(), b.size
                );
                b.values.extend_from_slice(bytes);
                b.validity.push(true);
            },
            ColumnBuilder::List(b) => {
                let list = ListRegion::parse(referenced_bytes(region, slot_offset)?)?;
                b.inner.extend_from_list(&list)?;
                b.offsets.push(b.inner.len() as i64);
                b.validity.push(true);
            },
            ColumnBuilder::Map(b) => {
                if b.empty_key {
                    b.offsets.push(*b.offsets.last().unwrap());
                } else {
                    let map = MapRegion::parse(referenced_bytes(region, slot_offset)?)?;
                    b.keys.extend_from_list(&map.keys)?;
                    b.values.extend_from_list(&map.values)?;
                    let entries = i32::try_from(b.keys.len()).map_err(|_| {
                        rowbatch_err!(LayoutMismatch: "map entry count overflows offsets")
                    })?;
                    b.offsets.push(entries);
                }
                b.validity.push(true);
            },
            ColumnBuilder::Struct(b) => {
                let bytes = referenced_bytes(region, slot_offset)?;
                let nested = StructRegion::parse(bytes, b.children.len())?;
                for (ordinal, child) in b.children.iter_mut().enumerate() {
                    if nested.is_null(ordinal) {
                        child.push_null();
                    } else {
                        child.push_slot(nested.region(), nested.slot_offset(ordinal))?;
                    }
                }
                b.length += 1;
                b.validity.push(true);
            },
        }
        Ok(())
    }

    /// Append every element of a list region, honoring its null bitmap.
    fn extend_from_list(&mut self, list: &ListRegion) -> RowbatchResult<()> {
        for index in 0..list.len() {
            if list.is_null(index) {
                self.push_null();
            } else {
                self.push_slot(list.region(), list.slot_offset(index))?;
            }
        }
        Ok(())
    }

    /// Finish the column. Consumes the builder; the array owns its buffers.
    pub fn freeze(self) -> RowbatchResult<ArrayRef> {
        Ok(match self {
            ColumnBuilder::Null { length } => NullArray::new(ArrowDataType::Null, length).boxed(),
            ColumnBuilder::Boolean(b) => BooleanArray::try_new(
                ArrowDataType::Boolean,
                b.values.into(),
                b.validity.freeze(),
            )?
            .boxed(),
            ColumnBuilder::Int8(b) => b.freeze()?,
            ColumnBuilder::Int16(b) => b.freeze()?,
            ColumnBuilder::Int32(b) => b.freeze()?,
            ColumnBuilder::Int64(b) => b.freeze()?,
            ColumnBuilder::Float32(b) => b.freeze()?,
            ColumnBuilder::Float64(b) => b.freeze()?,
            ColumnBuilder::Decimal(b) => {
                PrimitiveArray::try_new(b.dtype, b.values.into(), b.validity.freeze())?.boxed()
            },
            ColumnBuilder::Binary(b) => {
                // SAFETY: offsets start at 0 and only ever grow.
                let offsets =
                    unsafe { OffsetsBuffer::new_unchecked(Buffer::from(b.offsets)) };
                let values = Buffer::from(b.values);
                let validity = b.validity.freeze();
                if b.dtype == ArrowDataType::LargeUtf8 {
                    Utf8Array::<i64>::try_new(b.dtype, offsets, values, validity)
                        .map_err(|e| {
                            rowbatch_err!(LayoutMismatch: "invalid string payload: {}", e)
                        })?
                        .boxed()
                } else {
                    BinaryArray::<i64>::try_new(b.dtype, offsets, values, validity)?.boxed()
                }
            },
            ColumnBuilder::FixedSizeBinary(b) => FixedSizeBinaryArray::try_new(
                ArrowDataType::FixedSizeBinary(b.size),
                b.values.into(),
                b.validity.freeze(),
            )?
            .boxed(),
            ColumnBuilder::List(b) => {
                let dtype = ArrowDataType::LargeList(Box::new(b.item));
                // SAFETY: offsets start at 0 and only ever grow.
                let offsets =
                    unsafe { OffsetsBuffer::new_unchecked(Buffer::from(b.offsets)) };
                ListArray::<i64>::try_new(dtype, offsets, b.inner.freeze()?, b.validity.freeze())?
                    .boxed()
            },
            ColumnBuilder::Map(b) => {
                let keys = b.keys.freeze()?;
                let values = b.values.freeze()?;
                let length = keys.len();
                let entries = StructArray::try_new(
                    b.entries.dtype().clone(),
                    length,
                    vec![keys, values],
                    None,
                )?;
                let dtype = ArrowDataType::Map(Box::new(b.entries), false);
                // SAFETY: offsets start at 0 and only ever grow.
                let offsets =
                    unsafe { OffsetsBuffer::new_unchecked(Buffer::from(b.offsets)) };
                MapArray::try_new(dtype, offsets, entries.boxed(), b.validity.freeze())?.boxed()
            },
            ColumnBuilder::Struct(b) => {
                let values = b
                    .children
                    .into_iter()
                    .map(|child| child.freeze())
                    .collect::<RowbatchResult<Vec<_>>>()?;
                StructArray::try_new(b.dtype, b.length, values, b.validity.freeze())?.boxed()
            },
        })
    }
}
