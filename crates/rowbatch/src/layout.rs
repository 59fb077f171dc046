//! Per-schema row layout planning.
//!
//! The layout is computed once per distinct schema and is immutable
//! afterwards, so it can be cached and shared across concurrent conversions.

use arrow::datatypes::{ArrowDataType, Field};
use rowbatch_error::{rowbatch_bail, rowbatch_ensure, RowbatchResult};

use crate::variable;

/// Widest decimal the embedded engine represents.
pub const MAX_DECIMAL_PRECISION: usize = 38;

/// Widest decimal whose unscaled integer fits the 8-byte slot inline.
/// Larger precisions (up to [`MAX_DECIMAL_PRECISION`]) are stored in the
/// variable-length region as big-endian unscaled bytes. This boundary must
/// match the engine's native decimal widths.
pub const MAX_INLINE_DECIMAL_PRECISION: usize = 18;

/// Fixed-vs-variable classification of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    /// Value stored in the leading `width` bytes of the slot.
    Fixed { width: usize },
    /// Slot holds a packed offset+length word into the variable region.
    Variable,
    /// The empty type: occupies a slot, decodes to null unconditionally.
    Null,
}

/// Everything the decoders need to know about one field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub field: Field,
    pub class: FieldClass,
    /// Stored bytes are big-endian relative to native order. Only true for
    /// the variable-length large-decimal representation.
    pub big_endian: bool,
    /// Whether the stored bytes can be handed out verbatim without
    /// materializing. Nested containers must be materialized.
    pub supports_raw_data: bool,
}

pub(crate) fn classify(dtype: &ArrowDataType) -> RowbatchResult<FieldClass> {
    use ArrowDataType as D;
    Ok(match dtype {
        D::Boolean => FieldClass::Fixed { width: 1 },
        D::Int8 => FieldClass::Fixed { width: 1 },
        D::Int16 => FieldClass::Fixed { width: 2 },
        D::Int32 | D::Date32 => FieldClass::Fixed { width: 4 },
        D::Int64 | D::Timestamp(_, _) => FieldClass::Fixed { width: 8 },
        D::Float32 => FieldClass::Fixed { width: 4 },
        D::Float64 => FieldClass::Fixed { width: 8 },
        D::Decimal(precision, _) if *precision <= MAX_INLINE_DECIMAL_PRECISION => {
            FieldClass::Fixed { width: 8 }
        },
        D::Decimal(_, _) => FieldClass::Variable,
        D::LargeUtf8 | D::LargeBinary | D::FixedSizeBinary(_) => FieldClass::Variable,
        D::LargeList(_) | D::Map(_, _) | D::Struct(_) => FieldClass::Variable,
        D::Null => FieldClass::Null,
        dt => rowbatch_bail!(UnsupportedType: "no row representation for {:?}", dt),
    })
}

impl FieldDescriptor {
    pub(crate) fn try_new(field: Field) -> RowbatchResult<Self> {
        let class = classify(field.dtype())?;
        let big_endian = matches!(
            (field.dtype(), class),
            (ArrowDataType::Decimal(_, _), FieldClass::Variable)
        );
        let supports_raw_data = match field.dtype() {
            ArrowDataType::LargeList(_) | ArrowDataType::Map(_, _) | ArrowDataType::Struct(_) => {
                false
            },
            ArrowDataType::Null => false,
            _ => true,
        };
        Ok(FieldDescriptor {
            field,
            class,
            big_endian,
            supports_raw_data,
        })
    }
}

/// Bitmap width for `field_count` fields: one bit per field, padded to a
/// 64-bit word boundary.
pub(crate) fn null_bitmap_bytes(field_count: usize) -> usize {
    field_count.div_ceil(64) * 8
}

pub(crate) fn is_bit_set(bitmap: &[u8], ordinal: usize) -> bool {
    bitmap[ordinal / 8] & (1 << (ordinal % 8)) != 0
}

/// The planned layout of one row: bitmap width plus one 8-byte slot per
/// field, in declared order.
#[derive(Debug, Clone)]
pub struct RowLayout {
    fields: Vec<FieldDescriptor>,
    null_bitmap_bytes: usize,
}

impl RowLayout {
    pub fn plan(fields: &[Field]) -> RowbatchResult<Self> {
        let fields = fields
            .iter()
            .map(|f| FieldDescriptor::try_new(f.clone()))
            .collect::<RowbatchResult<Vec<_>>>()?;
        let null_bitmap_bytes = null_bitmap_bytes(fields.len());
        Ok(RowLayout {
            fields,
            null_bitmap_bytes,
        })
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn null_bitmap_bytes(&self) -> usize {
        self.null_bitmap_bytes
    }

    /// Byte offset of the field's slot within the row.
    pub fn slot_offset(&self, ordinal: usize) -> RowbatchResult<usize> {
        rowbatch_ensure!(
            ordinal < self.fields.len(),
            OutOfBounds: "field {} of a {}-field row", ordinal, self.fields.len()
        );
        Ok(self.null_bitmap_bytes + ordinal * 8)
    }

    /// Minimum number of bytes a well-formed row occupies: the bitmap plus
    /// the slot region. Zero for a zero-field schema.
    pub fn min_row_bytes(&self) -> usize {
        self.null_bitmap_bytes + self.fields.len() * 8
    }
}

/// A non-owning view over one row's bytes. Ephemeral: created per row and
/// never outlives the buffer it points into.
#[derive(Clone, Copy, Debug)]
pub struct RowView<'a> {
    layout: &'a RowLayout,
    data: &'a [u8],
}

impl<'a> RowView<'a> {
    pub fn try_new(layout: &'a RowLayout, data: &'a [u8]) -> RowbatchResult<Self> {
        rowbatch_ensure!(
            data.len() >= layout.min_row_bytes(),
            LayoutMismatch: "row of {} bytes cannot hold {} fields ({} bytes minimum)",
            data.len(), layout.field_count(), layout.min_row_bytes()
        );
        Ok(RowView { layout, data })
    }

    pub fn layout(&self) -> &'a RowLayout {
        self.layout
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn is_null_at(&self, ordinal: usize) -> RowbatchResult<bool> {
        rowbatch_ensure!(
            ordinal < self.layout.field_count(),
            OutOfBounds: "field {} of a {}-field row", ordinal, self.layout.field_count()
        );
        Ok(is_bit_set(self.data, ordinal))
    }

    /// The stored bytes of a non-null field, without type conversion: the
    /// leading value bytes of the slot for fixed-length fields, the
    /// referenced span for strings, binaries and large decimals.
    ///
    /// Byte-identical passthrough only; fields of nested type must be
    /// materialized instead and nulls must be checked beforehand.
    pub fn raw_bytes_at(&self, ordinal: usize) -> RowbatchResult<&'a [u8]> {
        let descriptor = &self.layout.fields()[self.check_ordinal(ordinal)?];
        rowbatch_ensure!(
            descriptor.supports_raw_data,
            UnsupportedType: "field '{}' ({:?}) has no raw representation",
            descriptor.field.name, descriptor.field.dtype()
        );
        rowbatch_ensure!(
            !self.is_null_at(ordinal)?,
            LayoutMismatch: "raw read of null field '{}'", descriptor.field.name
        );
        let slot = self.layout.slot_offset(ordinal)?;
        match descriptor.class {
            FieldClass::Fixed { width } => Ok(&self.data[slot..slot + width]),
            FieldClass::Variable => variable::referenced_bytes(self.data, slot),
            FieldClass::Null => unreachable!("null class never supports raw data"),
        }
    }

    fn check_ordinal(&self, ordinal: usize) -> RowbatchResult<usize> {
        rowbatch_ensure!(
            ordinal < self.layout.field_count(),
            OutOfBounds: "field {} of a {}-field row", ordinal, self.layout.field_count()
        );
        Ok(ordinal)
    }
}
