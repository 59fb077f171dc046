//! Driving row decoding into finished columnar batches.
//!
//! A [`RowConverter`] is built once per distinct schema (parse + layout plan)
//! and is immutable afterwards: it can be cached, shared and used from any
//! number of concurrent conversion calls, each operating on its own buffers
//! and builders. Row buffers stay owned by the caller; nothing is retained
//! past the conversion call and buffer contents are never mutated.

use arrow::datatypes::Field;
use rowbatch_error::{rowbatch_ensure, RowbatchResult};

use crate::builder::ColumnBuilder;
use crate::config;
use crate::layout::{FieldClass, RowLayout, RowView};
use crate::translate::{FunctionRegistry, Schema};
use crate::ArrayRef;

/// Buffer terminator in streamed mode: no more rows, pull the next buffer.
const END_OF_BUFFER: i32 = -1;

/// A pull-based producer of row buffers for streamed conversion.
///
/// The codec only pulls: `false` from [`has_next`](RowBufferSource::has_next)
/// is end-of-stream, not an error. Each buffer is only borrowed until the
/// next pull.
pub trait RowBufferSource {
    fn has_next(&mut self) -> bool;
    fn next_batch(&mut self) -> &[u8];
}

/// A finished columnar batch: one typed column per schema field plus the row
/// count. The height is carried explicitly so zero-column batches (e.g. a
/// `count(*)` projection) keep their row count.
#[derive(Debug)]
pub struct ColumnBatch {
    fields: Vec<Field>,
    columns: Vec<ArrayRef>,
    height: usize,
}

impl ColumnBatch {
    pub fn try_new(
        fields: Vec<Field>,
        columns: Vec<ArrayRef>,
        height: usize,
    ) -> RowbatchResult<Self> {
        rowbatch_ensure!(
            fields.len() == columns.len(),
            LayoutMismatch: "{} columns for {} fields", columns.len(), fields.len()
        );
        for (field, column) in fields.iter().zip(&columns) {
            rowbatch_ensure!(
                column.len() == height,
                LayoutMismatch: "column '{}' has {} rows, batch has {}",
                field.name, column.len(), height
            );
        }
        Ok(ColumnBatch {
            fields,
            columns,
            height,
        })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn columns(&self) -> &[ArrayRef] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0
    }

    pub fn into_columns(self) -> Vec<ArrayRef> {
        self.columns
    }
}

/// The build-once-per-schema conversion object.
#[derive(Debug, Clone)]
pub struct RowConverter {
    fields: Vec<Field>,
    layout: RowLayout,
}

impl RowConverter {
    pub fn try_new(schema: Schema) -> RowbatchResult<Self> {
        let fields = schema.into_fields();
        let layout = RowLayout::plan(&fields)?;
        Ok(RowConverter { fields, layout })
    }

    /// Build a converter straight from `(name, serialized descriptor)`
    /// pairs. Schema errors surface here, before any row is read.
    pub fn from_descriptor_pairs(pairs: &[(String, Vec<u8>)]) -> RowbatchResult<Self> {
        Self::try_new(Schema::try_from_pairs(pairs)?)
    }

    /// Like [`RowConverter::from_descriptor_pairs`], resolving
    /// aggregate-state columns through `registry`.
    pub fn from_descriptor_pairs_with_registry(
        pairs: &[(String, Vec<u8>)],
        registry: &dyn FunctionRegistry,
    ) -> RowbatchResult<Self> {
        Self::try_new(Schema::try_from_pairs_with_registry(pairs, registry)?)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn layout(&self) -> &RowLayout {
        &self.layout
    }

    fn new_builders(&self) -> RowbatchResult<Vec<ColumnBuilder>> {
        self.fields.iter().map(ColumnBuilder::try_new).collect()
    }

    fn append_row(&self, builders: &mut [ColumnBuilder], row: &[u8]) -> RowbatchResult<()> {
        let row = RowView::try_new(&self.layout, row)?;
        for (ordinal, (descriptor, builder)) in
            self.layout.fields().iter().zip(builders.iter_mut()).enumerate()
        {
            if matches!(descriptor.class, FieldClass::Null) || row.is_null_at(ordinal)? {
                builder.push_null();
            } else {
                builder.push_slot(row.data(), self.layout.slot_offset(ordinal)?)?;
            }
        }
        Ok(())
    }

    fn finish(&self, builders: Vec<ColumnBuilder>, height: usize) -> RowbatchResult<ColumnBatch> {
        let columns = builders
            .into_iter()
            .map(|builder| builder.freeze())
            .collect::<RowbatchResult<Vec<_>>>()?;
        ColumnBatch::try_new(self.fields.clone(), columns, height)
    }

    /// Single-buffer mode: decode rows whose boundaries the caller already
    /// owns. `offsets[i]` and `lengths[i]` locate row `i` within `data`.
    pub fn convert_block(
        &self,
        data: &[u8],
        offsets: &[usize],
        lengths: &[usize],
    ) -> RowbatchResult<ColumnBatch> {
        rowbatch_ensure!(
            offsets.len() == lengths.len(),
            LayoutMismatch: "{} row offsets but {} lengths", offsets.len(), lengths.len()
        );
        let mut builders = self.new_builders()?;
        for (&offset, &length) in offsets.iter().zip(lengths) {
            let row = crate::variable::sub_region(data, offset, length)?;
            self.append_row(&mut builders, row)?;
        }
        self.finish(builders, offsets.len())
    }

    /// Streamed mode: pull buffers until the source is exhausted, decoding
    /// the length-prefixed rows of each. Builders start empty and are
    /// retained across buffers within this one call.
    pub fn convert_stream(&self, source: &mut dyn RowBufferSource) -> RowbatchResult<ColumnBatch> {
        let mut builders = self.new_builders()?;
        let mut height = 0usize;
        let mut buffers = 0usize;
        while source.has_next() {
            let buffer = source.next_batch();
            buffers += 1;
            let mut cursor = 0usize;
            loop {
                rowbatch_ensure!(
                    cursor + 4 <= buffer.len(),
                    LayoutMismatch: "row buffer ends without a terminator at byte {}", cursor
                );
                let length =
                    i32::from_le_bytes(buffer[cursor..cursor + 4].try_into().unwrap());
                cursor += 4;
                if length == END_OF_BUFFER {
                    break;
                }
                rowbatch_ensure!(
                    length >= 0,
                    LayoutMismatch: "negative row length {} at byte {}", length, cursor - 4
                );
                let row = crate::variable::sub_region(buffer, cursor, length as usize)?;
                self.append_row(&mut builders, row)?;
                cursor += length as usize;
                height += 1;
            }
        }
        if config::verbose() {
            eprintln!(
                "rowbatch: decoded {} rows from {} buffers into {} columns",
                height,
                buffers,
                self.fields.len()
            );
        }
        self.finish(builders, height)
    }
}
