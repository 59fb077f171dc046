//! Conversion between a fixed-layout binary row format produced by an external
//! execution engine and the columnar batches consumed by the embedded engine.
//!
//! ## Row format
//!
//! A row is a contiguous byte span with three sections:
//!
//! ```text
//! ┌─────────────────┬──────────────────────────┬───────────────────────────┐
//! │   null bitmap   │   one 8-byte slot per    │   variable-length data    │
//! │ ceil(n/64) * 8  │   field, declared order  │   region (offset-based)   │
//! └─────────────────┴──────────────────────────┴───────────────────────────┘
//! ```
//!
//! The bitmap holds one bit per field, padded to a 64-bit word boundary; a set
//! bit marks the field as null, in which case the slot contents are
//! unspecified and must not be dereferenced.
//!
//! A fixed-length field (booleans, integers, floats, dates, timestamps and
//! decimals whose unscaled value fits in 8 bytes) stores its value in the
//! leading bytes of the slot, native byte order.
//!
//! A variable-length field packs a byte offset (high 32 bits, relative to the
//! row start) and a byte length (low 32 bits) into the slot, pointing into the
//! trailing data region:
//!
//! ```text
//!                ┌──────────────┬──────────────┐
//!   slot word    │    offset    │    length    │
//!                └──────────────┴──────────────┘
//!                 63          32 31           0
//! ```
//!
//! Nested regions repeat the same shape. A list region is
//!
//! ```text
//! ┌───────────┬──────────────────┬────────────────────┬─────────────────────┐
//! │ u64 count │ element bitmap   │ count × 8-byte     │ variable sub-region │
//! │           │ ceil(n/64) * 8   │ element slots      │                     │
//! └───────────┴──────────────────┴────────────────────┴─────────────────────┘
//! ```
//!
//! with element offsets relative to the list region start. A struct region is
//! shaped like a row scoped to the struct's own field count, and a map region
//! is a u64 key-region byte length followed by two list regions (keys, then
//! values) sharing one entry count.
//!
//! In streamed conversion, row buffers carry a sequence of length-prefixed
//! rows: a 4-byte little-endian length `L` followed by `L` row bytes, with
//! `L = -1` terminating the buffer and `L = 0` encoding a zero-column row
//! (e.g. a `count(*)` projection).
//!
//! The schema side enters as serialized [`TypeDescriptor`] trees and is
//! translated into the embedded engine's [`Field`]s once per conversion; rows
//! are then decoded against the planned [`RowLayout`] into [`ColumnBatch`]es.
//!
//! [`Field`]: arrow::datatypes::Field

pub mod builder;
pub mod config;
pub mod convert;
pub mod descriptor;
pub mod fixed;
pub mod layout;
pub mod translate;
pub mod variable;

use arrow::array::Array;

pub type ArrayRef = Box<dyn Array>;

pub use convert::{ColumnBatch, RowBufferSource, RowConverter};
pub use descriptor::{parse_descriptor, TypeDescriptor, TypeKind};
pub use layout::{FieldClass, FieldDescriptor, RowLayout, RowView};
pub use translate::{translate, translate_with_names, FunctionRegistry, Schema};
