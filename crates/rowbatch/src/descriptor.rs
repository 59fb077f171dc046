//! The serialized cross-system type representation.
//!
//! Descriptors travel as opaque byte strings alongside field names; nothing
//! outside this module and the translator interprets them. The encoding is a
//! bincode-serialized [`TypeDescriptor`] tree.

use rowbatch_error::{rowbatch_err, RowbatchResult};
use serde::{Deserialize, Serialize};

/// One node of the descriptor tree: a type tag plus an orthogonal
/// nullability flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub kind: TypeKind,
    pub nullable: bool,
}

/// The type tags the wire schema can carry.
///
/// The reserved tags at the bottom are well-formed on the wire but have no
/// embedded counterpart; translating them fails with `UnsupportedType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
    Binary,
    FixedBinary(usize),
    Decimal { precision: usize, scale: usize },
    Date,
    Timestamp,
    Struct(Vec<TypeDescriptor>),
    List(Box<TypeDescriptor>),
    Map { key: Box<TypeDescriptor>, value: Box<TypeDescriptor> },
    /// The empty type; always nullable, decodes to null.
    Nothing,
    // Reserved, not implemented by this codec.
    Time,
    IntervalYear,
    IntervalDay,
    TimestampTz,
    Uuid,
    VarChar(usize),
}

impl TypeDescriptor {
    pub fn new(kind: TypeKind) -> Self {
        TypeDescriptor { kind, nullable: false }
    }

    /// Mark the descriptor nullable. Idempotent: wrapping an already-nullable
    /// descriptor is a no-op.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Decode one serialized descriptor.
pub fn parse_descriptor(bytes: &[u8]) -> RowbatchResult<TypeDescriptor> {
    bincode::deserialize(bytes)
        .map_err(|e| rowbatch_err!(SchemaParse: "cannot decode type descriptor: {}", e))
}

/// Encode a descriptor to its wire form.
pub fn descriptor_to_bytes(descriptor: &TypeDescriptor) -> RowbatchResult<Vec<u8>> {
    bincode::serialize(descriptor)
        .map_err(|e| rowbatch_err!(SchemaParse: "cannot encode type descriptor: {}", e))
}
