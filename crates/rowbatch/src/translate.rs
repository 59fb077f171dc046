//! Translation of descriptor trees into the embedded engine's type system.
//!
//! Translation is a pure function of the descriptor: every well-formed
//! descriptor maps deterministically to exactly one [`Field`]. Nullability is
//! applied post-order: a composite type is translated as non-null first, then
//! flagged nullable if its own flag is set; nested elements carry their own
//! flags and inherit nothing from the parent.

use std::collections::VecDeque;

use arrow::datatypes::{ArrowDataType, Field, TimeUnit};
use polars_utils::pl_str::PlSmallStr;
use rowbatch_error::{rowbatch_bail, rowbatch_ensure, RowbatchResult};

use crate::descriptor::{parse_descriptor, TypeDescriptor, TypeKind};
use crate::layout::MAX_DECIMAL_PRECISION;

/// Resolves an aggregate function name plus argument types to the function's
/// intermediate (merge/state) type.
///
/// Only consulted for the aggregate-state naming convention handled by
/// [`Schema::try_from_pairs_with_registry`]; the registry itself belongs to
/// the expression layer and is opaque to this crate.
pub trait FunctionRegistry {
    fn agg_state_type(
        &self,
        function: &str,
        args: &[ArrowDataType],
    ) -> RowbatchResult<ArrowDataType>;
}

/// Translate a descriptor; struct fields are named positionally
/// (`field_0`, `field_1`, …).
pub fn translate(descriptor: &TypeDescriptor) -> RowbatchResult<Field> {
    do_translate(descriptor, PlSmallStr::from_static("item"), &mut None)
}

/// Translate a descriptor consuming declared field names in document order:
/// the top-level name first, then one name per struct field, pre-order.
pub fn translate_with_names(
    descriptor: &TypeDescriptor,
    names: &[&str],
) -> RowbatchResult<Field> {
    let mut queue: VecDeque<PlSmallStr> = names.iter().map(|n| PlSmallStr::from(*n)).collect();
    let mut queue = Some(&mut queue);
    let name = next_name(&mut queue, || PlSmallStr::from_static("item"))?;
    do_translate(descriptor, name, &mut queue)
}

/// Whether a serialized descriptor translates to the given embedded field
/// type (ignoring the field name).
pub fn matches_descriptor(descriptor: &TypeDescriptor, field: &Field) -> bool {
    match translate(descriptor) {
        Ok(translated) => {
            translated.dtype() == field.dtype() && translated.is_nullable == field.is_nullable
        },
        Err(_) => false,
    }
}

fn next_name(
    names: &mut Option<&mut VecDeque<PlSmallStr>>,
    fallback: impl FnOnce() -> PlSmallStr,
) -> RowbatchResult<PlSmallStr> {
    match names {
        Some(queue) => match queue.pop_front() {
            Some(name) => Ok(name),
            None => rowbatch_bail!(SchemaParse: "declared field name list exhausted"),
        },
        None => Ok(fallback()),
    }
}

fn do_translate(
    descriptor: &TypeDescriptor,
    name: PlSmallStr,
    names: &mut Option<&mut VecDeque<PlSmallStr>>,
) -> RowbatchResult<Field> {
    use TypeKind as K;
    let dtype = match &descriptor.kind {
        K::Boolean => ArrowDataType::Boolean,
        K::Int8 => ArrowDataType::Int8,
        K::Int16 => ArrowDataType::Int16,
        K::Int32 => ArrowDataType::Int32,
        K::Int64 => ArrowDataType::Int64,
        K::Float32 => ArrowDataType::Float32,
        K::Float64 => ArrowDataType::Float64,
        K::String => ArrowDataType::LargeUtf8,
        K::Binary => ArrowDataType::LargeBinary,
        K::FixedBinary(len) => ArrowDataType::FixedSizeBinary(*len),
        K::Decimal { precision, scale } => {
            rowbatch_ensure!(
                *precision >= 1 && *precision <= MAX_DECIMAL_PRECISION,
                UnsupportedType: "decimal precision {} outside 1..={}",
                precision, MAX_DECIMAL_PRECISION
            );
            rowbatch_ensure!(
                scale <= precision,
                SchemaParse: "decimal scale {} exceeds precision {}", scale, precision
            );
            ArrowDataType::Decimal(*precision, *scale)
        },
        K::Date => ArrowDataType::Date32,
        K::Timestamp => ArrowDataType::Timestamp(TimeUnit::Microsecond, None),
        K::Struct(children) => {
            let fields = children
                .iter()
                .enumerate()
                .map(|(i, child)| {
                    let child_name = next_name(names, || PlSmallStr::from(format!("field_{i}")))?;
                    do_translate(child, child_name, names)
                })
                .collect::<RowbatchResult<Vec<_>>>()?;
            ArrowDataType::Struct(fields)
        },
        K::List(element) => {
            // Element names are not part of the declared name list.
            let item = do_translate(element, PlSmallStr::from_static("item"), &mut None)?;
            ArrowDataType::LargeList(Box::new(item))
        },
        K::Map { key, value } => {
            let key = do_translate(key, PlSmallStr::from_static("key"), &mut None)?;
            let value = do_translate(value, PlSmallStr::from_static("value"), &mut None)?;
            let entries = Field::new(
                PlSmallStr::from_static("entries"),
                ArrowDataType::Struct(vec![key, value]),
                false,
            );
            ArrowDataType::Map(Box::new(entries), false)
        },
        K::Nothing => {
            // The empty type carries no values; it is nullable by definition.
            return Ok(Field::new(name, ArrowDataType::Null, true));
        },
        K::Time
        | K::IntervalYear
        | K::IntervalDay
        | K::TimestampTz
        | K::Uuid
        | K::VarChar(_) => {
            rowbatch_bail!(UnsupportedType: "descriptor tag {:?} has no embedded type", descriptor.kind)
        },
    };
    Ok(Field::new(name, dtype, descriptor.nullable))
}

/// A translated schema: the embedded-engine fields of one conversion, in
/// declared order.
#[derive(Debug, Clone)]
pub struct Schema {
    fields: Vec<Field>,
}

/// Number of `#`-delimited segments that mark a partial-aggregation column.
const AGG_STATE_NAME_SEGMENTS: usize = 4;

impl Schema {
    pub fn from_fields(fields: Vec<Field>) -> Self {
        Schema { fields }
    }

    /// Build a schema from `(name, serialized descriptor)` pairs.
    ///
    /// Fails with `UnsupportedType` if any column name matches the
    /// aggregate-state convention; those schemas need
    /// [`Schema::try_from_pairs_with_registry`].
    pub fn try_from_pairs(pairs: &[(String, Vec<u8>)]) -> RowbatchResult<Self> {
        Self::build(pairs, None)
    }

    /// Build a schema, resolving aggregate-state columns through `registry`.
    ///
    /// This is the one deliberate leak between the schema and expression
    /// layers: a column whose name is `#`-delimited with at least four
    /// segments (field name, marker, ordinal, aggregate function name) does
    /// not store its literal struct type. The struct's element types are the
    /// aggregate function's argument types, and the stored type is the
    /// function's state type, resolved through the registry once at schema
    /// build time.
    pub fn try_from_pairs_with_registry(
        pairs: &[(String, Vec<u8>)],
        registry: &dyn FunctionRegistry,
    ) -> RowbatchResult<Self> {
        Self::build(pairs, Some(registry))
    }

    fn build(
        pairs: &[(String, Vec<u8>)],
        registry: Option<&dyn FunctionRegistry>,
    ) -> RowbatchResult<Self> {
        let mut fields = Vec::with_capacity(pairs.len());
        for (name, bytes) in pairs {
            let descriptor = parse_descriptor(bytes)?;
            let mut field = do_translate(&descriptor, PlSmallStr::from(name.as_str()), &mut None)?;

            let segments: Vec<&str> = name.split('#').collect();
            if segments.len() >= AGG_STATE_NAME_SEGMENTS {
                field = resolve_agg_state(field, segments[3], registry)?;
            }
            fields.push(field);
        }
        Ok(Schema { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }
}

fn resolve_agg_state(
    field: Field,
    function: &str,
    registry: Option<&dyn FunctionRegistry>,
) -> RowbatchResult<Field> {
    let Some(registry) = registry else {
        rowbatch_bail!(
            UnsupportedType:
            "aggregate state column '{}' requires a function registry", field.name
        )
    };
    let ArrowDataType::Struct(args) = field.dtype() else {
        rowbatch_bail!(
            UnsupportedType:
            "aggregate state column '{}' must be a struct, got {:?}", field.name, field.dtype()
        )
    };
    let arg_types: Vec<ArrowDataType> = args.iter().map(|f| f.dtype.clone()).collect();
    let state = registry.agg_state_type(function, &arg_types)?;
    Ok(Field::new(field.name.clone(), state, field.is_nullable))
}
