use arrow::array::{
    BinaryArray, BooleanArray, FixedSizeBinaryArray, PrimitiveArray, Utf8Array,
};
use arrow::datatypes::ArrowDataType;
use rowbatch::descriptor::descriptor_to_bytes;
use rowbatch::{RowConverter, TypeDescriptor, TypeKind};
use rowbatch_error::RowbatchError;

use crate::util::{Slot, VecSource};

fn pair(name: &str, descriptor: &TypeDescriptor) -> (String, Vec<u8>) {
    (name.to_string(), descriptor_to_bytes(descriptor).unwrap())
}

fn scalar_pairs() -> Vec<(String, Vec<u8>)> {
    let nullable = |kind| TypeDescriptor::new(kind).nullable();
    vec![
        pair("b", &nullable(TypeKind::Boolean)),
        pair("i8", &nullable(TypeKind::Int8)),
        pair("i16", &nullable(TypeKind::Int16)),
        pair("i32", &nullable(TypeKind::Int32)),
        pair("i64", &nullable(TypeKind::Int64)),
        pair("f32", &nullable(TypeKind::Float32)),
        pair("f64", &nullable(TypeKind::Float64)),
        pair("date", &nullable(TypeKind::Date)),
        pair("ts", &nullable(TypeKind::Timestamp)),
        pair("dec_s", &nullable(TypeKind::Decimal { precision: 10, scale: 2 })),
        pair("dec_l", &nullable(TypeKind::Decimal { precision: 38, scale: 10 })),
        pair("s", &nullable(TypeKind::String)),
        pair("bin", &nullable(TypeKind::Binary)),
        pair("fixed", &nullable(TypeKind::FixedBinary(4))),
    ]
}

fn scalar_row() -> Vec<Slot> {
    vec![
        Slot::from_bool(true),
        Slot::from_i8(-8),
        Slot::from_i16(-1600),
        Slot::from_i32(320_000),
        Slot::from_i64(-64_000_000_000),
        Slot::from_f32(core::f32::consts::PI),
        Slot::from_f64(-0.0),
        Slot::from_i32(19_000),
        Slot::from_i64(1_700_000_000_123_456),
        Slot::from_i64(12_345),
        Slot::from_unscaled_be(12_345_678_901_234_567_890_123_456_789i128),
        Slot::from_str("héllo"),
        Slot::from_bytes(&[0x00, 0x9F, 0x92, 0x96]),
        Slot::from_bytes(&[1, 2, 3, 4]),
    ]
}

#[test]
fn scalars_roundtrip_exactly() {
    let converter = RowConverter::from_descriptor_pairs(&scalar_pairs()).unwrap();
    let mut source = VecSource::single(&[crate::util::build_row(&scalar_row())]);
    let batch = converter.convert_stream(&mut source).unwrap();
    assert_eq!(batch.height(), 1);
    let columns = batch.columns();

    let b = columns[0].as_any().downcast_ref::<BooleanArray>().unwrap();
    assert!(b.value(0));
    let i8s = columns[1]
        .as_any()
        .downcast_ref::<PrimitiveArray<i8>>()
        .unwrap();
    assert_eq!(i8s.value(0), -8);
    let i16s = columns[2]
        .as_any()
        .downcast_ref::<PrimitiveArray<i16>>()
        .unwrap();
    assert_eq!(i16s.value(0), -1600);
    let i32s = columns[3]
        .as_any()
        .downcast_ref::<PrimitiveArray<i32>>()
        .unwrap();
    assert_eq!(i32s.value(0), 320_000);
    let i64s = columns[4]
        .as_any()
        .downcast_ref::<PrimitiveArray<i64>>()
        .unwrap();
    assert_eq!(i64s.value(0), -64_000_000_000);

    // Floats are bit-exact, signed zero included.
    let f32s = columns[5]
        .as_any()
        .downcast_ref::<PrimitiveArray<f32>>()
        .unwrap();
    assert_eq!(f32s.value(0).to_bits(), core::f32::consts::PI.to_bits());
    let f64s = columns[6]
        .as_any()
        .downcast_ref::<PrimitiveArray<f64>>()
        .unwrap();
    assert_eq!(f64s.value(0).to_bits(), (-0.0f64).to_bits());

    let dates = columns[7]
        .as_any()
        .downcast_ref::<PrimitiveArray<i32>>()
        .unwrap();
    assert_eq!(dates.dtype(), &ArrowDataType::Date32);
    assert_eq!(dates.value(0), 19_000);
    let ts = columns[8]
        .as_any()
        .downcast_ref::<PrimitiveArray<i64>>()
        .unwrap();
    assert_eq!(ts.value(0), 1_700_000_000_123_456);

    let dec_s = columns[9]
        .as_any()
        .downcast_ref::<PrimitiveArray<i128>>()
        .unwrap();
    assert_eq!(dec_s.dtype(), &ArrowDataType::Decimal(10, 2));
    assert_eq!(dec_s.value(0), 12_345);
    let dec_l = columns[10]
        .as_any()
        .downcast_ref::<PrimitiveArray<i128>>()
        .unwrap();
    assert_eq!(dec_l.dtype(), &ArrowDataType::Decimal(38, 10));
    assert_eq!(dec_l.value(0), 12_345_678_901_234_567_890_123_456_789i128);

    let strings = columns[11]
        .as_any()
        .downcast_ref::<Utf8Array<i64>>()
        .unwrap();
    assert_eq!(strings.value(0), "héllo");
    let binary = columns[12]
        .as_any()
        .downcast_ref::<BinaryArray<i64>>()
        .unwrap();
    assert_eq!(binary.value(0), &[0x00, 0x9F, 0x92, 0x96][..]);
    let fixed = columns[13]
        .as_any()
        .downcast_ref::<FixedSizeBinaryArray>()
        .unwrap();
    assert_eq!(fixed.value(0), &[1u8, 2, 3, 4][..]);
}

#[test]
fn null_bits_win_over_garbage_slots() {
    let converter = RowConverter::from_descriptor_pairs(&scalar_pairs()).unwrap();
    // The writer fills null slots with 0xDB garbage; nothing may read it.
    let nulls: Vec<Slot> = (0..scalar_row().len()).map(|_| Slot::Null).collect();
    let mut source = VecSource::single(&[crate::util::build_row(&nulls)]);
    let batch = converter.convert_stream(&mut source).unwrap();
    assert_eq!(batch.height(), 1);
    for column in batch.columns() {
        assert_eq!(column.null_count(), 1, "{:?}", column.dtype());
    }
}

#[test]
fn mixed_null_and_value_rows() {
    let converter = RowConverter::from_descriptor_pairs(&scalar_pairs()).unwrap();
    let nulls: Vec<Slot> = (0..scalar_row().len()).map(|_| Slot::Null).collect();
    let rows = vec![
        crate::util::build_row(&scalar_row()),
        crate::util::build_row(&nulls),
        crate::util::build_row(&scalar_row()),
    ];
    let batch = converter
        .convert_stream(&mut VecSource::single(&rows))
        .unwrap();
    assert_eq!(batch.height(), 3);
    for column in batch.columns() {
        assert!(column.is_valid(0));
        assert!(column.is_null(1) || column.dtype() == &ArrowDataType::Null);
        assert!(column.is_valid(2));
    }
}

#[test]
fn decimal_precision_boundary_fails_at_translation() {
    let ok = vec![pair(
        "d",
        &TypeDescriptor::new(TypeKind::Decimal { precision: 38, scale: 0 }),
    )];
    assert!(RowConverter::from_descriptor_pairs(&ok).is_ok());

    let too_wide = vec![pair(
        "d",
        &TypeDescriptor::new(TypeKind::Decimal { precision: 39, scale: 0 }),
    )];
    let err = RowConverter::from_descriptor_pairs(&too_wide).unwrap_err();
    assert!(matches!(err, RowbatchError::UnsupportedType(_)));
}

#[test]
fn unknown_tag_fails_before_any_row_is_read() {
    let pairs = vec![pair("u", &TypeDescriptor::new(TypeKind::Uuid))];
    let err = RowConverter::from_descriptor_pairs(&pairs).unwrap_err();
    assert!(matches!(err, RowbatchError::UnsupportedType(_)));
}

#[test]
fn invalid_utf8_is_a_layout_mismatch() {
    let pairs = vec![pair("s", &TypeDescriptor::new(TypeKind::String).nullable())];
    let converter = RowConverter::from_descriptor_pairs(&pairs).unwrap();
    let row = crate::util::build_row(&[Slot::from_bytes(&[0xFF, 0xFE])]);
    let err = converter
        .convert_stream(&mut VecSource::single(&[row]))
        .unwrap_err();
    assert!(matches!(err, RowbatchError::LayoutMismatch(_)));
}

#[test]
fn corrupt_offset_word_is_a_layout_mismatch() {
    let pairs = vec![pair("s", &TypeDescriptor::new(TypeKind::String).nullable())];
    let converter = RowConverter::from_descriptor_pairs(&pairs).unwrap();
    // A hand-crafted slot pointing far outside the row.
    let word = (1u64 << 40) | 8;
    let row = crate::util::build_row(&[Slot::Fixed(word.to_le_bytes())]);
    let err = converter
        .convert_stream(&mut VecSource::single(&[row]))
        .unwrap_err();
    assert!(matches!(err, RowbatchError::LayoutMismatch(_)));
}

#[test]
fn raw_bytes_passthrough_matches_the_wire() {
    use rowbatch::RowView;

    let pairs = vec![
        pair("n", &TypeDescriptor::new(TypeKind::Int64).nullable()),
        pair("s", &TypeDescriptor::new(TypeKind::String).nullable()),
    ];
    let converter = RowConverter::from_descriptor_pairs(&pairs).unwrap();
    let row = crate::util::build_row(&[Slot::from_i64(77), Slot::from_str("raw")]);
    let view = RowView::try_new(converter.layout(), &row).unwrap();
    assert_eq!(view.raw_bytes_at(0).unwrap(), &77i64.to_le_bytes()[..]);
    assert_eq!(view.raw_bytes_at(1).unwrap(), &b"raw"[..]);

    let null_row = crate::util::build_row(&[Slot::Null, Slot::Null]);
    let view = RowView::try_new(converter.layout(), &null_row).unwrap();
    assert!(view.raw_bytes_at(0).is_err());
    let err = view.raw_bytes_at(2).unwrap_err();
    assert!(matches!(err, RowbatchError::OutOfBounds(_)));
}
