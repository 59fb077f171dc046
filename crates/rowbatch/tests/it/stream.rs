use arrow::array::Utf8Array;
use rowbatch::descriptor::descriptor_to_bytes;
use rowbatch::{RowConverter, Schema, TypeDescriptor, TypeKind};

use crate::util::{build_row, framed, Slot, VecSource};

#[test]
fn zero_column_projection_counts_rows() {
    // A `count(*)` projection: zero fields, any row payload is ignored.
    let converter = RowConverter::try_new(Schema::from_fields(vec![])).unwrap();
    let mut first = Vec::new();
    first.extend_from_slice(&12i32.to_le_bytes());
    first.extend_from_slice(&[0u8; 12]);
    first.extend_from_slice(&(-1i32).to_le_bytes());
    let second = framed(&[vec![]]); // a single zero-length row

    let batch = converter
        .convert_stream(&mut VecSource::new(vec![first, second]))
        .unwrap();
    assert_eq!(batch.height(), 2);
    assert_eq!(batch.width(), 0);
}

#[test]
fn builders_reset_between_conversions_and_accumulate_within_one() {
    let pairs = vec![(
        "s".to_string(),
        descriptor_to_bytes(&TypeDescriptor::new(TypeKind::String).nullable()).unwrap(),
    )];
    let converter = RowConverter::from_descriptor_pairs(&pairs).unwrap();

    let rows_a = vec![build_row(&[Slot::from_str("one")])];
    let rows_b = vec![
        build_row(&[Slot::from_str("two")]),
        build_row(&[Slot::from_str("three")]),
    ];
    let mut source = VecSource::new(vec![framed(&rows_a), framed(&rows_b)]);
    let batch = converter.convert_stream(&mut source).unwrap();
    assert_eq!(batch.height(), 3);
    let strings = batch.columns()[0]
        .as_any()
        .downcast_ref::<Utf8Array<i64>>()
        .unwrap();
    assert_eq!(strings.value(0), "one");
    assert_eq!(strings.value(2), "three");

    // Same converter, fresh conversion: nothing leaks from the previous one.
    let mut source = VecSource::single(&[build_row(&[Slot::from_str("fresh")])]);
    let batch = converter.convert_stream(&mut source).unwrap();
    assert_eq!(batch.height(), 1);
}

#[test]
fn converter_is_shareable_across_threads() {
    use std::sync::Arc;

    let pairs = vec![(
        "n".to_string(),
        descriptor_to_bytes(&TypeDescriptor::new(TypeKind::Int64).nullable()).unwrap(),
    )];
    let converter = Arc::new(RowConverter::from_descriptor_pairs(&pairs).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let converter = Arc::clone(&converter);
            std::thread::spawn(move || {
                let mut row = vec![0u8; 8];
                row.extend_from_slice(&(i as i64).to_le_bytes());
                let mut source = VecSource::single(&[row]);
                converter.convert_stream(&mut source).unwrap().height()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
    }
}
