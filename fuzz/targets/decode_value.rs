#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use zrdb::{
    rdb::{read_value, ByteCursor},
    ValueType,
};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    type_byte: u8,
    collect: bool,
    payload: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let Ok(value_type) = ValueType::try_from(input.type_byte) else {
        return;
    };
    let mut cursor = ByteCursor::new(&input.payload);
    if let Ok(value) = read_value(&mut cursor, value_type, input.collect) {
        if let Some(elements) = value.elements {
            assert!(elements.len() as u64 <= value.element_count);
        }
        assert!(cursor.position() <= input.payload.len());
    }
});
