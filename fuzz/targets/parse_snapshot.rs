#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use zrdb::{Event, ParserConfig, SnapshotParser};

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    version: u8,
    collect_elements: bool,
    verify_checksum: bool,
    body: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    // Правдоподобный заголовок, чтобы фаззер доходил до тела.
    let mut data = format!("REDIS{:04}", input.version % 13).into_bytes();
    data.extend_from_slice(&input.body);

    let config = ParserConfig {
        collect_elements: input.collect_elements,
        verify_checksum: input.verify_checksum,
        max_blob_size: 1 << 20,
        ..ParserConfig::default()
    };

    let mut parser = SnapshotParser::with_config(data.as_slice(), config);
    let mut last_offset = 0;
    while let Some(event) = parser.next() {
        let offset = parser.stats().bytes_read;
        assert!(offset >= last_offset, "offset went backwards");
        assert!(offset <= data.len() as u64, "offset past end of input");
        last_offset = offset;
        if matches!(event, Event::Error { .. }) {
            assert!(parser.next().is_none(), "iterator must fuse after error");
            break;
        }
    }
});
