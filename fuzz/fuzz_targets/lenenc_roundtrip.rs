#![no_main]

use libfuzzer_sys::fuzz_target;
use mysql_wire::{PayloadReader, PayloadWriter};

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes must never panic, and whatever decodes
    // must re-encode to the identical shortest form.
    let mut reader = PayloadReader::new(data);
    if let Ok(value) = reader.read_lenenc_int("fuzz") {
        let consumed = data.len() - reader.remaining();
        let mut writer = PayloadWriter::new();
        writer.write_lenenc_int(value);
        let encoded = writer.freeze();
        // Round-trip identity holds whenever the input used the
        // canonical (shortest) encoding.
        if encoded.len() == consumed {
            assert_eq!(&encoded[..], &data[..consumed]);
        }
        let mut again = PayloadReader::new(&encoded);
        assert_eq!(again.read_lenenc_int("fuzz"), Ok(value));
    }
});
