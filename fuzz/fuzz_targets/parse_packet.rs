#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use mysql_codec::PacketCodec;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Fuzz packet framing: arbitrary bytes through the frame decoder.
    let mut codec = PacketCodec::new().without_sequence_validation();
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_packet)) = codec.decode(&mut buf) {}
});
