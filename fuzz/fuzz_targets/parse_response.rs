#![no_main]

use libfuzzer_sys::fuzz_target;
use mysql_wire::response::{EofPacket, ErrPacket, OkPacket};
use mysql_wire::{Capabilities, ColumnDefinition};

fuzz_target!(|data: &[u8]| {
    // Fuzz the generic response and column-definition parsers under both
    // capability regimes.
    let modern = Capabilities::client_default();
    let legacy = modern - Capabilities::DEPRECATE_EOF;

    let _ = OkPacket::decode(data, modern);
    let _ = OkPacket::decode(data, legacy);
    let _ = ErrPacket::decode(data);
    let _ = EofPacket::decode(data);
    let _ = ColumnDefinition::decode(data);
});
