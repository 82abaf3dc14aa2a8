#![no_main]

use libfuzzer_sys::fuzz_target;
use mysql_wire::handshake::{AuthMoreData, AuthSwitchRequest, InitialHandshake};

fuzz_target!(|data: &[u8]| {
    // Fuzz the server-greeting and mid-auth packet parsers.
    let _ = InitialHandshake::decode(data);
    let _ = AuthSwitchRequest::decode(data);
    let _ = AuthMoreData::decode(data);
});
