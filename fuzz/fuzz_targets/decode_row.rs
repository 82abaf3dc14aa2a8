#![no_main]

use libfuzzer_sys::fuzz_target;
use mysql_types::decode::{DecodeOptions, decode_binary_row, decode_text_row};
use mysql_types::guid::GuidFormat;
use mysql_wire::column::{ColumnDefinition, ColumnFlags, ColumnType};

fn column(ty: ColumnType, unsigned: bool) -> ColumnDefinition {
    ColumnDefinition {
        catalog: "def".into(),
        schema: String::new(),
        table: String::new(),
        org_table: String::new(),
        name: "c".into(),
        org_name: "c".into(),
        charset: 63,
        length: 64,
        column_type: ty,
        flags: if unsigned {
            ColumnFlags::UNSIGNED
        } else {
            ColumnFlags::empty()
        },
        decimals: 0,
    }
}

fuzz_target!(|data: &[u8]| {
    // Row decoders over arbitrary payloads must fail cleanly, never
    // panic, for every column-type shape.
    let types = [
        ColumnType::Tiny,
        ColumnType::Long,
        ColumnType::LongLong,
        ColumnType::Double,
        ColumnType::DateTime,
        ColumnType::Time,
        ColumnType::NewDecimal,
        ColumnType::VarString,
        ColumnType::Json,
        ColumnType::Bit,
    ];

    let opts = DecodeOptions {
        allow_zero_datetime: true,
        convert_zero_datetime: false,
        guid_format: GuidFormat::None,
    };

    for ty in types {
        for unsigned in [false, true] {
            let columns = [column(ty, unsigned)];
            let _ = decode_text_row(data, &columns, &opts);
            let _ = decode_binary_row(data, &columns, &opts);
        }
    }
});
