//! Character-set collation ids.

/// `latin1_swedish_ci`, the pre-4.1 server default.
pub const LATIN1_SWEDISH_CI: u8 = 8;
/// `utf8_general_ci`.
pub const UTF8_GENERAL_CI: u8 = 33;
/// `binary` pseudo-charset.
pub const BINARY: u8 = 63;
/// `utf8mb4_general_ci`.
pub const UTF8MB4_GENERAL_CI: u8 = 45;
/// `utf8mb4_unicode_ci`.
pub const UTF8MB4_UNICODE_CI: u8 = 224;
/// `utf8mb4_0900_ai_ci`, the MySQL 8.0 default.
pub const UTF8MB4_0900_AI_CI: u8 = 255;

/// Default collation requested by this driver.
pub const DEFAULT: u8 = UTF8MB4_GENERAL_CI;

/// Map a connection-string `Character Set` name to a collation id.
///
/// Returns `None` for names this driver does not recognize.
#[must_use]
pub fn from_name(name: &str) -> Option<u8> {
    match name.to_ascii_lowercase().as_str() {
        "latin1" => Some(LATIN1_SWEDISH_CI),
        "utf8" | "utf8mb3" => Some(UTF8_GENERAL_CI),
        "utf8mb4" => Some(UTF8MB4_GENERAL_CI),
        "binary" => Some(BINARY),
        _ => None,
    }
}
