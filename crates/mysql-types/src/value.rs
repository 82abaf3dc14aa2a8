//! Value representation for MySQL cells and parameters.

use uuid::Uuid;

/// Calendar date as transmitted by the server.
///
/// MySQL allows `0000-00-00`, so this is not a `chrono::NaiveDate`; use
/// [`FromValue`](crate::FromValue) to convert when a real date is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Date {
    /// Year (0-9999).
    pub year: u16,
    /// Month (0-12; 0 only in zero dates).
    pub month: u8,
    /// Day (0-31; 0 only in zero dates).
    pub day: u8,
}

impl Date {
    /// Whether this is the zero date `0000-00-00`.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.year == 0 && self.month == 0 && self.day == 0
    }
}

/// Date and time of day with microsecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DateTime {
    /// Date part.
    pub date: Date,
    /// Hour (0-23).
    pub hour: u8,
    /// Minute (0-59).
    pub minute: u8,
    /// Second (0-59).
    pub second: u8,
    /// Microseconds (0-999999).
    pub micros: u32,
}

impl DateTime {
    /// Whether this is the zero datetime `0000-00-00 00:00:00`.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.date.is_zero()
            && self.hour == 0
            && self.minute == 0
            && self.second == 0
            && self.micros == 0
    }
}

/// Duration value of a TIME column.
///
/// TIME is a signed duration up to ±838:59:59, not a time of day, hence
/// the explicit sign and day count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Time {
    /// Whether the duration is negative.
    pub negative: bool,
    /// Whole days.
    pub days: u32,
    /// Hours (0-23 after day extraction).
    pub hours: u8,
    /// Minutes (0-59).
    pub minutes: u8,
    /// Seconds (0-59).
    pub seconds: u8,
    /// Microseconds (0-999999).
    pub micros: u32,
}

/// A single decoded cell or bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Signed integer (TINY through LONGLONG, YEAR).
    Int(i64),
    /// Unsigned integer (UNSIGNED columns).
    UInt(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit double.
    Double(f64),
    /// String and blob family, raw column bytes.
    Bytes(Vec<u8>),
    /// DECIMAL / NEWDECIMAL, kept in its exact string form.
    Decimal(String),
    /// DATE column.
    Date(Date),
    /// DATETIME / TIMESTAMP column.
    DateTime(DateTime),
    /// TIME column.
    Time(Time),
    /// JSON document text.
    Json(String),
    /// BIT column bits, most significant byte first.
    Bit(Vec<u8>),
    /// GUID column decoded per the configured format.
    Uuid(Uuid),
}

impl Value {
    /// Check if the value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the variant, for error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Int(_) => "INT",
            Self::UInt(_) => "UNSIGNED INT",
            Self::Float(_) => "FLOAT",
            Self::Double(_) => "DOUBLE",
            Self::Bytes(_) => "BYTES",
            Self::Decimal(_) => "DECIMAL",
            Self::Date(_) => "DATE",
            Self::DateTime(_) => "DATETIME",
            Self::Time(_) => "TIME",
            Self::Json(_) => "JSON",
            Self::Bit(_) => "BIT",
            Self::Uuid(_) => "UUID",
        }
    }

    /// Get the value as an i64 if it is an integer that fits.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Get the value as a u64 if it is a non-negative integer.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Get the value as a string slice if it is textual.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Bytes(b) => std::str::from_utf8(b).ok(),
            Self::Json(s) | Self::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Get the raw bytes if the value is a byte string.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) | Self::Bit(b) => Some(b),
            Self::Json(s) | Self::Decimal(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::UInt(u64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Bytes(v.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Bytes(v.into_bytes())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
