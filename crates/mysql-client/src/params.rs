//! Parameter collections for prepared and text commands.

use mysql_types::Value;

use crate::error::{Error, Result};

/// An ordered collection of bound parameter values.
///
/// Positional only: parameter N binds to the Nth `?` placeholder.
/// Index-taking methods validate their arguments and surface usage
/// errors rather than panicking.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: Vec<Value>,
}

impl Params {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bound parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameters are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Append a parameter.
    pub fn push(&mut self, value: impl Into<Value>) {
        self.values.push(value.into());
    }

    /// Insert a parameter at an index, shifting later parameters.
    ///
    /// `index` may equal `len()` (append); anything past that is a usage
    /// error.
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        if index > self.values.len() {
            return Err(Error::Usage(format!(
                "insert index {index} out of range for {} parameters",
                self.values.len()
            )));
        }
        self.values.insert(index, value.into());
        Ok(())
    }

    /// Remove the parameter at an index.
    pub fn remove_at(&mut self, index: usize) -> Result<Value> {
        if index >= self.values.len() {
            return Err(Error::Usage(format!(
                "remove index {index} out of range for {} parameters",
                self.values.len()
            )));
        }
        Ok(self.values.remove(index))
    }

    /// Replace the parameter at an index.
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(Error::Usage(format!(
                "set index {index} out of range for {} parameters",
                self.values.len()
            ))),
        }
    }

    /// The bound values in order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Remove all parameters.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl<V: Into<Value>> FromIterator<V> for Params {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

/// Interpolate parameters into SQL text for the text protocol.
///
/// Replaces each `?` outside of string literals, backtick quotes, and
/// comments with the escaped literal form of the corresponding value.
pub fn interpolate_params(sql: &str, params: &[Value]) -> Result<String> {
    if params.is_empty() {
        return Ok(sql.to_owned());
    }

    let mut out = String::with_capacity(sql.len() + params.len() * 8);
    let mut param_iter = params.iter();
    let mut chars = sql.chars().peekable();
    let mut in_quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match in_quote {
            Some(quote) => {
                out.push(c);
                if c == '\\' && quote != '`' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == quote {
                    in_quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    in_quote = Some(c);
                    out.push(c);
                }
                '?' => {
                    let value = param_iter.next().ok_or_else(|| {
                        Error::Usage(format!(
                            "SQL has more placeholders than the {} bound parameters",
                            params.len()
                        ))
                    })?;
                    write_literal(&mut out, value);
                }
                _ => out.push(c),
            },
        }
    }

    if param_iter.next().is_some() {
        return Err(Error::Usage(format!(
            "{} parameters bound but fewer placeholders in SQL",
            params.len()
        )));
    }

    Ok(out)
}

/// Whether the SQL references a `@user` variable outside of string
/// literals and quoted identifiers.
///
/// Parameterized commands reject user variables unless
/// `Allow User Variables` is set, because an unintended `@` usually means
/// a mistyped parameter placeholder.
#[must_use]
pub fn contains_user_variables(sql: &str) -> bool {
    let mut chars = sql.chars().peekable();
    let mut in_quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match in_quote {
            Some(quote) => {
                if c == '\\' && quote != '`' {
                    chars.next();
                } else if c == quote {
                    in_quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => in_quote = Some(c),
                // @@system_variable is always allowed.
                '@' if chars.peek() != Some(&'@') => return true,
                '@' => {
                    chars.next();
                }
                _ => {}
            },
        }
    }
    false
}

fn write_literal(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("NULL"),
        Value::Int(v) => out.push_str(&v.to_string()),
        Value::UInt(v) => out.push_str(&v.to_string()),
        Value::Float(v) => out.push_str(&v.to_string()),
        Value::Double(v) => out.push_str(&v.to_string()),
        Value::Decimal(s) => out.push_str(s),
        Value::Bytes(b) => {
            out.push('\'');
            for &byte in b {
                match byte {
                    b'\'' => out.push_str("''"),
                    b'\\' => out.push_str("\\\\"),
                    0 => out.push_str("\\0"),
                    b'\n' => out.push_str("\\n"),
                    b'\r' => out.push_str("\\r"),
                    0x1A => out.push_str("\\Z"),
                    _ => out.push(byte as char),
                }
            }
            out.push('\'');
        }
        Value::Json(s) => write_literal(out, &Value::Bytes(s.clone().into_bytes())),
        Value::Bit(b) => {
            out.push_str("b'");
            for &byte in b {
                out.push_str(&format!("{byte:08b}"));
            }
            out.push('\'');
        }
        Value::Date(d) => {
            out.push_str(&format!("'{:04}-{:02}-{:02}'", d.year, d.month, d.day));
        }
        Value::DateTime(dt) => {
            out.push_str(&format!(
                "'{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}'",
                dt.date.year, dt.date.month, dt.date.day, dt.hour, dt.minute, dt.second, dt.micros
            ));
        }
        Value::Time(t) => {
            let sign = if t.negative { "-" } else { "" };
            out.push_str(&format!(
                "'{sign}{:02}:{:02}:{:02}.{:06}'",
                u32::from(t.hours) + t.days * 24,
                t.minutes,
                t.seconds,
                t.micros
            ));
        }
        Value::Uuid(u) => out.push_str(&format!("'{u}'")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove_bounds() {
        let mut params = Params::new();
        params.push(1i64);

        // Insert at len() appends.
        params.insert(1, 2i64).unwrap();
        assert_eq!(params.len(), 2);

        // Past-end insert and remove are usage errors.
        assert!(matches!(params.insert(5, 3i64), Err(Error::Usage(_))));
        assert!(matches!(params.remove_at(2), Err(Error::Usage(_))));

        assert_eq!(params.remove_at(0).unwrap(), Value::Int(1));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_set_bounds() {
        let mut params: Params = [1i64].into_iter().collect();
        params.set(0, 9i64).unwrap();
        assert_eq!(params.values()[0], Value::Int(9));
        assert!(matches!(params.set(1, 0i64), Err(Error::Usage(_))));
    }

    #[test]
    fn test_interpolation() {
        let params = vec![Value::Int(5), Value::from("O'Brien")];
        let sql = interpolate_params("SELECT * FROM t WHERE id = ? AND name = ?", &params).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE id = 5 AND name = 'O''Brien'");
    }

    #[test]
    fn test_interpolation_ignores_literals() {
        let params = vec![Value::Int(1)];
        let sql = interpolate_params("SELECT '?' , `a?b`, ? FROM t", &params).unwrap();
        assert_eq!(sql, "SELECT '?' , `a?b`, 1 FROM t");
    }

    #[test]
    fn test_interpolation_count_mismatch() {
        assert!(matches!(
            interpolate_params("SELECT ?", &[]),
            Ok(_)
        ));
        assert!(matches!(
            interpolate_params("SELECT ?, ?", &[Value::Int(1)]),
            Err(Error::Usage(_))
        ));
        assert!(matches!(
            interpolate_params("SELECT 1", &[Value::Int(1)]),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn test_user_variable_detection() {
        assert!(contains_user_variables("SET @x = 1"));
        assert!(contains_user_variables("SELECT @total + ?"));
        // System variables and quoted text do not count.
        assert!(!contains_user_variables("SELECT @@version"));
        assert!(!contains_user_variables("SELECT 'mail@example.com'"));
        assert!(!contains_user_variables("SELECT `weird@name` FROM t"));
    }

    #[test]
    fn test_null_and_binary_literals() {
        let mut out = String::new();
        write_literal(&mut out, &Value::Null);
        assert_eq!(out, "NULL");

        let params = vec![Value::Bytes(vec![b'a', 0, b'\n'])];
        let sql = interpolate_params("VALUES (?)", &params).unwrap();
        assert_eq!(sql, "VALUES ('a\\0\\n')");
    }
}
