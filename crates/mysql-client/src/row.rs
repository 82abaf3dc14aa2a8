//! Decoded result rows.

use std::sync::Arc;

use mysql_types::{FromValue, Value};
use mysql_wire::ColumnDefinition;

use crate::error::{Error, Result};

/// One decoded row of a result set.
///
/// The column metadata is shared across all rows of a set; values are
/// owned per row. Rows are plain data: once yielded they outlive the
/// session lease that produced them.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<Vec<ColumnDefinition>>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<Vec<ColumnDefinition>>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Column metadata for this row's result set.
    #[must_use]
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at a column index.
    pub fn value(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or_else(|| {
            Error::Usage(format!(
                "column index {index} out of range for {}-column row",
                self.values.len()
            ))
        })
    }

    /// All raw values in column order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consume the row, returning its values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Index of a named column (case-insensitive, alias name).
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::Usage(format!("no column named `{name}`")))
    }

    /// Typed value at a column index.
    pub fn get<T: FromValue>(&self, index: usize) -> Result<T> {
        T::from_value(self.value(index)?).map_err(Error::Conversion)
    }

    /// Typed value of a named column.
    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T> {
        let index = self.column_index(name)?;
        self.get(index)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mysql_wire::column::{ColumnFlags, ColumnType};

    fn test_row() -> Row {
        let column = |name: &str, ty: ColumnType| ColumnDefinition {
            catalog: "def".into(),
            schema: String::new(),
            table: String::new(),
            org_table: String::new(),
            name: name.into(),
            org_name: name.into(),
            charset: 63,
            length: 11,
            column_type: ty,
            flags: ColumnFlags::empty(),
            decimals: 0,
        };
        Row::new(
            Arc::new(vec![
                column("id", ColumnType::Long),
                column("name", ColumnType::VarString),
            ]),
            vec![Value::Int(7), Value::from("seven")],
        )
    }

    #[test]
    fn test_typed_access() {
        let row = test_row();
        assert_eq!(row.get::<i64>(0).unwrap(), 7);
        assert_eq!(row.get_by_name::<String>("NAME").unwrap(), "seven");
    }

    #[test]
    fn test_out_of_range_is_usage_error() {
        let row = test_row();
        assert!(matches!(row.get::<i64>(5), Err(Error::Usage(_))));
        assert!(matches!(
            row.get_by_name::<i64>("missing"),
            Err(Error::Usage(_))
        ));
    }

    #[test]
    fn test_conversion_error_is_not_usage() {
        let row = test_row();
        assert!(matches!(
            row.get::<i64>(1),
            Err(Error::Conversion(_))
        ));
    }
}
