//! Canned rows and execution results returned by matched expectations.

use std::sync::Arc;

use crate::{UsageError, Value};

/// The summary of an executed statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    last_insert_id: i64,
    rows_affected: u64,
}

impl ExecResult {
    pub fn new(last_insert_id: i64, rows_affected: u64) -> Self {
        Self {
            last_insert_id,
            rows_affected,
        }
    }

    pub fn last_insert_id(&self) -> i64 {
        self.last_insert_id
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RowsData {
    columns: Vec<String>,
    records: Vec<Vec<Value>>,
}

/// An ordered set of named-column records.
///
/// Rows are built once during test setup. Every query that returns them gets a cheap
/// clone sharing the records, with its own cursor starting at the first row.
///
/// ```
/// use sqlmock::Rows;
///
/// let rows = Rows::new(["id", "status"])
///     .add_csv_rows("1,pending\n2,shipped")
///     .unwrap();
/// assert_eq!(rows.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Rows {
    data: Arc<RowsData>,
    pos: usize,
}

impl PartialEq for Rows {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Rows {
    /// Creates an empty result set with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data: Arc::new(RowsData {
                columns: columns.into_iter().map(Into::into).collect(),
                records: vec![],
            }),
            pos: 0,
        }
    }

    /// Result set with neither columns nor rows.
    pub fn empty() -> Self {
        Self::new(Vec::<String>::new())
    }

    /// Appends one record. It must have one value per column.
    pub fn add_row<I, V>(mut self, values: I) -> Result<Self, UsageError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let record: Vec<Value> = values.into_iter().map(Into::into).collect();
        self.push_record(record)?;
        Ok(self)
    }

    /// Appends one record per non-empty line of comma separated fields.
    ///
    /// Fields are trimmed, then `NULL` becomes [`Value::Null`], integers become
    /// [`Value::Int`], other finite numbers become [`Value::Float`], and everything else
    /// is text, including `NaN` and `inf`.
    pub fn add_csv_rows(mut self, csv: &str) -> Result<Self, UsageError> {
        for line in csv.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let record = line.split(',').map(parse_field).collect();
            self.push_record(record)?;
        }
        Ok(self)
    }

    fn push_record(&mut self, record: Vec<Value>) -> Result<(), UsageError> {
        let data = Arc::make_mut(&mut self.data);
        if record.len() != data.columns.len() {
            return Err(UsageError::RowWidth {
                expected: data.columns.len(),
                actual: record.len(),
            });
        }
        data.records.push(record);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.data.columns
    }

    /// Total number of records, regardless of the cursor.
    pub fn len(&self) -> usize {
        self.data.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.records.is_empty()
    }

    /// Clone of these rows with the cursor back at the first record.
    pub(crate) fn rewind(&self) -> Self {
        Self {
            data: self.data.clone(),
            pos: 0,
        }
    }
}

impl Iterator for Rows {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        let values = self.data.records.get(self.pos)?.clone();
        self.pos += 1;
        Some(Row {
            data: self.data.clone(),
            values,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.data.records.len() - self.pos;
        (left, Some(left))
    }
}

/// A single record fetched from [`Rows`].
#[derive(Debug, Clone)]
pub struct Row {
    data: Arc<RowsData>,
    values: Vec<Value>,
}

impl Row {
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn get_by_name(&self, column: &str) -> Option<&Value> {
        let idx = self.data.columns.iter().position(|c| c == column)?;
        self.values.get(idx)
    }

    pub fn columns(&self) -> &[String] {
        &self.data.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

fn parse_field(field: &str) -> Value {
    let field = field.trim();
    if field.eq_ignore_ascii_case("null") {
        Value::Null
    } else if let Ok(v) = field.parse::<i64>() {
        Value::Int(v)
    } else if let Some(v) = field.parse::<f64>().ok().filter(|v| v.is_finite()) {
        Value::Float(v)
    } else {
        Value::Text(field.to_string())
    }
}
