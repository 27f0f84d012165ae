use serde::{Deserialize, Serialize};

use crate::error::{Result, TasteError};

/// A single typed column. Audio features are floats, the categorical
/// pitch-class style attributes (key, mode, time signature) are
/// integers, identifiers and labels are strings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Column {
    Float(Vec<f64>),
    Int(Vec<i64>),
    Str(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(values) => values.len(),
            Column::Int(values) => values.len(),
            Column::Str(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row selection by index, in the order given. An out-of-range
    /// index is a schema error, not a panic.
    pub fn take(&self, indices: &[usize]) -> Result<Column> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(TasteError::Schema(format!(
                "row index {} out of range for column of {} rows",
                bad,
                self.len()
            )));
        }
        Ok(match self {
            Column::Float(values) => {
                Column::Float(indices.iter().map(|&i| values[i]).collect())
            }
            Column::Int(values) => Column::Int(indices.iter().map(|&i| values[i]).collect()),
            Column::Str(values) => {
                Column::Str(indices.iter().map(|&i| values[i].clone()).collect())
            }
        })
    }

    fn append(&mut self, other: &Column) -> Result<()> {
        match (self, other) {
            (Column::Float(a), Column::Float(b)) => a.extend_from_slice(b),
            (Column::Int(a), Column::Int(b)) => a.extend_from_slice(b),
            (Column::Str(a), Column::Str(b)) => a.extend_from_slice(b),
            _ => return Err(TasteError::schema("column type mismatch on concat")),
        }
        Ok(())
    }
}

/// A column-major table of track records: one row per song, one column
/// per attribute.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    columns: Vec<(String, Column)>,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if self.columns.iter().any(|(existing, _)| *existing == name) {
            return Err(TasteError::Schema(format!("duplicate column '{}'", name)));
        }
        if let Some((_, first)) = self.columns.first() {
            if first.len() != column.len() {
                return Err(TasteError::Schema(format!(
                    "column '{}' has {} rows, frame has {}",
                    name,
                    column.len(),
                    first.len()
                )));
            }
        }
        self.columns.push((name, column));
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, column)| column)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// The values of a string column, or a schema error if the column is
    /// missing or not string-typed.
    pub fn str_column(&self, name: &str) -> Result<&[String]> {
        match self.column(name) {
            Some(Column::Str(values)) => Ok(values),
            Some(_) => Err(TasteError::Schema(format!(
                "column '{}' is not string-typed",
                name
            ))),
            None => Err(TasteError::Schema(format!("missing column '{}'", name))),
        }
    }

    /// New frame with the selected rows, in the order given.
    pub fn take(&self, indices: &[usize]) -> Result<Frame> {
        let mut columns = Vec::with_capacity(self.columns.len());
        for (name, column) in &self.columns {
            columns.push((name.clone(), column.take(indices)?));
        }
        Ok(Frame { columns })
    }

    /// Vertical concatenation. All frames must share the same columns in
    /// the same order with matching types.
    pub fn concat(frames: &[Frame]) -> Result<Frame> {
        let mut iter = frames.iter();
        let first = match iter.next() {
            Some(frame) => frame,
            None => return Ok(Frame::new()),
        };
        let mut result = first.clone();
        for frame in iter {
            if frame.column_names() != result.column_names() {
                return Err(TasteError::schema(
                    "frames have mismatched columns on concat",
                ));
            }
            for ((_, target), (_, source)) in result.columns.iter_mut().zip(&frame.columns) {
                target.append(source)?;
            }
        }
        Ok(result)
    }
}
