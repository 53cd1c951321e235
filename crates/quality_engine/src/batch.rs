//! Record batches.
//!
//! A `Batch` is the unit streamed through the pipeline: a bounded,
//! column-major slice of one file. Column-major storage lets predicates be
//! evaluated a column at a time, while `RowView` gives rules a record view.

use crate::DataValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Ordered column names with a name lookup.
///
/// Shared by every batch of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Columns {
    /// Creates a column set. Later duplicates shadow nothing; the first wins.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self { names, index }
    }

    /// Column names in file order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Position of a column.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Whether the column exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether there are no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A bounded sequence of records from one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    columns: Arc<Columns>,
    data: Vec<Vec<DataValue>>,
    rows: Vec<u64>,
}

impl Batch {
    /// Creates an empty batch with the given columns.
    pub fn empty(columns: Arc<Columns>) -> Self {
        let data = vec![Vec::new(); columns.len()];
        Self {
            columns,
            data,
            rows: Vec::new(),
        }
    }

    /// Builds a batch from row-major values.
    ///
    /// Rows shorter than the column set are padded with nulls; extra values
    /// are dropped. Row numbers start at `first_row` (1-based).
    pub fn from_rows(columns: Arc<Columns>, rows: Vec<Vec<DataValue>>, first_row: u64) -> Self {
        let mut builder = BatchBuilder::new(columns, first_row, rows.len());
        for row in rows {
            builder.push_row(row);
        }
        builder.finish()
    }

    /// Builds a batch from column-major values of `num_rows` records each.
    ///
    /// Columns of the wrong length are truncated or padded with nulls.
    pub fn from_columns(
        columns: Arc<Columns>,
        mut data: Vec<Vec<DataValue>>,
        num_rows: usize,
        first_row: u64,
    ) -> Self {
        data.resize_with(columns.len(), Vec::new);
        for column in &mut data {
            column.resize(num_rows, DataValue::Null);
        }
        Self {
            columns,
            data,
            rows: (first_row..first_row + num_rows as u64).collect(),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the batch holds no records.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The batch's column set.
    pub fn columns(&self) -> &Arc<Columns> {
        &self.columns
    }

    /// All values of one column.
    pub fn column(&self, name: &str) -> Option<&[DataValue]> {
        self.columns
            .position(name)
            .map(|i| self.data[i].as_slice())
    }

    /// All values of the column at `index`.
    pub fn column_at(&self, index: usize) -> &[DataValue] {
        &self.data[index]
    }

    /// 1-based file row number of the record at `index`.
    pub fn row_number(&self, index: usize) -> u64 {
        self.rows[index]
    }

    /// View of the record at `index`.
    pub fn row(&self, index: usize) -> RowView<'_> {
        RowView { batch: self, index }
    }

    /// Iterates over all records.
    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        (0..self.len()).map(move |index| RowView { batch: self, index })
    }

    /// Keeps the records whose mask entry is true.
    ///
    /// Row numbers are preserved so samples still point at the file.
    pub fn filter(&self, mask: &[bool]) -> Batch {
        let keep: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();

        if keep.len() == self.len() {
            return self.clone();
        }

        let data = self
            .data
            .iter()
            .map(|column| keep.iter().map(|&i| column[i].clone()).collect())
            .collect();
        let rows = keep.iter().map(|&i| self.rows[i]).collect();

        Batch {
            columns: Arc::clone(&self.columns),
            data,
            rows,
        }
    }
}

/// Borrowed view of one record.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    batch: &'a Batch,
    index: usize,
}

impl<'a> RowView<'a> {
    /// Value of a field; `None` when the column does not exist.
    pub fn get(&self, name: &str) -> Option<&'a DataValue> {
        self.batch
            .columns
            .position(name)
            .map(|i| &self.batch.data[i][self.index])
    }

    /// Value of the field at a column position.
    pub fn get_at(&self, column: usize) -> &'a DataValue {
        &self.batch.data[column][self.index]
    }

    /// 1-based file row number.
    pub fn row_number(&self) -> u64 {
        self.batch.rows[self.index]
    }

    /// Copies this record into a one-row batch.
    pub fn to_batch(&self) -> Batch {
        Batch {
            columns: Arc::clone(&self.batch.columns),
            data: self
                .batch
                .data
                .iter()
                .map(|column| vec![column[self.index].clone()])
                .collect(),
            rows: vec![self.row_number()],
        }
    }

    /// Iterates over `(column, value)` pairs in column order.
    pub fn values(&self) -> impl Iterator<Item = (&'a str, &'a DataValue)> + 'a {
        let batch = self.batch;
        let index = self.index;
        batch
            .columns
            .names()
            .iter()
            .zip(batch.data.iter())
            .map(move |(name, column)| (name.as_str(), &column[index]))
    }
}

/// Accumulates row-major records into a column-major batch.
#[derive(Debug)]
pub struct BatchBuilder {
    columns: Arc<Columns>,
    data: Vec<Vec<DataValue>>,
    rows: Vec<u64>,
    next_row: u64,
}

impl BatchBuilder {
    /// Creates a builder whose first record is file row `first_row`.
    pub fn new(columns: Arc<Columns>, first_row: u64, capacity: usize) -> Self {
        let data = (0..columns.len())
            .map(|_| Vec::with_capacity(capacity))
            .collect();
        Self {
            columns,
            data,
            rows: Vec::with_capacity(capacity),
            next_row: first_row,
        }
    }

    /// Appends one record in column order.
    pub fn push_row<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = DataValue>,
    {
        let mut values = values.into_iter();
        for column in &mut self.data {
            column.push(values.next().unwrap_or(DataValue::Null));
        }
        self.rows.push(self.next_row);
        self.next_row += 1;
    }

    /// Records pushed so far.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether nothing was pushed.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row number the next pushed record will get.
    pub fn next_row(&self) -> u64 {
        self.next_row
    }

    /// Takes the accumulated batch and resets the builder for the next one.
    pub fn take(&mut self, capacity: usize) -> Batch {
        let data = std::mem::replace(
            &mut self.data,
            (0..self.columns.len())
                .map(|_| Vec::with_capacity(capacity))
                .collect(),
        );
        let rows = std::mem::replace(&mut self.rows, Vec::with_capacity(capacity));
        Batch {
            columns: Arc::clone(&self.columns),
            data,
            rows,
        }
    }

    /// Finishes the batch.
    pub fn finish(self) -> Batch {
        Batch {
            columns: self.columns,
            data: self.data,
            rows: self.rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Batch {
        let columns = Arc::new(Columns::new(["id", "name"]));
        Batch::from_rows(
            columns,
            vec![
                vec![DataValue::Int(1), "a".into()],
                vec![DataValue::Int(2)],
                vec![DataValue::Int(3), "c".into()],
            ],
            10,
        )
    }

    #[test]
    fn test_batch_layout() {
        let batch = sample();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.columns().names(), ["id", "name"]);
        assert_eq!(batch.column("name").unwrap()[1], DataValue::Null);
        assert_eq!(batch.row_number(0), 10);
        assert_eq!(batch.row(2).get("name"), Some(&DataValue::from("c")));
        assert_eq!(batch.row(2).get("missing"), None);
    }

    #[test]
    fn test_filter_keeps_row_numbers() {
        let batch = sample();
        let filtered = batch.filter(&[false, true, true]);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.row_number(0), 11);
        assert_eq!(filtered.row(1).get("id"), Some(&DataValue::Int(3)));
    }

    #[test]
    fn test_builder_take_resets() {
        let columns = Arc::new(Columns::new(["x"]));
        let mut builder = BatchBuilder::new(columns, 1, 2);
        builder.push_row([DataValue::Int(1)]);
        builder.push_row([DataValue::Int(2)]);
        let first = builder.take(2);
        builder.push_row([DataValue::Int(3)]);
        let second = builder.finish();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert_eq!(second.row_number(0), 3);
    }

    #[test]
    fn test_row_values_in_order() {
        let batch = sample();
        let pairs: Vec<(&str, String)> = batch
            .row(0)
            .values()
            .map(|(k, v)| (k, v.to_string()))
            .collect();
        assert_eq!(pairs, vec![("id", "1".to_string()), ("name", "a".to_string())]);
    }
}
