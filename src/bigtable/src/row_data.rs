// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cells and rows assembled from a `ReadRows` stream.

use bytes::{Bytes, BytesMut};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

/// A single cell in a Bigtable row.
///
/// # Example
/// ```
/// # use google_cloud_bigtable::row_data::Cell;
/// let cell = Cell::new("value", 1_000).with_labels(["label"]);
/// assert_eq!(cell.value().as_ref(), b"value");
/// assert_eq!(cell.timestamp_micros(), 1_000);
/// assert_eq!(cell.labels(), ["label"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    value: Bytes,
    timestamp_micros: i64,
    labels: Vec<String>,
}

impl Cell {
    /// Creates a cell without labels.
    pub fn new<V: Into<Bytes>>(value: V, timestamp_micros: i64) -> Self {
        Self {
            value: value.into(),
            timestamp_micros,
            labels: Vec::new(),
        }
    }

    /// Returns a copy of this cell with the given labels.
    pub fn with_labels<T, V>(mut self, labels: T) -> Self
    where
        T: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.labels = labels.into_iter().map(|v| v.into()).collect();
        self
    }

    /// The value stored in the cell.
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// The cell timestamp, in microseconds since the Unix epoch.
    pub fn timestamp_micros(&self) -> i64 {
        self.timestamp_micros
    }

    /// The cell timestamp, `None` if it cannot be represented.
    pub fn timestamp(&self) -> Option<SystemTime> {
        let offset = Duration::from_micros(self.timestamp_micros.unsigned_abs());
        if self.timestamp_micros >= 0 {
            SystemTime::UNIX_EPOCH.checked_add(offset)
        } else {
            SystemTime::UNIX_EPOCH.checked_sub(offset)
        }
    }

    /// The labels applied to the cell by the read filter.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

/// A cell whose value may still be arriving.
///
/// The row key, family and qualifier are resolved when the cell is opened,
/// either from the chunk or from the previous cell. An empty qualifier is
/// valid.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct PartialCellData {
    pub row_key: Bytes,
    pub family_name: String,
    pub qualifier: Bytes,
    pub timestamp_micros: i64,
    pub labels: Vec<String>,
    pub value: BytesMut,
}

impl PartialCellData {
    pub fn append_value(&mut self, fragment: &[u8]) {
        self.value.extend_from_slice(fragment);
    }

    /// Moves the accumulated value and labels into a new [Cell].
    ///
    /// The row key, family and qualifier remain, so this partial cell can
    /// supply omitted fields to the next cell in the row.
    pub fn take_cell(&mut self) -> Cell {
        Cell {
            value: std::mem::take(&mut self.value).freeze(),
            timestamp_micros: self.timestamp_micros,
            labels: std::mem::take(&mut self.labels),
        }
    }
}

/// The cells in a row, keyed by family name and then by column qualifier.
pub type RowCells = BTreeMap<String, BTreeMap<Bytes, Vec<Cell>>>;

/// A row read from Bigtable.
///
/// Within a column the cells appear in the order the service returned them.
///
/// # Example
/// ```
/// # use google_cloud_bigtable::row_data::PartialRowData;
/// # fn sample(row: PartialRowData) {
/// if let Some(value) = row.cell_value("cf", "greeting") {
///     println!("{:?} has greeting={value:?}", row.row_key());
/// }
/// # }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartialRowData {
    row_key: Bytes,
    cells: RowCells,
}

impl PartialRowData {
    /// Creates an empty row.
    pub fn new<K: Into<Bytes>>(row_key: K) -> Self {
        Self {
            row_key: row_key.into(),
            cells: BTreeMap::new(),
        }
    }

    /// The row key.
    pub fn row_key(&self) -> &Bytes {
        &self.row_key
    }

    /// All the cells in the row.
    pub fn cells(&self) -> &RowCells {
        &self.cells
    }

    /// Consumes the row and returns its cells.
    pub fn into_cells(self) -> RowCells {
        self.cells
    }

    /// The cells in a single column, `None` if the column is not present.
    pub fn find_cells<Q: AsRef<[u8]>>(&self, family: &str, qualifier: Q) -> Option<&[Cell]> {
        self.cells
            .get(family)
            .and_then(|columns| columns.get(qualifier.as_ref()))
            .map(Vec::as_slice)
    }

    /// The value of the first cell in a column.
    pub fn cell_value<Q: AsRef<[u8]>>(&self, family: &str, qualifier: Q) -> Option<&Bytes> {
        self.find_cells(family, qualifier)
            .and_then(|cells| cells.first())
            .map(Cell::value)
    }

    /// Flattens the cells, keyed by `family:qualifier`.
    pub fn to_map(&self) -> BTreeMap<Bytes, Vec<Cell>> {
        let mut result = BTreeMap::new();
        for (family, columns) in &self.cells {
            for (qualifier, cells) in columns {
                let mut key = BytesMut::with_capacity(family.len() + 1 + qualifier.len());
                key.extend_from_slice(family.as_bytes());
                key.extend_from_slice(b":");
                key.extend_from_slice(qualifier);
                result.insert(key.freeze(), cells.clone());
            }
        }
        result
    }

    pub(crate) fn push_cell(&mut self, family: String, qualifier: Bytes, cell: Cell) {
        self.cells
            .entry(family)
            .or_default()
            .entry(qualifier)
            .or_default()
            .push(cell);
    }
}
