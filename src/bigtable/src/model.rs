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

//! Messages exchanged with the Bigtable data API.
//!
//! These types mirror the `google.bigtable.v2` messages used by the
//! `ReadRows` and `MutateRows` RPCs. The transport (see [Stub][crate::stub::Stub])
//! converts them to and from their wire representation.

use gax::error::rpc::Status;
use bytes::Bytes;
use std::ops::Bound;

/// Request message for `ReadRows`.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct ReadRowsRequest {
    /// The unique name of the table from which to read.
    pub table_name: String,

    /// The app profile used to route the request, empty for the default.
    pub app_profile_id: String,

    /// The row keys and/or ranges to read. If empty, reads the whole table.
    pub rows: RowSet,

    /// The read will stop after committing this many rows. Zero means no
    /// limit.
    pub rows_limit: i64,
}

impl ReadRowsRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [table_name][ReadRowsRequest::table_name].
    pub fn set_table_name<T: Into<String>>(mut self, v: T) -> Self {
        self.table_name = v.into();
        self
    }

    /// Sets the value of [app_profile_id][ReadRowsRequest::app_profile_id].
    pub fn set_app_profile_id<T: Into<String>>(mut self, v: T) -> Self {
        self.app_profile_id = v.into();
        self
    }

    /// Sets the value of [rows][ReadRowsRequest::rows].
    pub fn set_rows<T: Into<RowSet>>(mut self, v: T) -> Self {
        self.rows = v.into();
        self
    }

    /// Sets the value of [rows_limit][ReadRowsRequest::rows_limit].
    pub fn set_rows_limit<T: Into<i64>>(mut self, v: T) -> Self {
        self.rows_limit = v.into();
        self
    }
}

/// A set of row keys and row ranges.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct RowSet {
    /// Single rows included in the set.
    pub row_keys: Vec<Bytes>,

    /// Contiguous row ranges included in the set.
    pub row_ranges: Vec<RowRange>,
}

impl RowSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single row key to the set.
    pub fn add_row_key<T: Into<Bytes>>(mut self, v: T) -> Self {
        self.row_keys.push(v.into());
        self
    }

    /// Adds a row range to the set.
    pub fn add_row_range(mut self, v: RowRange) -> Self {
        self.row_ranges.push(v);
        self
    }

    /// Returns true if the set selects the whole table.
    pub fn is_empty(&self) -> bool {
        self.row_keys.is_empty() && self.row_ranges.is_empty()
    }
}

/// A contiguous range of rows.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct RowRange {
    pub start_key: Bound<Bytes>,
    pub end_key: Bound<Bytes>,
}

impl RowRange {
    /// A range covering every row.
    pub fn new() -> Self {
        Self {
            start_key: Bound::Unbounded,
            end_key: Bound::Unbounded,
        }
    }

    /// Start the range at `key`, inclusive.
    pub fn set_start_key_closed<T: Into<Bytes>>(mut self, key: T) -> Self {
        self.start_key = Bound::Included(key.into());
        self
    }

    /// Start the range after `key`.
    pub fn set_start_key_open<T: Into<Bytes>>(mut self, key: T) -> Self {
        self.start_key = Bound::Excluded(key.into());
        self
    }

    /// End the range at `key`, inclusive.
    pub fn set_end_key_closed<T: Into<Bytes>>(mut self, key: T) -> Self {
        self.end_key = Bound::Included(key.into());
        self
    }

    /// End the range before `key`.
    pub fn set_end_key_open<T: Into<Bytes>>(mut self, key: T) -> Self {
        self.end_key = Bound::Excluded(key.into());
        self
    }
}

impl Default for RowRange {
    fn default() -> Self {
        Self::new()
    }
}

/// Response message for `ReadRows`.
///
/// Each response carries zero or more chunks. A chunk may start a cell,
/// continue the value of a cell split across chunks, commit a row, or
/// reset all the data received for the current row.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct ReadRowsResponse {
    pub chunks: Vec<CellChunk>,

    /// The service may report progress past rows that did not match the
    /// filter. The client may use this key when resuming a read.
    pub last_scanned_row_key: Bytes,
}

impl ReadRowsResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [chunks][ReadRowsResponse::chunks].
    pub fn set_chunks<T, I>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = I>,
        I: Into<CellChunk>,
    {
        self.chunks = v.into_iter().map(|i| i.into()).collect();
        self
    }

    /// Sets the value of [last_scanned_row_key][ReadRowsResponse::last_scanned_row_key].
    pub fn set_last_scanned_row_key<T: Into<Bytes>>(mut self, v: T) -> Self {
        self.last_scanned_row_key = v.into();
        self
    }
}

/// A fragment of a cell in a `ReadRows` response.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct CellChunk {
    /// The row key, empty if this chunk continues the current row.
    pub row_key: Bytes,

    /// The column family. `None` and `Some("")` both mean "same as the
    /// previous cell".
    pub family_name: Option<String>,

    /// The column qualifier. `None` means "same as the previous cell", an
    /// empty qualifier is a valid qualifier.
    pub qualifier: Option<Bytes>,

    pub timestamp_micros: i64,

    pub labels: Vec<String>,

    /// A fragment of the cell value.
    pub value: Bytes,

    /// If nonzero, the cell value continues in the following chunks, and
    /// this is the total size of the value.
    pub value_size: i32,

    /// Discard all the data received for the current row.
    pub reset_row: bool,

    /// The current row is complete.
    pub commit_row: bool,
}

impl CellChunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [row_key][CellChunk::row_key].
    pub fn set_row_key<T: Into<Bytes>>(mut self, v: T) -> Self {
        self.row_key = v.into();
        self
    }

    /// Sets the value of [family_name][CellChunk::family_name].
    pub fn set_family_name<T: Into<String>>(mut self, v: T) -> Self {
        self.family_name = Some(v.into());
        self
    }

    /// Sets the value of [qualifier][CellChunk::qualifier].
    pub fn set_qualifier<T: Into<Bytes>>(mut self, v: T) -> Self {
        self.qualifier = Some(v.into());
        self
    }

    /// Sets the value of [timestamp_micros][CellChunk::timestamp_micros].
    pub fn set_timestamp_micros<T: Into<i64>>(mut self, v: T) -> Self {
        self.timestamp_micros = v.into();
        self
    }

    /// Sets the value of [labels][CellChunk::labels].
    pub fn set_labels<T, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.labels = v.into_iter().map(|v| v.into()).collect();
        self
    }

    /// Sets the value of [value][CellChunk::value].
    pub fn set_value<T: Into<Bytes>>(mut self, v: T) -> Self {
        self.value = v.into();
        self
    }

    /// Sets the value of [value_size][CellChunk::value_size].
    pub fn set_value_size<T: Into<i32>>(mut self, v: T) -> Self {
        self.value_size = v.into();
        self
    }

    /// Sets the value of [reset_row][CellChunk::reset_row].
    pub fn set_reset_row(mut self, v: bool) -> Self {
        self.reset_row = v;
        self
    }

    /// Sets the value of [commit_row][CellChunk::commit_row].
    pub fn set_commit_row(mut self, v: bool) -> Self {
        self.commit_row = v;
        self
    }
}

/// Request message for `MutateRows`.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct MutateRowsRequest {
    pub table_name: String,
    pub app_profile_id: String,

    /// The row keys and mutations to apply. Each entry is applied
    /// atomically, but entries may be applied in any order.
    pub entries: Vec<mutate_rows_request::Entry>,
}

impl MutateRowsRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [table_name][MutateRowsRequest::table_name].
    pub fn set_table_name<T: Into<String>>(mut self, v: T) -> Self {
        self.table_name = v.into();
        self
    }

    /// Sets the value of [app_profile_id][MutateRowsRequest::app_profile_id].
    pub fn set_app_profile_id<T: Into<String>>(mut self, v: T) -> Self {
        self.app_profile_id = v.into();
        self
    }

    /// Sets the value of [entries][MutateRowsRequest::entries].
    pub fn set_entries<T>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = mutate_rows_request::Entry>,
    {
        self.entries = v.into_iter().collect();
        self
    }
}

pub mod mutate_rows_request {
    use super::Mutation;
    use bytes::Bytes;

    /// The mutations for a single row.
    #[derive(Clone, Debug, Default, PartialEq)]
    #[non_exhaustive]
    pub struct Entry {
        pub row_key: Bytes,
        pub mutations: Vec<Mutation>,
    }

    impl Entry {
        pub fn new() -> Self {
            Self::default()
        }

        /// Sets the value of [row_key][Entry::row_key].
        pub fn set_row_key<T: Into<Bytes>>(mut self, v: T) -> Self {
            self.row_key = v.into();
            self
        }

        /// Sets the value of [mutations][Entry::mutations].
        pub fn set_mutations<T>(mut self, v: T) -> Self
        where
            T: IntoIterator<Item = Mutation>,
        {
            self.mutations = v.into_iter().collect();
            self
        }
    }
}

/// A change to a single row.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Mutation {
    /// Sets the value of a cell.
    SetCell {
        family_name: String,
        column_qualifier: Bytes,
        /// Use `-1` for the current server time.
        timestamp_micros: i64,
        value: Bytes,
    },
    /// Deletes the cells of a column, optionally restricted to a time range.
    DeleteFromColumn {
        family_name: String,
        column_qualifier: Bytes,
        time_range: Option<TimestampRange>,
    },
    /// Deletes all the cells in a column family.
    DeleteFromFamily { family_name: String },
    /// Deletes all the cells in the row.
    DeleteFromRow,
}

// The field tag and length prefix of each mutation.
const MUTATION_ENVELOPE: usize = 2;

impl Mutation {
    /// The approximate size of the mutation on the wire.
    ///
    /// Every mutation has a non-zero size, even a whole row delete.
    pub(crate) fn approximate_size(&self) -> usize {
        MUTATION_ENVELOPE + self.payload_size()
    }

    fn payload_size(&self) -> usize {
        match self {
            Self::SetCell {
                family_name,
                column_qualifier,
                value,
                ..
            } => family_name.len() + column_qualifier.len() + value.len() + 8,
            Self::DeleteFromColumn {
                family_name,
                column_qualifier,
                time_range,
            } => {
                family_name.len() + column_qualifier.len() + time_range.as_ref().map_or(0, |_| 16)
            }
            Self::DeleteFromFamily { family_name } => family_name.len(),
            Self::DeleteFromRow => 0,
        }
    }
}

/// A range of timestamps, in microseconds.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct TimestampRange {
    /// Inclusive lower bound, zero means no lower bound.
    pub start_timestamp_micros: i64,
    /// Exclusive upper bound, zero means no upper bound.
    pub end_timestamp_micros: i64,
}

impl TimestampRange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [start_timestamp_micros][TimestampRange::start_timestamp_micros].
    pub fn set_start_timestamp_micros<T: Into<i64>>(mut self, v: T) -> Self {
        self.start_timestamp_micros = v.into();
        self
    }

    /// Sets the value of [end_timestamp_micros][TimestampRange::end_timestamp_micros].
    pub fn set_end_timestamp_micros<T: Into<i64>>(mut self, v: T) -> Self {
        self.end_timestamp_micros = v.into();
        self
    }
}

/// Response message for `MutateRows`.
///
/// The service streams these messages, each one carries the results for
/// some of the entries in the request.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct MutateRowsResponse {
    pub entries: Vec<mutate_rows_response::Entry>,
}

impl MutateRowsResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [entries][MutateRowsResponse::entries].
    pub fn set_entries<T>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = mutate_rows_response::Entry>,
    {
        self.entries = v.into_iter().collect();
        self
    }
}

pub mod mutate_rows_response {
    use gax::error::rpc::Status;

    /// The result of applying one entry of the request.
    #[derive(Clone, Debug, Default, PartialEq)]
    #[non_exhaustive]
    pub struct Entry {
        /// The index of the entry in the request.
        pub index: i64,
        pub status: Option<Status>,
    }

    impl Entry {
        pub fn new() -> Self {
            Self::default()
        }

        /// Sets the value of [index][Entry::index].
        pub fn set_index<T: Into<i64>>(mut self, v: T) -> Self {
            self.index = v.into();
            self
        }

        /// Sets the value of [status][Entry::status].
        pub fn set_status<T: Into<Status>>(mut self, v: T) -> Self {
            self.status = Some(v.into());
            self
        }
    }
}

// A missing status in a response entry is reported as `UNKNOWN`.
pub(crate) fn entry_status(entry: mutate_rows_response::Entry) -> Status {
    entry.status.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gax::error::rpc::Code;

    #[test]
    fn chunk_builders() {
        let chunk = CellChunk::new()
            .set_row_key("r1")
            .set_family_name("f")
            .set_qualifier("")
            .set_timestamp_micros(100)
            .set_labels(["a", "b"])
            .set_value("v")
            .set_commit_row(true);
        assert_eq!(chunk.row_key, Bytes::from_static(b"r1"));
        assert_eq!(chunk.family_name.as_deref(), Some("f"));
        assert_eq!(chunk.qualifier, Some(Bytes::new()));
        assert_eq!(chunk.timestamp_micros, 100);
        assert_eq!(chunk.labels, vec!["a", "b"]);
        assert!(chunk.commit_row);
        assert!(!chunk.reset_row);

        let chunk = CellChunk::new();
        assert_eq!(chunk.qualifier, None);
        assert_eq!(chunk.family_name, None);
    }

    #[test]
    fn row_range() {
        let range = RowRange::new()
            .set_start_key_closed("a")
            .set_end_key_open("z");
        assert_eq!(range.start_key, Bound::Included(Bytes::from_static(b"a")));
        assert_eq!(range.end_key, Bound::Excluded(Bytes::from_static(b"z")));
        let range = RowRange::default()
            .set_start_key_open("a")
            .set_end_key_closed("z");
        assert_eq!(range.start_key, Bound::Excluded(Bytes::from_static(b"a")));
        assert_eq!(range.end_key, Bound::Included(Bytes::from_static(b"z")));

        let set = RowSet::new();
        assert!(set.is_empty());
        let set = set.add_row_range(RowRange::new());
        assert!(!set.is_empty());
    }

    #[test]
    fn mutation_size() {
        let m = Mutation::SetCell {
            family_name: "cf".to_string(),
            column_qualifier: Bytes::from_static(b"col"),
            timestamp_micros: -1,
            value: Bytes::from_static(b"value"),
        };
        assert_eq!(m.approximate_size(), MUTATION_ENVELOPE + 2 + 3 + 5 + 8);
        assert_eq!(Mutation::DeleteFromRow.approximate_size(), MUTATION_ENVELOPE);
        let m = Mutation::DeleteFromFamily {
            family_name: "cf".to_string(),
        };
        assert_eq!(m.approximate_size(), MUTATION_ENVELOPE + 2);
    }

    #[test]
    fn missing_entry_status() {
        let entry = mutate_rows_response::Entry::new().set_index(3);
        assert_eq!(entry_status(entry).code, Code::Unknown);
        let entry = mutate_rows_response::Entry::new()
            .set_status(Status::default().set_code(Code::Ok));
        assert_eq!(entry_status(entry).code, Code::Ok);
    }
}
