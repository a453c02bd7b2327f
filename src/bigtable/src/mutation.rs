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

//! Mutations for a single row.

use crate::model::{Mutation, TimestampRange, mutate_rows_request::Entry};
use bytes::Bytes;
use std::time::SystemTime;

/// The timestamp meaning "use the server time".
pub const SERVER_TIMESTAMP: i64 = -1;

/// A row with mutations that are applied unconditionally.
///
/// Create instances using [Table::direct_row][crate::table::Table::direct_row],
/// the row remembers the table it belongs to.
///
/// # Example
/// ```
/// # use google_cloud_bigtable::mutation::DirectRow;
/// let mut row = DirectRow::new("projects/p/instances/i/tables/t", "user#123");
/// row.set_cell("profile", "name", "Alice", None)
///     .delete_cell("profile", "nickname", None);
/// assert_eq!(row.mutations_count(), 2);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DirectRow {
    table_name: String,
    row_key: Bytes,
    mutations: Vec<Mutation>,
}

impl DirectRow {
    /// Creates a row without mutations.
    pub fn new<T: Into<String>, K: Into<Bytes>>(table_name: T, row_key: K) -> Self {
        Self {
            table_name: table_name.into(),
            row_key: row_key.into(),
            mutations: Vec::new(),
        }
    }

    pub fn row_key(&self) -> &Bytes {
        &self.row_key
    }

    /// The full name of the table this row belongs to.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Sets the value of a cell.
    ///
    /// Without a timestamp the service assigns its current time. Explicit
    /// timestamps are truncated to millisecond granularity.
    pub fn set_cell<F, Q, V>(
        &mut self,
        family: F,
        qualifier: Q,
        value: V,
        timestamp: Option<SystemTime>,
    ) -> &mut Self
    where
        F: Into<String>,
        Q: Into<Bytes>,
        V: Into<Bytes>,
    {
        let timestamp_micros = timestamp
            .map(|t| truncate_to_millis(to_micros(t)))
            .unwrap_or(SERVER_TIMESTAMP);
        self.mutations.push(Mutation::SetCell {
            family_name: family.into(),
            column_qualifier: qualifier.into(),
            timestamp_micros,
            value: value.into(),
        });
        self
    }

    /// Deletes the cells in a column, optionally only those in `time_range`.
    pub fn delete_cell<F, Q>(
        &mut self,
        family: F,
        qualifier: Q,
        time_range: Option<TimestampRange>,
    ) -> &mut Self
    where
        F: Into<String>,
        Q: Into<Bytes>,
    {
        self.mutations.push(Mutation::DeleteFromColumn {
            family_name: family.into(),
            column_qualifier: qualifier.into(),
            time_range,
        });
        self
    }

    /// Deletes the cells in several columns of the same family.
    pub fn delete_cells<F, I, Q>(
        &mut self,
        family: F,
        qualifiers: I,
        time_range: Option<TimestampRange>,
    ) -> &mut Self
    where
        F: Into<String>,
        I: IntoIterator<Item = Q>,
        Q: Into<Bytes>,
    {
        let family = family.into();
        for qualifier in qualifiers {
            self.delete_cell(family.clone(), qualifier, time_range.clone());
        }
        self
    }

    /// Deletes all the cells in a column family.
    pub fn delete_cells_in_family<F: Into<String>>(&mut self, family: F) -> &mut Self {
        self.mutations.push(Mutation::DeleteFromFamily {
            family_name: family.into(),
        });
        self
    }

    /// Deletes the whole row.
    pub fn delete(&mut self) -> &mut Self {
        self.mutations.push(Mutation::DeleteFromRow);
        self
    }

    pub fn mutations_count(&self) -> usize {
        self.mutations.len()
    }

    /// The approximate size of the mutations, in bytes.
    pub fn mutations_size(&self) -> usize {
        self.mutations.iter().map(Mutation::approximate_size).sum()
    }

    /// Removes all the mutations.
    pub fn clear(&mut self) {
        self.mutations.clear();
    }

    /// The entry for this row in a `MutateRows` request.
    pub fn to_entry(&self) -> Entry {
        Entry::new()
            .set_row_key(self.row_key.clone())
            .set_mutations(self.mutations.iter().cloned())
    }
}

// Rounds toward negative infinity, saturating at the i64 bounds.
fn truncate_to_millis(micros: i64) -> i64 {
    micros.div_euclid(1000).saturating_mul(1000)
}

fn to_micros(t: SystemTime) -> i64 {
    match t.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_micros()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_micros())
            .map(|m| -m)
            .unwrap_or(i64::MIN),
    }
}
