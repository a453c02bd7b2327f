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

//! Reads and writes the rows of a single table.

use crate::Result;
use crate::batcher::MutationsBatcher;
use crate::error::Error;
use crate::model::{ReadRowsRequest, RowRange, RowSet};
use crate::mutate_rows::RetryableMutateRowsWorker;
use crate::mutation::DirectRow;
use crate::options::{BatchingOptions, RetryOptions};
use crate::read_rows::{ReadState, RowStream};
use crate::row_data::PartialRowData;
use crate::stub::Stub;
use bytes::Bytes;
use gax::backoff_policy::BackoffPolicyArg;
use gax::error::rpc::Status;
use gax::retry_policy::RetryPolicyArg;
use std::sync::Arc;

/// A client for one Bigtable table.
///
/// Cloning a table is cheap, the clones share the same stub.
///
/// # Example
/// ```
/// # use google_cloud_bigtable::table::Table;
/// # use google_cloud_bigtable::stub::Stub;
/// # async fn sample<S: Stub>(stub: S) -> google_cloud_bigtable::Result<()> {
/// let table = Table::builder("projects/my-project/instances/my-instance/tables/my-table")
///     .with_app_profile_id("my-profile")
///     .build(stub);
/// if let Some(row) = table.read_row("user#123").await? {
///     println!("name = {:?}", row.cell_value("profile", "name"));
/// }
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Table<S> {
    stub: Arc<S>,
    name: String,
    app_profile_id: String,
    retry: RetryOptions,
}

impl<S> Clone for Table<S> {
    fn clone(&self) -> Self {
        Self {
            stub: self.stub.clone(),
            name: self.name.clone(),
            app_profile_id: self.app_profile_id.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl Table<()> {
    /// Returns a builder for a table.
    ///
    /// `name` is the full table name, in the
    /// `projects/{project}/instances/{instance}/tables/{table}` format. The
    /// stub type is set by [TableBuilder::build].
    pub fn builder<T: Into<String>>(name: T) -> TableBuilder {
        TableBuilder::new(name.into())
    }
}

impl<S> Table<S>
where
    S: Stub,
{
    /// The full name of the table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The app profile used in requests, empty for the default profile.
    pub fn app_profile_id(&self) -> &str {
        &self.app_profile_id
    }

    /// Creates a row to mutate in this table.
    pub fn direct_row<K: Into<Bytes>>(&self, row_key: K) -> DirectRow {
        DirectRow::new(self.name.clone(), row_key)
    }

    /// Starts a request to read rows.
    ///
    /// Without a row key or a range the request reads the whole table.
    pub fn read_rows(&self) -> ReadRows<'_, S> {
        ReadRows::new(self)
    }

    /// Reads a single row.
    ///
    /// Returns `None` if the row does not exist. Fails with
    /// [Error::PartialRow] if the stream ends before the row is committed.
    pub async fn read_row<K: Into<Bytes>>(&self, row_key: K) -> Result<Option<PartialRowData>> {
        let row_key = row_key.into();
        let mut stream = self.read_rows().with_row_key(row_key.clone()).send().await?;
        let mut rows = stream.consume_all().await?;
        match stream.state() {
            ReadState::Start | ReadState::NewRow => Ok(rows.remove(&row_key)),
            state => Err(Error::PartialRow(state)),
        }
    }

    /// Starts a request to apply mutations to many rows.
    ///
    /// The rows must belong to this table.
    pub fn mutate_rows(&self, rows: Vec<DirectRow>) -> MutateRows<'_, S> {
        MutateRows::new(self, rows)
    }

    /// Creates a batcher that sends rows through this table.
    pub fn batcher(&self, options: BatchingOptions) -> MutationsBatcher<S> {
        MutationsBatcher::new(self.clone(), options)
    }
}

/// A builder for [Table].
#[derive(Clone, Debug)]
pub struct TableBuilder {
    name: String,
    app_profile_id: String,
    retry: RetryOptions,
}

impl TableBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            app_profile_id: String::new(),
            retry: RetryOptions::default(),
        }
    }

    /// Sets the app profile used in all requests.
    pub fn with_app_profile_id<V: Into<String>>(mut self, v: V) -> Self {
        self.app_profile_id = v.into();
        self
    }

    /// Configure the retry policy for `MutateRows` calls.
    ///
    /// The default policy retries transient errors for up to 120 seconds.
    ///
    /// ```
    /// # use google_cloud_bigtable::table::Table;
    /// # use google_cloud_bigtable::stub::Stub;
    /// # fn sample<S: Stub>(stub: S) {
    /// use gax::retry_policy::RetryPolicyExt;
    /// use google_cloud_bigtable::retry_policy::RetryableErrors;
    /// let table = Table::builder("projects/p/instances/i/tables/t")
    ///     .with_retry_policy(RetryableErrors.with_attempt_limit(3))
    ///     .build(stub);
    /// # }
    /// ```
    pub fn with_retry_policy<V: Into<RetryPolicyArg>>(mut self, v: V) -> Self {
        let policy: RetryPolicyArg = v.into();
        self.retry.retry_policy = Some(policy.into());
        self
    }

    /// Configure the backoff between `MutateRows` attempts.
    pub fn with_backoff_policy<V: Into<BackoffPolicyArg>>(mut self, v: V) -> Self {
        let policy: BackoffPolicyArg = v.into();
        self.retry.backoff_policy = policy.into();
        self
    }

    /// Creates the table client.
    pub fn build<S: Stub>(self, stub: S) -> Table<S> {
        Table {
            stub: Arc::new(stub),
            name: self.name,
            app_profile_id: self.app_profile_id,
            retry: self.retry,
        }
    }
}

/// A request builder for [Table::read_rows].
#[derive(Debug)]
pub struct ReadRows<'a, S> {
    table: &'a Table<S>,
    row_key: Option<Bytes>,
    start_key: Option<Bytes>,
    end_key: Option<Bytes>,
    end_inclusive: bool,
    limit: Option<i64>,
}

impl<'a, S> ReadRows<'a, S>
where
    S: Stub,
{
    fn new(table: &'a Table<S>) -> Self {
        Self {
            table,
            row_key: None,
            start_key: None,
            end_key: None,
            end_inclusive: false,
            limit: None,
        }
    }

    /// Reads a single row. Cannot be combined with a range.
    pub fn with_row_key<K: Into<Bytes>>(mut self, v: K) -> Self {
        self.row_key = Some(v.into());
        self
    }

    /// The first row key in the range, inclusive.
    pub fn with_start_key<K: Into<Bytes>>(mut self, v: K) -> Self {
        self.start_key = Some(v.into());
        self
    }

    /// The last row key in the range, exclusive unless
    /// [with_end_inclusive][ReadRows::with_end_inclusive] is set.
    pub fn with_end_key<K: Into<Bytes>>(mut self, v: K) -> Self {
        self.end_key = Some(v.into());
        self
    }

    pub fn with_end_inclusive(mut self, v: bool) -> Self {
        self.end_inclusive = v;
        self
    }

    /// Stops the read after this many rows.
    pub fn with_limit<V: Into<i64>>(mut self, v: V) -> Self {
        self.limit = Some(v.into());
        self
    }

    fn build_request(&self) -> Result<ReadRowsRequest> {
        let has_range = self.start_key.is_some() || self.end_key.is_some();
        if self.row_key.is_some() && has_range {
            return Err(Error::InvalidRequest(
                "a row key and a row range cannot be set at the same time".to_string(),
            ));
        }
        let mut rows = RowSet::new();
        if let Some(key) = &self.row_key {
            rows = rows.add_row_key(key.clone());
        }
        if has_range {
            let mut range = RowRange::new();
            if let Some(start) = &self.start_key {
                range = range.set_start_key_closed(start.clone());
            }
            range = match (&self.end_key, self.end_inclusive) {
                (Some(end), true) => range.set_end_key_closed(end.clone()),
                (Some(end), false) => range.set_end_key_open(end.clone()),
                (None, _) => range,
            };
            rows = rows.add_row_range(range);
        }
        let mut request = ReadRowsRequest::new()
            .set_table_name(self.table.name.clone())
            .set_app_profile_id(self.table.app_profile_id.clone())
            .set_rows(rows);
        if let Some(limit) = self.limit {
            request = request.set_rows_limit(limit);
        }
        Ok(request)
    }

    /// Sends the request and returns the stream of rows.
    pub async fn send(self) -> Result<RowStream<S::Stream>> {
        let request = self.build_request()?;
        let stream = self.table.stub.read_rows(request).await?;
        Ok(RowStream::new(stream))
    }
}

/// A request builder for [Table::mutate_rows].
#[derive(Debug)]
pub struct MutateRows<'a, S> {
    table: &'a Table<S>,
    rows: Vec<DirectRow>,
    retry: RetryOptions,
}

impl<'a, S> MutateRows<'a, S>
where
    S: Stub,
{
    fn new(table: &'a Table<S>, rows: Vec<DirectRow>) -> Self {
        Self {
            table,
            rows,
            retry: table.retry.clone(),
        }
    }

    /// Overrides the table's retry policy for this call.
    pub fn with_retry_policy<V: Into<RetryPolicyArg>>(mut self, v: V) -> Self {
        let policy: RetryPolicyArg = v.into();
        self.retry.retry_policy = Some(policy.into());
        self
    }

    /// Overrides the table's backoff policy for this call.
    pub fn with_backoff_policy<V: Into<BackoffPolicyArg>>(mut self, v: V) -> Self {
        let policy: BackoffPolicyArg = v.into();
        self.retry.backoff_policy = policy.into();
        self
    }

    /// Makes a single attempt.
    pub fn without_retry(mut self) -> Self {
        self.retry.retry_policy = None;
        self
    }

    /// Applies the mutations.
    ///
    /// Returns one status per row, in the order the rows were given. Rows
    /// that were never attempted have no status.
    pub async fn send(self) -> Result<Vec<Option<Status>>> {
        if let Some(row) = self.rows.iter().find(|r| r.table_name() != self.table.name) {
            return Err(Error::TableMismatch {
                row_key: row.row_key().clone(),
                row_table: row.table_name().to_string(),
                table: self.table.name.clone(),
            });
        }
        let mut worker = RetryableMutateRowsWorker::new(
            self.table.stub.clone(),
            self.table.name.clone(),
            self.table.app_profile_id.clone(),
            self.rows,
        );
        worker
            .run(self.retry.retry_policy, self.retry.backoff_policy)
            .await
    }
}
