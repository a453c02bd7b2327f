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

//! Buffers row mutations and sends them in bulk.

use crate::Result;
use crate::error::Error;
use crate::mutation::DirectRow;
use crate::options::{BatchingOptions, MAX_MUTATIONS};
use crate::stub::Stub;
use crate::table::Table;
use gax::error::rpc::Status;

/// Sends rows to a table in batches.
///
/// Rows are buffered until the batch reaches the row count or byte size
/// thresholds in [BatchingOptions], and are then sent with
/// [Table::mutate_rows]. A batch never holds more than
/// [MAX_MUTATIONS] mutations. Call [flush][MutationsBatcher::flush]
/// to send any remaining rows.
///
/// Each method returns the statuses of the rows it sent, if any, in the
/// order the rows were added.
///
/// # Example
/// ```
/// # use google_cloud_bigtable::options::BatchingOptions;
/// # use google_cloud_bigtable::stub::Stub;
/// # use google_cloud_bigtable::table::Table;
/// # async fn sample<S: Stub>(table: Table<S>) -> google_cloud_bigtable::Result<()> {
/// let mut batcher = table.batcher(BatchingOptions::new().set_flush_count(10_usize));
/// for i in 0..100 {
///     let mut row = table.direct_row(format!("row#{i:03}"));
///     row.set_cell("cf", "q", "value", None);
///     batcher.mutate(row).await?;
/// }
/// batcher.flush().await?;
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct MutationsBatcher<S> {
    table: Table<S>,
    options: BatchingOptions,
    rows: Vec<DirectRow>,
    total_mutation_count: usize,
    total_size: usize,
}

impl<S> MutationsBatcher<S>
where
    S: Stub,
{
    pub(crate) fn new(table: Table<S>, options: BatchingOptions) -> Self {
        Self {
            table,
            options,
            rows: Vec::new(),
            total_mutation_count: 0,
            total_size: 0,
        }
    }

    /// The number of buffered rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Adds a row to the batch, sending the batch if it is full.
    ///
    /// Fails with [Error::RowTooLarge] if the row alone has more than
    /// [MAX_MUTATIONS] mutations. The row is not buffered in that case.
    pub async fn mutate(&mut self, row: DirectRow) -> Result<Vec<Option<Status>>> {
        let mutation_count = row.mutations_count();
        if mutation_count > MAX_MUTATIONS {
            return Err(Error::RowTooLarge {
                row_key: row.row_key().clone(),
                count: mutation_count,
                maximum: MAX_MUTATIONS,
            });
        }

        let mut statuses = Vec::new();
        if self.total_mutation_count + mutation_count >= MAX_MUTATIONS {
            statuses.extend(self.flush().await?);
        }

        self.total_mutation_count += mutation_count;
        self.total_size += row.mutations_size();
        self.rows.push(row);

        if self.total_size >= self.options.max_row_bytes
            || self.rows.len() >= self.options.flush_count
        {
            statuses.extend(self.flush().await?);
        }
        Ok(statuses)
    }

    /// Adds several rows to the batch, see [mutate][MutationsBatcher::mutate].
    pub async fn mutate_rows<I>(&mut self, rows: I) -> Result<Vec<Option<Status>>>
    where
        I: IntoIterator<Item = DirectRow>,
    {
        let mut statuses = Vec::new();
        for row in rows {
            statuses.extend(self.mutate(row).await?);
        }
        Ok(statuses)
    }

    /// Sends the buffered rows.
    ///
    /// Does nothing if no rows are buffered. The batch is empty after this
    /// call, even if the request fails.
    pub async fn flush(&mut self) -> Result<Vec<Option<Status>>> {
        if self.rows.is_empty() {
            return Ok(Vec::new());
        }
        let rows = std::mem::take(&mut self.rows);
        tracing::debug!(
            "flushing {} rows with {} mutations ({} bytes)",
            rows.len(),
            self.total_mutation_count,
            self.total_size
        );
        self.total_mutation_count = 0;
        self.total_size = 0;
        self.table.mutate_rows(rows).send().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MutateRowsRequest, MutateRowsResponse, mutate_rows_response};
    use crate::stub::tests::MockStub;
    use bytes::Bytes;
    use gax::error::rpc::Code;
    use pretty_assertions::assert_eq;

    type TestResult = anyhow::Result<()>;

    const TABLE: &str = "projects/p/instances/i/tables/t";

    // Reports success for every entry in the request.
    fn all_ok(request: MutateRowsRequest) -> Result<Vec<MutateRowsResponse>> {
        let entries = (0..request.entries.len()).map(|i| {
            mutate_rows_response::Entry::new()
                .set_index(i as i64)
                .set_status(ok())
        });
        Ok(vec![MutateRowsResponse::new().set_entries(entries)])
    }

    fn ok() -> Status {
        Status::default().set_code(Code::Ok)
    }

    fn batcher(stub: MockStub, options: BatchingOptions) -> MutationsBatcher<MockStub> {
        Table::builder(TABLE).build(stub).batcher(options)
    }

    fn row(key: &str, mutations: usize) -> DirectRow {
        let mut row = DirectRow::new(TABLE, key.to_string());
        for _ in 0..mutations {
            row.delete();
        }
        row
    }

    fn entry_counts(request: &MutateRowsRequest) -> Vec<usize> {
        request.entries.iter().map(|e| e.mutations.len()).collect()
    }

    #[tokio::test]
    async fn flush_count() -> TestResult {
        let mut stub = MockStub::new();
        stub.expect_mutate_rows()
            .withf(|r| r.entries.len() == 2)
            .times(2)
            .returning(all_ok);
        let mut batcher = batcher(stub, BatchingOptions::new().set_flush_count(2_usize));

        assert!(batcher.mutate(row("a", 1)).await?.is_empty());
        assert_eq!(batcher.len(), 1);
        let statuses = batcher.mutate(row("b", 1)).await?;
        assert_eq!(statuses, vec![Some(ok()), Some(ok())]);
        assert!(batcher.is_empty());

        let statuses = batcher
            .mutate_rows([row("c", 1), row("d", 1), row("e", 1)])
            .await?;
        assert_eq!(statuses.len(), 2);
        assert_eq!(batcher.len(), 1);
        Ok(())
    }

    // A row with a single cell of `len` value bytes.
    fn sized_row(key: &str, len: usize) -> DirectRow {
        let mut row = DirectRow::new(TABLE, key.to_string());
        row.set_cell("cf", "q", vec![b'x'; len], None);
        row
    }

    #[tokio::test]
    async fn max_row_bytes() -> TestResult {
        let mut stub = MockStub::new();
        stub.expect_mutate_rows()
            .withf(|r| r.entries.len() == 2)
            .times(1)
            .returning(all_ok);
        let mut batcher = batcher(stub, BatchingOptions::new().set_max_row_bytes(150_usize));
        let a = sized_row("a", 100);
        assert!(a.mutations_size() >= 100 && a.mutations_size() < 150);
        assert!(batcher.mutate(a).await?.is_empty());
        assert_eq!(batcher.len(), 1);
        let statuses = batcher.mutate(sized_row("b", 100)).await?;
        assert_eq!(statuses, vec![Some(ok()), Some(ok())]);
        assert!(batcher.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn row_deletes_count_towards_size() -> TestResult {
        let mut stub = MockStub::new();
        stub.expect_mutate_rows()
            .withf(|r| r.entries.len() == 3)
            .times(1)
            .returning(all_ok);
        let mut batcher = batcher(stub, BatchingOptions::new().set_max_row_bytes(6_usize));
        assert!(batcher.mutate(row("a", 1)).await?.is_empty());
        assert!(batcher.mutate(row("b", 1)).await?.is_empty());
        let statuses = batcher.mutate(row("c", 1)).await?;
        assert_eq!(statuses.len(), 3);
        assert!(batcher.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn flush_before_mutation_limit() -> TestResult {
        let mut seq = mockall::Sequence::new();
        let mut stub = MockStub::new();
        stub.expect_mutate_rows()
            .withf(|r| entry_counts(r) == [60_000])
            .times(1)
            .in_sequence(&mut seq)
            .returning(all_ok);
        stub.expect_mutate_rows()
            .withf(|r| entry_counts(r) == [40_000])
            .times(1)
            .in_sequence(&mut seq)
            .returning(all_ok);
        let mut batcher = batcher(stub, BatchingOptions::new());
        assert!(batcher.mutate(row("a", 60_000)).await?.is_empty());
        // 60_000 + 40_000 reaches the limit, the first row is sent alone.
        let statuses = batcher.mutate(row("b", 40_000)).await?;
        assert_eq!(statuses, vec![Some(ok())]);
        assert_eq!(batcher.len(), 1);
        let statuses = batcher.flush().await?;
        assert_eq!(statuses, vec![Some(ok())]);
        Ok(())
    }

    #[tokio::test]
    async fn row_too_large() -> TestResult {
        let mut stub = MockStub::new();
        stub.expect_mutate_rows().never();
        let mut batcher = batcher(stub, BatchingOptions::new());
        let err = batcher
            .mutate(row("big", MAX_MUTATIONS + 1))
            .await
            .unwrap_err();
        match err {
            Error::RowTooLarge {
                row_key,
                count,
                maximum,
            } => {
                assert_eq!(row_key, Bytes::from_static(b"big"));
                assert_eq!(count, MAX_MUTATIONS + 1);
                assert_eq!(maximum, MAX_MUTATIONS);
            }
            e => panic!("unexpected error {e:?}"),
        }
        assert!(batcher.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn flush_empty() -> TestResult {
        let mut stub = MockStub::new();
        stub.expect_mutate_rows().never();
        let mut batcher = batcher(stub, BatchingOptions::new());
        assert!(batcher.flush().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn flush_error_clears_batch() -> TestResult {
        let mut stub = MockStub::new();
        stub.expect_mutate_rows()
            .times(1)
            .returning(|_| Err(Error::service(Status::default().set_code(Code::PermissionDenied))));
        let mut batcher = batcher(stub, BatchingOptions::new());
        batcher.mutate(row("a", 1)).await?;
        let err = batcher.flush().await.unwrap_err();
        assert_eq!(err.status().map(|s| s.code), Some(Code::PermissionDenied));
        assert!(batcher.is_empty());
        assert!(batcher.flush().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn rows_from_other_table() -> TestResult {
        let mut stub = MockStub::new();
        stub.expect_mutate_rows().never();
        let mut batcher = batcher(stub, BatchingOptions::new());
        let mut other = DirectRow::new("projects/p/instances/i/tables/other", "a");
        other.delete();
        batcher.mutate(other).await?;
        let err = batcher.flush().await.unwrap_err();
        assert!(matches!(err, Error::TableMismatch { .. }), "{err:?}");
        Ok(())
    }
}
