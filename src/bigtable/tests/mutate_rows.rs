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

use bytes::Bytes;
use gax::error::rpc::{Code, Status};
use gax::exponential_backoff::ExponentialBackoffBuilder;
use gax::retry_policy::RetryPolicyExt;
use google_cloud_bigtable::model::*;
use google_cloud_bigtable::options::BatchingOptions;
use google_cloud_bigtable::retry_policy::RetryableErrors;
use google_cloud_bigtable::stub::{ReadRowsStream, Stub};
use google_cloud_bigtable::table::Table;
use google_cloud_bigtable::{Error, Result};
use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TABLE: &str = "projects/test-project/instances/test-instance/tables/test-table";

#[derive(Debug)]
struct NoRows;

impl ReadRowsStream for NoRows {
    async fn next_message(&mut self) -> Result<Option<ReadRowsResponse>> {
        Ok(None)
    }
}

// Returns scripted `MutateRows` results and records the requests.
#[derive(Debug, Default)]
struct FakeStub {
    results: Mutex<VecDeque<Result<Vec<MutateRowsResponse>>>>,
    requests: Arc<Mutex<Vec<MutateRowsRequest>>>,
}

impl FakeStub {
    fn new<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<Vec<MutateRowsResponse>>>,
    {
        Self {
            results: Mutex::new(results.into_iter().collect()),
            requests: Arc::default(),
        }
    }
}

#[async_trait::async_trait]
impl Stub for FakeStub {
    type Stream = NoRows;

    async fn read_rows(&self, _request: ReadRowsRequest) -> Result<NoRows> {
        Ok(NoRows)
    }

    async fn mutate_rows(&self, request: MutateRowsRequest) -> Result<Vec<MutateRowsResponse>> {
        self.requests
            .lock()
            .expect("requests mutex is not poisoned")
            .push(request);
        self.results
            .lock()
            .expect("results mutex is not poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(Error::io("no more scripted results")))
    }
}

fn response(codes: &[Code]) -> Result<Vec<MutateRowsResponse>> {
    let entries = codes.iter().enumerate().map(|(i, c)| {
        mutate_rows_response::Entry::new()
            .set_index(i as i64)
            .set_status(Status::default().set_code(*c))
    });
    Ok(vec![MutateRowsResponse::new().set_entries(entries)])
}

fn keys(request: &MutateRowsRequest) -> Vec<Bytes> {
    request.entries.iter().map(|e| e.row_key.clone()).collect()
}

fn codes(statuses: &[Option<Status>]) -> Vec<Option<Code>> {
    statuses.iter().map(|s| s.as_ref().map(|s| s.code)).collect()
}

#[tokio::test(start_paused = true)]
async fn retries_only_failed_rows() -> anyhow::Result<()> {
    let stub = FakeStub::new([
        response(&[Code::Ok, Code::Unavailable, Code::InvalidArgument, Code::Aborted]),
        Err(Error::service(Status::default().set_code(Code::Unavailable))),
        response(&[Code::DeadlineExceeded, Code::Ok]),
        response(&[Code::Ok]),
    ]);
    let requests = stub.requests.clone();
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_delay(Duration::from_millis(10))
        .with_maximum_delay(Duration::from_millis(100))
        .build()?;
    let table = Table::builder(TABLE)
        .with_retry_policy(RetryableErrors.with_attempt_limit(10))
        .with_backoff_policy(backoff)
        .build(stub);

    let rows = ["r0", "r1", "r2", "r3"]
        .into_iter()
        .map(|k| {
            let mut row = table.direct_row(k);
            row.set_cell("cf", "q", format!("value-{k}"), None);
            row
        })
        .collect::<Vec<_>>();
    let statuses = table.mutate_rows(rows).send().await?;
    assert_eq!(
        codes(&statuses),
        vec![
            Some(Code::Ok),
            Some(Code::Ok),
            Some(Code::InvalidArgument),
            Some(Code::Ok)
        ]
    );

    let requests = requests.lock().expect("requests mutex is not poisoned");
    let sent = requests.iter().map(keys).collect::<Vec<_>>();
    let want = [
        vec!["r0", "r1", "r2", "r3"],
        vec!["r1", "r3"],
        vec!["r1", "r3"],
        vec!["r1"],
    ]
    .map(|k| k.into_iter().map(|k| Bytes::from_static(k.as_bytes())).collect::<Vec<_>>());
    assert_eq!(sent, want);
    assert!(requests.iter().all(|r| r.table_name == TABLE));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn exhausted_attempts_keep_last_status() -> anyhow::Result<()> {
    let stub = FakeStub::new([
        response(&[Code::Unavailable, Code::Ok]),
        response(&[Code::Unavailable]),
    ]);
    let table = Table::builder(TABLE)
        .with_retry_policy(RetryableErrors.with_attempt_limit(2))
        .build(stub);
    let mut a = table.direct_row("a");
    a.delete();
    let mut b = table.direct_row("b");
    b.delete_cells_in_family("cf");
    let statuses = table.mutate_rows(vec![a, b]).send().await?;
    assert_eq!(
        codes(&statuses),
        vec![Some(Code::Unavailable), Some(Code::Ok)]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn batcher_sends_all_rows() -> anyhow::Result<()> {
    let stub = FakeStub::new([
        response(&[Code::Ok, Code::Ok, Code::Ok]),
        response(&[Code::Ok, Code::Ok, Code::Ok]),
        response(&[Code::Ok]),
    ]);
    let requests = stub.requests.clone();
    let table = Table::builder(TABLE).build(stub);
    let mut batcher = table.batcher(BatchingOptions::new().set_flush_count(3_usize));

    let mut statuses = Vec::new();
    for i in 0..7 {
        let mut row = table.direct_row(format!("row-{i}"));
        row.set_cell("cf", "q", "v", None);
        statuses.extend(batcher.mutate(row).await?);
    }
    statuses.extend(batcher.flush().await?);
    assert_eq!(statuses.len(), 7);
    assert!(statuses.iter().all(|s| s.as_ref().is_some_and(|s| s.code == Code::Ok)));

    let requests = requests.lock().expect("requests mutex is not poisoned");
    let sizes = requests.iter().map(|r| r.entries.len()).collect::<Vec<_>>();
    assert_eq!(sizes, vec![3, 3, 1]);
    Ok(())
}

#[tokio::test]
async fn read_row_not_found() -> anyhow::Result<()> {
    let table = Table::builder(TABLE).build(FakeStub::default());
    assert!(table.read_row("missing").await?.is_none());
    Ok(())
}
