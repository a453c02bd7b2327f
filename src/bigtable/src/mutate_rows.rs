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

//! Applies bulk mutations, retrying the rows that fail with transient errors.

use crate::Result;
use crate::error::Error;
use crate::model::{MutateRowsRequest, entry_status};
use crate::mutation::DirectRow;
use crate::retry_policy::{is_retryable_code, is_transient};
use crate::stub::Stub;
use gax::backoff_policy::BackoffPolicy;
use gax::error::rpc::{Code, Status};
use gax::retry_policy::RetryPolicy;
use gax::retry_result::RetryResult;
use gax::retry_state::RetryState;
use std::sync::Arc;
use std::time::Instant;

/// The maximum number of mutations in a single `MutateRows` request.
pub const MAX_BULK_MUTATIONS: usize = 100_000;

/// Returns true if a row with this status should be included in the next
/// attempt.
///
/// Rows that were never attempted have no status and are retryable.
pub fn is_retryable(status: Option<&Status>) -> bool {
    status.is_none_or(|s| is_retryable_code(s.code))
}

// Used when the caller disables retries.
#[derive(Debug)]
struct SingleAttempt;

impl RetryPolicy for SingleAttempt {
    fn on_error(&self, _state: &RetryState, error: gax::error::Error) -> RetryResult {
        if is_transient(&error) {
            RetryResult::Exhausted(error)
        } else {
            RetryResult::Permanent(error)
        }
    }
}

/// Mutates rows in bulk, retrying the rows with transient failures.
///
/// The worker keeps one status per row, in the order the rows were given.
/// Each attempt sends only the rows without a final status, and maps the
/// results back to the original positions. Once all the rows have a final
/// status, further calls to [run][RetryableMutateRowsWorker::run] make no
/// RPCs and return the same statuses.
#[derive(Debug)]
pub struct RetryableMutateRowsWorker<S> {
    stub: Arc<S>,
    table_name: String,
    app_profile_id: String,
    // Rows are dropped once they succeed.
    rows: Vec<Option<DirectRow>>,
    statuses: Vec<Option<Status>>,
}

impl<S> RetryableMutateRowsWorker<S>
where
    S: Stub,
{
    pub fn new<T, A>(stub: Arc<S>, table_name: T, app_profile_id: A, rows: Vec<DirectRow>) -> Self
    where
        T: Into<String>,
        A: Into<String>,
    {
        let statuses = vec![None; rows.len()];
        Self {
            stub,
            table_name: table_name.into(),
            app_profile_id: app_profile_id.into(),
            rows: rows.into_iter().map(Some).collect(),
            statuses,
        }
    }

    /// The status of each row, `None` if the row has not been attempted.
    pub fn statuses(&self) -> &[Option<Status>] {
        &self.statuses
    }

    /// Runs attempts until every row has a final status, or the retry
    /// policy stops the loop.
    ///
    /// Without a retry policy the worker makes a single attempt. Rows that
    /// still have retryable failures when the loop stops keep their last
    /// status. Errors in the use of the library, and whole-call errors that
    /// the policy considers permanent, are returned as `Err`.
    ///
    /// Partial failures are reported to the policy as an `UNAVAILABLE`
    /// service error, whole-call failures as the error itself.
    pub async fn run(
        &mut self,
        retry: Option<Arc<dyn RetryPolicy>>,
        backoff: Arc<dyn BackoffPolicy>,
    ) -> Result<Vec<Option<Status>>> {
        let retry = retry.unwrap_or_else(|| Arc::new(SingleAttempt));
        let start = Instant::now();
        let mut attempt_count = 0_u32;
        loop {
            attempt_count += 1;
            let (error, partial) = match self.attempt().await {
                Ok(()) => return Ok(self.statuses.clone()),
                Err(Error::RetryableEntries { count }) => {
                    let status = Status::default()
                        .set_code(Code::Unavailable)
                        .set_message(format!("{count} entries failed with retryable errors"));
                    (gax::error::Error::service(status), true)
                }
                Err(Error::Rpc(e)) => (e, false),
                Err(e) => return Err(e),
            };
            let state = RetryState::new(true)
                .set_start(start)
                .set_attempt_count(attempt_count);
            match retry.on_error(&state, error) {
                RetryResult::Continue(e) => {
                    let delay = backoff.on_failure(&state);
                    if retry.remaining_time(&state).is_some_and(|r| r < delay) {
                        tracing::debug!(
                            "stopping MutateRows retries after {attempt_count} attempts, the next backoff ({delay:?}) exceeds the deadline: {e}"
                        );
                        return Ok(self.statuses.clone());
                    }
                    tracing::warn!(
                        "MutateRows attempt {attempt_count} failed, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryResult::Exhausted(e) => {
                    tracing::debug!(
                        "stopping MutateRows retries after {attempt_count} attempts: {e}"
                    );
                    return Ok(self.statuses.clone());
                }
                RetryResult::Permanent(e) if partial => {
                    tracing::debug!("the retry policy stopped on partial failures: {e}");
                    return Ok(self.statuses.clone());
                }
                RetryResult::Permanent(e) => return Err(Error::Rpc(e)),
            }
        }
    }

    /// Makes a single attempt with all the rows that do not have a final
    /// status.
    ///
    /// Returns [Error::RetryableEntries] if some rows failed with transient
    /// errors. On a whole-call error the statuses are unchanged.
    pub async fn attempt(&mut self) -> Result<()> {
        let pending: Vec<(usize, &DirectRow)> = self
            .statuses
            .iter()
            .zip(self.rows.iter())
            .enumerate()
            .filter(|(_, (status, _))| is_retryable(status.as_ref()))
            .filter_map(|(index, (_, row))| row.as_ref().map(|r| (index, r)))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let mutations_count = pending
            .iter()
            .map(|(_, row)| row.mutations_count())
            .sum::<usize>();
        if mutations_count > MAX_BULK_MUTATIONS {
            return Err(Error::TooManyMutations {
                count: mutations_count,
                maximum: MAX_BULK_MUTATIONS,
            });
        }
        let request = MutateRowsRequest::new()
            .set_table_name(self.table_name.clone())
            .set_app_profile_id(self.app_profile_id.clone())
            .set_entries(pending.iter().map(|(_, row)| row.to_entry()));
        let indices = pending
            .into_iter()
            .map(|(index, _)| index)
            .collect::<Vec<_>>();
        tracing::debug!(
            "sending MutateRows with {} of {} rows",
            indices.len(),
            self.rows.len()
        );

        let responses = self.stub.mutate_rows(request).await?;
        let mut seen = vec![false; indices.len()];
        let mut retryable = 0_usize;
        for entry in responses.into_iter().flat_map(|r| r.entries) {
            let position = usize::try_from(entry.index)
                .ok()
                .filter(|i| *i < indices.len())
                .ok_or(Error::UnexpectedEntryIndex {
                    index: entry.index,
                    count: indices.len(),
                })?;
            if std::mem::replace(&mut seen[position], true) {
                return Err(Error::DuplicateEntryIndex { index: entry.index });
            }
            let index = indices[position];
            let status = entry_status(entry);
            if is_retryable_code(status.code) {
                retryable += 1;
            }
            if status.code == Code::Ok {
                self.rows[index] = None;
            }
            self.statuses[index] = Some(status);
        }
        let received = seen.iter().filter(|s| **s).count();
        if received != indices.len() {
            return Err(Error::ResponseCountMismatch {
                expected: indices.len(),
                actual: received,
            });
        }
        if retryable > 0 {
            return Err(Error::RetryableEntries { count: retryable });
        }
        // Every row has a final status, none will be sent again.
        self.rows.iter_mut().for_each(|row| *row = None);
        Ok(())
    }
}
