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

//! Errors returned by the Bigtable client.
//!
//! The client distinguishes between errors in the data returned by the
//! service (for example, a malformed sequence of `ReadRows` chunks), errors
//! reported by the service for a whole RPC, transport errors, and errors in
//! the application's usage of the library. The last group is never retried.

use crate::read_rows::ReadState;
use bytes::Bytes;
use gax::error::rpc::Status;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The error type for all operations in this crate.
///
/// # Example
/// ```
/// use google_cloud_bigtable::Error;
/// use gax::error::rpc::{Code, Status};
/// let error = Error::service(Status::default().set_code(Code::Unavailable));
/// assert!(error.is_transient());
/// assert!(!error.is_usage());
/// ```
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The `ReadRows` stream contained a chunk that violates the protocol.
    ///
    /// The stream cannot be recovered, any partially assembled row must be
    /// discarded.
    #[error("invalid chunk in ReadRows response: {0}")]
    InvalidChunk(#[from] InvalidChunk),

    /// The envelope of a `ReadRows` response violates the protocol.
    #[error("invalid ReadRows response: {0}")]
    InvalidReadRowsResponse(String),

    /// The whole RPC failed, either in the transport or in the service.
    #[error(transparent)]
    Rpc(#[from] gax::error::Error),

    /// Some entries of a bulk mutation failed with transient errors.
    ///
    /// Only [attempt][crate::mutate_rows::RetryableMutateRowsWorker::attempt]
    /// returns this error. The retry loop turns it into a new attempt.
    #[error("{count} mutation entries failed with retryable errors")]
    RetryableEntries { count: usize },

    /// A bulk mutation request exceeds the service limits.
    #[error("the request has {count} mutations, the maximum is {maximum}")]
    TooManyMutations { count: usize, maximum: usize },

    /// The service returned a different number of entries than requested.
    #[error("unexpected number of responses ({actual}), expected {expected}")]
    ResponseCountMismatch { expected: usize, actual: usize },

    /// The service returned an entry index outside the request.
    #[error("the response references entry {index}, but the request had {count} entries")]
    UnexpectedEntryIndex { index: i64, count: usize },

    /// The service returned more than one status for the same entry.
    #[error("the response contains entry {index} more than once")]
    DuplicateEntryIndex { index: i64 },

    /// A row was submitted to a table it does not belong to.
    #[error("row {row_key:?} is a part of table {row_table}, current table: {table}")]
    TableMismatch {
        row_key: Bytes,
        row_table: String,
        table: String,
    },

    /// A single row read ended before the row was committed.
    #[error("the row remains partial / is not committed, the stream ended in {0:?}")]
    PartialRow(ReadState),

    /// The request is malformed and was not sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A single row has more mutations than a batch can hold.
    #[error("row {row_key:?} has {count} mutations, the maximum is {maximum}")]
    RowTooLarge {
        row_key: Bytes,
        count: usize,
        maximum: usize,
    },
}

impl Error {
    /// Creates an error for a whole RPC rejected by the service.
    pub fn service(status: Status) -> Self {
        Self::Rpc(gax::error::Error::service(status))
    }

    /// Creates an error representing a transport problem.
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        Self::Rpc(gax::error::Error::io(source))
    }

    /// The service status, if the service returned an error for the RPC.
    pub fn status(&self) -> Option<&Status> {
        match self {
            Self::Rpc(e) => e.status(),
            _ => None,
        }
    }

    /// Returns true if the error is transient and the operation may succeed
    /// if attempted again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RetryableEntries { .. } => true,
            Self::Rpc(e) => crate::retry_policy::is_transient(e),
            _ => false,
        }
    }

    /// Returns true if the error is caused by the application's use of the
    /// library, or by a response that cannot be matched to the request.
    ///
    /// These errors are raised before, or instead of, any retry.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::TooManyMutations { .. }
                | Self::ResponseCountMismatch { .. }
                | Self::UnexpectedEntryIndex { .. }
                | Self::DuplicateEntryIndex { .. }
                | Self::TableMismatch { .. }
                | Self::InvalidRequest(_)
                | Self::RowTooLarge { .. }
        )
    }
}

/// Structural violations in a sequence of `ReadRows` chunks.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidChunk {
    #[error("reset_row received before any cell of the current row")]
    ResetOnNewRow,
    #[error("reset_row chunks must not carry any other data")]
    ResetWithData,
    #[error("a new row must start with a row key")]
    MissingRowKey,
    #[error("a new row must start with a family name")]
    MissingFamilyName,
    #[error("a new row must start with a qualifier")]
    MissingQualifier,
    #[error("row key {new:?} is not greater than the previous row key {previous:?}")]
    RowKeyNotIncreasing { previous: Bytes, new: Bytes },
    #[error("row key changed from {current:?} to {new:?} without a commit")]
    RowKeyChanged { current: Bytes, new: Bytes },
    #[error("a new family name requires a qualifier")]
    FamilyWithoutQualifier,
    #[error("commit_row received with {value_size} value bytes still pending")]
    CommitWithPendingValue { value_size: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use gax::error::rpc::Code;
    use test_case::test_case;

    #[test_case(Code::DeadlineExceeded)]
    #[test_case(Code::Aborted)]
    #[test_case(Code::Unavailable)]
    fn transient_service(code: Code) {
        let error = Error::service(Status::default().set_code(code));
        assert!(error.is_transient(), "{error:?}");
        assert!(!error.is_usage(), "{error:?}");
        assert_eq!(error.status().map(|s| s.code), Some(code));
    }

    #[test_case(Code::PermissionDenied)]
    #[test_case(Code::InvalidArgument)]
    #[test_case(Code::Internal)]
    #[test_case(Code::NotFound)]
    fn permanent_service(code: Code) {
        let error = Error::service(Status::default().set_code(code));
        assert!(!error.is_transient(), "{error:?}");
    }

    #[test]
    fn transient_other() {
        assert!(Error::io("connection reset").is_transient());
        assert!(Error::RetryableEntries { count: 2 }.is_transient());
        assert!(!Error::from(InvalidChunk::MissingRowKey).is_transient());
        assert!(Error::io("connection reset").status().is_none());
    }

    #[test]
    fn from_gax() {
        let error = Error::from(gax::error::Error::io("broken pipe"));
        assert!(matches!(error, Error::Rpc(ref e) if e.is_io()), "{error:?}");
        assert!(error.is_transient());
    }

    #[test]
    fn usage() {
        let error = Error::TooManyMutations {
            count: 100_001,
            maximum: 100_000,
        };
        assert!(error.is_usage(), "{error:?}");
        assert!(!error.is_transient(), "{error:?}");

        let error = Error::ResponseCountMismatch {
            expected: 3,
            actual: 2,
        };
        assert!(error.is_usage(), "{error:?}");
        assert_eq!(
            error.to_string(),
            "unexpected number of responses (2), expected 3"
        );

        let error = Error::DuplicateEntryIndex { index: 0 };
        assert!(error.is_usage(), "{error:?}");
        assert!(!error.is_transient(), "{error:?}");

        let error = Error::InvalidChunk(InvalidChunk::ResetWithData);
        assert!(!error.is_usage(), "{error:?}");
    }
}
