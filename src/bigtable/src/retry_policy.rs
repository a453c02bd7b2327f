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

//! The retry policy for bulk mutations.
//!
//! Bulk mutations are retried when some of the rows fail with transient
//! errors, or when the whole RPC fails with a transient error. Only the rows
//! that have not reached a final status are included in each new attempt.
//!
//! Applications may replace [RetryableErrors] with any
//! [RetryPolicy][gax::retry_policy::RetryPolicy], or decorate it to retry for
//! a shorter time or a limited number of attempts.
//!
//! # Example
//! ```
//! # use google_cloud_bigtable::retry_policy::RetryableErrors;
//! use gax::retry_policy::RetryPolicyExt;
//! use std::time::Duration;
//! let policy = RetryableErrors
//!     .with_time_limit(Duration::from_secs(30))
//!     .with_attempt_limit(5);
//! ```

use gax::error::Error;
use gax::error::rpc::Code;
use gax::retry_policy::RetryPolicy;
use gax::retry_result::RetryResult;
use gax::retry_state::RetryState;

/// The status codes Bigtable considers transient.
pub(crate) const RETRYABLE_CODES: [Code; 3] =
    [Code::DeadlineExceeded, Code::Aborted, Code::Unavailable];

pub(crate) fn is_retryable_code(code: Code) -> bool {
    RETRYABLE_CODES.contains(&code)
}

/// Whether a whole-call error may succeed if attempted again.
pub(crate) fn is_transient(error: &Error) -> bool {
    if error.is_io() || error.is_timeout() {
        return true;
    }
    error.status().is_some_and(|s| is_retryable_code(s.code))
}

/// Retries all transient errors.
///
/// Transient errors are transport errors, timeouts, and failures with a
/// `DEADLINE_EXCEEDED`, `ABORTED` or `UNAVAILABLE` status. Bulk mutations
/// where some rows failed with one of those codes are reported to the policy
/// as an `UNAVAILABLE` service error.
///
/// This policy never stops on its own, decorate it to limit the number of
/// attempts or the duration of the loop.
#[derive(Clone, Debug)]
pub struct RetryableErrors;

impl RetryPolicy for RetryableErrors {
    fn on_error(&self, _state: &RetryState, error: Error) -> RetryResult {
        if is_transient(&error) {
            RetryResult::Continue(error)
        } else {
            RetryResult::Permanent(error)
        }
    }
}
