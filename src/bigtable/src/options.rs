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

//! Options for tables and mutation batchers.

use crate::retry_policy::RetryableErrors;
use gax::backoff_policy::BackoffPolicy;
use gax::exponential_backoff::ExponentialBackoffBuilder;
use gax::retry_policy::{RetryPolicy, RetryPolicyExt};
use std::sync::Arc;
use std::time::Duration;

/// The default number of rows in a batch.
pub const FLUSH_COUNT: usize = 1000;

/// The maximum number of mutations in a batch.
pub const MAX_MUTATIONS: usize = crate::mutate_rows::MAX_BULK_MUTATIONS;

/// The default size of the mutations in a batch, in bytes.
pub const MAX_ROW_BYTES: usize = 5 * 1024 * 1024;

const DEFAULT_RETRY_DEADLINE: Duration = Duration::from_secs(120);
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAXIMUM_DELAY: Duration = Duration::from_secs(15);
const DEFAULT_SCALING: f64 = 2.0;

/// Options for configuring [MutationsBatcher][crate::batcher::MutationsBatcher].
///
/// The batcher sends its rows once it buffers `flush_count` rows, or once
/// the size of the buffered mutations reaches `max_row_bytes`.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct BatchingOptions {
    pub flush_count: usize,
    pub max_row_bytes: usize,
}

impl BatchingOptions {
    /// Create a new instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the [BatchingOptions][Self::flush_count] field.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_bigtable::options::BatchingOptions;
    /// let options = BatchingOptions::new().set_flush_count(100_usize);
    /// ```
    pub fn set_flush_count<V: Into<usize>>(mut self, v: V) -> Self {
        self.flush_count = v.into();
        self
    }

    /// Set the [BatchingOptions][Self::max_row_bytes] field.
    ///
    /// # Example
    /// ```
    /// # use google_cloud_bigtable::options::BatchingOptions;
    /// let options = BatchingOptions::new().set_max_row_bytes(1024_usize);
    /// ```
    pub fn set_max_row_bytes<V: Into<usize>>(mut self, v: V) -> Self {
        self.max_row_bytes = v.into();
        self
    }
}

impl std::default::Default for BatchingOptions {
    fn default() -> Self {
        Self {
            flush_count: FLUSH_COUNT,
            max_row_bytes: MAX_ROW_BYTES,
        }
    }
}

/// The retry configuration for `MutateRows` calls.
#[derive(Clone, Debug)]
pub(crate) struct RetryOptions {
    /// `None` makes a single attempt.
    pub retry_policy: Option<Arc<dyn RetryPolicy>>,
    pub backoff_policy: Arc<dyn BackoffPolicy>,
}

impl std::default::Default for RetryOptions {
    fn default() -> Self {
        Self {
            retry_policy: Some(Arc::new(
                RetryableErrors.with_time_limit(DEFAULT_RETRY_DEADLINE),
            )),
            backoff_policy: Arc::new(
                ExponentialBackoffBuilder::new()
                    .with_initial_delay(DEFAULT_INITIAL_DELAY)
                    .with_maximum_delay(DEFAULT_MAXIMUM_DELAY)
                    .with_scaling(DEFAULT_SCALING)
                    .clamp(),
            ),
        }
    }
}
