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

//! Traits to plug in the transport layer.
//!
//! The client library does not include a transport. Applications, and the
//! unit tests in this crate, provide an implementation of [Stub] that sends
//! the requests to the service, or to an emulator, or to a fake.

use crate::Result;
use crate::model::{MutateRowsRequest, MutateRowsResponse, ReadRowsRequest, ReadRowsResponse};

/// A server-streaming `ReadRows` response.
pub trait ReadRowsStream: std::fmt::Debug + Send + 'static {
    /// Receives the next response.
    ///
    /// Returns `Ok(None)` once the service has closed the stream.
    fn next_message(&mut self) -> impl Future<Output = Result<Option<ReadRowsResponse>>> + Send;

    /// Asks the service to stop sending responses.
    ///
    /// Must be safe to call more than once, and after the stream has ended.
    fn cancel(&mut self) {}
}

/// The transport used by [Table][crate::table::Table].
///
/// # Example
/// ```
/// # use google_cloud_bigtable::{Error, Result};
/// # use google_cloud_bigtable::model::*;
/// # use google_cloud_bigtable::stub::{ReadRowsStream, Stub};
/// #[derive(Debug)]
/// struct Empty;
/// impl ReadRowsStream for Empty {
///     async fn next_message(&mut self) -> Result<Option<ReadRowsResponse>> {
///         Ok(None)
///     }
/// }
///
/// #[derive(Debug)]
/// struct Offline;
/// #[async_trait::async_trait]
/// impl Stub for Offline {
///     type Stream = Empty;
///     async fn read_rows(&self, _req: ReadRowsRequest) -> Result<Self::Stream> {
///         Ok(Empty)
///     }
///     async fn mutate_rows(&self, _req: MutateRowsRequest) -> Result<Vec<MutateRowsResponse>> {
///         Err(Error::io("offline"))
///     }
/// }
///
/// # tokio_test::block_on(async {
/// use google_cloud_bigtable::table::Table;
/// let table = Table::builder("projects/p/instances/i/tables/t").build(Offline);
/// assert!(table.read_row("r1").await?.is_none());
/// # Result::<()>::Ok(()) });
/// ```
#[async_trait::async_trait]
pub trait Stub: std::fmt::Debug + Send + Sync + 'static {
    type Stream: ReadRowsStream;

    /// Starts a `ReadRows` call.
    async fn read_rows(&self, request: ReadRowsRequest) -> Result<Self::Stream>;

    /// Performs a `MutateRows` call, returning all the responses.
    ///
    /// The worker issues exactly one call per attempt and waits for it to
    /// complete before interpreting the results.
    async fn mutate_rows(&self, request: MutateRowsRequest) -> Result<Vec<MutateRowsResponse>>;
}
