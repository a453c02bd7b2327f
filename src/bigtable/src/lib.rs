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

//! Google Cloud Client Libraries for Rust - Bigtable
//!
//! **WARNING:** this crate is under active development. We expect multiple
//! breaking changes in the upcoming releases. Testing is also incomplete, we do
//! **not** recommend that you use this crate in production. We welcome feedback
//! about the APIs, documentation, missing features, bugs, etc.
//!
//! This crate contains the data plane core for [Bigtable]:
//! * [read_rows] assembles the chunked rows of a `ReadRows` stream.
//! * [mutate_rows] applies bulk mutations, retrying only the rows that fail
//!   with transient errors.
//! * [table] and [batcher] wrap both in a client for a single table.
//!
//! The crate does not include a transport. Applications provide one by
//! implementing the traits in [stub].
//!
//! [Bigtable]: https://cloud.google.com/bigtable

pub mod batcher;
pub mod error;
pub mod model;
pub mod mutate_rows;
pub mod mutation;
pub mod options;
pub mod read_rows;
pub mod retry_policy;
pub mod row_data;
pub mod stub;
pub mod table;

pub use error::Error;

/// The result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
