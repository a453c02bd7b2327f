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

//! Assembles rows from the chunks in a `ReadRows` stream.
//!
//! The service splits rows into cells, and cells into chunks. A chunk may
//! omit the row key, family, or qualifier if they are unchanged from the
//! previous cell in the same row. Large values are split across several
//! chunks. A row is only complete once a chunk with `commit_row` arrives, and
//! the service may discard a partially sent row with a `reset_row` chunk.

use crate::Result;
use crate::error::{Error, InvalidChunk};
use crate::model::{CellChunk, ReadRowsResponse};
use crate::row_data::{PartialCellData, PartialRowData};
use crate::stub::ReadRowsStream;
use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::collections::BTreeMap;

// The service declares the size of split values, but the buffer for a value
// grows as the fragments arrive beyond this point.
const MAX_VALUE_PREALLOCATION: usize = 1024 * 1024;

/// The state of a [RowAssembler].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReadState {
    /// No responses processed yet.
    Start,
    /// No cells complete for the current row.
    NewRow,
    /// Some cells complete for the current row.
    RowInProgress,
    /// A cell is incomplete, more value fragments are expected.
    CellInProgress,
}

impl ReadState {
    pub fn name(&self) -> &str {
        match self {
            Self::Start => "Start",
            Self::NewRow => "New row",
            Self::RowInProgress => "Row in progress",
            Self::CellInProgress => "Cell in progress",
        }
    }
}

impl std::fmt::Display for ReadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A state machine converting chunks into rows.
///
/// The assembler does no I/O. [RowStream] drives it from a transport stream,
/// applications can also drive it directly.
///
/// # Example
/// ```
/// # use google_cloud_bigtable::read_rows::{ReadState, RowAssembler};
/// # use google_cloud_bigtable::model::{CellChunk, ReadRowsResponse};
/// # fn sample() -> google_cloud_bigtable::Result<()> {
/// let mut assembler = RowAssembler::new();
/// let response = ReadRowsResponse::new().set_chunks([CellChunk::new()
///     .set_row_key("row")
///     .set_family_name("cf")
///     .set_qualifier("q")
///     .set_value("v")
///     .set_commit_row(true)]);
/// let rows = assembler.on_response(response)?;
/// assert_eq!(rows.len(), 1);
/// assert_eq!(assembler.state(), ReadState::NewRow);
/// # Ok(()) }
/// ```
#[derive(Clone, Debug, Default)]
pub struct RowAssembler {
    // `None` until the first response.
    last_scanned_row_key: Option<Bytes>,
    // The row being assembled, from its first chunk until commit or reset.
    row: Option<PartialRowData>,
    // The open cell, while its value is still arriving.
    cell: Option<PartialCellData>,
    // The last completed cell in the current row.
    previous_cell: Option<PartialCellData>,
    // The key of the last committed row.
    previous_row_key: Option<Bytes>,
}

impl RowAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state.
    pub fn state(&self) -> ReadState {
        if self.cell.is_some() {
            return ReadState::CellInProgress;
        }
        if self.previous_cell.is_some() {
            return ReadState::RowInProgress;
        }
        if self.last_scanned_row_key.is_none() {
            return ReadState::Start;
        }
        ReadState::NewRow
    }

    /// The `last_scanned_row_key` of the most recent response.
    ///
    /// `None` until a response is processed.
    pub fn last_scanned_row_key(&self) -> Option<&Bytes> {
        self.last_scanned_row_key.as_ref()
    }

    /// Records the envelope of a new response.
    ///
    /// Call this before feeding the chunks of the response to
    /// [on_chunk][RowAssembler::on_chunk].
    pub fn start_response(&mut self, last_scanned_row_key: Bytes) -> Result<()> {
        if self.last_scanned_row_key.is_none() && !last_scanned_row_key.is_empty() {
            return Err(Error::InvalidReadRowsResponse(format!(
                "the first response has a last_scanned_row_key ({last_scanned_row_key:?})"
            )));
        }
        self.last_scanned_row_key = Some(last_scanned_row_key);
        Ok(())
    }

    /// Processes a full response, returning the rows it commits.
    ///
    /// On error, any rows committed earlier in the same response are lost.
    /// Use [RowStream] to receive those rows before the error.
    pub fn on_response(&mut self, response: ReadRowsResponse) -> Result<Vec<PartialRowData>> {
        self.start_response(response.last_scanned_row_key)?;
        let mut rows = Vec::new();
        for chunk in response.chunks {
            if let Some(row) = self.on_chunk(chunk)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Processes a single chunk, returning the row it commits, if any.
    pub fn on_chunk(&mut self, chunk: CellChunk) -> Result<Option<PartialRowData>> {
        if chunk.reset_row {
            self.validate_reset(&chunk)?;
            tracing::debug!(
                "discarding partial row {:?}",
                self.row.as_ref().map(PartialRowData::row_key)
            );
            self.row = None;
            self.cell = None;
            self.previous_cell = None;
            return Ok(None);
        }

        let commit_row = chunk.commit_row;
        let value_size = chunk.value_size;
        match self.cell.as_mut() {
            Some(cell) => cell.append_value(&chunk.value),
            None => {
                self.validate_new_cell(&chunk)?;
                self.cell = Some(self.open_cell(chunk));
            }
        }
        if self.row.is_none() {
            let row_key = self
                .cell
                .as_ref()
                .map(|c| c.row_key.clone())
                .unwrap_or_default();
            self.row = Some(PartialRowData::new(row_key));
        }

        if commit_row {
            if value_size > 0 {
                return Err(InvalidChunk::CommitWithPendingValue { value_size }.into());
            }
            self.save_current_cell();
            self.previous_cell = None;
            let row = self.row.take();
            if let Some(r) = &row {
                self.previous_row_key = Some(r.row_key().clone());
            }
            return Ok(row);
        }
        if value_size == 0 {
            self.save_current_cell();
        }
        Ok(None)
    }

    fn validate_reset(&self, chunk: &CellChunk) -> Result<()> {
        if self.state() == ReadState::NewRow {
            return Err(InvalidChunk::ResetOnNewRow.into());
        }
        let has_data = !chunk.row_key.is_empty()
            || chunk.family_name.is_some()
            || chunk.qualifier.is_some()
            || chunk.timestamp_micros != 0
            || !chunk.labels.is_empty()
            || chunk.value_size != 0
            || !chunk.value.is_empty();
        if has_data {
            return Err(InvalidChunk::ResetWithData.into());
        }
        Ok(())
    }

    // Only called when no cell is open, the chunk starts a new cell.
    fn validate_new_cell(&self, chunk: &CellChunk) -> Result<()> {
        let has_family = chunk.family_name.as_ref().is_some_and(|f| !f.is_empty());
        match self.state() {
            ReadState::RowInProgress => {
                let current = self.row.as_ref().map(PartialRowData::row_key);
                if let Some(current) = current {
                    if !chunk.row_key.is_empty() && &chunk.row_key != current {
                        return Err(InvalidChunk::RowKeyChanged {
                            current: current.clone(),
                            new: chunk.row_key.clone(),
                        }
                        .into());
                    }
                }
                if has_family && chunk.qualifier.is_none() {
                    return Err(InvalidChunk::FamilyWithoutQualifier.into());
                }
            }
            ReadState::Start | ReadState::NewRow => {
                if chunk.row_key.is_empty() {
                    return Err(InvalidChunk::MissingRowKey.into());
                }
                if !has_family {
                    return Err(InvalidChunk::MissingFamilyName.into());
                }
                if chunk.qualifier.is_none() {
                    return Err(InvalidChunk::MissingQualifier.into());
                }
                if let Some(previous) = &self.previous_row_key {
                    if chunk.row_key <= *previous {
                        return Err(InvalidChunk::RowKeyNotIncreasing {
                            previous: previous.clone(),
                            new: chunk.row_key.clone(),
                        }
                        .into());
                    }
                }
            }
            ReadState::CellInProgress => {}
        }
        Ok(())
    }

    // Missing fields are copied from the previous cell in the row. The
    // timestamp and labels are never copied.
    fn open_cell(&self, chunk: CellChunk) -> PartialCellData {
        let previous = self.previous_cell.as_ref();
        let row_key = match (chunk.row_key.is_empty(), previous) {
            (true, Some(p)) => p.row_key.clone(),
            _ => chunk.row_key,
        };
        let family_name = match (chunk.family_name, previous) {
            (Some(f), _) if !f.is_empty() => f,
            (_, Some(p)) => p.family_name.clone(),
            (f, None) => f.unwrap_or_default(),
        };
        let qualifier = match (chunk.qualifier, previous) {
            (Some(q), _) => q,
            (None, Some(p)) => p.qualifier.clone(),
            (None, None) => Bytes::new(),
        };
        let declared = usize::try_from(chunk.value_size)
            .unwrap_or(0)
            .min(MAX_VALUE_PREALLOCATION);
        let mut value = BytesMut::with_capacity(std::cmp::max(chunk.value.len(), declared));
        value.extend_from_slice(&chunk.value);
        PartialCellData {
            row_key,
            family_name,
            qualifier,
            timestamp_micros: chunk.timestamp_micros,
            labels: chunk.labels,
            value,
        }
    }

    fn save_current_cell(&mut self) {
        let (Some(row), Some(mut cell)) = (self.row.as_mut(), self.cell.take()) else {
            return;
        };
        let complete = cell.take_cell();
        row.push_cell(cell.family_name.clone(), cell.qualifier.clone(), complete);
        self.previous_cell = Some(cell);
    }
}

/// The rows returned by a `ReadRows` call.
///
/// Rows are returned one at a time, in increasing row key order, as soon as
/// the chunk committing them arrives.
///
/// # Example
/// ```
/// # use google_cloud_bigtable::read_rows::RowStream;
/// # use google_cloud_bigtable::stub::ReadRowsStream;
/// # async fn sample<S: ReadRowsStream>(mut rows: RowStream<S>) -> google_cloud_bigtable::Result<()> {
/// while let Some(row) = rows.next().await.transpose()? {
///     println!("row {:?} has {} families", row.row_key(), row.cells().len());
/// }
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct RowStream<S> {
    stream: S,
    assembler: RowAssembler,
    chunks: std::vec::IntoIter<CellChunk>,
    done: bool,
}

impl<S> RowStream<S>
where
    S: ReadRowsStream,
{
    /// Wraps a transport stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            assembler: RowAssembler::new(),
            chunks: Vec::new().into_iter(),
            done: false,
        }
    }

    /// Returns the next committed row.
    ///
    /// Returns `None` when the stream ends. After an error, or after
    /// [cancel][RowStream::cancel], the stream is finished: it returns `None`
    /// and no more responses are received.
    pub async fn next(&mut self) -> Option<Result<PartialRowData>> {
        if self.done {
            return None;
        }
        loop {
            if let Some(chunk) = self.chunks.next() {
                match self.assembler.on_chunk(chunk) {
                    Ok(None) => continue,
                    Ok(Some(row)) => {
                        tracing::trace!("committed row {:?}", row.row_key());
                        return Some(Ok(row));
                    }
                    Err(e) => return Some(Err(self.fail(e))),
                }
            }
            match self.stream.next_message().await {
                Ok(Some(response)) => {
                    if let Err(e) = self
                        .assembler
                        .start_response(response.last_scanned_row_key)
                    {
                        return Some(Err(self.fail(e)));
                    }
                    self.chunks = response.chunks.into_iter();
                }
                Ok(None) => {
                    self.done = true;
                    if self.assembler.state() != ReadState::NewRow
                        && self.assembler.state() != ReadState::Start
                    {
                        tracing::debug!(
                            "ReadRows stream closed in state {}",
                            self.assembler.state()
                        );
                    }
                    return None;
                }
                Err(e) => return Some(Err(self.fail(e))),
            }
        }
    }

    fn fail(&mut self, error: Error) -> Error {
        self.done = true;
        self.chunks = Vec::new().into_iter();
        error
    }

    /// Stops the stream.
    ///
    /// Safe to call at any time, any partial row is discarded.
    pub fn cancel(&mut self) {
        tracing::debug!("cancelling ReadRows stream in state {}", self.assembler.state());
        self.stream.cancel();
        self.chunks = Vec::new().into_iter();
        self.done = true;
    }

    /// The state of the row assembly.
    pub fn state(&self) -> ReadState {
        self.assembler.state()
    }

    /// The `last_scanned_row_key` of the most recent response.
    pub fn last_scanned_row_key(&self) -> Option<&Bytes> {
        self.assembler.last_scanned_row_key()
    }

    /// Reads all the remaining rows, keyed by row key.
    pub async fn consume_all(&mut self) -> Result<BTreeMap<Bytes, PartialRowData>> {
        let mut rows = BTreeMap::new();
        while let Some(row) = self.next().await.transpose()? {
            rows.insert(row.row_key().clone(), row);
        }
        Ok(rows)
    }

    /// Convert the rows to a [Stream].
    pub fn into_stream(self) -> impl Stream<Item = Result<PartialRowData>> + Unpin {
        use futures::stream::unfold;
        Box::pin(unfold(Some(self), move |state| async move {
            if let Some(mut this) = state {
                if let Some(row) = this.next().await {
                    return Some((row, Some(this)));
                }
            };
            None
        }))
    }
}
