//! Point-to-point messaging between workers
//!
//! A worker issues non-blocking sends and receives, collects the returned
//! request handles, and later blocks on all of them at once with
//! [`Transport::wait_all`]. A send takes its [`CellMessage`] by value, so the
//! caller has nothing left to mutate while the send is outstanding.

pub mod channel;

pub use channel::{ChannelNetwork, ChannelTransport};

use crate::core::error::Result;
use crate::core::types::{Cell, Rank, Tag};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// One boundary cell's state, addressed in normalized global coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellMessage {
    pub row: usize,
    pub col: usize,
    pub value: Cell,
}

impl CellMessage {
    pub fn new(row: usize, col: usize, value: Cell) -> Self {
        Self { row, col, value }
    }
}

/// A message in flight, stamped with its sender and tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub source: Rank,
    pub tag: Tag,
    pub message: CellMessage,
}

/// Handle for an issued send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "sends must be waited on before the exchange is reused"]
pub struct SendRequest {
    pub destination: Rank,
    pub tag: Tag,
}

/// Handle for a posted receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a posted receive has no effect until it is waited on"]
pub struct RecvRequest {
    pub source: Rank,
    pub tag: Tag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Send(SendRequest),
    Recv(RecvRequest),
}

impl From<SendRequest> for Request {
    fn from(request: SendRequest) -> Self {
        Request::Send(request)
    }
}

impl From<RecvRequest> for Request {
    fn from(request: RecvRequest) -> Self {
        Request::Recv(request)
    }
}

/// Communication endpoint owned by a single worker
pub trait Transport: Send {
    /// Rank of the worker that owns this endpoint
    fn rank(&self) -> Rank;

    /// Start sending `message` to `destination`; returns immediately
    fn isend(&mut self, destination: Rank, tag: Tag, message: CellMessage) -> Result<SendRequest>;

    /// Post a receive for the next message from `source` carrying `tag`
    fn irecv(&mut self, source: Rank, tag: Tag) -> Result<RecvRequest>;

    /// Block until every listed request completes
    ///
    /// Returns the received messages in the order their receives appear in
    /// `requests`. Any failure aborts the whole wait.
    fn wait_all(
        &mut self,
        requests: Vec<Request>,
    ) -> impl Future<Output = Result<Vec<CellMessage>>> + Send;
}
