use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use ofstats_core::{DeviceCategoryKey, DeviceId, LogicalRecord, SkippedRecords, StatCategory};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::{CollectError, CollectFailure, Stage};

/// A completed logical collection.
///
/// By the time this is observed every write of the cycle has been applied to
/// the store, so reading the key returns exactly `records`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionResult {
    pub device: DeviceId,
    pub category: StatCategory,
    pub xid: u32,
    pub records: Vec<LogicalRecord>,
    pub skipped: SkippedRecords,
    pub fragments: usize,
    pub completed_at: DateTime<Utc>,
}

impl CollectionResult {
    pub fn key(&self) -> DeviceCategoryKey {
        DeviceCategoryKey::new(self.device, self.category)
    }
}

pub(crate) type Outcome = Result<CollectionResult, CollectError>;

/// Resolves once the collection reaches a terminal state.
///
/// Dropping it does not cancel the collection; writes already submitted still
/// run to completion.
#[derive(Debug)]
pub struct CollectionFuture {
    key: DeviceCategoryKey,
    xid: u32,
    receiver: oneshot::Receiver<Outcome>,
}

impl CollectionFuture {
    pub(crate) fn new(key: DeviceCategoryKey, xid: u32, receiver: oneshot::Receiver<Outcome>) -> Self {
        Self { key, xid, receiver }
    }

    /// Transaction id the request was sent with
    pub fn xid(&self) -> u32 {
        self.xid
    }

    pub fn key(&self) -> DeviceCategoryKey {
        self.key
    }
}

impl Future for CollectionFuture {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // The request task was torn down with its runtime.
            Poll::Ready(Err(_)) => Poll::Ready(Err(CollectError::new(
                self.key.device,
                self.key.category,
                self.xid,
                Stage::Shutdown,
                CollectFailure::Shutdown,
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}
