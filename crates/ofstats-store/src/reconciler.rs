//! Per-key serialized write chains over a [`StatsStore`].
//!
//! Every write for a [`DeviceCategoryKey`] is spawned as a task that first
//! awaits the write submitted before it for the same key. Tasks run whether or
//! not anyone awaits their handle, so a request that gives up early never
//! leaves a purge without its merges.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt, Shared};
use ofstats_core::{DeviceCategoryKey, LogicalRecord};
use parking_lot::Mutex;

use crate::error::{Result, StoreError};
use crate::store::StatsStore;

type SharedWrite = Shared<BoxFuture<'static, Result<usize>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Purge,
    Merge,
}

impl WriteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purge => "purge",
            Self::Merge => "merge",
        }
    }
}

enum WriteOp {
    Purge,
    Merge(Vec<LogicalRecord>),
}

/// Completion handle for one submitted write.
///
/// Resolves to the number of records removed (purge) or written (merge).
/// Cloning is cheap; every clone observes the same outcome.
#[derive(Clone)]
pub struct WriteHandle {
    key: DeviceCategoryKey,
    kind: WriteKind,
    seq: u64,
    outcome: SharedWrite,
}

impl WriteHandle {
    pub fn key(&self) -> &DeviceCategoryKey {
        &self.key
    }

    pub fn kind(&self) -> WriteKind {
        self.kind
    }

    /// Submission order across all keys of one reconciler
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The outcome, if the write has already finished.
    pub fn peek(&self) -> Option<&Result<usize>> {
        self.outcome.peek()
    }
}

impl std::fmt::Debug for WriteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteHandle")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("seq", &self.seq)
            .finish()
    }
}

impl Future for WriteHandle {
    type Output = Result<usize>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.outcome).poll(cx)
    }
}

struct ChainTail {
    seq: u64,
    outcome: SharedWrite,
}

type Chains = Arc<Mutex<HashMap<DeviceCategoryKey, ChainTail>>>;

/// Serializes purge and merge writes per [`DeviceCategoryKey`].
///
/// Submitting requires a Tokio runtime.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn StatsStore>,
    chains: Chains,
    next_seq: Arc<AtomicU64>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self {
            store,
            chains: Arc::default(),
            next_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn store(&self) -> &Arc<dyn StatsStore> {
        &self.store
    }

    /// Delete every record cached under `key` from a previous cycle.
    ///
    /// Runs after any pending write for the key, even one that failed.
    pub fn purge_stale(&self, key: DeviceCategoryKey) -> WriteHandle {
        self.submit(key, WriteOp::Purge)
    }

    /// Upsert `records` under `key` after every earlier write for the key.
    ///
    /// If the write before it failed the merge is not applied and resolves to
    /// [`StoreError::PredecessorFailed`].
    pub fn merge(&self, key: DeviceCategoryKey, records: Vec<LogicalRecord>) -> WriteHandle {
        self.submit(key, WriteOp::Merge(records))
    }

    /// Whether any write for `key` is still in flight.
    pub fn has_pending(&self, key: &DeviceCategoryKey) -> bool {
        self.chains.lock().contains_key(key)
    }

    /// Wait until every write submitted so far for `key` has finished.
    pub async fn settled(&self, key: &DeviceCategoryKey) {
        let tail = self.chains.lock().get(key).map(|tail| tail.outcome.clone());
        if let Some(tail) = tail {
            let _ = tail.await;
        }
    }

    /// Read `key` once its pending writes have drained.
    pub async fn read_settled(&self, key: &DeviceCategoryKey) -> Result<Vec<LogicalRecord>> {
        self.settled(key).await;
        self.store.read(key).await
    }

    fn submit(&self, key: DeviceCategoryKey, op: WriteOp) -> WriteHandle {
        let kind = match op {
            WriteOp::Purge => WriteKind::Purge,
            WriteOp::Merge(_) => WriteKind::Merge,
        };

        // The chain lock is held until the new tail is recorded, so a write
        // submitted concurrently for the same key always sees this one.
        let mut chains = self.chains.lock();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let predecessor = chains.get(&key).map(|tail| tail.outcome.clone());

        let store = Arc::clone(&self.store);
        let chains_ref = Arc::clone(&self.chains);
        let task = tokio::spawn(async move {
            let predecessor_failed = match predecessor {
                Some(previous) => previous.await.is_err(),
                None => false,
            };

            let outcome = match op {
                WriteOp::Purge => store.delete_range(&key).await,
                WriteOp::Merge(_) if predecessor_failed => {
                    Err(StoreError::predecessor_failed(&key))
                }
                WriteOp::Merge(records) => store.upsert(&key, &records).await,
            };

            match &outcome {
                Ok(count) => tracing::debug!(
                    key = %key,
                    op = kind.as_str(),
                    seq,
                    count,
                    "Store write applied"
                ),
                Err(error) => tracing::warn!(
                    key = %key,
                    op = kind.as_str(),
                    seq,
                    error = %error,
                    "Store write failed"
                ),
            }

            let mut chains = chains_ref.lock();
            if chains.get(&key).is_some_and(|tail| tail.seq == seq) {
                chains.remove(&key);
            }
            outcome
        });

        let outcome = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_error) => Err(StoreError::write_aborted(&key, join_error)),
            }
        }
        .boxed()
        .shared();

        chains.insert(
            key,
            ChainTail {
                seq,
                outcome: outcome.clone(),
            },
        );

        WriteHandle {
            key,
            kind,
            seq,
            outcome,
        }
    }
}
