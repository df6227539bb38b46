//! The actor that owns one logical request.
//!
//! Fragments reach it through a bounded queue in arrival order and are handled
//! one at a time, so translation and write submission never interleave within
//! a request. Store writes go through the [`Reconciler`] and are watched while
//! later fragments are still arriving; the first failing write fails the
//! request without waiting for the last fragment.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use ofstats_core::{
    CycleTracker, DeviceCategoryKey, FragmentTranslator, LogicalRecord, ReplyClassifier,
    SkippedRecords,
};
use ofstats_store::{Reconciler, WriteHandle};
use ofstats_wire::OfMessage;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::collection::{CollectionResult, Outcome};
use crate::error::{CollectError, CollectFailure, Stage};
use crate::sink::DeviceSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CollectState {
    AwaitingFirst,
    Collecting,
    Complete,
    Failed,
}

impl CollectState {
    fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingFirst => "awaiting_first",
            Self::Collecting => "collecting",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

enum Step {
    Continue,
    LastFragment,
}

pub(crate) struct RequestActor {
    xid: u32,
    key: DeviceCategoryKey,
    classifier: ReplyClassifier,
    cycle: CycleTracker,
    translator: FragmentTranslator,
    reconciler: Reconciler,
    fragment_timeout: Duration,
    fragments: mpsc::Receiver<OfMessage>,
    state: CollectState,
    pending: VecDeque<WriteHandle>,
    records: Vec<LogicalRecord>,
    skipped: SkippedRecords,
    fragment_count: usize,
}

impl RequestActor {
    pub fn new(
        xid: u32,
        key: DeviceCategoryKey,
        translator: FragmentTranslator,
        reconciler: Reconciler,
        fragment_timeout: Duration,
        fragments: mpsc::Receiver<OfMessage>,
    ) -> Self {
        Self {
            xid,
            key,
            classifier: ReplyClassifier::new(key.category),
            cycle: CycleTracker::new(),
            translator,
            reconciler,
            fragment_timeout,
            fragments,
            state: CollectState::AwaitingFirst,
            pending: VecDeque::new(),
            records: Vec::new(),
            skipped: SkippedRecords::default(),
            fragment_count: 0,
        }
    }

    /// Send the request and drive the collection to a terminal state.
    pub async fn run(mut self, request: Bytes, sink: Arc<dyn DeviceSink>) -> Outcome {
        let outcome = self.collect(request, sink.as_ref()).await;
        self.fragments.close();
        let category = self.key.category.as_str();

        match &outcome {
            Ok(result) => {
                self.state = CollectState::Complete;
                counter!("ofstats.collections", "category" => category, "outcome" => "completed")
                    .increment(1);
                counter!("ofstats.records.merged", "category" => category)
                    .increment(result.records.len() as u64);
                tracing::info!(
                    device = %self.key.device,
                    category,
                    xid = self.xid,
                    fragments = result.fragments,
                    records = result.records.len(),
                    skipped = result.skipped.total(),
                    "Collection complete"
                );
            }
            Err(error) => {
                let reached = self.state;
                self.state = CollectState::Failed;
                counter!("ofstats.collections", "category" => category, "outcome" => "failed")
                    .increment(1);
                tracing::error!(
                    device = %self.key.device,
                    category,
                    xid = self.xid,
                    stage = %error.stage,
                    state = reached.as_str(),
                    fragments = self.fragment_count,
                    error = %error.source,
                    "Collection failed"
                );
            }
        }
        outcome
    }

    async fn collect(&mut self, request: Bytes, sink: &dyn DeviceSink) -> Outcome {
        // Armed at registration so a device that never answers still times out.
        let deadline = time::sleep(self.fragment_timeout);
        tokio::pin!(deadline);

        tokio::select! {
            sent = sink.send(&self.key.device, request) => {
                if let Err(error) = sent {
                    return Err(self.fail(Stage::Send, CollectFailure::Sink(format!("{error:#}"))));
                }
            }
            () = &mut deadline => return Err(self.timed_out()),
        }

        loop {
            tokio::select! {
                biased;
                written = next_write(&mut self.pending) => {
                    if let Err(error) = written {
                        return Err(self.fail(Stage::Store, error));
                    }
                }
                message = self.fragments.recv() => {
                    let Some(message) = message else {
                        return Err(self.fail(Stage::Shutdown, CollectFailure::Shutdown));
                    };
                    deadline.as_mut().reset(Instant::now() + self.fragment_timeout);
                    if let Step::LastFragment = self.on_fragment(&message)? {
                        break;
                    }
                }
                () = &mut deadline => return Err(self.timed_out()),
            }
        }

        // Anything still addressed to this xid is late from here on.
        self.fragments.close();

        // Resolve only once the cycle's writes are all applied.
        while let Some(handle) = self.pending.pop_front() {
            if let Err(error) = handle.await {
                return Err(self.fail(Stage::Store, error));
            }
        }

        Ok(CollectionResult {
            device: self.key.device,
            category: self.key.category,
            xid: self.xid,
            records: std::mem::take(&mut self.records),
            skipped: self.skipped,
            fragments: self.fragment_count,
            completed_at: chrono::Utc::now(),
        })
    }

    fn on_fragment(&mut self, message: &OfMessage) -> Result<Step, CollectError> {
        let Some(reply) = self.classifier.expected(message) else {
            tracing::debug!(
                device = %self.key.device,
                category = self.key.category.as_str(),
                xid = self.xid,
                "Ignoring message that is not a reply for this category"
            );
            return Ok(Step::Continue);
        };

        let purge = self.cycle.consume_virgin();
        let translation = self
            .translator
            .translate(&reply.body, &self.key.device)
            .map_err(|error| self.fail(Stage::Translate, error))?;

        self.fragment_count += 1;
        let record_count = translation.records.len();
        let category = self.key.category.as_str();
        counter!("ofstats.fragments", "category" => category).increment(1);

        if translation.skipped.has_skipped() {
            counter!("ofstats.records.skipped", "category" => category)
                .increment(translation.skipped.total() as u64);
            tracing::warn!(
                device = %self.key.device,
                category,
                xid = self.xid,
                malformed = translation.skipped.malformed,
                unresolved_ports = translation.skipped.unresolved_ports,
                "Skipped records in fragment"
            );
        }

        if purge {
            self.pending.push_back(self.reconciler.purge_stale(self.key));
        }
        self.pending
            .push_back(self.reconciler.merge(self.key, translation.records.clone()));
        self.records.extend(translation.records);
        self.skipped += translation.skipped;
        self.state = CollectState::Collecting;

        let more = self.classifier.wants_more(message);
        tracing::debug!(
            device = %self.key.device,
            category,
            xid = self.xid,
            fragment = self.fragment_count,
            records = record_count,
            purge,
            more,
            "Processed fragment"
        );

        Ok(if more {
            Step::Continue
        } else {
            Step::LastFragment
        })
    }

    fn timed_out(&self) -> CollectError {
        self.fail(Stage::Timeout, CollectFailure::Timeout(self.fragment_timeout))
    }

    fn fail(&self, stage: Stage, source: impl Into<CollectFailure>) -> CollectError {
        CollectError::new(self.key.device, self.key.category, self.xid, stage, source)
    }
}

/// Outcome of the oldest unfinished write; never resolves while none is queued.
///
/// Writes for one key finish in submission order, so the front is always the
/// first to fail.
async fn next_write(pending: &mut VecDeque<WriteHandle>) -> ofstats_store::Result<usize> {
    match pending.front_mut() {
        Some(handle) => {
            let outcome = handle.await;
            pending.pop_front();
            outcome
        }
        None => std::future::pending().await,
    }
}
