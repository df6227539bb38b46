use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use metrics::counter;
use ofstats_config::CollectorConfig;
use ofstats_core::{
    DeviceCategoryKey, DeviceId, FragmentTranslator, ReplyClassifier, StatCategory,
    TranslationError,
};
use ofstats_store::Reconciler;
use ofstats_wire::{
    decode_message, encode_message, DeserializerRegistry, FlowStatsRequest, MessageBody,
    MultipartRequest, OfMessage,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::collection::CollectionFuture;
use crate::error::{CollectError, CollectFailure, Stage};
use crate::recent::RecentXids;
use crate::request::RequestActor;
use crate::sink::DeviceSink;

/// What the driver did with a message handed to it by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentDisposition {
    /// Queued for the live request with this xid
    Accepted,
    /// The xid is live but the message is not a reply for its category; the
    /// caller may route it elsewhere
    Unexpected(OfMessage),
    /// No request with this xid is known
    Unknown,
    /// The request with this xid already completed or failed
    Late,
}

struct LiveRequest {
    key: DeviceCategoryKey,
    classifier: ReplyClassifier,
    fragments: mpsc::Sender<OfMessage>,
    /// A fragment without the continuation flag was already queued
    final_queued: bool,
}

struct Requests {
    live: HashMap<u32, LiveRequest>,
    /// xid of the live request for each key; at most one per key
    by_key: HashMap<DeviceCategoryKey, u32>,
    recent: RecentXids,
}

struct DriverInner {
    sink: Arc<dyn DeviceSink>,
    reconciler: Reconciler,
    registry: Arc<DeserializerRegistry>,
    fragment_timeout: Duration,
    queue_depth: usize,
    next_xid: AtomicU32,
    requests: Mutex<Requests>,
}

impl DriverInner {
    fn retire(&self, xid: u32) {
        let mut requests = self.requests.lock();
        if let Some(live) = requests.live.remove(&xid) {
            if requests.by_key.get(&live.key) == Some(&xid) {
                requests.by_key.remove(&live.key);
            }
        }
        requests.recent.remember(xid);
    }
}

/// Correlates multipart replies with the collections that asked for them.
///
/// Each [`start_collection`](Self::start_collection) spawns one task that owns
/// the request until it completes, fails or times out. The transport feeds
/// every decoded message to [`on_fragment_received`](Self::on_fragment_received).
///
/// Dropping the last clone of the driver fails every live collection with
/// [`Stage::Shutdown`].
#[derive(Clone)]
pub struct AggregationDriver {
    inner: Arc<DriverInner>,
}

impl AggregationDriver {
    pub fn new(config: &CollectorConfig, reconciler: Reconciler, sink: Arc<dyn DeviceSink>) -> Self {
        Self::with_registry(
            config,
            reconciler,
            sink,
            Arc::new(DeserializerRegistry::default()),
        )
    }

    /// Driver whose flow translation resolves instructions through `registry`.
    pub fn with_registry(
        config: &CollectorConfig,
        reconciler: Reconciler,
        sink: Arc<dyn DeviceSink>,
        registry: Arc<DeserializerRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(DriverInner {
                sink,
                reconciler,
                registry,
                fragment_timeout: config.fragment_timeout(),
                queue_depth: config.queue_depth.max(1),
                next_xid: AtomicU32::new(1),
                requests: Mutex::new(Requests {
                    live: HashMap::new(),
                    by_key: HashMap::new(),
                    recent: RecentXids::new(config.late_xid_memory),
                }),
            }),
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.inner.reconciler
    }

    /// Number of collections not yet terminal
    pub fn live_requests(&self) -> usize {
        self.inner.requests.lock().live.len()
    }

    /// Start one logical collection of `category` from `device`.
    ///
    /// Must be called within a Tokio runtime. Categories without a translation
    /// resolve immediately with a [`Stage::Encode`] error. Only one collection
    /// per device and category may be live; starting another before it is
    /// terminal resolves immediately with a [`Stage::Register`] error and sends
    /// nothing.
    pub fn start_collection(&self, device: DeviceId, category: StatCategory) -> CollectionFuture {
        let key = DeviceCategoryKey::new(device, category);
        let (result_tx, result_rx) = oneshot::channel();

        let Some(request) = collection_request(category) else {
            let xid = self.inner.next_xid.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(device = %device, category = category.as_str(), "Category cannot be collected");
            let _ = result_tx.send(Err(CollectError::new(
                device,
                category,
                xid,
                Stage::Encode,
                TranslationError::UnsupportedCategory(category),
            )));
            return CollectionFuture::new(key, xid, result_rx);
        };

        let (fragments_tx, fragments_rx) = mpsc::channel(self.inner.queue_depth);
        let xid = match self.register(key, fragments_tx) {
            Ok(xid) => xid,
            Err(live_xid) => {
                let xid = self.inner.next_xid.fetch_add(1, Ordering::Relaxed);
                counter!("ofstats.collections", "category" => category.as_str(), "outcome" => "rejected")
                    .increment(1);
                tracing::warn!(key = %key, live_xid, "Collection already in progress");
                let _ = result_tx.send(Err(CollectError::new(
                    device,
                    category,
                    xid,
                    Stage::Register,
                    CollectFailure::InProgress(live_xid),
                )));
                return CollectionFuture::new(key, xid, result_rx);
            }
        };
        let frame = encode_message(&OfMessage::new(xid, MessageBody::MultipartRequest(request)));

        tracing::debug!(
            device = %device,
            category = category.as_str(),
            xid,
            bytes = frame.len(),
            "Starting collection"
        );

        let actor = RequestActor::new(
            xid,
            key,
            FragmentTranslator::with_registry(category, Arc::clone(&self.inner.registry)),
            self.inner.reconciler.clone(),
            self.inner.fragment_timeout,
            fragments_rx,
        );
        let sink = Arc::clone(&self.inner.sink);
        let driver: Weak<DriverInner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            let outcome = actor.run(frame, sink).await;
            if let Some(driver) = driver.upgrade() {
                driver.retire(xid);
            }
            let _ = result_tx.send(outcome);
        });

        CollectionFuture::new(key, xid, result_rx)
    }

    /// Hand a decoded message from the transport to the request it belongs to.
    ///
    /// Correlation and classification happen before anything is queued, so a
    /// fragment following the final one is `Late` even while the request is
    /// still applying its writes. Waits only when the request's fragment queue
    /// is full.
    pub async fn on_fragment_received(&self, xid: u32, message: OfMessage) -> FragmentDisposition {
        let (key, fragments) = {
            let mut guard = self.inner.requests.lock();
            let requests = &mut *guard;
            match requests.live.get_mut(&xid) {
                Some(live) if !live.classifier.is_expected_reply(&message) => {
                    counter!("ofstats.fragments.dropped", "reason" => "unexpected").increment(1);
                    tracing::debug!(
                        key = %live.key,
                        xid,
                        "Message is not a reply for this collection"
                    );
                    return FragmentDisposition::Unexpected(message);
                }
                Some(live) if live.final_queued => {
                    counter!("ofstats.fragments.dropped", "reason" => "late").increment(1);
                    tracing::warn!(key = %live.key, xid, "Dropping fragment after the final one");
                    return FragmentDisposition::Late;
                }
                Some(live) => {
                    live.final_queued = !live.classifier.wants_more(&message);
                    (live.key, live.fragments.clone())
                }
                None if requests.recent.contains(xid) => {
                    counter!("ofstats.fragments.dropped", "reason" => "late").increment(1);
                    tracing::warn!(xid, "Dropping fragment for a finished collection");
                    return FragmentDisposition::Late;
                }
                None => {
                    counter!("ofstats.fragments.dropped", "reason" => "unknown").increment(1);
                    tracing::debug!(xid, "Dropping fragment with unknown xid");
                    return FragmentDisposition::Unknown;
                }
            }
        };

        match fragments.send(message).await {
            Ok(()) => FragmentDisposition::Accepted,
            Err(_) => {
                counter!("ofstats.fragments.dropped", "reason" => "late").increment(1);
                tracing::warn!(key = %key, xid, "Dropping fragment for a finished collection");
                FragmentDisposition::Late
            }
        }
    }

    /// Decode one complete OpenFlow frame and route it by its xid.
    pub async fn on_frame_received(&self, frame: &[u8]) -> ofstats_wire::Result<FragmentDisposition> {
        let message = decode_message(frame)?;
        Ok(self.on_fragment_received(message.xid, message).await)
    }

    /// Allocate an xid and make `key` live, or return the xid already live for it.
    fn register(&self, key: DeviceCategoryKey, fragments: mpsc::Sender<OfMessage>) -> Result<u32, u32> {
        let mut requests = self.inner.requests.lock();
        if let Some(&live_xid) = requests.by_key.get(&key) {
            return Err(live_xid);
        }
        // Skip ids still live after the counter wraps.
        let xid = loop {
            let candidate = self.inner.next_xid.fetch_add(1, Ordering::Relaxed);
            if !requests.live.contains_key(&candidate) {
                break candidate;
            }
        };
        requests.live.insert(
            xid,
            LiveRequest {
                key,
                classifier: ReplyClassifier::new(key.category),
                fragments,
                final_queued: false,
            },
        );
        requests.by_key.insert(key, xid);
        Ok(xid)
    }
}

/// Request asking a device for every entry of `category`.
fn collection_request(category: StatCategory) -> Option<MultipartRequest> {
    match category {
        StatCategory::Flow => Some(MultipartRequest::flow_stats(&FlowStatsRequest::default())),
        StatCategory::Port => Some(MultipartRequest::all_ports()),
        StatCategory::Table => Some(MultipartRequest::table_stats()),
        StatCategory::Group | StatCategory::Meter | StatCategory::Queue => None,
    }
}
