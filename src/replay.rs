//! Offline replay of captured reply fragments.
//!
//! A capture is a file of back-to-back OpenFlow frames as one device sent them
//! for one statistics request. Replaying starts a live collection and feeds it
//! every captured message with its xid rewritten to the request's, so the
//! store ends up exactly as a real scrape would have left it.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use ofstats_collector::{AggregationDriver, CollectionResult, DeviceSink, FragmentDisposition};
use ofstats_config::RuntimeConfig;
use ofstats_core::{DeviceId, LogicalRecord, SkippedRecords, StatCategory};
use ofstats_wire::{decode_message, frame_len, OfMessage};
use serde::Serialize;

use crate::init::init_reconciler;

/// Split a capture into decoded messages, in order.
pub fn read_capture(data: &[u8]) -> Result<Vec<OfMessage>> {
    let mut messages = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let rest = &data[offset..];
        let Some(len) =
            frame_len(rest).with_context(|| format!("Invalid frame header at byte {offset}"))?
        else {
            bail!(
                "Capture ends in a truncated frame at byte {offset} ({} bytes left)",
                rest.len()
            );
        };
        let message = decode_message(&rest[..len])
            .with_context(|| format!("Failed to decode frame at byte {offset}"))?;
        messages.push(message);
        offset += len;
    }
    Ok(messages)
}

/// Stands in for the device whose replies were captured.
struct CaptureSink;

#[async_trait]
impl DeviceSink for CaptureSink {
    async fn send(&self, device: &DeviceId, frame: Bytes) -> anyhow::Result<()> {
        tracing::debug!(device = %device, bytes = frame.len(), "Request withheld during replay");
        Ok(())
    }
}

/// How the driver disposed of the captured messages
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MessageCounts {
    pub accepted: usize,
    pub unexpected: usize,
    pub late: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    pub device: DeviceId,
    pub category: StatCategory,
    pub xid: u32,
    pub fragments: usize,
    pub records: usize,
    pub skipped: SkippedRecords,
    pub completed_at: DateTime<Utc>,
    pub messages: MessageCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<Vec<LogicalRecord>>,
}

impl ReplayReport {
    fn new(result: CollectionResult, messages: MessageCounts, store: Option<Vec<LogicalRecord>>) -> Self {
        Self {
            device: result.device,
            category: result.category,
            xid: result.xid,
            fragments: result.fragments,
            records: result.records.len(),
            skipped: result.skipped,
            completed_at: result.completed_at,
            messages,
            store,
        }
    }
}

/// Run one collection of `category` fed from `messages`.
///
/// With `dump` set, the report carries the settled store contents for the
/// collected key.
pub async fn replay(
    config: &RuntimeConfig,
    messages: Vec<OfMessage>,
    device: DeviceId,
    category: StatCategory,
    dump: bool,
) -> Result<ReplayReport> {
    let reconciler = init_reconciler(config)?;
    let driver = AggregationDriver::new(&config.collector, reconciler.clone(), Arc::new(CaptureSink));

    let collection = driver.start_collection(device, category);
    let xid = collection.xid();

    let mut counts = MessageCounts::default();
    for mut message in messages {
        message.xid = xid;
        match driver.on_fragment_received(xid, message).await {
            FragmentDisposition::Accepted => counts.accepted += 1,
            FragmentDisposition::Unexpected(_) => counts.unexpected += 1,
            FragmentDisposition::Late | FragmentDisposition::Unknown => counts.late += 1,
        }
    }

    let result = collection
        .await
        .with_context(|| format!("Replayed {category} collection from {device} failed"))?;
    if counts.late > 0 {
        tracing::warn!(late = counts.late, "Capture continues past the final fragment");
    }

    let store = if dump {
        let records = reconciler
            .read_settled(&result.key())
            .await
            .context("Failed to read back the store")?;
        Some(records)
    } else {
        None
    };

    Ok(ReplayReport::new(result, counts, store))
}
