use async_trait::async_trait;
use bytes::Bytes;
use ofstats_core::DeviceId;

/// Transport towards devices.
///
/// Receives fully encoded OpenFlow messages. Replies come back through
/// [`AggregationDriver::on_fragment_received`](crate::AggregationDriver::on_fragment_received).
#[async_trait]
pub trait DeviceSink: Send + Sync + 'static {
    async fn send(&self, device: &DeviceId, frame: Bytes) -> anyhow::Result<()>;
}
