use bytes::Bytes;
use ofstats_wire::{port_no, Action, MessageBody, OfMessage, PacketOut, OFP_NO_BUFFER};

use crate::error::TranslationError;
use crate::ports::port_number;

/// A request to emit one packet through a device port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitPacket {
    /// Connector the packet is considered to have arrived on
    pub ingress: Option<String>,
    pub egress: Option<String>,
    pub buffer_id: Option<u32>,
    pub payload: Bytes,
}

/// Build the PACKET_OUT message for `packet` on the given datapath.
///
/// Without an ingress the packet originates from the controller. The egress
/// must resolve to a port and becomes the single output action.
pub fn to_packet_out(
    packet: &TransmitPacket,
    version: u8,
    xid: u32,
    datapath_id: u64,
) -> Result<OfMessage, TranslationError> {
    let in_port = match &packet.ingress {
        Some(connector) => port_number(datapath_id, connector)?,
        None => port_no::CONTROLLER,
    };
    let egress = packet
        .egress
        .as_deref()
        .ok_or(TranslationError::MissingEgress)?;
    let out_port = port_number(datapath_id, egress)?;

    Ok(OfMessage {
        version,
        xid,
        body: MessageBody::PacketOut(PacketOut {
            buffer_id: packet.buffer_id.unwrap_or(OFP_NO_BUFFER),
            in_port,
            actions: vec![Action::Output {
                port: out_port,
                max_len: 0,
            }],
            data: packet.payload.clone(),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ofstats_wire::OFP_VERSION_1_3;

    fn packet(ingress: Option<&str>, egress: Option<&str>) -> TransmitPacket {
        TransmitPacket {
            ingress: ingress.map(String::from),
            egress: egress.map(String::from),
            buffer_id: None,
            payload: Bytes::from_static(b"payload"),
        }
    }

    fn body(message: OfMessage) -> PacketOut {
        match message.body {
            MessageBody::PacketOut(packet_out) => packet_out,
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn missing_ingress_means_controller() {
        let message =
            to_packet_out(&packet(None, Some("openflow:1:2")), OFP_VERSION_1_3, 5, 1).unwrap();
        assert_eq!(message.xid, 5);
        let packet_out = body(message);
        assert_eq!(packet_out.in_port, port_no::CONTROLLER);
        assert_eq!(packet_out.buffer_id, OFP_NO_BUFFER);
        assert_eq!(
            packet_out.actions,
            vec![Action::Output {
                port: 2,
                max_len: 0
            }]
        );
    }

    #[test]
    fn ingress_connector_is_resolved() {
        let packet_out = body(
            to_packet_out(
                &packet(Some("openflow:1:LOCAL"), Some("openflow:1:FLOOD")),
                OFP_VERSION_1_3,
                1,
                1,
            )
            .unwrap(),
        );
        assert_eq!(packet_out.in_port, port_no::LOCAL);
        assert_eq!(
            packet_out.actions,
            vec![Action::Output {
                port: port_no::FLOOD,
                max_len: 0
            }]
        );
    }

    #[test]
    fn egress_is_required_and_must_resolve() {
        assert_eq!(
            to_packet_out(&packet(None, None), OFP_VERSION_1_3, 1, 1),
            Err(TranslationError::MissingEgress)
        );
        assert!(matches!(
            to_packet_out(&packet(None, Some("openflow:1:0")), OFP_VERSION_1_3, 1, 1),
            Err(TranslationError::UnresolvedPort { port_no: 0, .. })
        ));
    }
}
