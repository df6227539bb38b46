// Integration tests for ofstats-core
//
// Drives encoded reply messages through classification and translation

use bytes::{Bytes, BytesMut};
use ofstats_core::{
    CycleTracker, DeviceId, FragmentTranslator, LogicalRecord, ReplyClassifier, StatCategory,
};
use ofstats_wire::{
    decode_message, encode_message, Action, FlowStatsEntry, Instruction, MessageBody,
    MultipartReply, MultipartType, OfMessage, OxmField, OxmMatch, OFPMPF_REQ_MORE,
};

fn flow_entry(priority: u16) -> FlowStatsEntry {
    FlowStatsEntry {
        table_id: 0,
        duration_sec: 30,
        duration_nsec: 0,
        priority,
        idle_timeout: 0,
        hard_timeout: 0,
        flags: 0,
        cookie: priority as u64,
        packet_count: 10,
        byte_count: 640,
        match_: OxmMatch::new(vec![OxmField::InPort(1), OxmField::EthType(0x0806)]),
        instructions: vec![Instruction::ApplyActions(vec![Action::Output {
            port: 2,
            max_len: 0,
        }])],
    }
}

/// One flow entry whose match type is not OXM, so it frames but fails to decode.
fn malformed_entry() -> BytesMut {
    let mut buf = BytesMut::new();
    flow_entry(999).encode(&mut buf);
    buf[48] = 0;
    buf[49] = 0;
    buf
}

fn reply_frame(xid: u32, flags: u16, body: Bytes) -> Bytes {
    encode_message(&OfMessage::new(
        xid,
        MessageBody::MultipartReply(MultipartReply {
            mp_type: MultipartType::Flow,
            flags,
            body,
        }),
    ))
}

#[test]
fn single_fragment_with_one_malformed_entry() {
    let mut body = BytesMut::new();
    flow_entry(1).encode(&mut body);
    flow_entry(2).encode(&mut body);
    body.extend_from_slice(&malformed_entry());
    flow_entry(3).encode(&mut body);
    flow_entry(4).encode(&mut body);

    let message = decode_message(&reply_frame(11, 0, body.freeze())).unwrap();
    let classifier = ReplyClassifier::new(StatCategory::Flow);
    let reply = classifier.expected(&message).expect("flow reply");
    assert!(!classifier.wants_more(&message));

    let translation = FragmentTranslator::new(StatCategory::Flow)
        .translate(&reply.body, &DeviceId::new(1))
        .unwrap();
    assert_eq!(translation.records.len(), 4);
    assert_eq!(translation.skipped.total(), 1);
    assert_eq!(translation.skipped.malformed, 1);

    let priorities: Vec<u16> = translation
        .records
        .iter()
        .map(|record| match record {
            LogicalRecord::Flow(flow) => flow.priority,
            other => panic!("unexpected record {other:?}"),
        })
        .collect();
    assert_eq!(priorities, vec![1, 2, 3, 4]);
}

#[test]
fn translating_the_same_body_twice_is_identical() {
    let mut body = BytesMut::new();
    for priority in 0..5 {
        flow_entry(priority).encode(&mut body);
    }
    body.extend_from_slice(&malformed_entry());
    let body = body.freeze();

    let translator = FragmentTranslator::new(StatCategory::Flow);
    let first = translator.translate(&body, &DeviceId::new(9)).unwrap();
    let second = translator.translate(&body, &DeviceId::new(9)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn only_the_first_fragment_opens_the_cycle() {
    let tracker = CycleTracker::new();
    let classifier = ReplyClassifier::new(StatCategory::Flow);
    let flags = [OFPMPF_REQ_MORE, OFPMPF_REQ_MORE, 0];

    let mut purges = 0;
    for flag in flags {
        let message = decode_message(&reply_frame(3, flag, Bytes::new())).unwrap();
        assert!(classifier.is_expected_reply(&message));
        if tracker.consume_virgin() {
            purges += 1;
        }
    }
    assert_eq!(purges, 1);
}

#[test]
fn port_reply_is_not_a_flow_fragment() {
    let message = OfMessage::new(
        4,
        MessageBody::MultipartReply(MultipartReply {
            mp_type: MultipartType::PortStats,
            flags: 0,
            body: Bytes::new(),
        }),
    );
    assert!(!ReplyClassifier::new(StatCategory::Flow).is_expected_reply(&message));
}
