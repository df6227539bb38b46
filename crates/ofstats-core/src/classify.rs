use ofstats_wire::{MultipartReply, MultipartType, OfMessage};

use crate::model::StatCategory;

/// Decides whether a decoded message is a reply fragment for one category.
///
/// Configured per category instead of specialised per reply type; a mismatch
/// means the message belongs to another exchange and is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyClassifier {
    category: StatCategory,
    expected: MultipartType,
}

impl ReplyClassifier {
    pub fn new(category: StatCategory) -> Self {
        Self {
            category,
            expected: category.multipart_type(),
        }
    }

    pub fn category(&self) -> StatCategory {
        self.category
    }

    /// The reply carried by `message`, if it is one this classifier expects.
    pub fn expected<'a>(&self, message: &'a OfMessage) -> Option<&'a MultipartReply> {
        message
            .as_multipart_reply()
            .filter(|reply| reply.mp_type == self.expected)
    }

    pub fn is_expected_reply(&self, message: &OfMessage) -> bool {
        self.expected(message).is_some()
    }

    /// Continuation flag of `message`; false for anything that is not a reply.
    pub fn wants_more(&self, message: &OfMessage) -> bool {
        message
            .as_multipart_reply()
            .is_some_and(MultipartReply::request_more)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ofstats_wire::{MessageBody, MultipartRequest, OFPMPF_REQ_MORE};

    fn reply(mp_type: MultipartType, flags: u16) -> OfMessage {
        OfMessage::new(
            3,
            MessageBody::MultipartReply(MultipartReply {
                mp_type,
                flags,
                body: Bytes::new(),
            }),
        )
    }

    #[test]
    fn matches_only_its_own_category() {
        let flows = ReplyClassifier::new(StatCategory::Flow);
        assert!(flows.is_expected_reply(&reply(MultipartType::Flow, 0)));
        assert!(!flows.is_expected_reply(&reply(MultipartType::PortStats, 0)));

        let ports = ReplyClassifier::new(StatCategory::Port);
        assert!(ports.is_expected_reply(&reply(MultipartType::PortStats, 0)));
    }

    #[test]
    fn requests_are_never_expected_replies() {
        let message = OfMessage::new(
            3,
            MessageBody::MultipartRequest(MultipartRequest::table_stats()),
        );
        let classifier = ReplyClassifier::new(StatCategory::Table);
        assert!(!classifier.is_expected_reply(&message));
        assert!(!classifier.wants_more(&message));
    }

    #[test]
    fn wants_more_follows_flag() {
        let classifier = ReplyClassifier::new(StatCategory::Flow);
        assert!(classifier.wants_more(&reply(MultipartType::Flow, OFPMPF_REQ_MORE)));
        assert!(!classifier.wants_more(&reply(MultipartType::Flow, 0)));
    }
}
