/// MongoDB wire protocol message header.
///
/// Constants and layout are compatible across the MongoDB wire protocol
/// versions that ship both OP_QUERY/OP_GETMORE style traffic and OP_MSG.
use bytes::Buf;

/// Size in bytes of the standard message header.
pub const STANDARD_HEADER_SIZE: usize = 16;

/// MongoDB wire protocol opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Reply,
    Msg,
    Update,
    Insert,
    Query,
    GetMore,
    Delete,
    KillCursors,
    /// Anything not recognized, or a header too short to classify.
    Unknown,
}

impl OpCode {
    pub fn from_i32(code: i32) -> Self {
        match code {
            1 => OpCode::Reply,
            1000 => OpCode::Msg,
            2001 => OpCode::Update,
            2002 => OpCode::Insert,
            2004 => OpCode::Query,
            2005 => OpCode::GetMore,
            2006 => OpCode::Delete,
            2007 => OpCode::KillCursors,
            _ => OpCode::Unknown,
        }
    }

    /// Mutation opcodes are the ones the quota filter is allowed to block.
    pub fn is_mutation(&self) -> bool {
        matches!(self, OpCode::Update | OpCode::Insert)
    }

    /// Dirty opcodes trigger a quota re-check even though some of them
    /// (OP_DELETE) are never themselves blocked.
    pub fn is_dirty(&self) -> bool {
        matches!(self, OpCode::Update | OpCode::Insert | OpCode::Delete)
    }
}

/// A parsed wire protocol message header.
#[derive(Debug, Clone, Copy)]
pub struct MessageHeader {
    pub message_length: i32,
    pub request_id: i32,
    pub response_to: i32,
    pub op_code: OpCode,
}

impl MessageHeader {
    /// Parse the 16-byte standard header. Mirrors the original's
    /// `parseMsgHeader`: a packet shorter than the header size, or one that
    /// otherwise can't be read, yields message_length=0, op_code=Unknown
    /// rather than an error.
    pub fn parse(packet: &[u8]) -> MessageHeader {
        if packet.len() < STANDARD_HEADER_SIZE {
            return MessageHeader {
                message_length: 0,
                request_id: 0,
                response_to: 0,
                op_code: OpCode::Unknown,
            };
        }

        let mut buf = &packet[0..STANDARD_HEADER_SIZE];
        let message_length = buf.get_i32_le();
        let request_id = buf.get_i32_le();
        let response_to = buf.get_i32_le();
        let op_code = OpCode::from_i32(buf.get_i32_le());

        MessageHeader {
            message_length,
            request_id,
            response_to,
            op_code,
        }
    }

    /// Number of body bytes that follow the header, per the claimed
    /// message_length. Does not clamp negative values; callers doing
    /// running length accounting are responsible for that (see
    /// `session::forward`, which clamps to zero on overstated lengths).
    pub fn body_length(&self) -> i64 {
        self.message_length as i64 - STANDARD_HEADER_SIZE as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(message_length: i32, request_id: i32, response_to: i32, op_code: i32) -> Vec<u8> {
        let mut buf = Vec::with_capacity(STANDARD_HEADER_SIZE);
        buf.extend_from_slice(&message_length.to_le_bytes());
        buf.extend_from_slice(&request_id.to_le_bytes());
        buf.extend_from_slice(&response_to.to_le_bytes());
        buf.extend_from_slice(&op_code.to_le_bytes());
        buf
    }

    #[test]
    fn test_parse_insert_header() {
        let bytes = header_bytes(48, 7, 0, 2002);
        let header = MessageHeader::parse(&bytes);
        assert_eq!(header.message_length, 48);
        assert_eq!(header.request_id, 7);
        assert_eq!(header.op_code, OpCode::Insert);
        assert_eq!(header.body_length(), 32);
    }

    #[test]
    fn test_parse_short_packet_is_unknown() {
        let bytes = header_bytes(48, 7, 0, 2002);
        let header = MessageHeader::parse(&bytes[0..15]);
        assert_eq!(header.op_code, OpCode::Unknown);
        assert_eq!(header.message_length, 0);
    }

    #[test]
    fn test_parse_exact_boundary() {
        let bytes = header_bytes(16, 0, 0, 2004);
        let header = MessageHeader::parse(&bytes);
        assert_eq!(header.op_code, OpCode::Query);
    }

    #[test]
    fn test_unrecognized_opcode_is_unknown() {
        assert_eq!(OpCode::from_i32(9999), OpCode::Unknown);
        assert_eq!(OpCode::from_i32(2003), OpCode::Unknown); // reserved
    }

    #[test]
    fn test_mutation_and_dirty_classification() {
        assert!(OpCode::Insert.is_mutation());
        assert!(OpCode::Update.is_mutation());
        assert!(!OpCode::Delete.is_mutation());
        assert!(!OpCode::Query.is_mutation());

        assert!(OpCode::Insert.is_dirty());
        assert!(OpCode::Update.is_dirty());
        assert!(OpCode::Delete.is_dirty());
        assert!(!OpCode::Query.is_dirty());
        assert!(!OpCode::GetMore.is_dirty());
    }
}
