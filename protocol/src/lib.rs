//! Wire protocol between trace producers and the collector.
//!
//! A [`Message`] is the unit of exchange over the named pipe. The framing is
//! length-prefixed: a one byte kind tag, the producer pid, the body length,
//! then exactly that many body bytes. Bodies are opaque to this crate; in
//! practice they carry a serialized trace event.
//!
//! Messages are built right before a write and consumed right after a read.
//! Nothing here is persisted and there is no schema versioning.

use std::io::Read;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("message truncated mid-frame")]
    Truncated,
    #[error("unknown message kind tag {0:#04x}")]
    InvalidKind(u8),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Distinguishes a payload-carrying message from a producer's goodbye.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    Data = 0,
    Stop = 1,
}

impl TryFrom<u8> for MessageKind {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(MessageKind::Data),
            1 => Ok(MessageKind::Stop),
            other => Err(ProtocolError::InvalidKind(other)),
        }
    }
}

/// One framed message.
///
/// `pid` identifies the producer process; the collector uses it to track
/// which producers are still alive. A pid may be reused only after that
/// producer has sent [`MessageKind::Stop`] or disconnected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub pid: i32,
    pub body: Vec<u8>,
}

impl Message {
    pub fn data(pid: i32, body: Vec<u8>) -> Self {
        Message {
            kind: MessageKind::Data,
            pid,
            body,
        }
    }

    /// A stop message carries no body; it only retires the pid.
    pub fn stop(pid: i32) -> Self {
        Message {
            kind: MessageKind::Stop,
            pid,
            body: Vec::new(),
        }
    }
}

/// Encodes a message into its wire form.
///
/// Layout, in order: `[kind: u8][pid: i32 le][length: u64 le][body]`. The
/// length is always the body's current length, so bodies of arbitrary size
/// are supported up to the transport's practical limit.
pub fn encode(msg: &Message) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + 4 + 8 + msg.body.len());
    buf.push(msg.kind as u8);
    buf.extend_from_slice(&msg.pid.to_le_bytes());
    buf.extend_from_slice(&(msg.body.len() as u64).to_le_bytes());
    buf.extend_from_slice(&msg.body);
    buf
}

/// Decodes one message from a byte stream.
///
/// The three fixed-width header fields are read first, then exactly
/// `length` body bytes. Running out of bytes anywhere inside the frame
/// yields [`ProtocolError::Truncated`] rather than a short body.
pub fn decode(reader: &mut impl Read) -> Result<Message> {
    let mut tag = [0u8; 1];
    read_field(reader, &mut tag)?;
    let kind = MessageKind::try_from(tag[0])?;

    let mut pid = [0u8; 4];
    read_field(reader, &mut pid)?;
    let pid = i32::from_le_bytes(pid);

    let mut length = [0u8; 8];
    read_field(reader, &mut length)?;
    let length = u64::from_le_bytes(length) as usize;

    let mut body = vec![0u8; length];
    read_field(reader, &mut body)?;

    Ok(Message { kind, pid, body })
}

fn read_field(reader: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => ProtocolError::Truncated,
        _ => ProtocolError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use std::io::Cursor;

    #[rstest]
    #[case::data_text(Message::data(42, b"hello".to_vec()))]
    #[case::data_empty(Message::data(7, Vec::new()))]
    #[case::data_nul_bytes(Message::data(-3, vec![0, 1, 0, 255, 0]))]
    #[case::data_large(Message::data(i32::MAX, vec![0xAB; 4096]))]
    #[case::stop(Message::stop(1234))]
    fn test_round_trip(#[case] msg: Message) {
        let encoded = encode(&msg);
        let decoded = decode(&mut Cursor::new(encoded)).expect("decode failed");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_encode_layout() {
        let msg = Message::data(0x01020304, b"ab".to_vec());
        let encoded = encode(&msg);

        assert_eq!(encoded[0], 0);
        assert_eq!(&encoded[1..5], &0x01020304i32.to_le_bytes());
        assert_eq!(&encoded[5..13], &2u64.to_le_bytes());
        assert_eq!(&encoded[13..], b"ab");
    }

    #[test]
    fn test_truncated_body() {
        let mut encoded = encode(&Message::data(1, vec![0u8; 100]));
        encoded.truncate(1 + 4 + 8 + 10);

        let err = decode(&mut Cursor::new(encoded)).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated));
    }

    #[rstest]
    #[case::empty(0)]
    #[case::tag_only(1)]
    #[case::partial_pid(3)]
    #[case::partial_length(9)]
    fn test_truncated_header(#[case] available: usize) {
        let mut encoded = encode(&Message::data(99, b"payload".to_vec()));
        encoded.truncate(available);

        let err = decode(&mut Cursor::new(encoded)).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated));
    }

    #[test]
    fn test_invalid_kind_tag() {
        let mut encoded = encode(&Message::stop(5));
        encoded[0] = 0x7F;

        let err = decode(&mut Cursor::new(encoded)).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidKind(0x7F)));
    }

    #[test]
    fn test_decode_consumes_exactly_one_message() {
        let first = Message::data(1, b"first".to_vec());
        let second = Message::stop(1);

        let mut stream = encode(&first);
        stream.extend_from_slice(&encode(&second));

        let mut cursor = Cursor::new(stream);
        assert_eq!(decode(&mut cursor).unwrap(), first);
        assert_eq!(decode(&mut cursor).unwrap(), second);
        assert!(matches!(
            decode(&mut cursor).unwrap_err(),
            ProtocolError::Truncated
        ));
    }
}
