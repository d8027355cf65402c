//! SOME/IP message envelope.
//!
//! Header layout (all integers little-endian):
//!
//! ```text
//! service_id: u16 | method_id: u16 | length: u32 | client_id: u16 |
//! session_id: u16 | protocol_version: u8 | interface_version: u8 |
//! message_type: u8 | return_code: u8 | payload: [u8; length - 8]
//! ```
//!
//! `length` counts everything after the length field itself, so it is
//! always `8 + payload.len()`.

use std::convert::TryFrom;
use thiserror::Error;

/// Fixed header size in bytes.
pub const HEADER_LEN: usize = 16;

/// `length` covers the second half of the header plus the payload.
pub const LENGTH_BASE: u32 = 8;

/// Upper bound for a single frame (header + payload).
pub const MAX_FRAME_LEN: usize = 64 * 1024;

pub const PROTOCOL_VERSION: u8 = 1;
pub const INTERFACE_VERSION: u8 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("message truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("declared length {0} is shorter than the header remainder")]
    BadLength(u32),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    Oversized(usize),
    #[error("unknown message type 0x{0:02x}")]
    UnknownMessageType(u8),
    #[error("unknown return code 0x{0:02x}")]
    UnknownReturnCode(u8),
    #[error("trailing bytes after payload")]
    TrailingBytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Request = 0x00,
    RequestNoReturn = 0x01,
    Notification = 0x02,
    Response = 0x80,
    Error = 0x81,
}

impl TryFrom<u8> for MessageType {
    type Error = WireError;

    fn try_from(raw: u8) -> Result<Self, WireError> {
        match raw {
            0x00 => Ok(MessageType::Request),
            0x01 => Ok(MessageType::RequestNoReturn),
            0x02 => Ok(MessageType::Notification),
            0x80 => Ok(MessageType::Response),
            0x81 => Ok(MessageType::Error),
            other => Err(WireError::UnknownMessageType(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReturnCode {
    Ok = 0x00,
    NotOk = 0x01,
    UnknownMethod = 0x03,
    NotReady = 0x04,
    Timeout = 0x06,
    MalformedMessage = 0x09,
    WrongMessageType = 0x0A,
}

impl TryFrom<u8> for ReturnCode {
    type Error = WireError;

    fn try_from(raw: u8) -> Result<Self, WireError> {
        match raw {
            0x00 => Ok(ReturnCode::Ok),
            0x01 => Ok(ReturnCode::NotOk),
            0x03 => Ok(ReturnCode::UnknownMethod),
            0x04 => Ok(ReturnCode::NotReady),
            0x06 => Ok(ReturnCode::Timeout),
            0x09 => Ok(ReturnCode::MalformedMessage),
            0x0A => Ok(ReturnCode::WrongMessageType),
            other => Err(WireError::UnknownReturnCode(other)),
        }
    }
}

/// A single SOME/IP message, header fields plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub service_id: u16,
    pub method_id: u16,
    pub client_id: u16,
    pub session_id: u16,
    pub protocol_version: u8,
    pub interface_version: u8,
    pub message_type: MessageType,
    pub return_code: ReturnCode,
    pub payload: Vec<u8>,
}

impl Message {
    /// A request with the current protocol/interface versions filled in.
    pub fn request(
        service_id: u16,
        method_id: u16,
        client_id: u16,
        session_id: u16,
        payload: Vec<u8>,
    ) -> Message {
        Message {
            service_id,
            method_id,
            client_id,
            session_id,
            protocol_version: PROTOCOL_VERSION,
            interface_version: INTERFACE_VERSION,
            message_type: MessageType::Request,
            return_code: ReturnCode::Ok,
            payload,
        }
    }

    /// A notification carries no session correlation.
    pub fn notification(service_id: u16, event_id: u16, payload: Vec<u8>) -> Message {
        Message {
            service_id,
            method_id: event_id,
            client_id: 0,
            session_id: 0,
            protocol_version: PROTOCOL_VERSION,
            interface_version: INTERFACE_VERSION,
            message_type: MessageType::Notification,
            return_code: ReturnCode::Ok,
            payload,
        }
    }

    /// A response echoing the request's correlation fields.
    pub fn response_to(request: &Message, payload: Vec<u8>) -> Message {
        Message {
            service_id: request.service_id,
            method_id: request.method_id,
            client_id: request.client_id,
            session_id: request.session_id,
            protocol_version: PROTOCOL_VERSION,
            interface_version: INTERFACE_VERSION,
            message_type: MessageType::Response,
            return_code: ReturnCode::Ok,
            payload,
        }
    }

    /// An error response echoing the request's correlation fields.
    pub fn error_to(request: &Message, code: ReturnCode) -> Message {
        Message {
            service_id: request.service_id,
            method_id: request.method_id,
            client_id: request.client_id,
            session_id: request.session_id,
            protocol_version: PROTOCOL_VERSION,
            interface_version: INTERFACE_VERSION,
            message_type: MessageType::Error,
            return_code: code,
            payload: Vec::new(),
        }
    }

    /// Wire value of the `length` header field.
    pub fn wire_length(&self) -> u32 {
        LENGTH_BASE + self.payload.len() as u32
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.service_id.to_le_bytes());
        out.extend_from_slice(&self.method_id.to_le_bytes());
        out.extend_from_slice(&self.wire_length().to_le_bytes());
        out.extend_from_slice(&self.client_id.to_le_bytes());
        out.extend_from_slice(&self.session_id.to_le_bytes());
        out.push(self.protocol_version);
        out.push(self.interface_version);
        out.push(self.message_type as u8);
        out.push(self.return_code as u8);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Decode a complete message from `buf`. The buffer must contain exactly
    /// one message; trailing bytes are rejected.
    pub fn decode(buf: &[u8]) -> Result<Message, WireError> {
        if buf.len() < HEADER_LEN {
            return Err(WireError::Truncated {
                need: HEADER_LEN,
                have: buf.len(),
            });
        }
        let length = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        if length < LENGTH_BASE {
            return Err(WireError::BadLength(length));
        }
        let total = 8 + length as usize;
        if total > MAX_FRAME_LEN {
            return Err(WireError::Oversized(total));
        }
        if buf.len() < total {
            return Err(WireError::Truncated {
                need: total,
                have: buf.len(),
            });
        }
        if buf.len() > total {
            return Err(WireError::TrailingBytes);
        }
        Ok(Message {
            service_id: u16::from_le_bytes([buf[0], buf[1]]),
            method_id: u16::from_le_bytes([buf[2], buf[3]]),
            client_id: u16::from_le_bytes([buf[8], buf[9]]),
            session_id: u16::from_le_bytes([buf[10], buf[11]]),
            protocol_version: buf[12],
            interface_version: buf[13],
            message_type: MessageType::try_from(buf[14])?,
            return_code: ReturnCode::try_from(buf[15])?,
            payload: buf[HEADER_LEN..total].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Message {
        Message::request(0x1002, 0x0001, 0x0100, 7, vec![0x00, 0x01])
    }

    #[test]
    fn round_trip() {
        let msg = sample();
        let bytes = msg.encode();
        assert_eq!(bytes.len(), HEADER_LEN + 2);
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn length_field_counts_tail_and_payload() {
        let bytes = sample().encode();
        let length = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        assert_eq!(length, 10);
    }

    #[test]
    fn truncated_header_is_rejected() {
        let bytes = sample().encode();
        let err = Message::decode(&bytes[..10]).unwrap_err();
        assert_eq!(
            err,
            WireError::Truncated {
                need: HEADER_LEN,
                have: 10
            }
        );
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let bytes = sample().encode();
        let err = Message::decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, WireError::Truncated { .. }));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = sample().encode();
        bytes.push(0xFF);
        assert_eq!(Message::decode(&bytes).unwrap_err(), WireError::TrailingBytes);
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let mut bytes = sample().encode();
        bytes[14] = 0x55;
        assert_eq!(
            Message::decode(&bytes).unwrap_err(),
            WireError::UnknownMessageType(0x55)
        );
    }

    #[test]
    fn unknown_return_code_is_rejected() {
        let mut bytes = sample().encode();
        bytes[15] = 0x2F;
        assert_eq!(
            Message::decode(&bytes).unwrap_err(),
            WireError::UnknownReturnCode(0x2F)
        );
    }

    #[test]
    fn declared_length_below_base_is_rejected() {
        let mut bytes = sample().encode();
        bytes[4..8].copy_from_slice(&3u32.to_le_bytes());
        assert_eq!(Message::decode(&bytes).unwrap_err(), WireError::BadLength(3));
    }

    #[test]
    fn error_response_echoes_correlation() {
        let req = sample();
        let err = Message::error_to(&req, ReturnCode::MalformedMessage);
        assert_eq!(err.client_id, req.client_id);
        assert_eq!(err.session_id, req.session_id);
        assert_eq!(err.message_type, MessageType::Error);
        assert!(err.payload.is_empty());
    }
}
