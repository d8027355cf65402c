//! Length-delimited framing of SOME/IP messages over TCP.
//!
//! The stream is a plain concatenation of encoded messages; the header's
//! `length` field is the only framing information. A malformed header is not
//! recoverable, so codec errors fail the connection.

use crate::message::{HEADER_LEN, LENGTH_BASE, MAX_FRAME_LEN, Message};
use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

#[derive(Debug, Default, Clone, Copy)]
pub struct SomeipCodec;

impl Decoder for SomeipCodec {
    type Item = Message;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, io::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        let length = u32::from_le_bytes([src[4], src[5], src[6], src[7]]);
        if length < LENGTH_BASE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("declared length {length} below minimum"),
            ));
        }
        let total = 8 + length as usize;
        if total > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame of {total} bytes exceeds limit"),
            ));
        }
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        let frame = src.copy_to_bytes(total);
        Message::decode(&frame).map(Some).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, e.to_string())
        })
    }
}

impl Encoder<Message> for SomeipCodec {
    type Error = io::Error;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.put_slice(&msg.encode());
        Ok(())
    }
}
