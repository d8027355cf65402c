//! Service-discovery entries.
//!
//! SD messages reuse the plain message envelope with the reserved service id
//! `0xFFFF` and method id `0x8100`, carried as notifications over UDP. The
//! payload is a concatenation of fixed-size 14-byte entries:
//!
//! ```text
//! entry_type: u8 | service_id: u16 | instance_id: u16 | major: u8 |
//! ttl_secs: u32 | port: u16 | aux: u16
//! ```
//!
//! For offers `port` is the service's TCP method port and `aux` is reserved
//! zero; a withdrawal is an offer with `ttl_secs = 0`. For subscribes `port`
//! is the subscriber's UDP notification port and `aux` is the event-group id;
//! acks echo the subscribe entry.

use crate::message::{Message, WireError};
use std::convert::TryFrom;

pub const SD_SERVICE_ID: u16 = 0xFFFF;
pub const SD_METHOD_ID: u16 = 0x8100;

const ENTRY_LEN: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SdEntryType {
    OfferService = 0x01,
    Subscribe = 0x06,
    SubscribeAck = 0x07,
}

impl TryFrom<u8> for SdEntryType {
    type Error = WireError;

    fn try_from(raw: u8) -> Result<Self, WireError> {
        match raw {
            0x01 => Ok(SdEntryType::OfferService),
            0x06 => Ok(SdEntryType::Subscribe),
            0x07 => Ok(SdEntryType::SubscribeAck),
            other => Err(WireError::UnknownMessageType(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdEntry {
    pub entry_type: SdEntryType,
    pub service_id: u16,
    pub instance_id: u16,
    pub major_version: u8,
    pub ttl_secs: u32,
    pub port: u16,
    /// Event-group id for subscribe/ack entries, reserved zero for offers.
    pub aux: u16,
}

impl SdEntry {
    pub fn offer(
        service_id: u16,
        instance_id: u16,
        major_version: u8,
        ttl_secs: u32,
        port: u16,
    ) -> SdEntry {
        SdEntry {
            entry_type: SdEntryType::OfferService,
            service_id,
            instance_id,
            major_version,
            ttl_secs,
            port,
            aux: 0,
        }
    }

    pub fn subscribe(
        service_id: u16,
        instance_id: u16,
        major_version: u8,
        event_group: u16,
        notify_port: u16,
    ) -> SdEntry {
        SdEntry {
            entry_type: SdEntryType::Subscribe,
            service_id,
            instance_id,
            major_version,
            ttl_secs: 0,
            port: notify_port,
            aux: event_group,
        }
    }

    pub fn ack(subscribe: &SdEntry) -> SdEntry {
        SdEntry {
            entry_type: SdEntryType::SubscribeAck,
            ..*subscribe
        }
    }

    /// An offer with TTL 0, announcing service withdrawal.
    pub fn is_stop_offer(&self) -> bool {
        self.entry_type == SdEntryType::OfferService && self.ttl_secs == 0
    }
}

pub fn encode_entries(entries: &[SdEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * ENTRY_LEN);
    for e in entries {
        out.push(e.entry_type as u8);
        out.extend_from_slice(&e.service_id.to_le_bytes());
        out.extend_from_slice(&e.instance_id.to_le_bytes());
        out.push(e.major_version);
        out.extend_from_slice(&e.ttl_secs.to_le_bytes());
        out.extend_from_slice(&e.port.to_le_bytes());
        out.extend_from_slice(&e.aux.to_le_bytes());
    }
    out
}

pub fn decode_entries(buf: &[u8]) -> Result<Vec<SdEntry>, WireError> {
    if buf.len() % ENTRY_LEN != 0 {
        return Err(WireError::Truncated {
            need: buf.len().div_ceil(ENTRY_LEN) * ENTRY_LEN,
            have: buf.len(),
        });
    }
    let mut entries = Vec::with_capacity(buf.len() / ENTRY_LEN);
    for chunk in buf.chunks_exact(ENTRY_LEN) {
        entries.push(SdEntry {
            entry_type: SdEntryType::try_from(chunk[0])?,
            service_id: u16::from_le_bytes([chunk[1], chunk[2]]),
            instance_id: u16::from_le_bytes([chunk[3], chunk[4]]),
            major_version: chunk[5],
            ttl_secs: u32::from_le_bytes([chunk[6], chunk[7], chunk[8], chunk[9]]),
            port: u16::from_le_bytes([chunk[10], chunk[11]]),
            aux: u16::from_le_bytes([chunk[12], chunk[13]]),
        });
    }
    Ok(entries)
}

/// Wrap SD entries into an envelope ready to send.
pub fn sd_message(entries: &[SdEntry]) -> Message {
    Message::notification(SD_SERVICE_ID, SD_METHOD_ID, encode_entries(entries))
}
