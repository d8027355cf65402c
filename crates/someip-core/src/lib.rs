//! SOME/IP wire layer.
//!
//! This crate owns everything that is bit-exact on the wire: the 16-byte
//! message envelope, the length-delimited TCP framing codec, and the
//! service-discovery entry format. It knows nothing about the body-domain
//! services themselves; payload bytes pass through opaque.

pub mod framing;
pub mod message;
pub mod sd;

pub use framing::SomeipCodec;
pub use message::{Message, MessageType, ReturnCode, WireError};
pub use sd::{SdEntry, SdEntryType};
