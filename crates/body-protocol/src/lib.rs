//! Body-domain protocol definitions shared by the provider and the gateway.
//!
//! Three concerns live here: the service catalog (ids, event groups, ports,
//! timeouts), the typed payload structs with their flat little-endian codec,
//! and the JSON types spoken on the gateway's REST/SSE surface.

pub mod api;
pub mod catalog;
pub mod payload;

pub use payload::{CodecError, WirePayload};
