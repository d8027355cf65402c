//! Client-side error taxonomy.
//!
//! Transport and codec failures never escape the runtime untranslated;
//! callers only ever see one of these variants.

use someip_core::ReturnCode;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ClientError {
    /// Service is discovered but the event subscription has not been
    /// acknowledged yet; nothing was sent.
    #[error("service discovered but not ready")]
    ServiceNotReady,
    /// Service has never been discovered or its offer TTL lapsed; nothing
    /// was sent.
    #[error("service unavailable")]
    ServiceUnavailable,
    /// No response within the method-call deadline.
    #[error("request timed out")]
    Timeout,
    /// The TCP connection to the provider failed; pending requests are
    /// resolved with this variant.
    #[error("transport down")]
    TransportDown,
    /// Response arrived but its payload did not decode.
    #[error("malformed response payload")]
    Malformed,
    /// The provider answered with a SOME/IP error code.
    #[error("remote error: {0:?}")]
    Remote(ReturnCode),
}
