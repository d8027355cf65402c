//! SOME/IP transport runtime shared by the provider and gateway nodes.
//!
//! The provider side owns the service-discovery announcer, the per-service
//! TCP method listeners, and the subscriber registry used for UDP
//! notifications. The client side owns discovery tracking, per-service
//! availability state machines, request/response correlation, and event
//! dispatch. Both read their endpoint layout from [`config::RuntimeConfig`].

pub mod client;
pub mod config;
pub mod error;
pub mod provider;
pub mod session;
pub mod shutdown;

pub use client::{Availability, ClientRuntime, EventNotification};
pub use config::{ConfigError, RuntimeConfig};
pub use error::ClientError;
pub use provider::{InboundRequest, Notifier, ProviderRuntime, RequestOutcome};
