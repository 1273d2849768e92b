//! Request/response correlation over a fire-and-forget transport.
//!
//! Collector services ask other services for values (station coordinates,
//! weather observations) over messaging rather than point-to-point calls.
//! [`CorrelationRegistry`] bridges the two styles: a caller parks a future
//! under a correlation key, publishes its outbound request, and the inbound
//! message handler later settles the future via [`resolve`] or
//! [`resolve_error`] — or the deadline settles it with a timeout.
//!
//! One registry instance exists per kind of lookup; all instances share the
//! same mechanics.
//!
//! [`resolve`]: CorrelationRegistry::resolve
//! [`resolve_error`]: CorrelationRegistry::resolve_error

mod config;
mod error;
mod registry;

pub use config::CorrelationConfig;
pub use error::CorrelationError;
pub use registry::{Correlated, CorrelationRegistry, ResponseFuture};
