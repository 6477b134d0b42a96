//! Adapters that put contract validation around real HTTP traffic.
//!
//! - [`ValidatingClient`] wraps a `reqwest` client on the consumer side.
//! - [`MockClient`] answers from the registered schema instead of a live
//!   producer.
//! - [`with_validation`] wraps an axum router on the provider side, with the
//!   outcome of a failed check decided by [`apply_mode`].

pub mod capture;
pub mod error;
pub mod middleware;
pub mod mock;
pub mod mode;
pub mod transport;

pub use capture::InteractionLog;
pub use error::{AdapterError, Result};
pub use middleware::{with_validation, MiddlewareConfig, PathFilter};
pub use mock::{generate_example, MockClient};
pub use mode::{apply_mode, rejection, BufferedResponse, ParseModeError, ValidationMode};
pub use transport::{CapturedResponse, TransportConfig, ValidatingClient};
