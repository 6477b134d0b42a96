//! Network surface of the contract validation engine.
//!
//! [`build_router`] serves any [`ContractValidator`] over HTTP/JSON, and
//! [`RemoteValidator`] implements the same trait by calling such a server.
//!
//! [`ContractValidator`]: cvtdemo_contract::ContractValidator

pub mod client;
pub mod server;
pub mod settings;
pub mod wire;

pub use client::{normalize_base_url, ClientOptions, RemoteValidator};
pub use server::{build_router, map_error, prepare_validator, serve};
pub use settings::{PreloadSchema, ServerSettings};
