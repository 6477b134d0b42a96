//! Consumer-driven contract validation around a calculator API.
//!
//! # Crate Structure
//!
//! - [`contract`]: schema registry, interaction validation, consumer
//!   registry and deploy-safety checks
//! - [`service`]: the validator's HTTP surface and its client
//! - [`adapters`]: validating client, mock client, provider middleware
//! - [`calculator`]: the producer
//! - [`logging`]: subscriber setup shared by the binaries (behind `cli`)

/// Re-export contract types.
pub mod contract {
    pub use cvtdemo_contract::*;
}

/// Re-export service types.
pub mod service {
    pub use cvtdemo_service::*;
}

/// Re-export adapter types.
pub mod adapters {
    pub use cvtdemo_adapters::*;
}

/// Re-export calculator types.
pub mod calculator {
    pub use cvtdemo_calculator::*;
}

#[cfg(feature = "cli")]
pub mod logging;
