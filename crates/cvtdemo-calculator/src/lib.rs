//! The calculator producer: four arithmetic endpoints and a health check,
//! optionally wrapped in provider-side contract validation.

pub mod error;
pub mod handlers;
pub mod operation;
pub mod server;
pub mod settings;

pub use error::{CalculatorError, Result};
pub use operation::Operation;
pub use server::{build_app, router, serve};
pub use settings::ProducerSettings;
