//! Consumer-driven contract validation.
//!
//! Register OpenAPI schemas under a stable ID, check captured HTTP
//! interactions against them, record which consumers depend on which
//! endpoints and fields, and answer whether a new schema version can be
//! deployed without breaking any of them.
//!
//! The [`ContractValidator`] trait is the protocol every other component
//! talks to. [`LocalValidator`] implements it in-process; the service crate
//! exposes the same protocol over HTTP.

pub mod compat;
pub mod config;
pub mod consumer;
pub mod engine;
pub mod error;
pub mod interaction;
pub mod registry;
pub mod schema;
pub mod validator;

pub use compat::{
    assess_deployment, BreakingChange, BreakingChangeDetector, BreakingChangeKind,
    CanIDeployResult, ConsumerCheck, UsageDiffDetector,
};
pub use config::RegistryConfig;
pub use consumer::{
    build_consumer_from_interactions, AutoRegisterConfig, ConsumerInfo, ConsumerRegistry,
    EndpointUsage, RegisterConsumerOptions,
};
pub use engine::{ContractValidator, LocalValidator, SchemaDocument, SchemaInfo};
pub use error::{ContractError, Result};
pub use interaction::{
    body_from_bytes, Interaction, ValidationRequest, ValidationResponse, ValidationResult,
    ValidationScope,
};
pub use registry::{load_document, SchemaRegistry};
pub use schema::{ContractSchema, Operation, OperationKey, Parameter, ParameterLocation};
pub use validator::CompiledSchema;
