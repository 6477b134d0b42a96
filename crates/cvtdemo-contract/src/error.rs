/// Errors raised by the contract engine and by clients of it.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// The schema file could not be read.
    #[error("failed to load schema: {0}")]
    LoadFailed(String),

    /// The document is not a usable OpenAPI 3 description.
    #[error("invalid schema document: {0}")]
    InvalidSchema(String),

    /// A JSON Schema embedded in the document could not be compiled.
    #[error("failed to compile schema: {0}")]
    CompileFailed(String),

    /// Input is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// No schema registered under the given ID (and version).
    #[error("schema not found: {schema_id}{}", version_suffix(.version))]
    SchemaNotFound {
        schema_id: String,
        version: Option<String>,
    },

    /// A different document is already registered under this ID and version.
    #[error("schema {schema_id}@{version} is already registered with different content")]
    VersionConflict { schema_id: String, version: String },

    /// A request to the engine is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A consumer registration is incomplete.
    #[error("invalid consumer registration: {0}")]
    InvalidRegistration(String),

    /// Auto-registration was asked to work from an empty capture.
    #[error("no interactions captured, nothing to register")]
    NoInteractions,

    /// The validator service could not be reached.
    #[error("validator unreachable: {0}")]
    Transport(String),

    /// The validator service answered with an error.
    #[error("validator returned {status} ({code}): {message}")]
    Remote {
        status: u16,
        code: String,
        message: String,
    },

    /// Engine state is unusable.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ContractError {
    /// Stable machine-readable code, used on the wire.
    pub fn code(&self) -> &str {
        match self {
            Self::LoadFailed(_) => "load_failed",
            Self::InvalidSchema(_) => "invalid_schema",
            Self::CompileFailed(_) => "compile_failed",
            Self::InvalidJson(_) => "invalid_json",
            Self::SchemaNotFound { .. } => "schema_not_found",
            Self::VersionConflict { .. } => "version_conflict",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidRegistration(_) => "invalid_registration",
            Self::NoInteractions => "no_interactions",
            Self::Transport(_) => "transport",
            Self::Remote { code, .. } => code,
            Self::Internal(_) => "internal",
        }
    }

    /// True when the failure is about reaching the validator rather than
    /// about the contract itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// True for a missing schema, local or reported by a remote service.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::SchemaNotFound { .. } => true,
            Self::Remote { status, .. } => *status == 404,
            _ => false,
        }
    }
}

fn version_suffix(version: &Option<String>) -> String {
    version
        .as_deref()
        .map(|version| format!("@{version}"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, ContractError>;
