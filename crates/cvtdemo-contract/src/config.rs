/// Controls how schema documents are loaded and compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// When true, object schemas reject properties they do not declare.
    pub strict_mode: bool,
    /// Maximum bytes allowed per schema file read from disk.
    pub max_schema_file_size: usize,
    /// Maximum nesting of local `$ref` resolution before a document is
    /// rejected as cyclic.
    pub max_ref_depth: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            max_schema_file_size: 256 * 1024,
            max_ref_depth: 32,
        }
    }
}
