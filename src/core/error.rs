//! Error types for the resource subsystem
//!
//! Lookups and loads never fail through this type: they follow the boolean /
//! invalid-handle contract and log. `ResourceError` covers programmer errors
//! caught at registration time and the IO/parse failures that concrete loaders
//! and the configuration layer report before folding them into that contract.

/// Result type for resource subsystem operations
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Errors that can occur while configuring or feeding the resource library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A loader for this resource type is already registered in the group
    DuplicateLoader {
        /// Group the registration was attempted on
        group: String,
        /// Short name of the resource type
        type_name: &'static str,
    },
    /// IO error
    IoError(String),
    /// Asset payload could not be decoded
    DecodeError(String),
    /// Serialization error
    SerializeError(String),
    /// Deserialization error
    DeserializeError(String),
}

impl std::fmt::Display for ResourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateLoader { group, type_name } => {
                write!(f, "Group '{group}' already has a loader for {type_name}")
            }
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::DecodeError(e) => write!(f, "Decode error: {e}"),
            Self::SerializeError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializeError(e) => write!(f, "Deserialization error: {e}"),
        }
    }
}

impl std::error::Error for ResourceError {}
