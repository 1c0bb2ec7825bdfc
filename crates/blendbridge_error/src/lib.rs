//! # blendbridge_error - Unified Error Handling
//!
//! This crate provides the unified error system for the blendbridge toolkit:
//! - Consistent error types across all crates
//! - Rich contextual information (file paths, object indices, destinations)
//! - User-friendly messages for notifications and detailed info for debugging
//!
//! Every terminal condition of a read or write operation maps onto exactly
//! one of these variants; the host-integration boundary converts them into
//! notifications instead of letting them escape as panics.

use std::path::PathBuf;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The main unified error type for the blendbridge toolkit
#[derive(Error, Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BridgeError {
    /// File system and I/O related errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
        file_path: Option<PathBuf>,
        // Note: We store the source error message instead of the error itself for cloneability
        #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
        source_message: Option<String>,
    },

    /// Configuration and external-tool setup errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
        tool_path: Option<PathBuf>,
        kind: ConfigErrorKind,
    },

    /// Conversion (read-side) errors
    #[error("Conversion error: {message}")]
    Convert {
        message: String,
        #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
        file_path: Option<PathBuf>,
        #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
        object_index: Option<usize>,
        kind: ConvertErrorKind,
    },

    /// Reassembly (write-side) errors
    #[error("Write error: {message}")]
    Write {
        message: String,
        #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
        destination: Option<PathBuf>,
        kind: WriteErrorKind,
    },

    /// File watcher errors
    #[error("Watch error: {message}")]
    Watch {
        message: String,
        kind: WatchErrorKind,
    },

    /// CLI and user interface errors
    #[error("CLI error: {message}")]
    Cli {
        message: String,
        #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
        command: Option<String>,
        kind: CliErrorKind,
    },
}

/// Specific kinds of configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConfigErrorKind {
    #[error("Tool path is not set")]
    ToolPathUnset,
    #[error("Tool path is not verified")]
    ToolPathUnverified,
    #[error("Tool version is outdated")]
    OutdatedToolVersion,
    #[error("Unsupported interchange extension")]
    UnsupportedExtension,
    #[error("Invalid configuration value")]
    InvalidValue,
    #[error("Settings file could not be read")]
    SettingsUnreadable,
}

/// Specific kinds of conversion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConvertErrorKind {
    #[error("File contains no mesh objects")]
    NoObjects,
    #[error("Object count output was unreadable")]
    CountUnreadable,
    #[error("Expected export file is missing (permission denied?)")]
    PermissionDenied,
    #[error("File is too complex for the chosen interchange format")]
    FormatTooComplex,
    #[error("External tool exited with failure")]
    ToolFailed,
    #[error("Job payload could not be encoded")]
    PayloadEncode,
}

/// Specific kinds of write errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WriteErrorKind {
    #[error("External tool could not be launched")]
    LaunchFailed,
    #[error("External tool exited with failure")]
    ToolFailed,
    #[error("Destination file was not created")]
    DestinationMissing,
    #[error("No exportable nodes on the scene")]
    NothingToWrite,
}

/// Specific kinds of watcher errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WatchErrorKind {
    #[error("Watcher initialization failed")]
    Init,
    #[error("Filesystem notification backend error")]
    Notify,
}

/// Specific kinds of CLI errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CliErrorKind {
    #[error("Invalid command arguments")]
    InvalidArguments,
    #[error("Missing required argument")]
    MissingArgument,
    #[error("Command execution failed")]
    ExecutionFailed,
}

/// Convenient result type for blendbridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Create a new I/O error with optional context
    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io {
            message: message.into(),
            file_path: None,
            source_message: None,
        }
    }

    /// Create a new I/O error with file path context
    pub fn io_with_path<M: Into<String>, P: Into<PathBuf>>(message: M, path: P) -> Self {
        Self::Io {
            message: message.into(),
            file_path: Some(path.into()),
            source_message: None,
        }
    }

    /// Create a new configuration error
    pub fn config<M: Into<String>>(message: M, kind: ConfigErrorKind) -> Self {
        Self::Config {
            message: message.into(),
            tool_path: None,
            kind,
        }
    }

    /// Create a new conversion error
    pub fn convert<M: Into<String>>(message: M, kind: ConvertErrorKind) -> Self {
        Self::Convert {
            message: message.into(),
            file_path: None,
            object_index: None,
            kind,
        }
    }

    /// Create a new write error
    pub fn write<M: Into<String>>(message: M, kind: WriteErrorKind) -> Self {
        Self::Write {
            message: message.into(),
            destination: None,
            kind,
        }
    }

    /// Create a new watcher error
    pub fn watch<M: Into<String>>(message: M, kind: WatchErrorKind) -> Self {
        Self::Watch {
            message: message.into(),
            kind,
        }
    }

    /// Create a new CLI error
    pub fn cli<M: Into<String>>(message: M, kind: CliErrorKind) -> Self {
        Self::Cli {
            message: message.into(),
            command: None,
            kind,
        }
    }

    /// Add file path context to an existing error
    pub fn with_file_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        let path = path.into();
        match &mut self {
            Self::Io { file_path, .. } => *file_path = Some(path),
            Self::Config { tool_path, .. } => *tool_path = Some(path),
            Self::Convert { file_path, .. } => *file_path = Some(path),
            Self::Write { destination, .. } => *destination = Some(path),
            _ => {} // Other variants don't carry a path
        }
        self
    }

    /// Add object index context to conversion errors
    pub fn with_object_index(mut self, index: usize) -> Self {
        if let Self::Convert { object_index, .. } = &mut self {
            *object_index = Some(index);
        }
        self
    }

    /// Add command context to CLI errors
    pub fn with_command<C: Into<String>>(mut self, cmd: C) -> Self {
        if let Self::Cli { command, .. } = &mut self {
            *command = Some(cmd.into());
        }
        self
    }

    /// Check if this error is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Check if this error is a conversion error
    pub fn is_convert(&self) -> bool {
        matches!(self, Self::Convert { .. })
    }

    /// Check if this error is a conversion error of the given kind
    pub fn is_convert_kind(&self, want: ConvertErrorKind) -> bool {
        matches!(self, Self::Convert { kind, .. } if *kind == want)
    }

    /// Get the file path associated with this error, if any
    pub fn file_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { file_path, .. } => file_path.as_ref(),
            Self::Config { tool_path, .. } => tool_path.as_ref(),
            Self::Convert { file_path, .. } => file_path.as_ref(),
            Self::Write { destination, .. } => destination.as_ref(),
            _ => None,
        }
    }

    /// Get the object index associated with this error, if any
    pub fn object_index(&self) -> Option<usize> {
        match self {
            Self::Convert { object_index, .. } => *object_index,
            _ => None,
        }
    }

    /// Get a user-friendly error message suitable for notifications
    pub fn user_message(&self) -> String {
        match self {
            Self::Io {
                message, file_path, ..
            } => {
                if let Some(path) = file_path {
                    format!("File error in '{}': {}", path.display(), message)
                } else {
                    message.clone()
                }
            }
            Self::Config {
                message, tool_path, ..
            } => {
                if let Some(path) = tool_path {
                    format!(
                        "Configuration error: {} (tool: {})",
                        message,
                        path.display()
                    )
                } else {
                    format!("Configuration error: {message}")
                }
            }
            Self::Convert {
                message,
                file_path,
                object_index,
                kind: _,
            } => {
                let mut msg = format!("Conversion failed: {message}");
                if let Some(path) = file_path {
                    msg.push_str(&format!(" (file: {})", path.display()));
                }
                if let Some(index) = object_index {
                    msg.push_str(&format!(" (object: {index})"));
                }
                msg
            }
            Self::Write {
                message,
                destination,
                ..
            } => {
                if let Some(path) = destination {
                    format!("Write failed: {} (destination: {})", message, path.display())
                } else {
                    format!("Write failed: {message}")
                }
            }
            Self::Watch { message, .. } => format!("File watcher error: {message}"),
            Self::Cli {
                message, command, ..
            } => {
                if let Some(cmd) = command {
                    format!("Command '{cmd}' failed: {message}")
                } else {
                    format!("CLI error: {message}")
                }
            }
        }
    }

    /// Get a short error summary without context details
    pub fn summary(&self) -> String {
        match self {
            Self::Io { message, .. } => format!("I/O: {message}"),
            Self::Config { kind, .. } => format!("Config: {kind}"),
            Self::Convert { kind, .. } => format!("Convert: {kind}"),
            Self::Write { kind, .. } => format!("Write: {kind}"),
            Self::Watch { kind, .. } => format!("Watch: {kind}"),
            Self::Cli { kind, .. } => format!("CLI: {kind}"),
        }
    }
}

/// Standardized error helper functions for consistent error creation across crates.
impl BridgeError {
    // === Config Domain Helpers ===

    /// Create a config error for an unset tool path
    pub fn config_tool_unset<M: Into<String>>(message: M) -> Self {
        Self::config(message, ConfigErrorKind::ToolPathUnset)
    }

    /// Create a config error for an unverified tool path
    pub fn config_tool_unverified<M: Into<String>>(message: M) -> Self {
        Self::config(message, ConfigErrorKind::ToolPathUnverified)
    }

    /// Create a config error for an outdated tool version
    pub fn config_tool_outdated<M: Into<String>>(message: M) -> Self {
        Self::config(message, ConfigErrorKind::OutdatedToolVersion)
    }

    /// Create a config error for an unsupported interchange extension
    pub fn config_unsupported_extension<M: Into<String>>(message: M) -> Self {
        Self::config(message, ConfigErrorKind::UnsupportedExtension)
    }

    // === Convert Domain Helpers ===

    /// Create a conversion error for files without mesh objects
    pub fn convert_no_objects<M: Into<String>>(message: M) -> Self {
        Self::convert(message, ConvertErrorKind::NoObjects)
    }

    /// Create a conversion error for unreadable count output
    pub fn convert_count_unreadable<M: Into<String>>(message: M) -> Self {
        Self::convert(message, ConvertErrorKind::CountUnreadable)
    }

    /// Create a conversion error for missing export files
    pub fn convert_permission_denied<M: Into<String>>(message: M) -> Self {
        Self::convert(message, ConvertErrorKind::PermissionDenied)
    }

    /// Create a conversion error for too-complex files
    pub fn convert_too_complex<M: Into<String>>(message: M) -> Self {
        Self::convert(message, ConvertErrorKind::FormatTooComplex)
    }

    /// Create a conversion error for failed tool invocations
    pub fn convert_tool_failed<M: Into<String>>(message: M) -> Self {
        Self::convert(message, ConvertErrorKind::ToolFailed)
    }

    // === Write Domain Helpers ===

    /// Create a write error for failed launches
    pub fn write_launch_failed<M: Into<String>>(message: M) -> Self {
        Self::write(message, WriteErrorKind::LaunchFailed)
    }

    /// Create a write error for missing destinations
    pub fn write_destination_missing<M: Into<String>>(message: M) -> Self {
        Self::write(message, WriteErrorKind::DestinationMissing)
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            file_path: None,
            source_message: Some(format!("IO Error: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BridgeError::convert("count failed", ConvertErrorKind::CountUnreadable);
        assert!(err.is_convert());
        assert!(err.is_convert_kind(ConvertErrorKind::CountUnreadable));
        assert_eq!(err.object_index(), None);
    }

    #[test]
    fn test_error_context() {
        let err = BridgeError::convert("export missing", ConvertErrorKind::PermissionDenied)
            .with_file_path("/path/to/file.blend")
            .with_object_index(3);

        assert_eq!(err.file_path(), Some(&PathBuf::from("/path/to/file.blend")));
        assert_eq!(err.object_index(), Some(3));
    }

    #[test]
    fn test_user_message() {
        let err = BridgeError::convert("export missing", ConvertErrorKind::PermissionDenied)
            .with_file_path("/path/to/file.blend")
            .with_object_index(3);

        let msg = err.user_message();
        assert!(msg.contains("Conversion failed"));
        assert!(msg.contains("file.blend"));
        assert!(msg.contains("object: 3"));
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: BridgeError = io_err.into();
        assert!(matches!(err, BridgeError::Io { .. }));
    }
}
