//! Error types for the NUMA exporter
//!
//! Every reader returns these typed errors with enough context (file, node,
//! guest, NIC or command line) for the caller to log meaningfully. Nothing
//! in the crate turns an error into a zero count.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for exporter operations
#[derive(Error, Debug)]
pub enum NumaExporterError {
    /// I/O error while reading a host file
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Range-encoded CPU list could not be parsed
    #[error("Invalid CPU list '{input}': {reason}")]
    InvalidCpuList { input: String, reason: String },

    /// Topology, meminfo or configuration file has unexpected content
    #[error("Malformed file '{path}': {message}")]
    MalformedFile { path: PathBuf, message: String },

    /// External tool produced output that could not be parsed
    #[error("Unparseable output from '{command}': {message}")]
    MalformedOutput { command: String, message: String },

    /// Guest machine description could not be parsed
    #[error("Invalid guest XML: {message}")]
    InvalidGuestXml { message: String },

    /// External tool could not be started
    #[error("Failed to run '{command}': {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// External tool exited unsuccessfully
    #[error("'{command}' exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// External tool did not finish within its budget
    #[error("'{command}' timed out after {}", format_timeout(.timeout))]
    CommandTimeout { command: String, timeout: Duration },

    /// A CPU is listed under more than one NUMA node
    #[error("CPU {cpu} is listed under both {first} and {second}")]
    TopologyOverlap {
        cpu: u32,
        first: String,
        second: String,
    },

    /// HTTP listener or client connection error
    #[error("Connection error on '{addr}': {message}")]
    ConnectionError { addr: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Multiple errors occurred
    #[error("Multiple errors occurred ({count} errors): {}", summarize(.errors))]
    MultipleErrors {
        count: usize,
        errors: Vec<NumaExporterError>,
    },

    /// Error with context describing what was being read
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<NumaExporterError>,
    },
}

fn format_timeout(timeout: &Duration) -> String {
    humantime::format_duration(*timeout).to_string()
}

fn summarize(errors: &[NumaExporterError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl NumaExporterError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a malformed file error
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MalformedFile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid CPU list error
    pub fn cpu_list(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCpuList {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a connection error
    pub fn connection(addr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionError {
            addr: addr.into(),
            message: message.into(),
        }
    }

    /// Combine errors into one, flattening nested `MultipleErrors`
    ///
    /// A single error is returned unchanged.
    pub fn multiple(errors: Vec<NumaExporterError>) -> Self {
        let mut flat = Vec::with_capacity(errors.len());
        for error in errors {
            match error {
                Self::MultipleErrors { errors, .. } => flat.extend(errors),
                other => flat.push(other),
            }
        }

        if flat.len() == 1 {
            if let Some(only) = flat.pop() {
                return only;
            }
        }
        Self::MultipleErrors {
            count: flat.len(),
            errors: flat,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Check if this error came from invoking an external tool
    pub fn is_command_error(&self) -> bool {
        match self {
            Self::CommandSpawn { .. }
            | Self::CommandFailed { .. }
            | Self::CommandTimeout { .. }
            | Self::MalformedOutput { .. } => true,
            Self::WithContext { source, .. } => source.is_command_error(),
            Self::MultipleErrors { errors, .. } => errors.iter().any(|e| e.is_command_error()),
            _ => false,
        }
    }

    /// Get the file path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } | Self::MalformedFile { path, .. } => Some(path),
            Self::WithContext { source, .. } => source.path(),
            _ => None,
        }
    }
}

/// Result type alias for exporter operations
pub type Result<T> = std::result::Result<T, NumaExporterError>;

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| NumaExporterError::io(path, e))
    }
}

/// Collects multiple results into a single result
pub fn collect_errors<T>(results: Vec<Result<T>>) -> Result<Vec<T>> {
    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(value) => successes.push(value),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(successes)
    } else {
        Err(NumaExporterError::multiple(errors))
    }
}
