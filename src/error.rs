//! Error types for auraprobe
//!
//! Structured errors per subsystem, gathered under [`AuraprobeError`] with
//! user-facing hints for the command-line front end.

use thiserror::Error;

/// Main error type for auraprobe operations
#[derive(Error, Debug)]
pub enum AuraprobeError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Search pattern rejected before execution
    #[error("Pattern error: {0}")]
    Pattern(#[from] PatternError),

    /// Job-level scan failures
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    /// Vendor response interpretation errors
    #[error("Aura error: {0}")]
    Aura(#[from] AuraError),

    /// Captured traffic import errors
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Scope rule errors
    #[error("Scope error: {0}")]
    Scope(#[from] ScopeError),

    /// Record identifier errors
    #[error("Record id error: {0}")]
    Sfid(#[from] SfidError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {path}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {field} - {reason}")]
    ValidationError { field: String, reason: String },
}

/// Input rejection for user-supplied search patterns
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Empty pattern")]
    Empty,

    #[error("Pattern too long: {len} chars (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("Potentially unsafe pattern: {0}")]
    Suspicious(String),

    #[error("Invalid pattern syntax: {0}")]
    Syntax(String),
}

/// Job-level failures. Per-item failures never surface here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("A scan is already running against this result set")]
    AlreadyRunning,

    #[error("Result destination '{0}' is held by another job")]
    DestinationBusy(String),

    #[error("No work items supplied")]
    NoItems,

    #[error("Result sink rejected update: {0}")]
    SinkFailed(String),

    #[error("Scan worker aborted: {0}")]
    WorkerAborted(String),
}

/// Errors interpreting vendor responses
#[derive(Error, Debug)]
pub enum AuraError {
    #[error("Response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid response format: no actions array")]
    NoActions,

    #[error("Action failed with state: {0}")]
    ActionState(String),

    #[error("Missing field in response: {0}")]
    MissingField(&'static str),
}

/// Errors importing captured traffic
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to parse HAR archive: {0}")]
    InvalidHar(#[from] serde_json::Error),

    #[error("No request in the capture qualifies as an Aura base request")]
    NoBaseRequest,

    #[error("Capture entry {index} is out of range ({len} entries)")]
    EntryOutOfRange { index: usize, len: usize },
}

/// Scope rule errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("Empty scope rule")]
    Empty,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Scope pattern rejected: {0}")]
    Pattern(#[from] PatternError),
}

/// Record identifier errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SfidError {
    #[error("Record id must be 15 or 18 characters, got {0}")]
    BadLength(usize),

    #[error("Record id must be alphanumeric")]
    NotAlphanumeric,

    #[error("Invalid base62 character: {0:?}")]
    InvalidBase62(char),

    #[error("Value {0} does not fit in 8 base62 digits")]
    ValueOutOfRange(u64),
}

impl AuraprobeError {
    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            AuraprobeError::Config(e) => format!("Configuration problem: {}", e.user_hint()),
            AuraprobeError::Pattern(e) => format!("Search pattern rejected: {}", e.user_hint()),
            AuraprobeError::Scan(e) => format!("Scan problem: {}", e.user_hint()),
            AuraprobeError::Aura(e) => format!("Unexpected response: {}", e),
            AuraprobeError::Capture(e) => format!("Capture problem: {}", e.user_hint()),
            AuraprobeError::Scope(e) => format!("Scope problem: {}", e.user_hint()),
            AuraprobeError::Sfid(e) => format!("Record id problem: {}", e),
            AuraprobeError::Io(e) => format!("File system issue: {}", e),
        }
    }
}

/// Trait for providing user-friendly hints
pub trait UserHint {
    fn user_hint(&self) -> String;
}

impl UserHint for ConfigError {
    fn user_hint(&self) -> String {
        match self {
            ConfigError::ReadError { path, .. } => {
                format!("Could not read '{}'. Check if the file exists and you have read permissions.", path)
            }
            ConfigError::ParseError(_) => {
                "The configuration file has invalid syntax. Check for TOML formatting errors.".into()
            }
            ConfigError::ValidationError { field, reason } => {
                format!("Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl UserHint for PatternError {
    fn user_hint(&self) -> String {
        match self {
            PatternError::Suspicious(reason) => {
                format!("{}. Simplify nested repetition or use a literal search.", reason)
            }
            PatternError::TooLong { max, .. } => {
                format!("Patterns are limited to {} characters.", max)
            }
            _ => self.to_string(),
        }
    }
}

impl UserHint for ScanError {
    fn user_hint(&self) -> String {
        match self {
            ScanError::AlreadyRunning | ScanError::DestinationBusy(_) => {
                "Wait for the running scan to finish or cancel it first.".into()
            }
            ScanError::NoItems => "The wordlist or name set is empty.".into(),
            _ => self.to_string(),
        }
    }
}

impl UserHint for ScopeError {
    fn user_hint(&self) -> String {
        match self {
            ScopeError::Pattern(e) => format!("re: rule rejected. {}", e.user_hint()),
            _ => format!("{}. Use host, *.domain, a URL prefix or re:<regex>.", self),
        }
    }
}

impl UserHint for CaptureError {
    fn user_hint(&self) -> String {
        match self {
            CaptureError::NoBaseRequest => {
                "Capture a POST to /aura carrying aura.token and aura.context, or pick an entry with --entry.".into()
            }
            _ => self.to_string(),
        }
    }
}
