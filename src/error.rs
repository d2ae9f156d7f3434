use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Error taxonomy shared by the data and query layers
// ---------------------------------------------------------------------------

/// The key=value component that rejected a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Filter,
    Options,
    Keywords,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Filter => write!(f, "Filter"),
            Role::Options => write!(f, "Options"),
            Role::Keywords => write!(f, "Keywords"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChromError {
    /// The input path does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No vendor signature was recognised, or a requested format name is unknown.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A required section or header did not match its expected layout.
    #[error("malformed record at line {line}: {message}")]
    MalformedRecord { line: usize, message: String },

    #[error("invalid {role} key '{key}'")]
    InvalidKey { key: String, role: Role },

    /// A key=value token without any `=`.
    #[error("malformed key=value pair '{0}'")]
    MalformedPair(String),

    /// A `<path>[:<filter>[:<options>[:<keywords>]]]` string that cannot be split.
    #[error("invalid plot entry '{0}'")]
    InvalidPlotEntry(String),
}

impl ChromError {
    pub(crate) fn malformed(line: usize, message: impl Into<String>) -> Self {
        ChromError::MalformedRecord {
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChromError>;
