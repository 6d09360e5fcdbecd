//! Error taxonomy for loading, scoring and dividing ARPA models.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T, E = DivideError> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum DivideError {
    /// The model path is missing or could not be opened.
    File(FileError),
    /// The input violates the ARPA grammar.
    Format(FormatError),
    /// A divide weight is not a positive finite number.
    InvalidWeight(InvalidWeightError),
    /// Neither an output path nor an in-memory model was requested.
    NoOutputRequested,
    /// Writing the output failed.
    Io(io::Error),
    /// A job configuration could not be (de)serialized.
    Config(String),
}

impl DivideError {
    pub(crate) fn file<P>(path: P, source: io::Error) -> Self
    where
        P: Into<PathBuf>,
    {
        Self::File(FileError {
            path: path.into(),
            source,
        })
    }

    pub(crate) fn format<S, M>(source_name: S, line: usize, msg: M) -> Self
    where
        S: Into<String>,
        M: Into<String>,
    {
        Self::Format(FormatError {
            source_name: source_name.into(),
            line,
            msg: msg.into(),
        })
    }

    pub(crate) fn invalid_weight(name: &'static str, value: f64) -> Self {
        Self::InvalidWeight(InvalidWeightError { name, value })
    }
}

impl fmt::Display for DivideError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::File(e) => e.fmt(f),
            Self::Format(e) => e.fmt(f),
            Self::InvalidWeight(e) => e.fmt(f),
            Self::NoOutputRequested => write!(
                f,
                "NoOutputRequested: neither an output path nor an in-memory model was requested"
            ),
            Self::Io(e) => e.fmt(f),
            Self::Config(msg) => write!(f, "ConfigError: {}", msg),
        }
    }
}

impl Error for DivideError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::File(e) => Some(&e.source),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Error used when a model file is missing or unreadable.
#[derive(Debug)]
pub struct FileError {
    /// Offending path.
    pub(crate) path: PathBuf,

    pub(crate) source: io::Error,
}

impl FileError {
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FileError: {}: {}", self.path.display(), self.source)
    }
}

impl Error for FileError {}

/// Error used when the ARPA input is malformed.
#[derive(Debug)]
pub struct FormatError {
    /// Path or label of the input.
    pub(crate) source_name: String,

    /// 1-based line number where the violation was detected.
    pub(crate) line: usize,

    /// Error message.
    pub(crate) msg: String,
}

impl FormatError {
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "FormatError: {}:{}: {}",
            self.source_name, self.line, self.msg
        )
    }
}

impl Error for FormatError {}

/// Error used when a divide weight is rejected.
#[derive(Debug)]
pub struct InvalidWeightError {
    /// Name of the weight.
    pub(crate) name: &'static str,

    pub(crate) value: f64,
}

impl fmt::Display for InvalidWeightError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "InvalidWeight: {} must be a positive number, got {}",
            self.name, self.value
        )
    }
}

impl Error for InvalidWeightError {}

impl From<io::Error> for DivideError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<toml::de::Error> for DivideError {
    fn from(error: toml::de::Error) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<toml::ser::Error> for DivideError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<tempfile::PersistError> for DivideError {
    fn from(error: tempfile::PersistError) -> Self {
        Self::Io(error.error)
    }
}
