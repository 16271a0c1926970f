use crate::format::{Format, Kind};

/// Broad classification of an [Error].
///
/// Wrapping an error with the URL it came from does not change its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No remote files match a request.
    Locator,
    /// A byte source could not be acquired.
    Transport,
    /// A dataset is missing or its metadata is malformed.
    Decode,
    /// Fetched pieces cannot be joined into one series.
    Assembly,
    /// Invalid arguments or configuration.
    Usage,
}

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("no data found for {detector} in [{start}, {end}): {reason}")]
    NoData {
        detector: String,
        start: i64,
        end: i64,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Downloading or otherwise acquiring a byte source failed.
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// A local file could not be opened as a container, e.g., it is not HDF5.
    #[error("cannot open {path} as a container: {message}")]
    InvalidContainer { path: String, message: String },

    #[error("dataset not found: {0}")]
    MissingDataset(String),

    #[error("dataset {dataset} has no attribute {name}")]
    MissingAttribute { dataset: String, name: String },

    #[error("invalid attribute {name} on {dataset}: {message}")]
    InvalidAttribute {
        dataset: String,
        name: String,
        message: String,
    },

    #[error("invalid data in {dataset}: {message}")]
    InvalidData { dataset: String, message: String },

    #[error("invalid unit: {0}")]
    InvalidUnit(String),

    #[error("file name does not follow the <obs>-<tag>-<start>-<duration>.<ext> convention: {0}")]
    InvalidFileName(String),

    #[error("no reader registered for format {format} and {kind} data")]
    UnsupportedFormat { format: Format, kind: Kind },

    #[error("cannot determine format of {0}")]
    UnknownFormat(String),

    #[error("no container backend available to open {0}")]
    NoBackend(String),

    /// Expected one kind of series and the reader produced another.
    #[error("expected {expected} data, got {got}")]
    WrongKind { expected: Kind, got: Kind },

    #[error("cannot append series starting at {start} to series ending at {end}")]
    Discontiguous { end: f64, start: f64 },

    #[error("cannot append incompatible series: {0}")]
    Incompatible(String),

    #[error("invalid time: {0}")]
    InvalidTime(String),

    #[error("invalid interval: start {start} is after end {end}")]
    InvalidInterval { start: f64, end: f64 },

    /// Error reading a single remote file; `source` carries the underlying failure.
    #[error("Failed to read data from `{url}`: `{source}`")]
    Read {
        url: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with the URL of the file being read.
    #[must_use]
    pub fn with_url(self, url: &str) -> Self {
        Error::Read {
            url: url.to_string(),
            source: Box::new(self),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoData { .. } => ErrorKind::Locator,
            Error::Io(_) | Error::Transport { .. } => ErrorKind::Transport,
            Error::InvalidContainer { .. }
            | Error::MissingDataset(_)
            | Error::MissingAttribute { .. }
            | Error::InvalidAttribute { .. }
            | Error::InvalidData { .. }
            | Error::InvalidUnit(_)
            | Error::InvalidFileName(_)
            | Error::UnsupportedFormat { .. }
            | Error::UnknownFormat(_)
            | Error::WrongKind { .. } => ErrorKind::Decode,
            Error::Discontiguous { .. } | Error::Incompatible(_) => ErrorKind::Assembly,
            Error::NoBackend(_) | Error::InvalidTime(_) | Error::InvalidInterval { .. } => {
                ErrorKind::Usage
            }
            Error::Read { source, .. } => source.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
