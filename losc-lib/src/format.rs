//! File formats and the reader registry.
use std::{collections::HashMap, fmt::Display, str::FromStr, sync::Arc};

use derive_more::From;

use crate::container::ContainerBackend;
use crate::decode::LoscHdf5Reader;
use crate::source::LocalFile;
use crate::{url, Error, Result, StateVector, TimeSeries};

/// Archive file format, identified by tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// `hdf5.losc`
    Hdf5Losc,
    /// `ascii.losc`
    AsciiLosc,
    /// `gwf`, the frame format
    Gwf,
}

/// Maps a lower-case file extension to its format.
const EXTENSIONS: &[(&str, Format)] = &[
    ("hdf5", Format::Hdf5Losc),
    ("h5", Format::Hdf5Losc),
    ("txt", Format::AsciiLosc),
    ("gwf", Format::Gwf),
];

impl Format {
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Format::Hdf5Losc => "hdf5.losc",
            Format::AsciiLosc => "ascii.losc",
            Format::Gwf => "gwf",
        }
    }

    /// Format for a file extension without the leading dot, e.g., `hdf5`.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Format> {
        let ext = ext.to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, f)| *f)
    }

    /// Format of the file at `url`, ignoring one compression suffix.
    ///
    /// # Errors
    /// [Error::UnknownFormat] if the extension is not recognized.
    pub fn from_url(url: &str) -> Result<Format> {
        url::extension(url)
            .and_then(|(ext, _)| Format::from_extension(&ext))
            .ok_or_else(|| Error::UnknownFormat(url.to_string()))
    }
}

impl FromStr for Format {
    type Err = Error;

    /// Parse a format tag, e.g., `hdf5.losc`, or a bare extension, e.g., `hdf5`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        [Format::Hdf5Losc, Format::AsciiLosc, Format::Gwf]
            .into_iter()
            .find(|f| f.tag() == s)
            .or_else(|| Format::from_extension(s))
            .ok_or_else(|| Error::UnknownFormat(s.to_string()))
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Kind of series requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Plain series, e.g., strain.
    Strain,
    /// Bit-flag series, e.g., data-quality.
    State,
}

impl Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Kind::Strain => f.write_str("strain"),
            Kind::State => f.write_str("state"),
        }
    }
}

/// Output of a [Reader].
#[derive(Debug, Clone, PartialEq, From)]
pub enum Decoded {
    Strain(TimeSeries),
    State(StateVector),
}

impl Decoded {
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Decoded::Strain(_) => Kind::Strain,
            Decoded::State(_) => Kind::State,
        }
    }
}

/// Arguments passed through to a [Reader].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOptions {
    /// Dataset path within a container.
    pub path: Option<String>,
    /// Channel name, required by the frame format.
    pub channel: Option<String>,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

/// Decodes a local file into a series.
pub trait Reader: Send + Sync {
    /// # Errors
    /// If `file` cannot be decoded.
    fn read(&self, file: &LocalFile, options: &ReadOptions) -> Result<Decoded>;
}

/// Readers by format and kind.
#[derive(Default, Clone)]
pub struct Registry {
    readers: HashMap<(Format, Kind), Arc<dyn Reader>>,
}

impl Registry {
    /// Registry with the `hdf5.losc` readers for both kinds, opening files with `backend`.
    #[must_use]
    pub fn losc(backend: Arc<dyn ContainerBackend>) -> Self {
        let mut reg = Registry::default();
        reg.register(
            Format::Hdf5Losc,
            Kind::Strain,
            LoscHdf5Reader::new(Arc::clone(&backend), Kind::Strain),
        );
        reg.register(
            Format::Hdf5Losc,
            Kind::State,
            LoscHdf5Reader::new(backend, Kind::State),
        );
        reg
    }

    /// Register `reader` for `format` and `kind`, replacing any existing reader.
    pub fn register(&mut self, format: Format, kind: Kind, reader: impl Reader + 'static) {
        self.readers.insert((format, kind), Arc::new(reader));
    }

    #[must_use]
    pub fn with(mut self, format: Format, kind: Kind, reader: impl Reader + 'static) -> Self {
        self.register(format, kind, reader);
        self
    }

    /// # Errors
    /// [Error::UnsupportedFormat] if nothing is registered for `format` and `kind`.
    pub fn get(&self, format: Format, kind: Kind) -> Result<&dyn Reader> {
        self.readers
            .get(&(format, kind))
            .map(|r| &**r)
            .ok_or(Error::UnsupportedFormat { format, kind })
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("readers", &self.readers.keys().collect::<Vec<_>>())
            .finish()
    }
}
