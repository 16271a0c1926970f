//! Fetching and decoding a single remote file.
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::format::{Decoded, Format, Kind, ReadOptions, Registry};
use crate::source::{self, ByteSource};
use crate::{Bits, Error, Result, StateVector, Unit};

/// A token in a frame unit string that is not `<index>:<name>`.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("invalid bit definition '{0}'")]
pub struct BitsError(pub String);

/// Parse bit names encoded in a frame unit string as whitespace separated
/// `<index>:<name>` tokens, e.g., `0:DATA 1:CBC_CAT1`.
///
/// # Errors
/// [BitsError] for the first token without a separator, a non-integer index or an
/// empty name.
pub fn parse_bits(unit: &str) -> std::result::Result<Bits, BitsError> {
    unit.split_whitespace()
        .map(|token| {
            let invalid = || BitsError(token.to_string());
            let (idx, name) = token.split_once(':').ok_or_else(invalid)?;
            let idx: u32 = idx.parse().map_err(|_| invalid())?;
            if name.is_empty() {
                return Err(invalid());
            }
            Ok((idx, name.to_string()))
        })
        .collect()
}

/// Move bit names from a frame state vector's unit into its bits.
///
/// Malformed definitions leave the bits empty. The unit is dimensionless either way.
fn promote_unit_bits(sv: &mut StateVector, url: &str) {
    let unit = std::mem::take(&mut sv.series.unit);
    sv.bits = match parse_bits(unit.as_str()) {
        Ok(bits) => bits,
        Err(err) => {
            warn!(url, %err, "ignoring malformed bit definitions");
            Bits::default()
        }
    };
    sv.series.unit = Unit::dimensionless();
}

/// Fetches single files, choosing a reader by file extension.
#[derive(Clone)]
pub struct Fetcher {
    source: Arc<dyn ByteSource>,
    registry: Registry,
}

impl Fetcher {
    pub fn new(source: impl ByteSource + 'static, registry: Registry) -> Self {
        Fetcher {
            source: Arc::new(source),
            registry,
        }
    }

    /// Read the file at `url` as `kind` data.
    ///
    /// The local copy of the file is released before returning, whether or not decoding
    /// succeeds.
    ///
    /// # Errors
    /// [Error::Transport] if the file cannot be acquired. Decode failures are returned as
    /// [Error::Read] naming `url`.
    pub fn fetch(
        &self,
        url: &str,
        kind: Kind,
        options: &ReadOptions,
        cache: bool,
        verbose: bool,
    ) -> Result<Decoded> {
        let format = Format::from_url(url).map_err(|e| e.with_url(url))?;
        let reader = self
            .registry
            .get(format, kind)
            .map_err(|e| e.with_url(url))?;

        let local = source::open_readable(self.source.as_ref(), url, cache)?;
        if verbose {
            info!(url, %format, "reading data");
        } else {
            debug!(url, %format, "reading data");
        }
        let decoded = reader
            .read(&local, options)
            .map_err(|e| e.with_url(url))?;
        drop(local);

        if decoded.kind() != kind {
            return Err(Error::WrongKind {
                expected: kind,
                got: decoded.kind(),
            }
            .with_url(url));
        }

        let decoded = match decoded {
            Decoded::State(mut sv) if format == Format::Gwf => {
                promote_unit_bits(&mut sv, url);
                Decoded::State(sv)
            }
            other => other,
        };

        if verbose {
            info!(url, "done");
        }
        Ok(decoded)
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
