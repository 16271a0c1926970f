//! Remote file references and the file naming convention.
//!
//! Archive files are named `<OBS>-<TAG>-<GPSSTART>-<DURATION>.<ext>`, optionally
//! followed by a compression suffix, e.g., `H-H1_LOSC_4_V1-1126256640-4096.hdf5`.
use std::{borrow::Cow, path::PathBuf, sync::OnceLock};

use ::url::Url;
use regex::Regex;

use crate::{Error, Result, Segment};

/// Compression suffixes that may follow the format extension.
pub const COMPRESSION_SUFFIXES: &[&str] = &["gz"];

fn file_name_regex() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| {
        Regex::new(
            r"^(?P<obs>[A-Za-z0-9]+)-(?P<tag>[^-]+)-(?P<start>\d+(?:\.\d*)?)-(?P<duration>\d+(?:\.\d*)?)\.",
        )
        .expect("regex to compile")
    })
}

/// `url` parsed as an absolute URL, `None` for plain local paths.
fn parse_url(url: &str) -> Option<Url> {
    Url::parse(url).ok().filter(|u| !u.cannot_be_a_base())
}

/// URL path without scheme, authority, query or fragment. Plain paths are returned as is.
fn path(url: &str) -> Cow<'_, str> {
    match parse_url(url) {
        Some(u) => Cow::Owned(u.path().to_string()),
        None => Cow::Borrowed(url.split(['?', '#']).next().unwrap_or(url)),
    }
}

/// Local file system path for a plain path or `file://` URL.
#[must_use]
pub fn to_path(url: &str) -> PathBuf {
    parse_url(url)
        .filter(|u| u.scheme() == "file")
        .and_then(|u| u.to_file_path().ok())
        .unwrap_or_else(|| PathBuf::from(url))
}

/// Final path component of `url`.
#[must_use]
pub fn base_name(url: &str) -> String {
    if let Some(u) = parse_url(url) {
        return u
            .path_segments()
            .and_then(|mut s| s.next_back())
            .unwrap_or_default()
            .to_string();
    }
    let path = path(url);
    path.rsplit('/').next().unwrap_or_default().to_string()
}

/// Host name of `url`, lowercase and without port or user info.
#[must_use]
pub fn host(url: &str) -> Option<String> {
    parse_url(url)?.host_str().map(str::to_string)
}

/// Format extension of `url` and any compression suffix following it.
///
/// `H-H1-1-2.hdf5.gz` yields `("hdf5", Some("gz"))`.
#[must_use]
pub fn extension(url: &str) -> Option<(String, Option<String>)> {
    let name = base_name(url);
    let (rest, ext) = name.rsplit_once('.')?;
    if COMPRESSION_SUFFIXES.contains(&ext.to_ascii_lowercase().as_str()) {
        let (_, inner) = rest.rsplit_once('.')?;
        return Some((inner.to_string(), Some(ext.to_string())));
    }
    Some((ext.to_string(), None))
}

/// True if `url` belongs to an event collection, i.e., short files around a notable event.
#[must_use]
pub fn is_event(url: &str) -> bool {
    path(url).split('/').any(|p| p.contains("events"))
}

/// Components of a remote file name following the naming convention.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    pub url: String,
    pub observatory: String,
    pub tag: String,
    /// Time covered by the file.
    pub segment: Segment,
}

impl RemoteFile {
    /// Parse `url`.
    ///
    /// # Errors
    /// [Error::InvalidFileName] if the file name does not follow the convention.
    pub fn parse(url: &str) -> Result<Self> {
        let name = base_name(url);
        let invalid = || Error::InvalidFileName(name.clone());
        let caps = file_name_regex().captures(&name).ok_or_else(invalid)?;
        let start: f64 = caps["start"].parse().map_err(|_| invalid())?;
        let duration: f64 = caps["duration"].parse().map_err(|_| invalid())?;
        Ok(RemoteFile {
            url: url.to_string(),
            observatory: caps["obs"].to_string(),
            tag: caps["tag"].to_string(),
            segment: Segment::new(start, start + duration)?,
        })
    }

    /// `_`-separated components of the tag, e.g., `H1`, `LOSC`, `4`, `V1`.
    pub fn tag_parts(&self) -> impl Iterator<Item = &str> {
        self.tag.split('_')
    }
}

/// Time covered by the file at `url`.
///
/// # Errors
/// [Error::InvalidFileName] if the file name does not follow the convention.
pub fn file_segment(url: &str) -> Result<Segment> {
    Ok(RemoteFile::parse(url)?.segment)
}
