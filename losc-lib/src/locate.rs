//! Mapping a detector and time range to candidate file URLs.
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use tracing::{debug, trace, warn};

use crate::url::{self, RemoteFile};
use crate::{Error, Format, Result, Segment};

/// Restrictions on the files a [Locator] returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    /// Sample rate in Hz.
    pub sample_rate: Option<f64>,
    /// Dataset tag, e.g., `LOSC` or `CLN`.
    pub tag: Option<String>,
    /// Dataset version, e.g., `V1` or `R1`.
    pub version: Option<String>,
    /// Only files served by this host.
    pub host: Option<String>,
    pub format: Option<Format>,
}

impl Filters {
    /// True if the tag token for the sample rate, e.g. `4` or `4KHZ` for 4096 Hz, is in
    /// `parts`.
    fn rate_matches(rate: f64, parts: &[&str]) -> bool {
        let khz = (rate / 1024.0).round();
        if khz < 1.0 {
            return false;
        }
        let plain = format!("{khz}");
        let suffixed = format!("{khz}KHZ");
        parts
            .iter()
            .any(|p| *p == plain || p.eq_ignore_ascii_case(&suffixed))
    }

    /// True if `file` passes every filter that is set.
    #[must_use]
    pub fn matches(&self, file: &RemoteFile) -> bool {
        let parts: Vec<&str> = file.tag_parts().collect();
        let has_part = |s: &str| parts.iter().any(|p| p.eq_ignore_ascii_case(s));

        if let Some(rate) = self.sample_rate {
            if !Filters::rate_matches(rate, &parts) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !has_part(tag) {
                return false;
            }
        }
        if let Some(version) = &self.version {
            if !has_part(version) {
                return false;
            }
        }
        if let Some(host) = &self.host {
            match url::host(&file.url) {
                Some(h) if h.eq_ignore_ascii_case(host) => {}
                _ => return false,
            }
        }
        if let Some(format) = self.format {
            if Format::from_url(&file.url).ok() != Some(format) {
                return false;
            }
        }
        true
    }
}

/// Source of candidate file URLs.
pub trait Locator: Send + Sync {
    /// URLs of files holding data for `detector` in `[start, end)`, ordered by start time.
    ///
    /// # Errors
    /// [Error::NoData] if nothing matches.
    fn locate(&self, detector: &str, start: i64, end: i64, filters: &Filters)
        -> Result<Vec<String>>;
}

/// [Locator] over a fixed list of URLs following the file naming convention.
#[derive(Debug, Clone, Default)]
pub struct CatalogLocator {
    files: Vec<RemoteFile>,
}

impl CatalogLocator {
    /// Catalog of `urls`. URLs whose file name does not follow the convention are skipped.
    pub fn from_urls<S: AsRef<str>>(urls: impl IntoIterator<Item = S>) -> Self {
        let files = urls
            .into_iter()
            .filter_map(|u| match RemoteFile::parse(u.as_ref()) {
                Ok(f) => Some(f),
                Err(err) => {
                    warn!(url = u.as_ref(), %err, "skipping catalog entry");
                    None
                }
            })
            .collect();
        CatalogLocator { files }
    }

    /// Read a catalog with one URL per line. Blank lines and lines starting with `#` are
    /// ignored.
    ///
    /// # Errors
    /// [Error::Io] if reading fails.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut urls = Vec::default();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            urls.push(line.to_string());
        }
        Ok(CatalogLocator::from_urls(urls))
    }

    /// # Errors
    /// [Error::Io] if the file cannot be read.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(?path, "reading catalog");
        CatalogLocator::from_reader(BufReader::new(File::open(path)?))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Locator for CatalogLocator {
    fn locate(
        &self,
        detector: &str,
        start: i64,
        end: i64,
        filters: &Filters,
    ) -> Result<Vec<String>> {
        let no_data = |reason: &str| Error::NoData {
            detector: detector.to_string(),
            start,
            end,
            reason: reason.to_string(),
        };
        #[allow(clippy::cast_precision_loss)]
        let wanted = Segment::new(start as f64, end as f64)?;
        if wanted.is_empty() {
            return Err(no_data("empty interval"));
        }

        let mut found: Vec<&RemoteFile> = self
            .files
            .iter()
            .filter(|f| f.tag.starts_with(detector))
            .filter(|f| f.segment.intersects(&wanted))
            .filter(|f| filters.matches(f))
            .collect();
        if found.is_empty() {
            return Err(no_data("no matching files"));
        }
        found.sort_by(|a, b| a.segment.start.total_cmp(&b.segment.start));
        trace!(detector, start, end, count = found.len(), "located");

        Ok(found.into_iter().map(|f| f.url.clone()).collect())
    }
}
