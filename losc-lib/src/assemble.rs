//! Resolving a time interval to remote files and assembling one continuous series.
use rayon::prelude::*;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

use crate::fetch::Fetcher;
use crate::format::{Decoded, Format, Kind, ReadOptions};
use crate::locate::{Filters, Locator};
use crate::url;
use crate::{Error, GpsTime, Result, Segment, StateVector, TimeSeries};

/// Options for fetching data.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct Config {
    /// Keep downloaded files for reuse.
    #[builder(default)]
    pub cache: bool,
    /// Report per-file progress at info level.
    #[builder(default)]
    pub verbose: bool,
    /// Fetch and decode files concurrently.
    #[builder(default)]
    pub parallel: bool,
    /// Channel name for frame files. Derived from the detector when not set.
    #[builder(default, setter(strip_option, into))]
    pub channel: Option<String>,
    /// Dataset path within container files.
    #[builder(default, setter(strip_option, into))]
    pub path: Option<String>,
}

/// A series type that can be assembled from per-file pieces.
pub trait Piece: Sized + Send {
    const KIND: Kind;

    /// # Errors
    /// [Error::WrongKind] if `decoded` is not of this type.
    fn from_decoded(decoded: Decoded) -> Result<Self>;

    #[must_use]
    fn crop_to(self, keep: Segment) -> Self;

    /// # Errors
    /// [Error::Discontiguous] or [Error::Incompatible] if `other` cannot follow `self`.
    fn append(&mut self, other: Self) -> Result<()>;
}

impl Piece for TimeSeries {
    const KIND: Kind = Kind::Strain;

    fn from_decoded(decoded: Decoded) -> Result<Self> {
        match decoded {
            Decoded::Strain(ts) => Ok(ts),
            other => Err(Error::WrongKind {
                expected: Self::KIND,
                got: other.kind(),
            }),
        }
    }

    fn crop_to(self, keep: Segment) -> Self {
        self.cropped(Some(keep.start), Some(keep.end))
    }

    fn append(&mut self, other: Self) -> Result<()> {
        TimeSeries::append(self, other)
    }
}

impl Piece for StateVector {
    const KIND: Kind = Kind::State;

    fn from_decoded(decoded: Decoded) -> Result<Self> {
        match decoded {
            Decoded::State(sv) => Ok(sv),
            other => Err(Error::WrongKind {
                expected: Self::KIND,
                got: other.kind(),
            }),
        }
    }

    fn crop_to(self, keep: Segment) -> Self {
        self.cropped(Some(keep.start), Some(keep.end))
    }

    fn append(&mut self, other: Self) -> Result<()> {
        StateVector::append(self, other)
    }
}

/// Channel name for frame files, e.g., `H1:LOSC-STRAIN`.
#[must_use]
pub fn frame_channel(detector: &str, kind: Kind) -> String {
    match kind {
        Kind::State => format!("{detector}:LOSC-DQMASK"),
        Kind::Strain => format!("{detector}:LOSC-STRAIN"),
    }
}

/// For event collections, reduce `urls` to the first file covering all of `wanted`.
///
/// Event files are short and overlapping, so a single file is preferred when one suffices.
/// Anything else is returned unchanged.
///
/// # Errors
/// [Error::InvalidFileName] if a candidate's covering segment cannot be determined.
pub fn select_event(urls: Vec<String>, wanted: Segment) -> Result<Vec<String>> {
    if !urls.iter().any(|u| url::is_event(u)) {
        return Ok(urls);
    }
    for u in &urls {
        if url::file_segment(u)?.contains(&wanted) {
            debug!(url = u.as_str(), %wanted, "using single event file");
            return Ok(vec![u.clone()]);
        }
    }
    Ok(urls)
}

/// Append `piece`, if any, to the series assembled so far.
fn join<P: Piece>(acc: Option<P>, piece: Option<P>) -> Result<Option<P>> {
    match (acc, piece) {
        (acc, None) => Ok(acc),
        (None, piece) => Ok(piece),
        (Some(mut acc), Some(piece)) => acc.append(piece).map(|()| Some(acc)),
    }
}

/// Locates, fetches and stitches together the files covering a time interval.
#[derive(Debug)]
pub struct Assembler<L> {
    locator: L,
    fetcher: Fetcher,
    config: Config,
}

impl<L: Locator> Assembler<L> {
    pub fn new(locator: L, fetcher: Fetcher, config: Config) -> Self {
        Assembler {
            locator,
            fetcher,
            config,
        }
    }

    fn progress(&self, urls: &[String], wanted: Segment) {
        let host = urls
            .first()
            .and_then(|u| url::host(u))
            .unwrap_or_else(|| "local".to_string());
        let count = urls.len();
        if self.config.verbose {
            info!("fetched {count} URLs from {host} for {wanted}");
        } else {
            debug!("fetched {count} URLs from {host} for {wanted}");
        }
    }

    /// Requested interval and the URLs of the files covering it.
    ///
    /// # Errors
    /// [Error::InvalidInterval] if `start > end`, or any error from the locator.
    pub fn candidates(
        &self,
        detector: &str,
        start: GpsTime,
        end: GpsTime,
        filters: &Filters,
    ) -> Result<(Segment, Vec<String>)> {
        let wanted = Segment::new(start.seconds(), end.seconds())?;
        let urls = self
            .locator
            .locate(detector, start.floor(), end.ceil(), filters)?;
        self.progress(&urls, wanted);
        Ok((wanted, select_event(urls, wanted)?))
    }

    fn read_options(
        &self,
        detector: &str,
        kind: Kind,
        first: &str,
        wanted: Segment,
    ) -> ReadOptions {
        let channel = match &self.config.channel {
            Some(c) => Some(c.clone()),
            None if Format::from_url(first).ok() == Some(Format::Gwf) => {
                Some(frame_channel(detector, kind))
            }
            None => None,
        };
        ReadOptions {
            path: self.config.path.clone(),
            channel,
            start: Some(wanted.start),
            end: Some(wanted.end),
        }
    }

    /// The piece of `url` falling in `wanted`, or `None` if they do not intersect.
    fn piece<P: Piece>(
        &self,
        url: &str,
        wanted: Segment,
        options: &ReadOptions,
    ) -> Result<Option<P>> {
        let keep = url::file_segment(url)? & wanted;
        if keep.is_empty() {
            debug!(url, %wanted, "skipping file outside interval");
            return Ok(None);
        }
        let decoded = self.fetcher.fetch(
            url,
            P::KIND,
            options,
            self.config.cache,
            self.config.verbose,
        )?;
        let piece = P::from_decoded(decoded).map_err(|e| e.with_url(url))?;
        Ok(Some(piece.crop_to(keep)))
    }

    /// Fetch data for `detector` in `[start, end)` as one continuous series.
    ///
    /// # Errors
    /// Any locator, transport or decode failure, or an assembly error if consecutive
    /// pieces are not contiguous.
    pub fn fetch<P: Piece>(
        &self,
        detector: &str,
        start: impl Into<GpsTime>,
        end: impl Into<GpsTime>,
        filters: &Filters,
    ) -> Result<P> {
        let (start, end) = (start.into(), end.into());
        let (wanted, urls) = self.candidates(detector, start, end, filters)?;
        let Some(first) = urls.first() else {
            return Err(Error::NoData {
                detector: detector.to_string(),
                start: start.floor(),
                end: end.ceil(),
                reason: "locator returned no files".to_string(),
            });
        };
        let options = self.read_options(detector, P::KIND, first, wanted);

        // serial fetching stops at the first file that cannot be appended
        let assembled: Option<P> = if self.config.parallel {
            let pieces = urls
                .par_iter()
                .map(|u| self.piece(u, wanted, &options))
                .collect::<Result<Vec<Option<P>>>>()?;
            pieces.into_iter().try_fold(None, join)?
        } else {
            urls.iter().try_fold(None, |acc, u| {
                join(acc, self.piece(u, wanted, &options)?)
            })?
        };

        assembled.ok_or_else(|| Error::NoData {
            detector: detector.to_string(),
            start: start.floor(),
            end: end.ceil(),
            reason: "no located file intersects the interval".to_string(),
        })
    }

    /// # Errors
    /// See [Assembler::fetch].
    pub fn fetch_strain(
        &self,
        detector: &str,
        start: impl Into<GpsTime>,
        end: impl Into<GpsTime>,
        filters: &Filters,
    ) -> Result<TimeSeries> {
        self.fetch(detector, start, end, filters)
    }

    /// # Errors
    /// See [Assembler::fetch].
    pub fn fetch_state(
        &self,
        detector: &str,
        start: impl Into<GpsTime>,
        end: impl Into<GpsTime>,
        filters: &Filters,
    ) -> Result<StateVector> {
        self.fetch(detector, start, end, filters)
    }

    /// Like [Assembler::fetch] with the series kind chosen at runtime.
    ///
    /// # Errors
    /// See [Assembler::fetch].
    pub fn assemble(
        &self,
        detector: &str,
        start: impl Into<GpsTime>,
        end: impl Into<GpsTime>,
        kind: Kind,
        filters: &Filters,
    ) -> Result<Decoded> {
        match kind {
            Kind::Strain => self.fetch_strain(detector, start, end, filters).map(Decoded::from),
            Kind::State => self.fetch_state(detector, start, end, filters).map(Decoded::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::container::{Array, MemoryBackend, MemoryContainer, MemoryDataset};
    use crate::format::{Reader, Registry};
    use crate::locate::CatalogLocator;
    use crate::source::{ByteSource, LocalFile};
    use crate::{Bits, ErrorKind, Series, Unit};
    use test_case::test_case;

    const RATE: f64 = 16.0;
    const T0: i64 = 1_000_000_000;

    /// Serves every URL from an empty temporary file with the same name, recording the
    /// URLs opened and the cache flag each was opened with.
    struct StubSource {
        dir: tempfile::TempDir,
        opened: Mutex<Vec<(String, bool)>>,
    }

    impl StubSource {
        fn new() -> Arc<Self> {
            Arc::new(StubSource {
                dir: tempfile::tempdir().unwrap(),
                opened: Mutex::default(),
            })
        }

        fn opened(&self) -> Vec<String> {
            self.opened.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
        }

        fn cache_flags(&self) -> Vec<bool> {
            self.opened.lock().unwrap().iter().map(|(_, c)| *c).collect()
        }
    }

    impl ByteSource for Arc<StubSource> {
        fn open(&self, url: &str, cache: bool) -> Result<LocalFile> {
            self.opened.lock().unwrap().push((url.to_string(), cache));
            let path = self.dir.path().join(url::base_name(url));
            std::fs::write(&path, b"").unwrap();
            Ok(LocalFile::persistent(path))
        }
    }

    fn strain_file(start: i64, duration: i64) -> MemoryContainer {
        let n = (duration as f64 * RATE) as usize;
        MemoryContainer::default().with_dataset(
            MemoryDataset::new(
                "strain/Strain",
                Array::Float((0..n).map(|i| (start as f64) + i as f64 / RATE).collect()),
            )
            .with_attr("Xstart", start)
            .with_attr("Xspacing", 1.0 / RATE)
            .with_attr("Xunits", "second")
            .with_attr("Yunits", "strain"),
        )
    }

    fn name(start: i64, duration: i64) -> String {
        format!("H-H1_LOSC_16_V1-{start}-{duration}.hdf5")
    }

    /// Assembler over hdf5 files `(start, duration)` served from `dir` of `base`.
    fn assembler(
        base: &str,
        files: &[(i64, i64)],
        config: Config,
    ) -> (Assembler<CatalogLocator>, Arc<StubSource>) {
        let mut backend = MemoryBackend::default();
        let mut urls = Vec::default();
        for (start, duration) in files {
            backend.insert(&name(*start, *duration), strain_file(*start, *duration));
            urls.push(format!("{base}/{}", name(*start, *duration)));
        }
        let source = StubSource::new();
        let fetcher = Fetcher::new(Arc::clone(&source), Registry::losc(Arc::new(backend)));
        (
            Assembler::new(CatalogLocator::from_urls(urls), fetcher, config),
            source,
        )
    }

    #[test_case(false; "serial")]
    #[test_case(true; "parallel")]
    fn single_file(parallel: bool) {
        let config = Config::builder().parallel(parallel).build();
        let (asm, _) = assembler("https://h.example/archive", &[(T0, 32)], config);
        let ts = asm
            .fetch_strain("H1", T0, T0 + 32, &Filters::default())
            .unwrap();
        assert_eq!(ts.t0, T0 as f64);
        assert_eq!(ts.len(), (32.0 * RATE) as usize);
        assert_eq!(ts.span(), Segment::new(T0 as f64, (T0 + 32) as f64).unwrap());
    }

    #[test_case(false; "serial")]
    #[test_case(true; "parallel")]
    fn two_adjacent_files(parallel: bool) {
        let config = Config::builder().parallel(parallel).build();
        let (asm, _) = assembler("https://h.example/archive", &[(T0 + 16, 16), (T0, 16)], config);
        let ts = asm
            .fetch_strain("H1", T0, T0 + 32, &Filters::default())
            .unwrap();
        assert_eq!(ts.t0, T0 as f64);
        assert_eq!(ts.len(), (32.0 * RATE) as usize);
        // samples hold their own time, so the boundary has no duplicate or missing samples
        for (i, v) in ts.data.iter().enumerate() {
            assert_eq!(*v, T0 as f64 + i as f64 / RATE, "sample {i}");
        }
    }

    #[test]
    fn crops_partial_files() {
        let (asm, _) = assembler(
            "https://h.example/archive",
            &[(T0, 16), (T0 + 16, 16)],
            Config::default(),
        );
        let ts = asm
            .fetch_strain("H1", T0 as f64 + 4.5, T0 as f64 + 20.25, &Filters::default())
            .unwrap();
        assert_eq!(
            ts.span(),
            Segment::new(T0 as f64 + 4.5, T0 as f64 + 20.25).unwrap()
        );
        assert_eq!(ts.len(), ((20.25 - 4.5) * RATE) as usize);
    }

    #[test]
    fn gap_is_an_error() {
        let (asm, _) = assembler(
            "https://h.example/archive",
            &[(T0, 16), (T0 + 20, 12)],
            Config::default(),
        );
        let err = asm
            .fetch_strain("H1", T0, T0 + 32, &Filters::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Assembly);
        assert!(matches!(err, Error::Discontiguous { .. }), "got {err:?}");
    }

    #[test]
    fn serial_fetch_stops_at_gap() {
        let (asm, source) = assembler(
            "https://h.example/archive",
            &[(T0, 8), (T0 + 12, 8), (T0 + 20, 12)],
            Config::default(),
        );
        let err = asm
            .fetch_strain("H1", T0, T0 + 32, &Filters::default())
            .unwrap_err();
        assert!(matches!(err, Error::Discontiguous { .. }), "got {err:?}");
        assert_eq!(
            source.opened(),
            vec![
                format!("https://h.example/archive/{}", name(T0, 8)),
                format!("https://h.example/archive/{}", name(T0 + 12, 8)),
            ]
        );
    }

    #[test_case(Config::builder().cache(true).build(), true; "cache")]
    #[test_case(Config::default(), false; "no cache")]
    fn cache_flag_reaches_source(config: Config, expected: bool) {
        let (asm, source) = assembler("https://h.example/archive", &[(T0, 16), (T0 + 16, 16)], config);
        asm.fetch_strain("H1", T0, T0 + 32, &Filters::default())
            .unwrap();
        assert_eq!(source.cache_flags(), vec![expected; 2]);
    }

    #[test]
    fn event_file_covering_interval_is_preferred() {
        let (asm, source) = assembler(
            "https://h.example/events/GW150914",
            &[(T0 - 16, 32), (T0, 32), (T0 + 8, 32)],
            Config::default(),
        );
        let ts = asm
            .fetch_strain("H1", T0 + 4, T0 + 12, &Filters::default())
            .unwrap();
        assert_eq!(ts.span(), Segment::new((T0 + 4) as f64, (T0 + 12) as f64).unwrap());
        assert_eq!(
            source.opened(),
            vec![format!("https://h.example/events/GW150914/{}", name(T0 - 16, 32))]
        );
    }

    #[test]
    fn select_event_without_covering_file() {
        let urls = vec![
            format!("https://h/events/{}", name(T0, 8)),
            format!("https://h/events/{}", name(T0 + 8, 8)),
        ];
        let wanted = Segment::new(T0 as f64 + 4.0, T0 as f64 + 12.0).unwrap();
        assert_eq!(select_event(urls.clone(), wanted).unwrap(), urls);
    }

    #[test]
    fn non_event_files_are_not_reduced() {
        let urls = vec![
            format!("https://h/archive/{}", name(T0 - 16, 32)),
            format!("https://h/archive/{}", name(T0, 32)),
        ];
        let wanted = Segment::new(T0 as f64, T0 as f64 + 8.0).unwrap();
        assert_eq!(select_event(urls.clone(), wanted).unwrap(), urls);
    }

    #[test]
    fn locator_error_is_surfaced() {
        let (asm, _) = assembler("https://h.example/archive", &[(T0, 32)], Config::default());
        let err = asm
            .fetch_strain("L1", T0, T0 + 32, &Filters::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Locator);
    }

    #[test]
    fn decode_error_names_url() {
        let (asm, _) = assembler("https://h.example/archive", &[(T0, 32)], Config::default());
        let err = asm
            .fetch_state("H1", T0, T0 + 32, &Filters::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert!(err.to_string().contains(&name(T0, 32)), "got {err}");
    }

    #[test]
    fn reversed_interval_is_usage_error() {
        let (asm, _) = assembler("https://h.example/archive", &[(T0, 32)], Config::default());
        let err = asm
            .fetch_strain("H1", T0 + 32, T0, &Filters::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    /// Frame reader stand-in recording the channel it was asked for.
    #[derive(Default)]
    struct FrameReader {
        channels: Mutex<Vec<Option<String>>>,
    }

    impl Reader for Arc<FrameReader> {
        fn read(&self, file: &LocalFile, options: &ReadOptions) -> Result<Decoded> {
            self.channels.lock().unwrap().push(options.channel.clone());
            let segment = url::file_segment(&file.path().to_string_lossy())?;
            let n = segment.duration() as usize;
            let series =
                Series::new("DQ", Unit::new("0:DATA 1:CAT1"), segment.start, 1.0, vec![3u32; n])?;
            Ok(Decoded::State(StateVector::new(series, Bits::default())))
        }
    }

    fn frame_assembler(config: Config) -> (Assembler<CatalogLocator>, Arc<FrameReader>) {
        let reader = Arc::new(FrameReader::default());
        let registry = Registry::default().with(Format::Gwf, Kind::State, Arc::clone(&reader));
        let fetcher = Fetcher::new(StubSource::new(), registry);
        let locator = CatalogLocator::from_urls([
            format!("https://h.example/archive/H-H1_LOSC_4_V1-{T0}-16.gwf"),
            format!("https://h.example/archive/H-H1_LOSC_4_V1-{}-16.gwf", T0 + 16),
        ]);
        (Assembler::new(locator, fetcher, config), reader)
    }

    #[test]
    fn frame_channel_is_derived_from_detector() {
        let (asm, reader) = frame_assembler(Config::default());
        let sv = asm
            .fetch_state("H1", T0, T0 + 32, &Filters::default())
            .unwrap();
        assert_eq!(sv.len(), 32);
        assert_eq!(sv.bits.get(1), Some("CAT1"));
        assert!(sv.series.unit.is_dimensionless());
        assert_eq!(
            *reader.channels.lock().unwrap(),
            vec![Some("H1:LOSC-DQMASK".to_string()); 2]
        );
    }

    #[test]
    fn explicit_channel_is_kept() {
        let (asm, reader) = frame_assembler(Config::builder().channel("H1:GDS-CALIB").build());
        asm.fetch_state("H1", T0, T0 + 8, &Filters::default())
            .unwrap();
        assert_eq!(
            *reader.channels.lock().unwrap(),
            vec![Some("H1:GDS-CALIB".to_string())]
        );
    }

    #[test]
    fn channel_names() {
        assert_eq!(frame_channel("L1", Kind::Strain), "L1:LOSC-STRAIN");
        assert_eq!(frame_channel("L1", Kind::State), "L1:LOSC-DQMASK");
    }

    #[test]
    fn assemble_by_kind() {
        let (asm, _) = assembler("https://h.example/archive", &[(T0, 32)], Config::default());
        let decoded = asm
            .assemble("H1", T0, T0 + 8, Kind::Strain, &Filters::default())
            .unwrap();
        assert_eq!(decoded.kind(), Kind::Strain);
    }
}
