use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use flate2::{write::GzEncoder, Compression};
use losc::{
    container::{Array, MemoryBackend, MemoryContainer, MemoryDataset},
    format::{Decoded, ReadOptions, Reader},
    source::{FileSource, LocalFile},
    Assembler, CatalogLocator, Config, Error, Fetcher, Format, Kind, Registry, Series, Unit,
};

pub const RATE: f64 = 16.0;

/// Archive file name for H1 data sampled at 4 kHz.
pub fn file_name(start: i64, duration: i64, ext: &str) -> String {
    format!("H-H1_LOSC_4_V1-{start}-{duration}.{ext}")
}

/// Strain container where each sample holds its own GPS time.
pub fn strain_container(start: i64, duration: i64) -> MemoryContainer {
    let n = (duration as f64 * RATE) as usize;
    MemoryContainer::default().with_dataset(
        MemoryDataset::new(
            "strain/Strain",
            Array::Float((0..n).map(|i| start as f64 + i as f64 / RATE).collect()),
        )
        .with_attr("Xstart", start as f64)
        .with_attr("Xspacing", 1.0 / RATE)
        .with_attr("Xunits", "second")
        .with_attr("Yunits", "strain"),
    )
}

/// One second data-quality container with every sample set to `value`.
pub fn state_container(start: i64, duration: i64, value: i64) -> MemoryContainer {
    MemoryContainer::default()
        .with_dataset(
            MemoryDataset::new(
                "quality/simple/DQmask",
                Array::Int(vec![value; duration as usize]),
            )
            .with_attr("Xstart", start)
            .with_attr("Xspacing", 1.0)
            .with_attr("Xunits", "s"),
        )
        .with_dataset(MemoryDataset::new(
            "quality/simple/DQDescriptions",
            Array::Bytes(vec![b"NO_CBC_HW_INJ".to_vec(), b"NO_BURST_HW_INJ".to_vec()]),
        ))
}

/// Text reader for files with a `# <t0> <dt>` header followed by one sample per line.
pub struct TextReader;

impl Reader for TextReader {
    fn read(&self, file: &LocalFile, options: &ReadOptions) -> losc::Result<Decoded> {
        let invalid = |message: &str| Error::InvalidData {
            dataset: file.path().display().to_string(),
            message: message.to_string(),
        };
        let text = fs::read_to_string(file.path())?;
        let mut lines = text.lines();
        let header: Vec<f64> = lines
            .next()
            .and_then(|l| l.strip_prefix('#'))
            .ok_or_else(|| invalid("missing header"))?
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| invalid("bad header"))?;
        let [t0, dt] = header[..] else {
            return Err(invalid("bad header"));
        };
        let data = lines
            .map(str::parse)
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| invalid("bad sample"))?;
        let ts = Series::new("Strain", Unit::new("strain"), t0, dt, data)?;
        Ok(Decoded::Strain(ts.cropped(options.start, options.end)))
    }
}

/// Write a gzip compressed text file in `dir` holding `duration` seconds from `start`.
pub fn write_text_gz(dir: &Path, start: i64, duration: i64) -> PathBuf {
    let path = dir.join(file_name(start, duration, "txt.gz"));
    let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    writeln!(enc, "# {start} {}", 1.0 / RATE).unwrap();
    for i in 0..(duration as f64 * RATE) as usize {
        writeln!(enc, "{}", start as f64 + i as f64 / RATE).unwrap();
    }
    enc.finish().unwrap();
    path
}

/// Local archive of files in a temporary directory with a catalog listing them.
pub struct Archive {
    pub dir: tempfile::TempDir,
    pub backend: MemoryBackend,
    urls: Vec<String>,
}

impl Archive {
    pub fn new() -> Self {
        Archive {
            dir: tempfile::tempdir().unwrap(),
            backend: MemoryBackend::default(),
            urls: Vec::default(),
        }
    }

    /// Add an empty placeholder file served by the memory backend.
    pub fn add(&mut self, name: &str, container: MemoryContainer) -> &mut Self {
        let path = self.dir.path().join(name);
        File::create(&path).unwrap();
        self.backend.insert(name, container);
        self.urls.push(format!("file://{}", path.display()));
        self
    }

    pub fn add_path(&mut self, path: &Path) -> &mut Self {
        self.urls.push(path.display().to_string());
        self
    }

    /// Write the catalog file and return its path.
    pub fn catalog(&self) -> PathBuf {
        let path = self.dir.path().join("catalog.txt");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "# local archive").unwrap();
        for url in &self.urls {
            writeln!(file, "{url}").unwrap();
        }
        path
    }

    pub fn assembler(&self, config: Config) -> Assembler<CatalogLocator> {
        let registry = Registry::losc(Arc::new(self.backend.clone())).with(
            Format::AsciiLosc,
            Kind::Strain,
            TextReader,
        );
        let locator = CatalogLocator::from_file(self.catalog()).unwrap();
        Assembler::new(locator, Fetcher::new(FileSource, registry), config)
    }
}
