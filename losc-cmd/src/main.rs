mod fetch;
mod locate;

use std::{io::stderr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use losc::{
    container::ContainerBackend, source::AutoSource, Assembler, CatalogLocator, Config, Fetcher,
    Filters, Format, GpsTime, Registry,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Restrictions on the files used.
#[derive(Args, Debug, Clone)]
struct FilterArgs {
    /// Only files sampled at this rate, e.g., 4096, 4kHz or 16kHz.
    #[arg(short = 'r', long, value_parser = losc::units::parse_frequency, value_name = "rate")]
    sample_rate: Option<f64>,

    /// Only files from this dataset, e.g., LOSC or CLN.
    #[arg(long)]
    tag: Option<String>,

    /// Only files of this dataset version, e.g., V1 or R1.
    #[arg(long, value_name = "version")]
    dataset_version: Option<String>,

    /// Only files served by this host.
    #[arg(long)]
    host: Option<String>,

    /// Only files of this format, e.g., hdf5.losc, ascii.losc or gwf.
    #[arg(long)]
    format: Option<Format>,
}

impl From<&FilterArgs> for Filters {
    fn from(args: &FilterArgs) -> Self {
        Filters {
            sample_rate: args.sample_rate,
            tag: args.tag.clone(),
            version: args.dataset_version.clone(),
            host: args.host.clone(),
            format: args.format,
        }
    }
}

/// Detector, interval and catalog shared by all commands.
#[derive(Args, Debug, Clone)]
struct Query {
    /// Detector, e.g., H1, L1 or V1.
    detector: String,

    /// Start of the interval, as GPS seconds or a timestamp (RFC3339).
    #[arg(value_name = "start")]
    start: GpsTime,

    /// End of the interval, as GPS seconds or a timestamp (RFC3339).
    #[arg(value_name = "end")]
    end: GpsTime,

    /// File listing archive file URLs, one per line.
    #[arg(short, long, value_name = "path")]
    catalog: PathBuf,

    #[command(flatten)]
    filters: FilterArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch strain or data-quality for an interval and summarize it.
    ///
    /// Each archive file covering the interval is read and cropped to the interval, and
    /// the pieces are joined into one continuous series. Reading hdf5.losc files requires
    /// a build with the hdf5 feature.
    Fetch {
        #[command(flatten)]
        query: Query,

        /// Fetch data-quality flags rather than strain.
        #[arg(long, action)]
        state: bool,

        /// Channel name for frame files. Defaults to <detector>:LOSC-STRAIN, or
        /// <detector>:LOSC-DQMASK with --state.
        #[arg(long)]
        channel: Option<String>,

        /// Dataset path within hdf5 files.
        #[arg(long, value_name = "path")]
        path: Option<String>,

        /// Keep downloaded files for reuse.
        #[arg(long, action, env = "LOSC_CACHE")]
        cache: bool,

        /// Directory for cached downloads.
        #[arg(long, value_name = "path", env = "LOSC_CACHE_DIR")]
        cache_dir: Option<PathBuf>,

        /// Fetch files concurrently.
        #[arg(long, action)]
        parallel: bool,

        /// Report progress for each file.
        #[arg(short, long, action)]
        verbose: bool,

        /// Include sample values in the output.
        #[arg(long, action)]
        samples: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        output: fetch::Format,
    },
    /// List the files that would be fetched for an interval.
    Locate {
        #[command(flatten)]
        query: Query,

        /// Output format
        #[arg(short, long, default_value = "text")]
        output: fetch::Format,
    },
}

#[cfg(feature = "hdf5")]
fn container_backend() -> Result<Arc<dyn ContainerBackend>> {
    Ok(Arc::new(losc::container::Hdf5Backend))
}

#[cfg(not(feature = "hdf5"))]
fn container_backend() -> Result<Arc<dyn ContainerBackend>> {
    Err(losc::Error::NoBackend("hdf5.losc".to_string()))
        .context("rebuild with the hdf5 feature to read hdf5 files")
}

#[cfg(feature = "http")]
fn byte_source(cache_dir: Option<&PathBuf>) -> AutoSource {
    match cache_dir {
        Some(dir) => AutoSource::new(losc::source::HttpSource::builder().cache_dir(dir.clone()).build()),
        None => AutoSource::default(),
    }
}

#[cfg(not(feature = "http"))]
fn byte_source(cache_dir: Option<&PathBuf>) -> AutoSource {
    if cache_dir.is_some() {
        tracing::warn!("--cache-dir has no effect without the http feature");
    }
    AutoSource::default()
}

fn catalog(query: &Query) -> Result<CatalogLocator> {
    let locator = CatalogLocator::from_file(&query.catalog)
        .with_context(|| format!("failed to read catalog {:?}", query.catalog))?;
    debug!("catalog has {} files", locator.len());
    Ok(locator)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("LOSC_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Fetch {
            query,
            state,
            channel,
            path,
            cache,
            cache_dir,
            parallel,
            verbose,
            samples,
            output,
        } => {
            let registry = Registry::losc(container_backend()?);
            let fetcher = Fetcher::new(byte_source(cache_dir.as_ref()), registry);
            let config = Config {
                cache: *cache,
                verbose: *verbose,
                parallel: *parallel,
                channel: channel.clone(),
                path: path.clone(),
            };
            let assembler = Assembler::new(catalog(query)?, fetcher, config);
            fetch::fetch(&assembler, query, *state, *samples, output)
        }
        Commands::Locate { query, output } => {
            let fetcher = Fetcher::new(AutoSource::default(), Registry::default());
            let assembler = Assembler::new(catalog(query)?, fetcher, Config::default());
            locate::locate(&assembler, query, output)
        }
    }
}
