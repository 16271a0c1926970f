//! Local, readable copies of remote files.
use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use flate2::read::GzDecoder;
use tempfile::TempPath;
use tracing::{debug, trace};

#[cfg(feature = "http")]
pub use self::http::HttpSource;
use crate::{url, Error, Result};

/// A readable file on local disk.
///
/// Temporary storage backing the file, if any, is removed when this is dropped.
#[derive(Debug)]
pub struct LocalFile {
    path: PathBuf,
    _temp: Option<TempPath>,
}

impl LocalFile {
    /// An existing file that is left in place when dropped.
    #[must_use]
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        LocalFile {
            path: path.into(),
            _temp: None,
        }
    }

    /// A temporary file removed when dropped.
    #[must_use]
    pub fn temporary(temp: TempPath) -> Self {
        LocalFile {
            path: temp.to_path_buf(),
            _temp: Some(temp),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self._temp.is_some()
    }
}

/// Provides local copies of files by URL.
pub trait ByteSource: Send + Sync {
    /// Make the file at `url` available locally. With `cache` the copy is kept for later
    /// use, otherwise it is released with the returned [LocalFile].
    ///
    /// # Errors
    /// [Error::Transport] if the file cannot be acquired.
    fn open(&self, url: &str, cache: bool) -> Result<LocalFile>;
}

fn transport(url: &str, message: impl ToString) -> Error {
    Error::Transport {
        url: url.to_string(),
        message: message.to_string(),
    }
}

/// Plain paths and `file://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl ByteSource for FileSource {
    fn open(&self, url: &str, _cache: bool) -> Result<LocalFile> {
        let path = url::to_path(url);
        if !path.is_file() {
            return Err(transport(url, "no such file"));
        }
        trace!(?path, "using local file");
        Ok(LocalFile::persistent(path))
    }
}

/// Dispatches on URL scheme: `http(s)://` to an [HttpSource] when the `http` feature is
/// enabled, anything else to [FileSource].
#[derive(Debug, Default)]
pub struct AutoSource {
    file: FileSource,
    #[cfg(feature = "http")]
    http: HttpSource,
}

impl AutoSource {
    #[cfg(feature = "http")]
    #[must_use]
    pub fn new(http: HttpSource) -> Self {
        AutoSource {
            file: FileSource,
            http,
        }
    }
}

impl ByteSource for AutoSource {
    fn open(&self, url: &str, cache: bool) -> Result<LocalFile> {
        if url.starts_with("http://") || url.starts_with("https://") {
            #[cfg(feature = "http")]
            return self.http.open(url, cache);
            #[cfg(not(feature = "http"))]
            return Err(transport(url, "built without http support"));
        }
        self.file.open(url, cache)
    }
}

/// Open `url` with `source`, decompressing a gzip compressed file into a temporary file
/// carrying the inner extension.
///
/// # Errors
/// [Error::Transport] if the file cannot be acquired or decompressed.
pub fn open_readable(source: &dyn ByteSource, url: &str, cache: bool) -> Result<LocalFile> {
    let local = source.open(url, cache)?;
    match url::extension(url) {
        Some((ext, Some(_))) => {
            debug!(url, "decompressing");
            gunzip(&local, &ext).map_err(|e| transport(url, format!("decompressing: {e}")))
        }
        _ => Ok(local),
    }
}

fn gunzip(local: &LocalFile, ext: &str) -> io::Result<LocalFile> {
    let mut decoder = GzDecoder::new(BufReader::new(File::open(local.path())?));
    let out = tempfile::Builder::new()
        .prefix("losc-")
        .suffix(&format!(".{ext}"))
        .tempfile()?;
    let mut writer = BufWriter::new(out.as_file());
    io::copy(&mut decoder, &mut writer)?;
    writer.flush()?;
    drop(writer);
    Ok(LocalFile::temporary(out.into_temp_path()))
}

#[cfg(feature = "http")]
mod http {
    use std::{fs, io::Write, path::PathBuf};

    use tracing::{debug, info};
    use typed_builder::TypedBuilder;

    use super::{transport, ByteSource, LocalFile};
    use crate::{url, Result};

    fn default_cache_dir() -> PathBuf {
        std::env::temp_dir().join("losc-cache")
    }

    /// Downloads over HTTP(S) with a blocking client.
    #[derive(Debug, TypedBuilder)]
    pub struct HttpSource {
        /// Cached downloads are stored here by file name.
        #[builder(default = default_cache_dir(), setter(into))]
        cache_dir: PathBuf,
        #[builder(default)]
        client: reqwest::blocking::Client,
    }

    impl Default for HttpSource {
        fn default() -> Self {
            HttpSource::builder().build()
        }
    }

    impl HttpSource {
        fn download<W: Write>(&self, url: &str, mut writer: W) -> Result<u64> {
            let mut resp = self
                .client
                .get(url)
                .send()
                .and_then(reqwest::blocking::Response::error_for_status)
                .map_err(|e| transport(url, e))?;
            let size = resp.copy_to(&mut writer).map_err(|e| transport(url, e))?;
            writer.flush().map_err(|e| transport(url, e))?;
            Ok(size)
        }
    }

    impl ByteSource for HttpSource {
        fn open(&self, url: &str, cache: bool) -> Result<LocalFile> {
            let name = url::base_name(url);
            if cache {
                let dest = self.cache_dir.join(&name);
                if dest.is_file() {
                    debug!(?dest, "using cached download");
                    return Ok(LocalFile::persistent(dest));
                }
                fs::create_dir_all(&self.cache_dir).map_err(|e| transport(url, e))?;
                let mut tmp =
                    tempfile::NamedTempFile::new_in(&self.cache_dir).map_err(|e| transport(url, e))?;
                let size = self.download(url, tmp.as_file_mut())?;
                tmp.persist(&dest).map_err(|e| transport(url, e.error))?;
                info!(url, size, ?dest, "downloaded");
                return Ok(LocalFile::persistent(dest));
            }

            // keep the file name suffix so readers see the remote extension
            let suffix = name.find('.').map_or("", |idx| &name[idx..]);
            let mut tmp = tempfile::Builder::new()
                .prefix("losc-")
                .suffix(suffix)
                .tempfile()
                .map_err(|e| transport(url, e))?;
            let size = self.download(url, tmp.as_file_mut())?;
            debug!(url, size, "downloaded");
            Ok(LocalFile::temporary(tmp.into_temp_path()))
        }
    }

    #[cfg(test)]
    mod tests {
        use std::{
            io::{BufRead, BufReader, Write},
            net::TcpListener,
            thread::{self, JoinHandle},
        };

        use super::*;
        use crate::ErrorKind;

        const NAME: &str = "H-H1_LOSC_4_V1-0-2.hdf5";

        /// Serve `body` to each of `count` requests, returning the requested paths.
        fn serve(body: &'static [u8], count: usize) -> (String, JoinHandle<Vec<String>>) {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            let handle = thread::spawn(move || {
                let mut paths = Vec::default();
                for stream in listener.incoming().take(count) {
                    let mut stream = stream.unwrap();
                    let mut reader = BufReader::new(stream.try_clone().unwrap());
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    paths.push(line.split_whitespace().nth(1).unwrap_or_default().to_string());
                    loop {
                        line.clear();
                        reader.read_line(&mut line).unwrap();
                        if line == "\r\n" || line.is_empty() {
                            break;
                        }
                    }
                    write!(
                        stream,
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    )
                    .unwrap();
                    stream.write_all(body).unwrap();
                }
                paths
            });
            (format!("http://{addr}"), handle)
        }

        #[test]
        fn cached_file_is_used_without_request() {
            let dir = tempfile::tempdir().unwrap();
            let seeded = dir.path().join(NAME);
            fs::write(&seeded, b"cached").unwrap();

            // nothing listens on the discard port
            let source = HttpSource::builder().cache_dir(dir.path()).build();
            let local = source
                .open(&format!("http://127.0.0.1:9/archive/{NAME}"), true)
                .unwrap();
            assert_eq!(local.path(), seeded);
            assert!(!local.is_temporary());
        }

        #[test]
        fn download_is_cached() {
            let dir = tempfile::tempdir().unwrap();
            let (base, server) = serve(b"remote", 1);
            let source = HttpSource::builder().cache_dir(dir.path()).build();
            let url = format!("{base}/archive/{NAME}");

            let local = source.open(&url, true).unwrap();
            assert_eq!(local.path(), dir.path().join(NAME));
            drop(local);
            // served from the cache, the server only answers once
            let local = source.open(&url, true).unwrap();
            assert_eq!(fs::read(local.path()).unwrap(), b"remote");

            assert_eq!(server.join().unwrap(), vec![format!("/archive/{NAME}")]);
        }

        #[test]
        fn uncached_download_is_removed_on_drop() {
            let dir = tempfile::tempdir().unwrap();
            let (base, server) = serve(b"remote", 1);
            let source = HttpSource::builder().cache_dir(dir.path()).build();

            let local = source.open(&format!("{base}/archive/{NAME}"), false).unwrap();
            assert!(local.is_temporary());
            assert_eq!(local.path().extension().unwrap(), "hdf5");
            assert_eq!(fs::read(local.path()).unwrap(), b"remote");
            let temp = local.path().to_path_buf();
            drop(local);
            assert!(!temp.exists());
            assert!(!dir.path().join(NAME).exists());
            server.join().unwrap();
        }

        #[test]
        fn unreachable_host_is_transport_error() {
            let dir = tempfile::tempdir().unwrap();
            let source = HttpSource::builder().cache_dir(dir.path()).build();
            let err = source
                .open(&format!("http://127.0.0.1:9/archive/{NAME}"), false)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Transport);
        }
    }
}
