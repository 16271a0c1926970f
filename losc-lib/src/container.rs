//! Access to hierarchical archive containers.
//!
//! Decoders only need to locate a dataset by path, read its array payload and read its
//! attributes. [ContainerBackend] opens a local file into a [Container]; an HDF5
//! implementation is available with the `hdf5` feature.
#[cfg(feature = "hdf5")]
mod h5;

use std::{collections::HashMap, path::Path, sync::Arc};

#[cfg(feature = "hdf5")]
pub use self::h5::Hdf5Backend;
use crate::{Error, Result};

/// Array payload of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    Float(Vec<f64>),
    Int(Vec<i64>),
    /// One byte string per element, e.g., fixed length strings.
    Bytes(Vec<Vec<u8>>),
}

impl Array {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Array::Float(v) => v.len(),
            Array::Int(v) => v.len(),
            Array::Bytes(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scalar attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Float(f64),
    Int(i64),
    Text(String),
}

impl AttrValue {
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

pub trait Dataset {
    /// Full path of this dataset within its container.
    fn path(&self) -> &str;

    /// Read attribute `name`, or `None` if there is no such attribute.
    ///
    /// # Errors
    /// If the attribute exists but cannot be read.
    fn attr(&self, name: &str) -> Result<Option<AttrValue>>;

    /// Read the full array payload.
    ///
    /// # Errors
    /// If the payload cannot be read or has an unsupported type.
    fn read(&self) -> Result<Array>;
}

impl<D: Dataset + ?Sized> Dataset for &D {
    fn path(&self) -> &str {
        (**self).path()
    }

    fn attr(&self, name: &str) -> Result<Option<AttrValue>> {
        (**self).attr(name)
    }

    fn read(&self) -> Result<Array> {
        (**self).read()
    }
}

pub trait Container {
    /// Locate the dataset at `path`, e.g., `strain/Strain`.
    ///
    /// # Errors
    /// [Error::MissingDataset] if there is no dataset at `path`.
    fn find_dataset(&self, path: &str) -> Result<Box<dyn Dataset + '_>>;
}

impl<C: Container + ?Sized> Container for Arc<C> {
    fn find_dataset(&self, path: &str) -> Result<Box<dyn Dataset + '_>> {
        (**self).find_dataset(path)
    }
}

/// Opens local files as containers.
pub trait ContainerBackend: Send + Sync {
    /// # Errors
    /// If `path` cannot be opened as a container.
    fn open(&self, path: &Path) -> Result<Box<dyn Container>>;
}

/// Dataset held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryDataset {
    path: String,
    data: Array,
    attrs: HashMap<String, AttrValue>,
}

impl MemoryDataset {
    #[must_use]
    pub fn new(path: &str, data: Array) -> Self {
        MemoryDataset {
            path: path.trim_matches('/').to_string(),
            data,
            attrs: HashMap::default(),
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }
}

impl Dataset for MemoryDataset {
    fn path(&self) -> &str {
        &self.path
    }

    fn attr(&self, name: &str) -> Result<Option<AttrValue>> {
        Ok(self.attrs.get(name).cloned())
    }

    fn read(&self) -> Result<Array> {
        Ok(self.data.clone())
    }
}

/// Container held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryContainer {
    datasets: HashMap<String, MemoryDataset>,
}

impl MemoryContainer {
    #[must_use]
    pub fn with_dataset(mut self, dataset: MemoryDataset) -> Self {
        self.datasets.insert(dataset.path.clone(), dataset);
        self
    }
}

impl Container for MemoryContainer {
    fn find_dataset(&self, path: &str) -> Result<Box<dyn Dataset + '_>> {
        let key = path.trim_matches('/');
        match self.datasets.get(key) {
            Some(ds) => Ok(Box::new(ds)),
            None => Err(Error::MissingDataset(path.to_string())),
        }
    }
}

/// Backend serving [MemoryContainer]s by file name, regardless of directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    files: HashMap<String, Arc<MemoryContainer>>,
}

impl MemoryBackend {
    pub fn insert(&mut self, file_name: &str, container: MemoryContainer) {
        self.files
            .insert(file_name.to_string(), Arc::new(container));
    }

    #[must_use]
    pub fn with_file(mut self, file_name: &str, container: MemoryContainer) -> Self {
        self.insert(file_name, container);
        self
    }
}

impl ContainerBackend for MemoryBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn Container>> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match self.files.get(&name) {
            Some(c) => Ok(Box::new(Arc::clone(c))),
            None => Err(Error::InvalidContainer {
                path: path.display().to_string(),
                message: "no such container".to_string(),
            }),
        }
    }
}
