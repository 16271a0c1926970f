use std::path::Path;

use ::hdf5::types::{FixedAscii, FixedUnicode, TypeDescriptor, VarLenAscii, VarLenUnicode};
use tracing::trace;

use super::{Array, AttrValue, Container, ContainerBackend, Dataset};
use crate::{Error, Result};

/// Longest fixed length string read from a file.
const MAX_FIXED_STRING: usize = 1024;

/// [ContainerBackend] reading HDF5 files through libhdf5.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hdf5Backend;

impl ContainerBackend for Hdf5Backend {
    fn open(&self, path: &Path) -> Result<Box<dyn Container>> {
        trace!(?path, "opening hdf5 file");
        let file = ::hdf5::File::open(path).map_err(|e| Error::InvalidContainer {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Box::new(Hdf5File(file)))
    }
}

struct Hdf5File(::hdf5::File);

impl Container for Hdf5File {
    fn find_dataset(&self, path: &str) -> Result<Box<dyn Dataset + '_>> {
        let dataset = self
            .0
            .dataset(path)
            .map_err(|_| Error::MissingDataset(path.to_string()))?;
        Ok(Box::new(Hdf5Dataset {
            path: path.trim_matches('/').to_string(),
            dataset,
        }))
    }
}

struct Hdf5Dataset {
    path: String,
    dataset: ::hdf5::Dataset,
}

impl Hdf5Dataset {
    fn invalid(&self, e: &::hdf5::Error) -> Error {
        Error::InvalidData {
            dataset: self.path.clone(),
            message: e.to_string(),
        }
    }
}

impl Dataset for Hdf5Dataset {
    fn path(&self) -> &str {
        &self.path
    }

    fn attr(&self, name: &str) -> Result<Option<AttrValue>> {
        let names = self.dataset.attr_names().map_err(|e| self.invalid(&e))?;
        if !names.iter().any(|n| n == name) {
            return Ok(None);
        }
        let invalid = |e: ::hdf5::Error| Error::InvalidAttribute {
            dataset: self.path.clone(),
            name: name.to_string(),
            message: e.to_string(),
        };
        let attr = self.dataset.attr(name).map_err(invalid)?;
        let descriptor = attr
            .dtype()
            .and_then(|t| t.to_descriptor())
            .map_err(invalid)?;
        let value = match descriptor {
            TypeDescriptor::Float(_) => AttrValue::Float(attr.read_scalar::<f64>().map_err(invalid)?),
            TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => {
                AttrValue::Int(attr.read_scalar::<i64>().map_err(invalid)?)
            }
            TypeDescriptor::VarLenUnicode => AttrValue::Text(
                attr.read_scalar::<VarLenUnicode>()
                    .map_err(invalid)?
                    .as_str()
                    .to_string(),
            ),
            TypeDescriptor::VarLenAscii => AttrValue::Text(
                attr.read_scalar::<VarLenAscii>()
                    .map_err(invalid)?
                    .as_str()
                    .to_string(),
            ),
            TypeDescriptor::FixedAscii(_) => AttrValue::Text(
                attr.read_scalar::<FixedAscii<MAX_FIXED_STRING>>()
                    .map_err(invalid)?
                    .as_str()
                    .to_string(),
            ),
            TypeDescriptor::FixedUnicode(_) => AttrValue::Text(
                attr.read_scalar::<FixedUnicode<MAX_FIXED_STRING>>()
                    .map_err(invalid)?
                    .as_str()
                    .to_string(),
            ),
            other => {
                return Err(Error::InvalidAttribute {
                    dataset: self.path.clone(),
                    name: name.to_string(),
                    message: format!("unsupported attribute type {other:?}"),
                })
            }
        };
        Ok(Some(value))
    }

    fn read(&self) -> Result<Array> {
        let descriptor = self
            .dataset
            .dtype()
            .and_then(|t| t.to_descriptor())
            .map_err(|e| self.invalid(&e))?;
        let array = match descriptor {
            TypeDescriptor::Float(_) => Array::Float(
                self.dataset
                    .read_raw::<f64>()
                    .map_err(|e| self.invalid(&e))?,
            ),
            TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => Array::Int(
                self.dataset
                    .read_raw::<i64>()
                    .map_err(|e| self.invalid(&e))?,
            ),
            TypeDescriptor::FixedAscii(_) => Array::Bytes(
                self.dataset
                    .read_raw::<FixedAscii<MAX_FIXED_STRING>>()
                    .map_err(|e| self.invalid(&e))?
                    .iter()
                    .map(|s| s.as_bytes().to_vec())
                    .collect(),
            ),
            TypeDescriptor::FixedUnicode(_) => Array::Bytes(
                self.dataset
                    .read_raw::<FixedUnicode<MAX_FIXED_STRING>>()
                    .map_err(|e| self.invalid(&e))?
                    .iter()
                    .map(|s| s.as_bytes().to_vec())
                    .collect(),
            ),
            TypeDescriptor::VarLenAscii => Array::Bytes(
                self.dataset
                    .read_raw::<VarLenAscii>()
                    .map_err(|e| self.invalid(&e))?
                    .iter()
                    .map(|s| s.as_bytes().to_vec())
                    .collect(),
            ),
            TypeDescriptor::VarLenUnicode => Array::Bytes(
                self.dataset
                    .read_raw::<VarLenUnicode>()
                    .map_err(|e| self.invalid(&e))?
                    .iter()
                    .map(|s| s.as_bytes().to_vec())
                    .collect(),
            ),
            other => {
                return Err(Error::InvalidData {
                    dataset: self.path.clone(),
                    message: format!("unsupported dataset type {other:?}"),
                })
            }
        };
        Ok(array)
    }
}
