//! Decoders for the LOSC HDF5 layout.
//!
//! Strain files hold a dataset, by default at `strain/Strain`, with the sample array and
//! attributes `Xstart` (GPS start), `Xspacing` (sample spacing in `Xunits`) and `Yunits`.
//!
//! Data-quality is held under a base path, by default `quality/simple`, as a `DQmask`
//! integer dataset and a `DQDescriptions` dataset naming each bit in ascending order.
use std::sync::Arc;

use tracing::trace;

use crate::container::{Array, AttrValue, Container, ContainerBackend, Dataset};
use crate::format::{Decoded, Kind, ReadOptions, Reader};
use crate::source::LocalFile;
use crate::{units, Bits, Error, Result, Series, StateVector, TimeSeries, Unit};

pub const DEFAULT_STRAIN_PATH: &str = "strain/Strain";
pub const DEFAULT_STATE_PATH: &str = "quality/simple";

const STATE_NAME: &str = "Data quality";

fn required(ds: &dyn Dataset, name: &str) -> Result<AttrValue> {
    ds.attr(name)?.ok_or_else(|| Error::MissingAttribute {
        dataset: ds.path().to_string(),
        name: name.to_string(),
    })
}

fn invalid_attr(ds: &dyn Dataset, name: &str, message: impl Into<String>) -> Error {
    Error::InvalidAttribute {
        dataset: ds.path().to_string(),
        name: name.to_string(),
        message: message.into(),
    }
}

fn required_f64(ds: &dyn Dataset, name: &str) -> Result<f64> {
    required(ds, name)?
        .as_f64()
        .ok_or_else(|| invalid_attr(ds, name, "expected a number"))
}

fn required_str(ds: &dyn Dataset, name: &str) -> Result<String> {
    required(ds, name)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| invalid_attr(ds, name, "expected a string"))
}

/// Sample spacing in seconds from `Xspacing` expressed in `Xunits`.
fn spacing(ds: &dyn Dataset, xspacing: f64) -> Result<f64> {
    let xunits = required_str(ds, "Xunits")?;
    let factor =
        units::seconds_per(&xunits).map_err(|e| invalid_attr(ds, "Xunits", e.to_string()))?;
    Ok(xspacing * factor)
}

/// Decode a strain [TimeSeries] from the dataset at `path`, cropped to `[start, end)`.
///
/// # Errors
/// [Error::MissingDataset] if there is no dataset at `path`, [Error::MissingAttribute] or
/// [Error::InvalidAttribute] for absent or malformed metadata.
pub fn read_strain(
    container: &dyn Container,
    path: &str,
    start: Option<f64>,
    end: Option<f64>,
) -> Result<TimeSeries> {
    let ds = container.find_dataset(path)?;
    let ds = ds.as_ref();

    let data = match ds.read()? {
        Array::Float(v) => v,
        Array::Int(v) => v.into_iter().map(|x| x as f64).collect(),
        Array::Bytes(_) => {
            return Err(Error::InvalidData {
                dataset: ds.path().to_string(),
                message: "expected numeric samples".to_string(),
            })
        }
    };

    let t0 = required_f64(ds, "Xstart")?;
    let dt = spacing(ds, required_f64(ds, "Xspacing")?)?;
    let unit = Unit::new(&required_str(ds, "Yunits")?);
    let name = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path);
    trace!(path, t0, dt, samples = data.len(), "decoded strain");

    Ok(Series::new(name, unit, t0, dt, data)?.cropped(start, end))
}

fn decode_names(ds: &dyn Dataset, raw: Vec<Vec<u8>>) -> Result<Vec<String>> {
    raw.into_iter()
        .map(|b| {
            String::from_utf8(b)
                .map(|s| s.trim_end_matches('\0').to_string())
                .map_err(|e| Error::InvalidData {
                    dataset: ds.path().to_string(),
                    message: format!("bit name is not utf-8: {e}"),
                })
        })
        .collect()
}

/// Decode a data-quality [StateVector] from the datasets under `path`, cropped to
/// `[start, end)`.
///
/// Sample spacing defaults to 1 second if the mask has no `Xspacing`.
///
/// # Errors
/// [Error::MissingDataset] if either dataset is missing, [Error::MissingAttribute] if there
/// is no `Xstart` or [Error::InvalidAttribute] for other malformed metadata.
pub fn read_state(
    container: &dyn Container,
    path: &str,
    start: Option<f64>,
    end: Option<f64>,
) -> Result<StateVector> {
    let base = path.trim_end_matches('/');
    let mask = container.find_dataset(&format!("{base}/DQmask"))?;
    let mask = mask.as_ref();
    let descriptions = container.find_dataset(&format!("{base}/DQDescriptions"))?;
    let descriptions = descriptions.as_ref();

    let data = match mask.read()? {
        Array::Int(v) => v
            .into_iter()
            .map(|x| {
                u32::try_from(x).map_err(|_| Error::InvalidData {
                    dataset: mask.path().to_string(),
                    message: format!("mask value {x} out of range"),
                })
            })
            .collect::<Result<Vec<u32>>>()?,
        _ => {
            return Err(Error::InvalidData {
                dataset: mask.path().to_string(),
                message: "expected integer mask".to_string(),
            })
        }
    };
    let names = match descriptions.read()? {
        Array::Bytes(raw) => decode_names(descriptions, raw)?,
        _ => {
            return Err(Error::InvalidData {
                dataset: descriptions.path().to_string(),
                message: "expected byte strings".to_string(),
            })
        }
    };

    let t0 = required_f64(mask, "Xstart")?;
    let dt = match mask.attr("Xspacing")? {
        None => 1.0,
        Some(v) => {
            let xspacing = v
                .as_f64()
                .ok_or_else(|| invalid_attr(mask, "Xspacing", "expected a number"))?;
            spacing(mask, xspacing)?
        }
    };
    trace!(path, t0, dt, samples = data.len(), bits = names.len(), "decoded state");

    let series = Series::new(STATE_NAME, Unit::dimensionless(), t0, dt, data)?;
    Ok(StateVector::new(series.cropped(start, end), Bits::from_names(names)))
}

/// [Reader] for the `hdf5.losc` format.
pub struct LoscHdf5Reader {
    backend: Arc<dyn ContainerBackend>,
    kind: Kind,
}

impl LoscHdf5Reader {
    pub fn new(backend: Arc<dyn ContainerBackend>, kind: Kind) -> Self {
        LoscHdf5Reader { backend, kind }
    }
}

impl Reader for LoscHdf5Reader {
    fn read(&self, file: &LocalFile, options: &ReadOptions) -> Result<Decoded> {
        let container = self.backend.open(file.path())?;
        match self.kind {
            Kind::Strain => {
                let path = options.path.as_deref().unwrap_or(DEFAULT_STRAIN_PATH);
                read_strain(container.as_ref(), path, options.start, options.end)
                    .map(Decoded::Strain)
            }
            Kind::State => {
                let path = options.path.as_deref().unwrap_or(DEFAULT_STATE_PATH);
                read_state(container.as_ref(), path, options.start, options.end)
                    .map(Decoded::State)
            }
        }
    }
}
