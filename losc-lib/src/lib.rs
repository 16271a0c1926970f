#![doc = include_str!("../README.md")]

mod error;
mod segment;
mod series;
mod time;

pub mod assemble;
pub mod container;
pub mod decode;
pub mod fetch;
pub mod format;
pub mod locate;
pub mod source;
pub mod units;
pub mod url;

pub use assemble::{Assembler, Config};
pub use error::{Error, ErrorKind, Result};
pub use fetch::Fetcher;
pub use format::{Decoded, Format, Kind, Registry};
pub use locate::{CatalogLocator, Filters, Locator};
pub use segment::Segment;
pub use series::{Bits, Series, StateVector, TimeSeries, CONTIGUITY_TOLERANCE};
pub use time::GpsTime;
pub use units::Unit;
