//! Streaming pure-Rust decoder for SAS7BDAT datasets.
//!
//! ```no_run
//! use std::fs::File;
//! use sas7bdat_reader::{ReadOptions, Row, SasReader};
//!
//! # fn main() -> sas7bdat_reader::Result<()> {
//! let file = File::open("data.sas7bdat")?;
//! let mut rows = SasReader::open(file, ReadOptions::new())?;
//! while let Some(row) = rows.next_row()? {
//!     match row {
//!         Row::Header(names) => println!("columns: {names:?}"),
//!         Row::Array(values) => println!("{values:?}"),
//!         Row::Map(_) => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod logger;
pub mod metadata;
pub mod parser;
pub mod reader;
pub mod value;

pub use error::{Error, Result, Section};
pub use logger::{LogLevel, Logger};
pub use metadata::{Column, ColumnType, Compression, Endianness, Platform, Properties};
pub use reader::{ReadOptions, Row, RowFormat, RowIterator, SasReader};
pub use value::Value;
