//! geoip2-cn - Build GeoIP2-Country databases from per-country CIDR lists
//!
//! Reads a primary list of China CIDR blocks plus optional lists for a few
//! extra countries, attaches a fixed GeoIP2 country record to every network
//! and writes a MaxMind DB file readable by any GeoIP2 country reader.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use geoip2_cn::{pipeline, BuildConfig, Catalog, MmdbWriter, WriterOptions};
//!
//! let catalog = Catalog::builtin()?;
//! let writer = MmdbWriter::new(WriterOptions {
//!     languages: catalog.languages(),
//!     ..WriterOptions::default()
//! });
//!
//! let report = pipeline::run(&BuildConfig::default(), &catalog, writer)?;
//! println!("{} networks", report.total_networks());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Pipeline
//!
//! ```text
//! ipip_cn.txt ─┐
//! usa/ip.txt  ─┤  line_scanner → cidr → Assembler → DatabaseWriter → Country.mmdb
//! japan/ip.txt ┘                    (catalog record per country)
//! ```
//!
//! Networks are inserted in source order, primary list first. Each insert
//! replaces every earlier record under its prefix, so where lists overlap the
//! later one wins; a later, more specific network still splits out of an
//! earlier, wider one. IPv4 networks are also reachable through the
//! `::ffff:0:0/96`, `2001::/32` and `2002::/16` IPv6 ranges.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Build state machine driving a database writer
pub mod assembler;
/// Country records attached to networks
pub mod catalog;
/// CIDR line parsing
pub mod cidr;
/// MMDB data section encoding
pub mod data_section;
/// Error types
pub mod error;
/// Binary search tree over IP networks
pub mod ip_tree;
/// Line-oriented input files, optionally gzip compressed
pub mod line_scanner;
/// MaxMind DB writer
pub mod mmdb_writer;
pub mod pipeline;
/// Database writer capability
pub mod writer;

// Re-exports for library consumers
pub use crate::assembler::{Assembler, BuildReport, CountryCount, CountryEntry, Stage};
pub use crate::catalog::{Catalog, CatalogEntry, Country, GeoRecord};
pub use crate::cidr::InvalidLinePolicy;
pub use crate::data_section::DataValue;
pub use crate::error::{CatalogError, ConfigError, Error, InsertError, Result, WriteError};
pub use crate::ip_tree::{IpVersion, RecordSize};
pub use crate::mmdb_writer::{MmdbWriter, WriterOptions};
pub use crate::pipeline::BuildConfig;
pub use crate::writer::DatabaseWriter;

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
