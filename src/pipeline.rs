//! End-to-end build: source lists → networks → writer → output file
//!
//! The primary list is always ingested first, tagged with the catalog's
//! primary record. Extra countries follow in catalog order (or the order
//! given in [`BuildConfig::countries`]), each read from
//! `<extra_dir>/<slug>/ip.txt`. Everything runs on the calling thread and the
//! first error ends the build.

use crate::assembler::{Assembler, BuildReport};
use crate::catalog::{Catalog, CatalogEntry};
use crate::cidr::{parse_cidrs, InvalidLinePolicy};
use crate::error::{Error, Result};
use crate::line_scanner;
use crate::writer::DatabaseWriter;
use std::path::{Path, PathBuf};

/// Default primary source list
pub const DEFAULT_SOURCE: &str = "ipip_cn.txt";

/// Default output path
pub const DEFAULT_DESTINATION: &str = "Country.mmdb";

/// File name of every extra country's list
pub const EXTRA_COUNTRY_FILE: &str = "ip.txt";

/// Inputs and outputs of one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Primary source list
    pub source: PathBuf,
    /// Directory holding one sub-directory per extra country
    pub extra_dir: PathBuf,
    /// Whether extra countries are ingested at all
    pub extra_countries: bool,
    /// Extra countries to ingest, in order; all catalog extras if unset
    pub countries: Option<Vec<String>>,
    /// Output database
    pub destination: PathBuf,
    /// What to do with unparseable lines
    pub invalid_lines: InvalidLinePolicy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from(DEFAULT_SOURCE),
            extra_dir: PathBuf::from("."),
            extra_countries: true,
            countries: None,
            destination: PathBuf::from(DEFAULT_DESTINATION),
            invalid_lines: InvalidLinePolicy::default(),
        }
    }
}

/// Location of an extra country's list: `<dir>/<slug>/ip.txt`
pub fn extra_country_path(dir: &Path, slug: &str) -> PathBuf {
    dir.join(slug).join(EXTRA_COUNTRY_FILE)
}

impl BuildConfig {
    /// Catalog entries for the extra countries this build ingests
    ///
    /// Fails on the first requested slug the catalog does not know.
    pub fn extra_entries<'a>(&self, catalog: &'a Catalog) -> Result<Vec<&'a CatalogEntry>> {
        if !self.extra_countries {
            return Ok(Vec::new());
        }

        match &self.countries {
            None => Ok(catalog.extras().iter().collect()),
            Some(slugs) => slugs
                .iter()
                .map(|slug| {
                    catalog
                        .extras()
                        .iter()
                        .find(|entry| &entry.slug == slug)
                        .ok_or_else(|| Error::UnknownCountry(slug.clone()))
                })
                .collect(),
        }
    }
}

/// Read and parse one source list
pub fn load_networks(path: &Path, policy: InvalidLinePolicy) -> Result<Vec<ipnetwork::IpNetwork>> {
    let lines = line_scanner::scan(path)?;
    parse_cidrs(path, &lines, policy)
}

/// Run a full build with `writer`
///
/// Extra-country slugs are resolved against `catalog` before any file is
/// opened. The output file is only created once every country has been
/// inserted.
pub fn run<W: DatabaseWriter>(
    config: &BuildConfig,
    catalog: &Catalog,
    writer: W,
) -> Result<BuildReport> {
    let extras = config.extra_entries(catalog)?;
    let mut assembler = Assembler::new(writer);

    let primary = catalog.primary();
    assembler.load_country(&primary.slug, &primary.record, || {
        load_networks(&config.source, config.invalid_lines)
    })?;

    for entry in extras {
        let path = extra_country_path(&config.extra_dir, &entry.slug);
        assembler.load_country(&entry.slug, &entry.record, || {
            load_networks(&path, config.invalid_lines)
        })?;
    }

    assembler.finish(&config.destination)
}
