//! Country record catalog
//!
//! Maps a country slug (`usa`, `japan`, ...) to the geolocation record that is
//! attached to every network of that country. The catalog has one primary
//! entry, used for the main source list, and an ordered list of extra
//! countries whose lists live under `<dir>/<slug>/ip.txt`.
//!
//! The built-in catalog is compiled into the binary from
//! `data/countries.json`. An alternate catalog with the same shape can be
//! loaded from disk; either way it is validated once and never mutated.

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../data/countries.json");

/// Geolocation record stored for a network
///
/// Serializes to the GeoIP2-Country layout:
/// `{"country": {"geoname_id", "is_in_european_union", "iso_code", "names"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoRecord {
    /// Country information
    pub country: Country,
}

/// The `country` map of a [`GeoRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    /// GeoNames identifier
    pub geoname_id: u32,
    /// Whether the country is a member state of the European Union
    pub is_in_european_union: bool,
    /// ISO 3166-1 alpha-2 code
    pub iso_code: String,
    /// Localized names keyed by language tag (`en`, `zh-CN`, ...)
    pub names: BTreeMap<String, String>,
}

impl GeoRecord {
    /// Check the record has the structure a country record needs
    pub fn validate(&self) -> Result<(), String> {
        let country = &self.country;
        let iso = country.iso_code.as_bytes();
        if iso.len() != 2 || !iso.iter().all(|b| b.is_ascii_uppercase()) {
            return Err(format!(
                "iso_code '{}' is not a two-letter uppercase code",
                country.iso_code
            ));
        }
        if !country.names.contains_key("en") {
            return Err("names has no 'en' entry".to_string());
        }
        if let Some((lang, _)) = country
            .names
            .iter()
            .find(|(lang, name)| lang.is_empty() || name.is_empty())
        {
            return Err(format!("empty name or language tag '{}'", lang));
        }
        Ok(())
    }
}

/// A country slug with its record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Short identifier, also the directory name of the country's list
    pub slug: String,
    /// Record attached to the country's networks
    pub record: GeoRecord,
}

#[derive(Deserialize)]
struct CatalogFile {
    primary: CatalogEntry,
    #[serde(default)]
    extras: Vec<CatalogEntry>,
}

/// Immutable slug → record catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    primary: CatalogEntry,
    extras: Vec<CatalogEntry>,
}

impl Catalog {
    /// Build a catalog from explicit entries
    ///
    /// Extra countries keep the given order. Slugs must be unique across the
    /// primary and extra entries, and every record must validate.
    pub fn new(primary: CatalogEntry, extras: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for entry in std::iter::once(&primary).chain(extras.iter()) {
            if entry.slug.is_empty() {
                return Err(CatalogError::InvalidRecord {
                    slug: entry.slug.clone(),
                    reason: "empty slug".to_string(),
                });
            }
            if !seen.insert(entry.slug.clone()) {
                return Err(CatalogError::DuplicateCountry(entry.slug.clone()));
            }
            entry
                .record
                .validate()
                .map_err(|reason| CatalogError::InvalidRecord {
                    slug: entry.slug.clone(),
                    reason,
                })?;
        }

        Ok(Self { primary, extras })
    }

    /// The catalog compiled into the crate
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json_str(BUILTIN_CATALOG)
    }

    /// Parse a catalog from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.primary, file.extras)
    }

    /// Load a catalog from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Entry for the primary source list
    pub fn primary(&self) -> &CatalogEntry {
        &self.primary
    }

    /// Extra countries, in ingestion order
    pub fn extras(&self) -> &[CatalogEntry] {
        &self.extras
    }

    /// Look up any entry, primary included, by slug
    pub fn get(&self, slug: &str) -> Option<&CatalogEntry> {
        std::iter::once(&self.primary)
            .chain(self.extras.iter())
            .find(|entry| entry.slug == slug)
    }

    /// Sorted union of the name languages of all records
    pub fn languages(&self) -> Vec<String> {
        std::iter::once(&self.primary)
            .chain(self.extras.iter())
            .flat_map(|entry| entry.record.country.names.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
