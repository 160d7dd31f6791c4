//! MaxMind DB writer
//!
//! Accumulates networks in an [`IpTree`] and their records in a deduplicated
//! [`DataEncoder`], then lays the file out as:
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  1. Search tree (node_count nodes)   │
//! │  2. 16 zero bytes                    │
//! │  3. Data section (deduplicated)      │
//! │  4. "\xAB\xCD\xEFMaxMind.com"        │
//! │  5. Metadata map                     │
//! └──────────────────────────────────────┘
//! ```
//!
//! Output depends only on the insertion sequence and the options, so a fixed
//! `build_epoch` makes builds byte-for-byte reproducible.

use crate::catalog::GeoRecord;
use crate::data_section::{encode_value, DataEncoder, DataValue};
use crate::error::{InsertError, WriteError};
use crate::ip_tree::{IpTree, IpVersion, RecordSize};
use crate::writer::DatabaseWriter;
use ipnetwork::IpNetwork;
use std::collections::BTreeMap;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// MMDB metadata marker: "\xAB\xCD\xEFMaxMind.com"
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Separator between the search tree and the data section
const DATA_SECTION_SEPARATOR: [u8; 16] = [0; 16];

/// Default `database_type` metadata value
pub const DEFAULT_DATABASE_TYPE: &str = "GeoIP2-Country";

/// Default English description
pub const DEFAULT_DESCRIPTION: &str = "GeoIP2 country database built from per-country CIDR lists";

/// Options fixed for the lifetime of a writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    /// `database_type` metadata value
    pub database_type: String,
    /// Width of tree records
    pub record_size: RecordSize,
    /// Tree address family
    pub ip_version: IpVersion,
    /// Languages the records carry names in
    pub languages: Vec<String>,
    /// Description per language
    pub description: BTreeMap<String, String>,
    /// Build timestamp in seconds since the epoch; the current time if unset
    pub build_epoch: Option<u64>,
    /// Point `::ffff:0:0/96`, `2001::/32` and `2002::/16` at the IPv4
    /// networks of an IPv6 database
    pub ipv4_aliases: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        let mut description = BTreeMap::new();
        description.insert("en".to_string(), DEFAULT_DESCRIPTION.to_string());
        Self {
            database_type: DEFAULT_DATABASE_TYPE.to_string(),
            record_size: RecordSize::default(),
            ip_version: IpVersion::default(),
            languages: Vec::new(),
            description,
            build_epoch: None,
            ipv4_aliases: true,
        }
    }
}

/// [`DatabaseWriter`] producing MaxMind DB v2.0 files
#[derive(Debug)]
pub struct MmdbWriter {
    options: WriterOptions,
    tree: IpTree,
    data: DataEncoder,
    inserted: usize,
}

impl MmdbWriter {
    /// Create an empty writer
    pub fn new(options: WriterOptions) -> Self {
        Self {
            tree: IpTree::new(options.ip_version),
            data: DataEncoder::new(),
            inserted: 0,
            options,
        }
    }

    /// Number of networks inserted
    pub fn len(&self) -> usize {
        self.inserted
    }

    /// Whether nothing has been inserted yet
    pub fn is_empty(&self) -> bool {
        self.inserted == 0
    }

    /// Serialize the database into memory
    pub fn to_bytes(&self) -> Result<Vec<u8>, WriteError> {
        let tree = self.search_tree()?;
        let node_count = tree.len() / self.options.record_size.node_bytes();
        let node_count =
            u32::try_from(node_count).map_err(|_| WriteError::TooManyNodes(node_count))?;
        let metadata = encode_value(&self.metadata(node_count))?;

        let mut database = Vec::with_capacity(
            tree.len()
                + DATA_SECTION_SEPARATOR.len()
                + self.data.size()
                + METADATA_MARKER.len()
                + metadata.len(),
        );
        database.extend_from_slice(&tree);
        database.extend_from_slice(&DATA_SECTION_SEPARATOR);
        database.extend_from_slice(self.data.as_bytes());
        database.extend_from_slice(METADATA_MARKER);
        database.extend_from_slice(&metadata);

        log::debug!(
            "serialized {} networks: {} nodes, {} data bytes, {} total bytes",
            self.inserted,
            node_count,
            self.data.size(),
            database.len()
        );
        Ok(database)
    }

    /// Serialized search tree, with IPv4 aliases in IPv6 databases
    fn search_tree(&self) -> Result<Vec<u8>, WriteError> {
        let record_size = self.options.record_size;
        if self.options.ipv4_aliases {
            self.tree.with_ipv4_aliases().serialize(record_size)
        } else {
            self.tree.serialize(record_size)
        }
    }

    fn metadata(&self, node_count: u32) -> DataValue {
        let options = &self.options;
        let build_epoch = options.build_epoch.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        });

        let mut metadata = BTreeMap::new();
        metadata.insert(
            "binary_format_major_version".to_string(),
            DataValue::Uint16(2),
        );
        metadata.insert(
            "binary_format_minor_version".to_string(),
            DataValue::Uint16(0),
        );
        metadata.insert("build_epoch".to_string(), DataValue::Uint64(build_epoch));
        metadata.insert(
            "database_type".to_string(),
            DataValue::String(options.database_type.clone()),
        );
        metadata.insert(
            "description".to_string(),
            DataValue::Map(
                options
                    .description
                    .iter()
                    .map(|(lang, text)| (lang.clone(), DataValue::String(text.clone())))
                    .collect(),
            ),
        );
        metadata.insert(
            "ip_version".to_string(),
            DataValue::Uint16(options.ip_version.number()),
        );
        metadata.insert(
            "languages".to_string(),
            DataValue::Array(
                options
                    .languages
                    .iter()
                    .map(|lang| DataValue::String(lang.clone()))
                    .collect(),
            ),
        );
        metadata.insert("node_count".to_string(), DataValue::Uint32(node_count));
        metadata.insert(
            "record_size".to_string(),
            DataValue::Uint16(options.record_size.bits()),
        );

        DataValue::Map(metadata)
    }
}

impl DatabaseWriter for MmdbWriter {
    fn insert(&mut self, network: IpNetwork, record: &GeoRecord) -> Result<(), InsertError> {
        record
            .validate()
            .map_err(|reason| InsertError::MalformedRecord { network, reason })?;

        let offset = self
            .data
            .encode(&record_value(record))
            .map_err(|source| InsertError::Encode { network, source })?;
        self.tree.insert(network, offset)?;
        self.inserted += 1;
        Ok(())
    }

    fn finalize(&mut self, output: &mut dyn Write) -> Result<(), WriteError> {
        let database = self.to_bytes()?;
        output.write_all(&database)?;
        output.flush()?;
        Ok(())
    }
}

/// GeoIP2-Country shaped map for a record
fn record_value(record: &GeoRecord) -> DataValue {
    let country = &record.country;

    let names = country
        .names
        .iter()
        .map(|(lang, name)| (lang.clone(), DataValue::String(name.clone())))
        .collect();

    let mut fields = BTreeMap::new();
    fields.insert(
        "geoname_id".to_string(),
        DataValue::Uint32(country.geoname_id),
    );
    fields.insert(
        "is_in_european_union".to_string(),
        DataValue::Bool(country.is_in_european_union),
    );
    fields.insert(
        "iso_code".to_string(),
        DataValue::String(country.iso_code.clone()),
    );
    fields.insert("names".to_string(), DataValue::Map(names));

    let mut root = BTreeMap::new();
    root.insert("country".to_string(), DataValue::Map(fields));
    DataValue::Map(root)
}
