/// Error types for the geoip2-cn library
use ipnetwork::{IpNetwork, IpNetworkError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Rejection of a single (network, record) pair by a database writer
#[derive(Debug, Error)]
pub enum InsertError {
    /// An IPv6 network was offered to a writer building an IPv4-only tree
    #[error("cannot insert IPv6 network {0} into an IPv4-only database")]
    Ipv6InIpv4Tree(IpNetwork),

    /// The record does not have the structure a country record needs
    #[error("malformed record for {network}: {reason}")]
    MalformedRecord {
        /// Network the record was to be attached to
        network: IpNetwork,
        /// What is wrong with the record
        reason: String,
    },

    /// The record could not be added to the data section
    #[error("cannot encode record for {network}: {source}")]
    Encode {
        /// Network the record was to be attached to
        network: IpNetwork,
        /// Encoding error
        source: WriteError,
    },
}

/// Failure while serializing the accumulated database
#[derive(Debug, Error)]
pub enum WriteError {
    /// A tree pointer does not fit into the configured record size
    #[error("record size of {record_size} bits cannot hold pointer value {value}; use a larger record size")]
    RecordSizeTooSmall {
        /// Configured record size in bits
        record_size: u16,
        /// Pointer value that overflowed
        value: u64,
    },

    /// The search tree grew past what the format can address
    #[error("search tree has too many nodes ({0})")]
    TooManyNodes(usize),

    /// A single value holds more entries or bytes than its size field allows
    #[error("value of size {0} is too large to encode")]
    ValueTooLarge(usize),

    /// The data section grew past what a 32-bit pointer can address
    #[error("data section too large ({0} bytes)")]
    DataSectionTooLarge(usize),

    /// Underlying output failure
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Country catalog loading and validation errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read
    #[error("failed to read catalog {}: {source}", path.display())]
    Read {
        /// Catalog path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// The catalog is not valid JSON for the expected shape
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    /// A country slug appears twice
    #[error("duplicate country '{0}' in catalog")]
    DuplicateCountry(String),

    /// A record failed validation
    #[error("invalid record for '{slug}': {reason}")]
    InvalidRecord {
        /// Country slug
        slug: String,
        /// What is wrong with the record
        reason: String,
    },
}

/// Invalid option values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Record size other than 24, 28 or 32
    #[error("invalid record size '{0}': expected 24, 28 or 32")]
    RecordSize(String),

    /// IP version other than 4 or 6
    #[error("invalid IP version '{0}': expected 4 or 6")]
    IpVersion(String),

    /// Unknown invalid-line policy
    #[error("invalid line policy '{0}': expected 'fail' or 'skip'")]
    LinePolicy(String),
}

/// Main error type: every way a build can fail
#[derive(Debug, Error)]
pub enum Error {
    /// An input file could not be opened
    #[error("fail to open {}: {source}", path.display())]
    Open {
        /// Input path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// An input file could not be read to the end
    #[error("fail to read {}: {source}", path.display())]
    Read {
        /// Input path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// A line is not a valid CIDR block or address
    #[error("{}:{line}: invalid CIDR '{text}': {source}", path.display())]
    Parse {
        /// Input path
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// Offending line, trimmed
        text: String,
        /// Parser error
        source: IpNetworkError,
    },

    /// The writer rejected a network
    #[error("fail to insert {country} network to writer: {source}")]
    Insert {
        /// Country slug being inserted
        country: String,
        /// Writer error
        source: InsertError,
    },

    /// The output file could not be created
    #[error("fail to create output file {}: {source}", path.display())]
    CreateOutput {
        /// Output path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Serialization to the output file failed
    #[error("fail to write to file {}: {source}", path.display())]
    Write {
        /// Output path
        path: PathBuf,
        /// Writer error
        source: WriteError,
    },

    /// Catalog problem
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A requested country has no record in the catalog
    #[error("unknown country '{0}': not present in the catalog")]
    UnknownCountry(String),

    /// The assembler already failed and accepts no further work
    #[error("assembler aborted after an earlier failure")]
    Aborted,
}
