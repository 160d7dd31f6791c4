//! CIDR list parsing
//!
//! Turns the raw lines of one source file into an ordered list of networks.
//! Each entry is either a CIDR block (`1.0.1.0/24`, `2001:db8::/32`) or a bare
//! address, which becomes a full-length host prefix (`/32` or `/128`).
//! Host bits below the prefix are cleared, so `1.0.1.7/24` yields `1.0.1.0/24`.
//! The address must be written out in full and the prefix as a plain decimal
//! length: netmasks (`/255.0.0.0`), zero-padded lengths (`/024`) and shortened
//! addresses (`10/8`) are rejected.
//!
//! Blank lines and lines starting with `#` are not entries and are ignored
//! under every policy.

use crate::error::{ConfigError, Error, Result};
use ipnetwork::{IpNetwork, IpNetworkError};
use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;

/// What to do with a line that is not a valid CIDR block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidLinePolicy {
    /// Abort the whole build on the first invalid line
    #[default]
    FailFast,
    /// Log a warning and continue with the next line
    Skip,
}

impl FromStr for InvalidLinePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" | "fail-fast" => Ok(InvalidLinePolicy::FailFast),
            "skip" => Ok(InvalidLinePolicy::Skip),
            _ => Err(ConfigError::LinePolicy(s.to_string())),
        }
    }
}

impl fmt::Display for InvalidLinePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidLinePolicy::FailFast => write!(f, "fail"),
            InvalidLinePolicy::Skip => write!(f, "skip"),
        }
    }
}

/// Parse one line
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> std::result::Result<Option<IpNetwork>, IpNetworkError> {
    let entry = line.trim();
    if entry.is_empty() || entry.starts_with('#') {
        return Ok(None);
    }

    let (addr, prefix) = match entry.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (entry, None),
    };

    let addr: IpAddr = addr
        .parse()
        .map_err(|_| IpNetworkError::InvalidAddr(addr.to_string()))?;
    let prefix = match prefix {
        Some(prefix) => parse_prefix(prefix)?,
        None => match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        },
    };

    let network = IpNetwork::new(addr, prefix)?;
    Ok(Some(normalize(network)))
}

/// Prefix length: decimal digits, no sign, no leading zero
fn parse_prefix(prefix: &str) -> std::result::Result<u8, IpNetworkError> {
    let digits_only = !prefix.is_empty() && prefix.bytes().all(|b| b.is_ascii_digit());
    if !digits_only || (prefix.len() > 1 && prefix.starts_with('0')) {
        return Err(IpNetworkError::InvalidPrefix);
    }
    prefix.parse().map_err(|_| IpNetworkError::InvalidPrefix)
}

/// Clear the host bits of a network, keeping its prefix length
pub fn normalize(network: IpNetwork) -> IpNetwork {
    IpNetwork::new(network.network(), network.prefix()).unwrap_or(network)
}

/// Parse the lines of `path` into networks, in file order
///
/// `path` is only used to label errors and warnings.
pub fn parse_cidrs(
    path: &Path,
    lines: &[String],
    policy: InvalidLinePolicy,
) -> Result<Vec<IpNetwork>> {
    let mut networks = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        match parse_line(line) {
            Ok(Some(network)) => networks.push(network),
            Ok(None) => {}
            Err(source) => match policy {
                InvalidLinePolicy::FailFast => {
                    return Err(Error::Parse {
                        path: path.to_path_buf(),
                        line: idx + 1,
                        text: line.trim().to_string(),
                        source,
                    });
                }
                InvalidLinePolicy::Skip => {
                    log::warn!(
                        "{}:{}: skipping invalid CIDR '{}': {}",
                        path.display(),
                        idx + 1,
                        line.trim(),
                        source
                    );
                }
            },
        }
    }

    Ok(networks)
}
