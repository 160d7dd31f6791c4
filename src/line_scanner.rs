//! Line-oriented input reading with automatic gzip decompression
//!
//! Source lists are plain text, one entry per line. Files ending in `.gz`
//! (case-insensitive) are decompressed on the fly, so published lists can be
//! consumed without unpacking them first.
//!
//! ```rust,no_run
//! use geoip2_cn::line_scanner;
//!
//! let lines = line_scanner::scan("ipip_cn.txt")?;
//! println!("{} lines", lines.len());
//! # Ok::<(), geoip2_cn::Error>(())
//! ```

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Buffer size for file reading (128KB)
const BUFFER_SIZE: usize = 128 * 1024;

/// Open a file for buffered line access, decompressing `.gz` files
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    let file = File::open(path)?;

    if is_gzip(path) {
        Ok(Box::new(BufReader::with_capacity(
            BUFFER_SIZE,
            GzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(BUFFER_SIZE, file)))
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Read a whole file into its ordered list of lines
///
/// Line terminators (`\n` or `\r\n`) are stripped; nothing else is touched.
/// An empty file yields an empty list.
///
/// # Errors
///
/// [`Error::Open`] if the file cannot be opened, [`Error::Read`] if reading
/// fails part way (including corrupt gzip data or invalid UTF-8).
pub fn scan<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let path = path.as_ref();
    let reader = open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let lines = reader
        .lines()
        .collect::<io::Result<Vec<_>>>()
        .map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;

    log::debug!("scanned {} lines from {}", lines.len(), path.display());
    Ok(lines)
}
