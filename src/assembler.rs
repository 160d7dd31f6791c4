//! Database assembly
//!
//! Feeds countries into a [`DatabaseWriter`] one at a time, in the order they
//! are given, and finally writes the database to its output file.
//!
//! ```text
//! Idle → Loading(c) → Inserting(c) → ... → Finalizing → Done
//!          └──────────────┴──────────────────────┴──→ Failed
//! ```
//!
//! Any error moves the assembler to `Failed`; from there every call returns
//! [`Error::Aborted`]. Nothing touches the output path until all countries
//! have been inserted, so a failed run never leaves a database behind.

use crate::catalog::GeoRecord;
use crate::error::{Error, Result, WriteError};
use crate::writer::DatabaseWriter;
use ipnetwork::IpNetwork;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Networks of one country together with the record they map to
#[derive(Debug, Clone)]
pub struct CountryEntry<'a> {
    /// Country slug, used in logs and errors
    pub slug: &'a str,
    /// Networks in source file order
    pub networks: Vec<IpNetwork>,
    /// Record attached to each network
    pub record: &'a GeoRecord,
}

/// Where the assembler is in its run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Nothing loaded yet
    Idle,
    /// Reading the source list of a country
    Loading(String),
    /// Pushing a country's networks into the writer
    Inserting(String),
    /// Serializing to the output file
    Finalizing,
    /// Output written
    Done,
    /// A step failed; terminal
    Failed,
}

/// Networks inserted for one country
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryCount {
    /// Country slug
    pub slug: String,
    /// Networks inserted
    pub networks: usize,
}

/// Summary of a finished build
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildReport {
    /// Per-country counts in insertion order
    pub countries: Vec<CountryCount>,
    /// Size of the output file
    pub bytes_written: u64,
}

impl BuildReport {
    /// Networks inserted across all countries
    pub fn total_networks(&self) -> usize {
        self.countries.iter().map(|c| c.networks).sum()
    }
}

/// Drives a [`DatabaseWriter`] through one build
#[derive(Debug)]
pub struct Assembler<W: DatabaseWriter> {
    writer: W,
    stage: Stage,
    report: BuildReport,
}

impl<W: DatabaseWriter> Assembler<W> {
    /// Start a build on an empty writer
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            stage: Stage::Idle,
            report: BuildReport::default(),
        }
    }

    /// Current stage
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Counts recorded so far
    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    fn transition(&mut self, next: Stage) -> Result<()> {
        if matches!(self.stage, Stage::Failed | Stage::Done) {
            return Err(Error::Aborted);
        }
        log::debug!("assembler: {:?} -> {:?}", self.stage, next);
        self.stage = next;
        Ok(())
    }

    /// Record the outcome of a step; errors are terminal
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.stage = Stage::Failed;
        }
        result
    }

    /// Load a country's networks with `load`, then insert them
    ///
    /// Returns the number of networks inserted.
    pub fn load_country<F>(&mut self, slug: &str, record: &GeoRecord, load: F) -> Result<usize>
    where
        F: FnOnce() -> Result<Vec<IpNetwork>>,
    {
        self.transition(Stage::Loading(slug.to_string()))?;
        let networks = load();
        let networks = self.guard(networks)?;

        self.add_country(CountryEntry {
            slug,
            networks,
            record,
        })
    }

    /// Insert every network of `entry`, in order
    ///
    /// Duplicates and overlaps are passed through; the writer resolves them.
    pub fn add_country(&mut self, entry: CountryEntry<'_>) -> Result<usize> {
        self.transition(Stage::Inserting(entry.slug.to_string()))?;

        let inserted = entry.networks.iter().try_for_each(|network| {
            self.writer
                .insert(*network, entry.record)
                .map_err(|source| Error::Insert {
                    country: entry.slug.to_string(),
                    source,
                })
        });
        self.guard(inserted)?;

        let count = entry.networks.len();
        log::info!("{} cnt: {}", entry.slug, count);
        self.report.countries.push(CountryCount {
            slug: entry.slug.to_string(),
            networks: count,
        });
        Ok(count)
    }

    /// Write the database to `output`, replacing any existing file
    ///
    /// A partially written file is removed before the error is returned.
    pub fn finish(mut self, output: &Path) -> Result<BuildReport> {
        self.transition(Stage::Finalizing)?;
        let written = self.write_output(output);
        let bytes_written = self.guard(written)?;

        self.transition(Stage::Done)?;
        self.report.bytes_written = bytes_written;
        log::info!("wrote {} ({} bytes)", output.display(), bytes_written);
        Ok(self.report)
    }

    fn write_output(&mut self, output: &Path) -> Result<u64> {
        let file = File::create(output).map_err(|source| Error::CreateOutput {
            path: output.to_path_buf(),
            source,
        })?;

        let mut out = BufWriter::new(file);
        let finalized = self
            .writer
            .finalize(&mut out)
            .and_then(|()| out.flush().map_err(WriteError::from));
        drop(out);

        if let Err(source) = finalized {
            if let Err(err) = fs::remove_file(output) {
                log::warn!(
                    "failed to remove partial output {}: {}",
                    output.display(),
                    err
                );
            }
            return Err(Error::Write {
                path: output.to_path_buf(),
                source,
            });
        }

        fs::metadata(output)
            .map(|meta| meta.len())
            .map_err(|source| Error::Write {
                path: output.to_path_buf(),
                source: source.into(),
            })
    }
}
