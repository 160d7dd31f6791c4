//! Database writer capability
//!
//! The assembler only ever talks to a writer through this trait: it pushes
//! (network, record) pairs in order and finally asks for the accumulated
//! database to be serialized. Overlap resolution, tree layout and encoding
//! are entirely the writer's business.

use crate::catalog::GeoRecord;
use crate::error::{InsertError, WriteError};
use ipnetwork::IpNetwork;
use std::io::Write;

/// Sink for (network, record) pairs that can serialize what it accumulated
pub trait DatabaseWriter {
    /// Attach `record` to `network`
    fn insert(&mut self, network: IpNetwork, record: &GeoRecord) -> Result<(), InsertError>;

    /// Serialize everything inserted so far to `output`
    fn finalize(&mut self, output: &mut dyn Write) -> Result<(), WriteError>;
}

impl<W: DatabaseWriter + ?Sized> DatabaseWriter for &mut W {
    fn insert(&mut self, network: IpNetwork, record: &GeoRecord) -> Result<(), InsertError> {
        (**self).insert(network, record)
    }

    fn finalize(&mut self, output: &mut dyn Write) -> Result<(), WriteError> {
        (**self).finalize(output)
    }
}
