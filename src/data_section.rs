//! MMDB data section encoding
//!
//! Encodes the values stored behind tree leaves and in the metadata block.
//! Only the types a country database needs are supported.
//!
//! Every value starts with a control byte: type in the top 3 bits, size in the
//! low 5. Types above 7 are "extended": the control byte carries type 0 and the
//! next byte holds `type - 7`. Sizes of 29 and above spill into 1-3 extra
//! bytes that follow the control byte (and the extended type byte, if any).
//!
//! See: https://maxmind.github.io/MaxMind-DB/

use crate::error::WriteError;
use std::collections::{BTreeMap, HashMap};

/// A value that can be written to the data section
///
/// Maps are ordered by key, so encoding the same value always yields the
/// same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    /// UTF-8 string
    String(String),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Key-value map (string keys only)
    Map(BTreeMap<String, DataValue>),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Ordered list of values
    Array(Vec<DataValue>),
    /// Boolean
    Bool(bool),
}

const TYPE_STRING: u8 = 2;
const TYPE_UINT16: u8 = 5;
const TYPE_UINT32: u8 = 6;
const TYPE_MAP: u8 = 7;
const TYPE_UINT64: u8 = 9;
const TYPE_ARRAY: u8 = 11;
const TYPE_BOOL: u8 = 14;

/// Largest size a control byte with three spill bytes can express
const MAX_SIZE: usize = 65_821 + 0xFF_FFFF;

/// Data section builder
///
/// Identical values are stored once; re-encoding returns the first offset.
#[derive(Debug, Default)]
pub struct DataEncoder {
    buffer: Vec<u8>,
    dedup_map: HashMap<Vec<u8>, u32>,
}

impl DataEncoder {
    /// Create an empty encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a value and return its offset within the section
    pub fn encode(&mut self, value: &DataValue) -> Result<u32, WriteError> {
        let mut temp = Vec::new();
        encode_to_buffer(value, &mut temp)?;

        if let Some(&offset) = self.dedup_map.get(&temp) {
            return Ok(offset);
        }

        let offset = checked_offset(self.buffer.len())?;
        self.buffer.extend_from_slice(&temp);
        self.dedup_map.insert(temp, offset);
        Ok(offset)
    }

    /// Encoded bytes so far
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Current section size in bytes
    pub fn size(&self) -> usize {
        self.buffer.len()
    }
}

/// Encode a single value without deduplication
pub fn encode_value(value: &DataValue) -> Result<Vec<u8>, WriteError> {
    let mut buffer = Vec::new();
    encode_to_buffer(value, &mut buffer)?;
    Ok(buffer)
}

/// Section offsets are stored as 32-bit pointers
fn checked_offset(len: usize) -> Result<u32, WriteError> {
    u32::try_from(len).map_err(|_| WriteError::DataSectionTooLarge(len))
}

fn encode_to_buffer(value: &DataValue, buffer: &mut Vec<u8>) -> Result<(), WriteError> {
    match value {
        DataValue::String(s) => {
            write_control(TYPE_STRING, s.len(), buffer)?;
            buffer.extend_from_slice(s.as_bytes());
        }
        DataValue::Uint16(n) => write_uint(TYPE_UINT16, u64::from(*n), buffer)?,
        DataValue::Uint32(n) => write_uint(TYPE_UINT32, u64::from(*n), buffer)?,
        DataValue::Uint64(n) => write_uint(TYPE_UINT64, *n, buffer)?,
        DataValue::Map(m) => {
            write_control(TYPE_MAP, m.len(), buffer)?;
            for (key, value) in m {
                write_control(TYPE_STRING, key.len(), buffer)?;
                buffer.extend_from_slice(key.as_bytes());
                encode_to_buffer(value, buffer)?;
            }
        }
        DataValue::Array(a) => {
            write_control(TYPE_ARRAY, a.len(), buffer)?;
            for value in a {
                encode_to_buffer(value, buffer)?;
            }
        }
        // The payload of a bool is its size field
        DataValue::Bool(b) => write_control(TYPE_BOOL, usize::from(*b), buffer)?,
    }
    Ok(())
}

/// Unsigned integers use the fewest big-endian bytes that hold the value
fn write_uint(type_id: u8, n: u64, buffer: &mut Vec<u8>) -> Result<(), WriteError> {
    let bytes = n.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    write_control(type_id, bytes.len() - skip, buffer)?;
    buffer.extend_from_slice(&bytes[skip..]);
    Ok(())
}

fn write_control(type_id: u8, size: usize, buffer: &mut Vec<u8>) -> Result<(), WriteError> {
    let (type_bits, extended) = if type_id > 7 {
        (0u8, Some(type_id - 7))
    } else {
        (type_id << 5, None)
    };

    // Each branch's range bounds the value it narrows
    let (size_bits, spill): (u8, Vec<u8>) = if size < 29 {
        (size as u8, Vec::new())
    } else if size < 285 {
        (29, vec![(size - 29) as u8])
    } else if size < 65_821 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else if size <= MAX_SIZE {
        (31, ((size - 65_821) as u32).to_be_bytes()[1..].to_vec())
    } else {
        return Err(WriteError::ValueTooLarge(size));
    };

    buffer.push(type_bits | size_bits);
    if let Some(ext) = extended {
        buffer.push(ext);
    }
    buffer.extend_from_slice(&spill);
    Ok(())
}
