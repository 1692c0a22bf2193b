//! Byte-oriented state store for save/load.
//!
//! Each structure writes its transient fields into a flat little-endian block
//! through [`StateWriter`] and reads them back through [`StateReader`]. Blocks
//! carry no self-description: the caller stores a revision tag next to the
//! block and hands it back on read. Readers accept older revisions by
//! defaulting the fields those revisions lack, and newer revisions by reading
//! the prefix they understand and skipping the rest.
//!
//! Whole-world snapshots wrap these blocks in a [`SnapshotHeader`] for format
//! detection before decoding.

use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a relay world snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0x5E1A_0001;

/// Current snapshot format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during serialization.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

/// Errors that can occur during deserialization.
#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("state block truncated: needed {needed} bytes, {remaining} remaining")]
    TooShort { needed: usize, remaining: usize },
    #[error("invalid value {value} for field '{field}'")]
    InvalidValue { field: &'static str, value: i64 },
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("snapshot references unknown block {0}")]
    UnknownBlock(u32),
    #[error("snapshot structure could not be placed: {0}")]
    Placement(String),
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

/// Header prepended to every world snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick count at the time the snapshot was taken.
    pub tick: u64,
}

impl SnapshotHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    /// Validate the header. Older versions are accepted; the per-structure
    /// revision tags take care of field defaults.
    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// StateWriter
// ---------------------------------------------------------------------------

/// Appends little-endian fields to a growable buffer.
#[derive(Debug, Default)]
pub struct StateWriter {
    buffer: Vec<u8>,
}

impl StateWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buffer.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buffer.push(v as u8);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buffer.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buffer.extend_from_slice(&v.to_le_bytes());
    }

    /// Fixed-point values are stored as their raw bits so a round-trip is exact.
    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.buffer.extend_from_slice(&v.to_bits().to_le_bytes());
    }

    /// A `u32` count followed by each value.
    pub fn write_i32_list(&mut self, values: &[i32]) {
        self.write_u32(values.len() as u32);
        for &v in values {
            self.write_i32(v);
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

// ---------------------------------------------------------------------------
// StateReader
// ---------------------------------------------------------------------------

/// Reads little-endian fields from a borrowed block.
#[derive(Debug)]
pub struct StateReader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> StateReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, cursor: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DeserializeError> {
        let remaining = self.remaining();
        if remaining < N {
            return Err(DeserializeError::TooShort {
                needed: N,
                remaining,
            });
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.cursor..self.cursor + N]);
        self.cursor += N;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, DeserializeError> {
        Ok(self.take::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, DeserializeError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(DeserializeError::InvalidValue {
                field: "bool",
                value: other as i64,
            }),
        }
    }

    pub fn read_i32(&mut self) -> Result<i32, DeserializeError> {
        Ok(i32::from_le_bytes(self.take::<4>()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, DeserializeError> {
        Ok(u32::from_le_bytes(self.take::<4>()?))
    }

    pub fn read_fixed64(&mut self) -> Result<Fixed64, DeserializeError> {
        Ok(Fixed64::from_bits(i64::from_le_bytes(self.take::<8>()?)))
    }

    pub fn read_i32_list(&mut self) -> Result<Vec<i32>, DeserializeError> {
        let count = self.read_u32()? as usize;
        // Each entry needs four bytes; reject impossible counts before allocating.
        let needed = count.saturating_mul(4);
        if needed > self.remaining() {
            return Err(DeserializeError::TooShort {
                needed,
                remaining: self.remaining(),
            });
        }
        (0..count).map(|_| self.read_i32()).collect()
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    /// Skip whatever a newer revision appended after the known fields.
    pub fn skip_rest(&mut self) {
        self.cursor = self.data.len();
    }
}
