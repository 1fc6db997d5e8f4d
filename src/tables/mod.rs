use std::{
    collections::{BTreeMap, btree_map::Iter},
    fmt,
};

use thiserror::Error;
use tracing::{debug, warn};

use crate::{ParseError, buffer::ByteCursor};

pub mod cmap;

/// A four byte table identifier as found in the font's table directory,
/// e.g. `cmap`, `head` or `glyf`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const CMAP: Tag = Tag(*b"cmap");
    pub const HEAD: Tag = Tag(*b"head");
    pub const GLYF: Tag = Tag(*b"glyf");
    pub const HMTX: Tag = Tag(*b"hmtx");
    pub const LOCA: Tag = Tag(*b"loca");
    pub const MAXP: Tag = Tag(*b"maxp");
    pub const NAME: Tag = Tag(*b"name");
    pub const POST: Tag = Tag(*b"post");
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tags are ASCII in practice, escape anything that isn't
        for byte in self.0 {
            write!(f, "{}", std::ascii::escape_default(byte))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

/// Represents the error messages which may occur when trying
/// to parse the table directory from raw binary buffers
#[derive(Error, Debug)]
pub enum TableEncodingError {
    #[error("The required buffer length for this table is {0} bytes, got {1} bytes")]
    InvalidBufferLength(usize, usize),

    /// Font collections and non-sfnt data end up here
    #[error("Unsupported font scalar type 0x{0:08X}")]
    UnsupportedScalarType(u32),

    #[error("The font has no '{0}' table")]
    MissingTable(Tag),

    #[error(
        "Table '{tag}' spans {offset}..{offset}+{length} which exceeds the file length of {file_len} bytes"
    )]
    CorruptDirectory {
        tag: Tag,
        offset: u32,
        length: u32,
        file_len: usize,
    },
}

/// Scalar types of fonts we know how to read a table directory from.
const SCALAR_TRUETYPE: u32 = 0x0001_0000;
const SCALAR_APPLE_TRUE: u32 = u32::from_be_bytes(*b"true");
const SCALAR_OPENTYPE_CFF: u32 = u32::from_be_bytes(*b"OTTO");

/// Represents the offset subtable directory and it's metadata
/// providing us with a important info such as the number of tables
#[derive(Debug, Clone)]
pub struct OffsetTable {
    scalar_type: u32,
    num_tables: u16,
    search_range: u16,
    entry_selector: u16,
    range_shift: u16,
}

impl OffsetTable {
    /// Size in bytes of the offset table per the reference manual
    pub const SIZE: usize = 12;

    /// Constructs the offset sub table from a raw buffer
    /// the offset sub table buffer size must be 12 per the reference manual.
    pub fn from_buffer(buf: &[u8]) -> Result<Self, TableEncodingError> {
        if buf.len() != Self::SIZE {
            return Err(TableEncodingError::InvalidBufferLength(Self::SIZE, buf.len()));
        }

        let table = Self {
            scalar_type: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            num_tables: u16::from_be_bytes([buf[4], buf[5]]),
            search_range: u16::from_be_bytes([buf[6], buf[7]]),
            entry_selector: u16::from_be_bytes([buf[8], buf[9]]),
            range_shift: u16::from_be_bytes([buf[10], buf[11]]),
        };

        match table.scalar_type {
            SCALAR_TRUETYPE | SCALAR_APPLE_TRUE | SCALAR_OPENTYPE_CFF => Ok(table),
            other => Err(TableEncodingError::UnsupportedScalarType(other)),
        }
    }

    /// Parses the offset table from the start of the font
    pub(crate) fn from_reader(reader: &mut ByteCursor<'_>) -> Result<Self, ParseError> {
        reader.seek(0)?;
        let buf = reader.bytes_at(0, Self::SIZE)?;
        reader.skip(Self::SIZE)?;

        Ok(Self::from_buffer(buf)?)
    }

    /// Returns the number of tables exists in the font file
    pub fn num_tables(&self) -> u16 {
        self.num_tables
    }

    pub fn scalar_type(&self) -> u32 {
        self.scalar_type
    }

    /// `(maximum power of 2 <= num_tables) * 16`, a binary search hint
    pub fn search_range(&self) -> u16 {
        self.search_range
    }

    /// `log2(maximum power of 2 <= num_tables)`
    pub fn entry_selector(&self) -> u16 {
        self.entry_selector
    }

    /// `num_tables * 16 - search_range`
    pub fn range_shift(&self) -> u16 {
        self.range_shift
    }
}

/// Represents metadata for a table within the font file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableMetadata {
    /// The checksum of the table. This value can be used to verify the
    /// integrity of the table data.
    pub checksum: u32,
    /// The offset of the table, in bytes, from the beginning of the file.
    pub offset: u32,
    /// The length of this table in bytes, not including any padding.
    pub length: u32,
}

impl TableMetadata {
    /// Size in bytes of a single table directory record
    pub const SIZE: usize = 16;

    /// Absolute byte range of the table within the file
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.length as usize
    }
}

/// The font's table directory, mapping a table tag to its location in the file.
///
/// Every record is validated against the file length while it is read, so
/// the ranges handed out here are always in bounds.
#[derive(Debug, Clone)]
pub struct TableDirectory {
    pub offset: OffsetTable,
    inner: BTreeMap<Tag, TableMetadata>,
}

impl TableDirectory {
    /// Reads the offset table and every directory record that follows it.
    ///
    /// # Errors
    ///
    /// * `OutOfBounds` if the directory itself is cut short.
    /// * `CorruptDirectory` if a record points past the end of the file.
    /// * `UnsupportedScalarType` for collections and non-sfnt input.
    pub fn from_reader(reader: &mut ByteCursor<'_>) -> Result<Self, ParseError> {
        let offset = OffsetTable::from_reader(reader)?;
        let file_len = reader.len();
        let mut inner = BTreeMap::new();

        for _ in 0..offset.num_tables() {
            let tag = Tag(reader.read_tag()?);
            let metadata = TableMetadata {
                checksum: reader.read_u32()?,
                offset: reader.read_u32()?,
                length: reader.read_u32()?,
            };

            let end = u64::from(metadata.offset) + u64::from(metadata.length);
            if end > file_len as u64 {
                return Err(TableEncodingError::CorruptDirectory {
                    tag,
                    offset: metadata.offset,
                    length: metadata.length,
                    file_len,
                }
                .into());
            }

            if inner.contains_key(&tag) {
                warn!(%tag, "duplicate table directory entry, keeping the first one");
                continue;
            }
            inner.insert(tag, metadata);
        }

        debug!(tables = inner.len(), "read table directory");

        Ok(Self { offset, inner })
    }

    /// Looks up the location of a table by tag
    pub fn get(&self, tag: Tag) -> Option<&TableMetadata> {
        self.inner.get(&tag)
    }

    /// Like `get`, but a missing table is an error
    pub fn require(&self, tag: Tag) -> Result<&TableMetadata, TableEncodingError> {
        self.get(tag).ok_or(TableEncodingError::MissingTable(tag))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, Tag, TableMetadata> {
        self.inner.iter()
    }
}

impl<'a> IntoIterator for &'a TableDirectory {
    type Item = (&'a Tag, &'a TableMetadata);

    type IntoIter = Iter<'a, Tag, TableMetadata>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}
