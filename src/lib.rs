//! Reads the Unicode character-to-glyph mapping out of TrueType and
//! OpenType fonts.
//!
//! Only the `cmap` table is decoded, from either a format 4 or a format 12
//! subtable, never both. Which one was used is reported on the result.
//!
//! ```no_run
//! use vero_cmap::{CmapFormat, parse_cmap_file};
//!
//! let mapping = parse_cmap_file("DejaVuSans.ttf")?;
//! assert_eq!(mapping.format(), CmapFormat::Format4);
//!
//! for (code_point, glyph) in mapping.iter().take(10) {
//!     println!("U+{code_point:04X} -> {glyph}");
//! }
//! # Ok::<(), vero_cmap::ParseError>(())
//! ```

use std::{io::Read, path::Path};

use buffer::{BufReaderError, ByteCursor};
use tables::{
    TableDirectory, TableEncodingError, Tag,
    cmap::{Cmap, CmapError},
};
use thiserror::Error;

pub mod buffer;
pub mod mapping;
pub mod tables;

#[cfg(test)]
mod fixtures;

pub use mapping::{CmapFormat, GlyphMapping, MappingSource};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Buffer(#[from] BufReaderError),

    #[error(transparent)]
    Table(#[from] TableEncodingError),

    #[error(transparent)]
    Cmap(#[from] CmapError),
}

impl From<std::io::Error> for ParseError {
    fn from(err: std::io::Error) -> Self {
        Self::Buffer(BufReaderError::Io(err))
    }
}

/// Flat view of a `ParseError`, for callers that only need to branch on
/// what went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    OutOfBounds,
    Io,
    InvalidBufferLength,
    UnsupportedScalarType,
    MissingTable,
    CorruptDirectory,
    CorruptCmap,
    NoUnicodeCmap,
    UnsupportedFormat,
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Buffer(BufReaderError::OutOfBounds { .. }) => ErrorKind::OutOfBounds,
            Self::Buffer(BufReaderError::Io(_)) => ErrorKind::Io,
            Self::Table(TableEncodingError::InvalidBufferLength(..)) => {
                ErrorKind::InvalidBufferLength
            }
            Self::Table(TableEncodingError::UnsupportedScalarType(_)) => {
                ErrorKind::UnsupportedScalarType
            }
            Self::Table(TableEncodingError::MissingTable(_)) => ErrorKind::MissingTable,
            Self::Table(TableEncodingError::CorruptDirectory { .. }) => {
                ErrorKind::CorruptDirectory
            }
            Self::Cmap(CmapError::CorruptCmap(_)) => ErrorKind::CorruptCmap,
            Self::Cmap(CmapError::NoUnicodeCmap) => ErrorKind::NoUnicodeCmap,
            Self::Cmap(CmapError::UnsupportedFormat(_)) => ErrorKind::UnsupportedFormat,
        }
    }
}

/// Decodes the Unicode cmap of an in-memory font.
///
/// Nothing borrowed from `font` outlives the call, the returned mapping
/// owns its data. Parsing is a pure function of the bytes so independent
/// fonts can be parsed from as many threads as needed.
///
/// # Errors
///
/// Any malformed structure on the way to the subtable aborts the parse, no
/// partial mapping is returned. See `ErrorKind` for the possible causes.
pub fn parse_cmap(font: &[u8]) -> Result<GlyphMapping, ParseError> {
    let mut reader = ByteCursor::new(font);
    let directory = TableDirectory::from_reader(&mut reader)?;
    let cmap = Cmap::from_reader(&mut reader, directory.require(Tag::CMAP)?)?;

    cmap.select(&reader)?.decode(&reader)
}

/// Reads a whole font from `reader` and decodes it with `parse_cmap`
pub fn parse_cmap_reader<R: Read>(mut reader: R) -> Result<GlyphMapping, ParseError> {
    let mut font = Vec::new();
    reader.read_to_end(&mut font)?;

    parse_cmap(&font)
}

/// Loads the font at `path` and decodes it with `parse_cmap`
pub fn parse_cmap_file<P: AsRef<Path>>(path: P) -> Result<GlyphMapping, ParseError> {
    let font = std::fs::read(path)?;

    parse_cmap(&font)
}
