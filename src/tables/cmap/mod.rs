use thiserror::Error;
use tracing::debug;

use crate::{
    ParseError,
    buffer::ByteCursor,
    mapping::{CmapFormat, GlyphMapping, MappingBuilder, MappingSource},
};

use super::TableMetadata;

pub mod format12;
pub mod format4;

pub use format4::{Format4, Segment};
pub use format12::{Format12, Group};

/// Represents the error messages which may occur while reading the cmap table
#[derive(Error, Debug)]
pub enum CmapError {
    /// An offset, length or count inside the cmap table doesn't add up
    #[error("Corrupt cmap table: {0}")]
    CorruptCmap(String),

    #[error("The cmap table has no Unicode encoding record")]
    NoUnicodeCmap,

    /// Only formats 4 and 12 are decoded, anything else is refused
    #[error("Unsupported cmap subtable format {0}")]
    UnsupportedFormat(u16),
}

/// Represents the platform identifier of an encoding record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformId {
    Unicode,
    Macintosh,
    /// ISO, deprecated
    Iso,
    Microsoft,
    Unknown(u16),
}

impl From<u16> for PlatformId {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Unicode,
            1 => Self::Macintosh,
            2 => Self::Iso,
            3 => Self::Microsoft,
            _ => Self::Unknown(value),
        }
    }
}

/// Microsoft encoding ids with Unicode semantics
const MS_UNICODE_BMP: u16 = 1;
const MS_UNICODE_FULL: u16 = 10;

/// A cmap [encoding record](https://developer.apple.com/fonts/TrueType-Reference-Manual/RM06/Chap6cmap.html)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingRecord {
    /// The platform identifier
    pub platform_id: u16,

    /// The platform specific encoding identifier
    pub encoding_id: u16,

    /// The offset of the mapping subtable, from the start of the cmap table
    pub subtable_offset: u32,
}

impl EncodingRecord {
    /// Size in bytes of one record
    pub const SIZE: usize = 8;

    pub fn platform(&self) -> PlatformId {
        PlatformId::from(self.platform_id)
    }

    /// Unicode platform with any encoding, or Microsoft's Unicode BMP and
    /// full repertoire encodings
    pub fn is_unicode(&self) -> bool {
        match self.platform() {
            PlatformId::Unicode => true,
            PlatformId::Microsoft => {
                matches!(self.encoding_id, MS_UNICODE_BMP | MS_UNICODE_FULL)
            }
            _ => false,
        }
    }
}

/// A representation of the [cmap table](https://developer.apple.com/fonts/TrueType-Reference-Manual/RM06/Chap6cmap.html)
/// supporting only formats 4 and 12 as these are the most used formats while other
/// are either for specialized uses or just never got materialized as the reference manual suggests.
#[derive(Debug, Clone)]
pub struct Cmap {
    /// The version of the cmap table
    /// it's almost guarenteed to be set to zero
    version: u16,

    /// The encoding records, in file order
    records: Vec<EncodingRecord>,

    /// Absolute offset of the table in the file
    offset: usize,

    /// Length of the table in bytes
    length: usize,
}

impl Cmap {
    /// Reads the cmap header and its encoding records.
    ///
    /// `metadata` must come from a `TableDirectory`, which guarantees the
    /// table lies within the file.
    pub fn from_reader(
        reader: &mut ByteCursor<'_>,
        metadata: &TableMetadata,
    ) -> Result<Self, ParseError> {
        let offset = metadata.offset as usize;
        let length = metadata.length as usize;
        reader.seek(offset)?;

        let version = reader.read_u16()?;
        let num_records = usize::from(reader.read_u16()?);

        if 4 + num_records * EncodingRecord::SIZE > length {
            return Err(CmapError::CorruptCmap(format!(
                "{num_records} encoding records don't fit in a {length} byte table"
            ))
            .into());
        }

        let mut records = Vec::with_capacity(num_records);
        for _ in 0..num_records {
            records.push(EncodingRecord {
                platform_id: reader.read_u16()?,
                encoding_id: reader.read_u16()?,
                subtable_offset: reader.read_u32()?,
            });
        }

        Ok(Self {
            version,
            records,
            offset,
            length,
        })
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn records(&self) -> &[EncodingRecord] {
        &self.records
    }

    /// Reads the format number of the subtable a record points at
    pub fn subtable_format(
        &self,
        reader: &ByteCursor<'_>,
        record: &EncodingRecord,
    ) -> Result<u16, ParseError> {
        let start = self.subtable_start(record)?;
        Ok(reader.read_u16_at(start)?)
    }

    /// Picks the subtable to decode.
    ///
    /// Among Unicode records the first format 12 subtable wins, then the
    /// first format 4 one. Other formats are never used as a fallback.
    pub fn select(&self, reader: &ByteCursor<'_>) -> Result<SelectedSubtable, ParseError> {
        let mut first_unicode = None;
        let mut format4 = None;

        for record in self.records.iter().filter(|record| record.is_unicode()) {
            let format = self.subtable_format(reader, record)?;
            first_unicode.get_or_insert(format);

            match format {
                12 => return self.load(reader, *record, format),
                4 if format4.is_none() => format4 = Some(*record),
                _ => {}
            }
        }

        match (format4, first_unicode) {
            (Some(record), _) => self.load(reader, record, 4),
            (None, Some(format)) => Err(CmapError::UnsupportedFormat(format).into()),
            (None, None) => Err(CmapError::NoUnicodeCmap.into()),
        }
    }

    fn load(
        &self,
        reader: &ByteCursor<'_>,
        record: EncodingRecord,
        format: u16,
    ) -> Result<SelectedSubtable, ParseError> {
        debug!(
            platform_id = record.platform_id,
            encoding_id = record.encoding_id,
            format,
            "selected cmap subtable"
        );

        let start = self.subtable_start(&record)?;
        let end = self.offset + self.length;
        let mut reader = *reader;

        let subtable = match format {
            4 => CmapSubtable::Format4(Format4::from_reader(&mut reader, start, end)?),
            12 => CmapSubtable::Format12(Format12::from_reader(&mut reader, start, end)?),
            other => return Err(CmapError::UnsupportedFormat(other).into()),
        };

        Ok(SelectedSubtable { record, subtable })
    }

    fn subtable_start(&self, record: &EncodingRecord) -> Result<usize, CmapError> {
        let relative = record.subtable_offset as usize;
        if relative.saturating_add(2) > self.length {
            return Err(CmapError::CorruptCmap(format!(
                "subtable offset {relative} lies outside the {} byte table",
                self.length
            )));
        }

        Ok(self.offset + relative)
    }
}

/// A parsed subtable of one of the two supported formats
#[derive(Debug, Clone)]
pub enum CmapSubtable {
    Format4(Format4),
    Format12(Format12),
}

/// The subtable chosen by `Cmap::select` with the record pointing at it
#[derive(Debug, Clone)]
pub struct SelectedSubtable {
    pub record: EncodingRecord,
    pub subtable: CmapSubtable,
}

impl SelectedSubtable {
    /// Runs the decoder for the selected format and collects the result
    pub fn decode(&self, reader: &ByteCursor<'_>) -> Result<GlyphMapping, ParseError> {
        let mut builder = MappingBuilder::new();

        let (format, language, ranges) = match &self.subtable {
            CmapSubtable::Format4(subtable) => {
                subtable.decode(reader, &mut builder)?;
                (
                    CmapFormat::Format4,
                    u32::from(subtable.language),
                    subtable.segments.len(),
                )
            }
            CmapSubtable::Format12(subtable) => {
                subtable.decode(&mut builder);
                (
                    CmapFormat::Format12,
                    subtable.language,
                    subtable.groups.len(),
                )
            }
        };

        Ok(builder.finish(MappingSource {
            format,
            platform_id: self.record.platform_id,
            encoding_id: self.record.encoding_id,
            language,
            ranges,
            omitted: 0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::fixtures::{CmapBuilder, FontBuilder, format0, format4, format6, format12};
    use crate::tables::{TableDirectory, Tag};

    fn cmap_of(font: &[u8]) -> Result<(ByteCursor<'_>, Cmap), ParseError> {
        let mut cursor = ByteCursor::new(font);
        let directory = TableDirectory::from_reader(&mut cursor)?;
        let cmap = Cmap::from_reader(&mut cursor, directory.require(Tag::CMAP)?)?;
        Ok((cursor, cmap))
    }

    fn font_with(cmap: CmapBuilder) -> Vec<u8> {
        FontBuilder::new().table(*b"cmap", cmap.build()).build()
    }

    #[test]
    fn unicode_records() {
        let record = |platform_id, encoding_id| EncodingRecord {
            platform_id,
            encoding_id,
            subtable_offset: 0,
        };

        assert!(record(0, 3).is_unicode());
        assert!(record(0, 6).is_unicode());
        assert!(record(3, 1).is_unicode());
        assert!(record(3, 10).is_unicode());
        assert!(!record(3, 0).is_unicode());
        assert!(!record(1, 0).is_unicode());
        assert!(!record(7, 1).is_unicode());
        assert_eq!(record(7, 1).platform(), PlatformId::Unknown(7));
    }

    #[test]
    fn reads_records_in_file_order() {
        let font = font_with(
            CmapBuilder::new()
                .subtable(1, 0, format6())
                .subtable(3, 1, format4(&[(0x41, 0x5A, 0, None)])),
        );
        let (cursor, cmap) = cmap_of(&font).unwrap();

        assert_eq!(cmap.version(), 0);
        let ids: Vec<(u16, u16)> = cmap
            .records()
            .iter()
            .map(|r| (r.platform_id, r.encoding_id))
            .collect();
        assert_eq!(ids, vec![(1, 0), (3, 1)]);
        assert_eq!(cmap.subtable_format(&cursor, &cmap.records()[0]).unwrap(), 6);
        assert_eq!(cmap.subtable_format(&cursor, &cmap.records()[1]).unwrap(), 4);
    }

    #[test]
    fn prefers_format12_even_when_listed_last() {
        let font = font_with(
            CmapBuilder::new()
                .subtable(3, 1, format4(&[(0x41, 0x5A, 0, None)]))
                .subtable(3, 10, format12(&[(0x41, 0x5A, 1)])),
        );
        let (cursor, cmap) = cmap_of(&font).unwrap();
        let selected = cmap.select(&cursor).unwrap();

        assert!(matches!(selected.subtable, CmapSubtable::Format12(_)));
        assert_eq!(selected.record.encoding_id, 10);

        let mapping = selected.decode(&cursor).unwrap();
        assert_eq!(mapping.format(), CmapFormat::Format12);
        assert_eq!(mapping.lookup(0x41), Some(1));
    }

    #[test]
    fn falls_back_to_first_format4() {
        let font = font_with(
            CmapBuilder::new()
                .subtable(1, 0, format12(&[(0x41, 0x5A, 1)]))
                .subtable(0, 3, format4(&[(0x41, 0x41, 1, None)]))
                .subtable(3, 1, format4(&[(0x41, 0x41, 2, None)])),
        );
        let (cursor, cmap) = cmap_of(&font).unwrap();
        let selected = cmap.select(&cursor).unwrap();

        assert!(matches!(selected.subtable, CmapSubtable::Format4(_)));
        assert_eq!((selected.record.platform_id, selected.record.encoding_id), (0, 3));
        assert_eq!(selected.decode(&cursor).unwrap().lookup(0x41), Some(0x42));
    }

    #[test]
    fn no_unicode_record() {
        let font = font_with(
            CmapBuilder::new()
                .subtable(1, 0, format4(&[(0x41, 0x5A, 0, None)]))
                .subtable(3, 0, format4(&[(0x41, 0x5A, 0, None)])),
        );
        let (cursor, cmap) = cmap_of(&font).unwrap();
        let err = cmap.select(&cursor).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NoUnicodeCmap);
    }

    #[test]
    fn other_formats_are_not_a_fallback() {
        let font = font_with(CmapBuilder::new().subtable(3, 1, format6()));
        let (cursor, cmap) = cmap_of(&font).unwrap();
        let err = cmap.select(&cursor).unwrap_err();

        assert!(matches!(err, ParseError::Cmap(CmapError::UnsupportedFormat(6))));
    }

    #[test]
    fn unsupported_format_names_the_first_unicode_record() {
        let font = font_with(
            CmapBuilder::new()
                .subtable(1, 0, format6())
                .subtable(3, 1, format0())
                .subtable(0, 3, format6()),
        );
        let (cursor, cmap) = cmap_of(&font).unwrap();
        let err = cmap.select(&cursor).unwrap_err();

        assert!(matches!(err, ParseError::Cmap(CmapError::UnsupportedFormat(0))));
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[test]
    fn subtable_offset_outside_table() {
        let mut table = CmapBuilder::new()
            .subtable(3, 1, format4(&[(0x41, 0x5A, 0, None)]))
            .build();
        // point the only record far past the end of the table
        table[8..12].copy_from_slice(&0x0010_0000u32.to_be_bytes());
        let font = FontBuilder::new().table(*b"cmap", table).build();

        let (cursor, cmap) = cmap_of(&font).unwrap();
        let err = cmap.select(&cursor).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptCmap);
    }

    #[test]
    fn too_many_records_for_table() {
        let table = vec![0, 0, 0, 9, 0, 3, 0, 1];
        let font = FontBuilder::new().table(*b"cmap", table).build();

        let err = cmap_of(&font).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptCmap);
    }
}
