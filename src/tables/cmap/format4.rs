//! Format 4: segment mapping to delta values.
//!
//! The BMP is split into segments of contiguous code points. Each segment
//! either adds `idDelta` to the code point directly or, when its
//! `idRangeOffset` is non-zero, indexes into the glyph id array that follows
//! the segment arrays. The `idRangeOffset` is relative to the address of the
//! `idRangeOffset` field itself, which is why the array position is kept
//! around after parsing.

use tracing::warn;

use crate::{
    ParseError,
    buffer::{BufReaderError, ByteCursor},
    mapping::MappingBuilder,
};

use super::CmapError;

/// format, length, language, segCountX2, searchRange, entrySelector, rangeShift
const HEADER_SIZE: usize = 14;

/// One segment of a format 4 subtable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start_code: u16,
    pub end_code: u16,
    pub id_delta: i16,
    pub id_range_offset: u16,
}

impl Segment {
    /// The mandatory last segment, mapping 0xFFFF to nothing
    pub fn is_sentinel(&self) -> bool {
        self.start_code == 0xFFFF && self.end_code == 0xFFFF
    }
}

/// A parsed format 4 subtable
#[derive(Debug, Clone)]
pub struct Format4 {
    pub language: u16,
    pub segments: Vec<Segment>,

    /// Absolute offset of the `idRangeOffset` array
    id_range_offsets_at: usize,

    /// Glyph id reads at or past this absolute offset fall outside the
    /// cmap table
    limit: usize,
}

impl Format4 {
    /// Parses the header and the four segment arrays of the subtable at
    /// `offset`. `limit` is the absolute end of the cmap table.
    pub fn from_reader(
        reader: &mut ByteCursor<'_>,
        offset: usize,
        limit: usize,
    ) -> Result<Self, ParseError> {
        reader.seek(offset)?;

        let format = reader.read_u16()?;
        if format != 4 {
            return Err(CmapError::UnsupportedFormat(format).into());
        }

        let length = usize::from(reader.read_u16()?);
        let language = reader.read_u16()?;
        let seg_count_x2 = reader.read_u16()?;
        if seg_count_x2 == 0 || seg_count_x2 % 2 != 0 {
            return Err(CmapError::CorruptCmap(format!(
                "format 4 segCountX2 of {seg_count_x2} is not a positive even number"
            ))
            .into());
        }
        // searchRange, entrySelector and rangeShift are only binary search hints
        reader.skip(6)?;

        let seg_count = usize::from(seg_count_x2 / 2);
        let arrays_end = offset + HEADER_SIZE + 2 + seg_count * 8;
        if arrays_end > limit {
            return Err(CmapError::CorruptCmap(format!(
                "format 4 segment arrays for {seg_count} segments run past the cmap table"
            ))
            .into());
        }
        // Fonts with large format 4 subtables are known to store a truncated
        // length, the segment arrays are trusted over it.
        if offset + length < arrays_end {
            warn!(
                length,
                seg_count, "format 4 length is shorter than its segment arrays"
            );
        }

        let end_codes = read_array(reader, seg_count, ByteCursor::read_u16)?;
        let reserved_pad = reader.read_u16()?;
        if reserved_pad != 0 {
            warn!(reserved_pad, "format 4 reservedPad is not zero");
        }
        let start_codes = read_array(reader, seg_count, ByteCursor::read_u16)?;
        let id_deltas = read_array(reader, seg_count, ByteCursor::read_i16)?;
        let id_range_offsets_at = reader.position();
        let id_range_offsets = read_array(reader, seg_count, ByteCursor::read_u16)?;

        let segments = (0..seg_count)
            .map(|i| Segment {
                start_code: start_codes[i],
                end_code: end_codes[i],
                id_delta: id_deltas[i],
                id_range_offset: id_range_offsets[i],
            })
            .collect();

        Ok(Self {
            language,
            segments,
            id_range_offsets_at,
            limit,
        })
    }

    /// Walks every segment and records each code point's glyph. Code points
    /// an earlier segment already covered are skipped without being walked.
    ///
    /// All glyph arithmetic wraps modulo 65536.
    pub(crate) fn decode(
        &self,
        reader: &ByteCursor<'_>,
        builder: &mut MappingBuilder,
    ) -> Result<(), ParseError> {
        for (i, segment) in self.segments.iter().enumerate() {
            if segment.is_sentinel() {
                continue;
            }
            if segment.start_code > segment.end_code {
                warn!(
                    segment = i,
                    start = segment.start_code,
                    end = segment.end_code,
                    "skipping inverted format 4 segment"
                );
                continue;
            }

            let delta = segment.id_delta as u16;
            let mut out_of_table = 0u64;

            let free = builder.claim(
                u32::from(segment.start_code),
                u32::from(segment.end_code),
            );
            for code in free.into_iter().flatten() {
                // claimed ranges stay inside the segment, so inside the BMP
                let code = code as u16;
                let glyph = if segment.id_range_offset == 0 {
                    code.wrapping_add(delta)
                } else {
                    let at = self.id_range_offsets_at
                        + 2 * i
                        + usize::from(segment.id_range_offset)
                        + 2 * usize::from(code - segment.start_code);

                    if at + 2 > self.limit {
                        out_of_table += 1;
                        continue;
                    }

                    match reader.read_u16_at(at)? {
                        0 => 0,
                        raw => raw.wrapping_add(delta),
                    }
                };

                builder.insert(u32::from(code), u32::from(glyph));
            }

            if out_of_table > 0 {
                warn!(
                    segment = i,
                    count = out_of_table,
                    "format 4 glyph ids point past the cmap table, leaving them unmapped"
                );
                builder.omit(out_of_table);
            }
        }

        Ok(())
    }
}

fn read_array<'a, T>(
    reader: &mut ByteCursor<'a>,
    count: usize,
    read: fn(&mut ByteCursor<'a>) -> Result<T, BufReaderError>,
) -> Result<Vec<T>, ParseError> {
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(read(reader)?);
    }

    Ok(values)
}
