//! Format 12: segmented coverage over the full 32-bit code point domain.

use tracing::warn;

use crate::{ParseError, buffer::ByteCursor, mapping::MappingBuilder};

use super::CmapError;

/// format, reserved, length, language, numGroups
const HEADER_SIZE: u64 = 16;

/// startCharCode, endCharCode, startGlyphID
const GROUP_SIZE: u64 = 12;

/// The last Unicode scalar value, code points above it are never mapped
pub const MAX_CODE_POINT: u32 = 0x10FFFF;

/// A sequential map group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Group {
    pub start_char_code: u32,
    pub end_char_code: u32,
    pub start_glyph_id: u32,
}

/// A parsed format 12 subtable
#[derive(Debug, Clone)]
pub struct Format12 {
    pub language: u32,
    pub groups: Vec<Group>,
}

impl Format12 {
    /// Parses the subtable at `offset`. `limit` is the absolute end of the
    /// cmap table, the declared subtable length has to fit before it and
    /// every group has to fit in the declared length.
    pub fn from_reader(
        reader: &mut ByteCursor<'_>,
        offset: usize,
        limit: usize,
    ) -> Result<Self, ParseError> {
        reader.seek(offset)?;

        let format = reader.read_u16()?;
        if format != 12 {
            return Err(CmapError::UnsupportedFormat(format).into());
        }
        let _reserved = reader.read_u16()?;
        let length = reader.read_u32()?;
        let language = reader.read_u32()?;
        let num_groups = reader.read_u32()?;

        if offset as u64 + u64::from(length) > limit as u64 {
            return Err(CmapError::CorruptCmap(format!(
                "format 12 length of {length} runs past the cmap table"
            ))
            .into());
        }
        if HEADER_SIZE + u64::from(num_groups) * GROUP_SIZE > u64::from(length) {
            return Err(CmapError::CorruptCmap(format!(
                "{num_groups} format 12 groups don't fit in a length of {length}"
            ))
            .into());
        }

        let mut groups = Vec::with_capacity(num_groups as usize);
        for i in 0..num_groups {
            let group = Group {
                start_char_code: reader.read_u32()?,
                end_char_code: reader.read_u32()?,
                start_glyph_id: reader.read_u32()?,
            };

            if group.end_char_code < group.start_char_code {
                return Err(CmapError::CorruptCmap(format!(
                    "format 12 group {i} ends at 0x{:X} before it starts at 0x{:X}",
                    group.end_char_code, group.start_char_code
                ))
                .into());
            }
            groups.push(group);
        }

        Ok(Self { language, groups })
    }

    /// Records `startGlyphID + (c - startCharCode)` for every code point of
    /// every group in file order. Nothing wraps; code points past
    /// `MAX_CODE_POINT` and glyph ids past `u32::MAX` are left out, as is
    /// anything an earlier group already covered.
    pub(crate) fn decode(&self, builder: &mut MappingBuilder) {
        for (i, group) in self.groups.iter().enumerate() {
            let start = group.start_char_code;
            let end = group.end_char_code;

            if start > MAX_CODE_POINT {
                warn!(group = i, start, "format 12 group lies beyond U+10FFFF, skipping it");
                builder.omit(u64::from(end - start) + 1);
                continue;
            }
            if end > MAX_CODE_POINT {
                warn!(group = i, end, "format 12 group extends beyond U+10FFFF, truncating it");
                builder.omit(u64::from(end - MAX_CODE_POINT));
            }
            let last = end.min(MAX_CODE_POINT);

            // the highest code point whose glyph id still fits in 32 bits
            let fits_until = start.saturating_add(u32::MAX - group.start_glyph_id);
            if last > fits_until {
                warn!(
                    group = i,
                    code = fits_until + 1,
                    "format 12 glyph id overflows 32 bits, leaving the rest unmapped"
                );
            }

            for free in builder.claim(start, last) {
                let (low, high) = free.into_inner();
                if low > fits_until {
                    builder.omit(u64::from(high - low) + 1);
                    continue;
                }

                let top = high.min(fits_until);
                builder.omit(u64::from(high - top));
                for code in low..=top {
                    builder.insert(code, group.start_glyph_id + (code - start));
                }
            }
        }
    }
}
