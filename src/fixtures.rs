//! Synthetic fonts for tests. Also compiled into the integration tests by
//! path, so this file must not refer to anything in the crate.
#![allow(dead_code)]

/// A format 4 segment for `format4`: start, end, idDelta and optionally the
/// glyph ids to store in the glyph id array instead of using the delta alone.
pub type SegmentSpec = (u16, u16, i16, Option<Vec<u16>>);

/// Assembles an sfnt with the given tables, sorted by tag as fonts store them.
#[derive(Debug, Default)]
pub struct FontBuilder {
    tables: Vec<([u8; 4], Vec<u8>)>,
}

impl FontBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, tag: [u8; 4], data: Vec<u8>) -> Self {
        self.tables.push((tag, data));
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.tables.sort_by(|a, b| a.0.cmp(&b.0));

        let mut font = table_directory_header(self.tables.len() as u16);
        let mut offset = 12 + 16 * self.tables.len();
        let mut data = Vec::new();

        for (tag, table) in &self.tables {
            font.extend_from_slice(tag);
            font.extend_from_slice(&checksum(table).to_be_bytes());
            font.extend_from_slice(&(offset as u32).to_be_bytes());
            font.extend_from_slice(&(table.len() as u32).to_be_bytes());

            let padded = table.len().next_multiple_of(4);
            data.extend_from_slice(table);
            data.resize(data.len() + padded - table.len(), 0);
            offset += padded;
        }

        font.extend_from_slice(&data);
        font
    }
}

/// The 12 byte offset table of a TrueType font with `num_tables` tables
pub fn table_directory_header(num_tables: u16) -> Vec<u8> {
    let entry_selector = if num_tables == 0 { 0 } else { num_tables.ilog2() as u16 };
    let search_range = (1u16 << entry_selector) * 16;
    let range_shift = (num_tables * 16).saturating_sub(search_range);

    let mut header = Vec::with_capacity(12);
    header.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    header.extend_from_slice(&num_tables.to_be_bytes());
    header.extend_from_slice(&search_range.to_be_bytes());
    header.extend_from_slice(&entry_selector.to_be_bytes());
    header.extend_from_slice(&range_shift.to_be_bytes());
    header
}

fn checksum(table: &[u8]) -> u32 {
    table.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}

/// Assembles a cmap table, one subtable per encoding record.
#[derive(Debug, Default)]
pub struct CmapBuilder {
    records: Vec<(u16, u16, Vec<u8>)>,
}

impl CmapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subtable(mut self, platform_id: u16, encoding_id: u16, subtable: Vec<u8>) -> Self {
        self.records.push((platform_id, encoding_id, subtable));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut table = Vec::new();
        table.extend_from_slice(&0u16.to_be_bytes());
        table.extend_from_slice(&(self.records.len() as u16).to_be_bytes());

        let mut offset = 4 + 8 * self.records.len();
        for (platform_id, encoding_id, subtable) in &self.records {
            table.extend_from_slice(&platform_id.to_be_bytes());
            table.extend_from_slice(&encoding_id.to_be_bytes());
            table.extend_from_slice(&(offset as u32).to_be_bytes());
            offset += subtable.len();
        }
        for (_, _, subtable) in &self.records {
            table.extend_from_slice(subtable);
        }
        table
    }
}

/// A format 4 subtable with the given segments followed by the 0xFFFF
/// sentinel segment.
pub fn format4(segments: &[SegmentSpec]) -> Vec<u8> {
    let mut all = segments.to_vec();
    all.push((0xFFFF, 0xFFFF, 1, None));
    let seg_count = all.len();

    let mut id_range_offsets = Vec::with_capacity(seg_count);
    let mut glyph_ids: Vec<u16> = Vec::new();
    for (i, (_, _, _, ids)) in all.iter().enumerate() {
        match ids {
            // relative to the segment's own idRangeOffset field
            Some(ids) => {
                id_range_offsets.push((2 * (seg_count - i + glyph_ids.len())) as u16);
                glyph_ids.extend_from_slice(ids);
            }
            None => id_range_offsets.push(0),
        }
    }

    let length = 16 + 8 * seg_count + 2 * glyph_ids.len();
    let entry_selector = (seg_count as u16).ilog2() as u16;
    let search_range = 2 * (1u16 << entry_selector);
    let seg_count_x2 = 2 * seg_count as u16;

    let mut subtable = Vec::with_capacity(length);
    for value in [
        4,
        length as u16,
        0,
        seg_count_x2,
        search_range,
        entry_selector,
        seg_count_x2 - search_range,
    ] {
        subtable.extend_from_slice(&value.to_be_bytes());
    }
    for (_, end, _, _) in &all {
        subtable.extend_from_slice(&end.to_be_bytes());
    }
    subtable.extend_from_slice(&0u16.to_be_bytes());
    for (start, _, _, _) in &all {
        subtable.extend_from_slice(&start.to_be_bytes());
    }
    for (_, _, delta, _) in &all {
        subtable.extend_from_slice(&delta.to_be_bytes());
    }
    for offset in &id_range_offsets {
        subtable.extend_from_slice(&offset.to_be_bytes());
    }
    for glyph in &glyph_ids {
        subtable.extend_from_slice(&glyph.to_be_bytes());
    }
    subtable
}

/// A format 12 subtable from (startCharCode, endCharCode, startGlyphID) groups
pub fn format12(groups: &[(u32, u32, u32)]) -> Vec<u8> {
    let length = 16 + 12 * groups.len() as u32;

    let mut subtable = Vec::with_capacity(length as usize);
    subtable.extend_from_slice(&12u16.to_be_bytes());
    subtable.extend_from_slice(&0u16.to_be_bytes());
    subtable.extend_from_slice(&length.to_be_bytes());
    subtable.extend_from_slice(&0u32.to_be_bytes());
    subtable.extend_from_slice(&(groups.len() as u32).to_be_bytes());
    for (start, end, glyph) in groups {
        subtable.extend_from_slice(&start.to_be_bytes());
        subtable.extend_from_slice(&end.to_be_bytes());
        subtable.extend_from_slice(&glyph.to_be_bytes());
    }
    subtable
}

/// A format 6 (trimmed table) subtable mapping 'A' and 'B'
pub fn format6() -> Vec<u8> {
    let mut subtable = Vec::new();
    for value in [6u16, 14, 0, 0x41, 2, 1, 2] {
        subtable.extend_from_slice(&value.to_be_bytes());
    }
    subtable
}

/// A format 0 (byte encoding) subtable mapping every byte to glyph 1
pub fn format0() -> Vec<u8> {
    let mut subtable = Vec::with_capacity(262);
    for value in [0u16, 262, 0] {
        subtable.extend_from_slice(&value.to_be_bytes());
    }
    subtable.resize(262, 1);
    subtable
}
