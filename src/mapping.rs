use std::{
    collections::{BTreeMap, btree_map},
    ops::RangeInclusive,
};

use tracing::{debug, warn};

/// The cmap subtable formats a mapping can be decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmapFormat {
    /// Segment mapping to delta values, BMP only
    Format4,
    /// Segmented coverage, the full 32-bit code point domain
    Format12,
}

impl CmapFormat {
    /// The format number as stored in the subtable header
    pub fn number(self) -> u16 {
        match self {
            Self::Format4 => 4,
            Self::Format12 => 12,
        }
    }
}

/// Records which subtable a `GlyphMapping` was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingSource {
    /// The decoder that produced the mapping, exactly one per font
    pub format: CmapFormat,
    pub platform_id: u16,
    pub encoding_id: u16,
    /// Language field of the subtable, zero for Unicode subtables
    pub language: u32,
    /// Segment count for format 4 (sentinel included), group count for format 12
    pub ranges: usize,
    /// Entries dropped without failing the parse, see the `warn!` output for why
    pub omitted: u64,
}

/// A font's code point to glyph index mapping.
///
/// Glyph 0 (`.notdef`) is never stored, so `lookup` returning `None` and a
/// code point mapping to the missing glyph mean the same thing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphMapping {
    entries: BTreeMap<u32, u32>,
    glyph_to_code_points: BTreeMap<u32, Vec<u32>>,
    source: MappingSource,
}

impl GlyphMapping {
    /// Returns the glyph index rendering `code_point`, if the font has one
    ///
    /// # Examples
    ///
    /// ```no_run
    /// let font = std::fs::read("DejaVuSans.ttf").unwrap();
    /// let mapping = vero_cmap::parse_cmap(&font).unwrap();
    ///
    /// if let Some(glyph) = mapping.lookup('A' as u32) {
    ///     println!("'A' is glyph {glyph}");
    /// }
    /// assert_eq!(mapping.lookup(0), None);
    /// ```
    pub fn lookup(&self, code_point: u32) -> Option<u32> {
        self.entries.get(&code_point).copied()
    }

    /// Same as `lookup` for a `char`
    pub fn lookup_char(&self, c: char) -> Option<u32> {
        self.lookup(u32::from(c))
    }

    pub fn contains(&self, code_point: u32) -> bool {
        self.entries.contains_key(&code_point)
    }

    /// Number of mapped code points
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(code point, glyph index)` pairs in ascending code point order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    /// Every code point rendered by `glyph`, ascending
    pub fn code_points_for(&self, glyph: u32) -> &[u32] {
        self.glyph_to_code_points
            .get(&glyph)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The highest mapped code point
    pub fn max_code_point(&self) -> Option<u32> {
        self.entries.last_key_value().map(|(code_point, _)| *code_point)
    }

    pub fn source(&self) -> &MappingSource {
        &self.source
    }

    /// Shorthand for `source().format`
    pub fn format(&self) -> CmapFormat {
        self.source.format
    }
}

/// Iterator over a `GlyphMapping`, see `GlyphMapping::iter`
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: btree_map::Iter<'a, u32, u32>,
}

impl Iterator for Iter<'_> {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(c, g)| (*c, *g))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(c, g)| (*c, *g))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a GlyphMapping {
    type Item = (u32, u32);

    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Collects decoded pairs while a subtable is walked.
///
/// Decoders `claim` each range before walking it and only walk the parts no
/// earlier range claimed, so every code point is visited at most once no
/// matter how the ranges overlap.
#[derive(Debug, Default)]
pub(crate) struct MappingBuilder {
    entries: BTreeMap<u32, u32>,
    /// Claimed code points as disjoint, non-adjacent `start -> end` intervals
    claimed: BTreeMap<u32, u32>,
    omitted: u64,
    duplicates: u64,
}

impl MappingBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Claims `start..=end` for the range being decoded and returns the parts
    /// of it no earlier range claimed, ascending. The first range covering a
    /// code point decides its glyph, the already claimed part is counted as
    /// omitted.
    pub(crate) fn claim(&mut self, start: u32, end: u32) -> Vec<RangeInclusive<u32>> {
        let reach = end.saturating_add(1);
        let mut touching: Vec<(u32, u32)> = self
            .claimed
            .range(..=reach)
            .rev()
            .take_while(|(_, e)| u64::from(**e) + 1 >= u64::from(start))
            .map(|(s, e)| (*s, *e))
            .collect();
        touching.reverse();

        let mut free = Vec::new();
        let mut free_len = 0u64;
        let mut next = u64::from(start);
        for (s, e) in &touching {
            let s = u64::from(*s);
            if s > next && next <= u64::from(end) {
                let gap_end = (s - 1).min(u64::from(end));
                free_len += gap_end - next + 1;
                free.push(next as u32..=gap_end as u32);
            }
            next = next.max(u64::from(*e) + 1);
        }
        if next <= u64::from(end) {
            free_len += u64::from(end) - next + 1;
            free.push(next as u32..=end);
        }

        let already = u64::from(end - start) + 1 - free_len;
        self.duplicates += already;
        self.omitted += already;

        let merged_start = touching.first().map_or(start, |(s, _)| start.min(*s));
        let merged_end = touching.last().map_or(end, |(_, e)| end.max(*e));
        for (s, _) in &touching {
            self.claimed.remove(s);
        }
        self.claimed.insert(merged_start, merged_end);

        free
    }

    /// Records a pair from a claimed range. Glyph 0 is dropped.
    pub(crate) fn insert(&mut self, code_point: u32, glyph: u32) {
        if glyph == 0 {
            return;
        }
        self.entries.entry(code_point).or_insert(glyph);
    }

    /// Counts entries skipped by the decoder
    pub(crate) fn omit(&mut self, count: u64) {
        self.omitted += count;
    }

    pub(crate) fn finish(self, mut source: MappingSource) -> GlyphMapping {
        if self.duplicates > 0 {
            warn!(
                count = self.duplicates,
                "overlapping cmap ranges, kept the first glyph for each code point"
            );
        }
        source.omitted += self.omitted;

        let mut glyph_to_code_points: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for (code_point, glyph) in &self.entries {
            glyph_to_code_points
                .entry(*glyph)
                .or_default()
                .push(*code_point);
        }

        debug!(
            format = source.format.number(),
            entries = self.entries.len(),
            omitted = source.omitted,
            "decoded cmap subtable"
        );

        GlyphMapping {
            entries: self.entries,
            glyph_to_code_points,
            source,
        }
    }
}
