use thiserror::Error;

macro_rules! impl_read {
    ($fn_name:ident, $fn_at:ident, $typ:ty) => {
        /// Reads a big-endian value at the cursor position and advances past it.
        pub fn $fn_name(&mut self) -> Result<$typ, BufReaderError> {
            let value = self.$fn_at(self.pos)?;
            self.pos += size_of::<$typ>();

            Ok(value)
        }

        /// Reads a big-endian value at an absolute offset without moving the cursor.
        pub fn $fn_at(&self, offset: usize) -> Result<$typ, BufReaderError> {
            let mut raw = [0u8; size_of::<$typ>()];
            raw.copy_from_slice(self.bytes_at(offset, size_of::<$typ>())?);

            Ok(<$typ>::from_be_bytes(raw))
        }
    };
}

/// Represents the possible errors that can occur when using `ByteCursor`.
#[derive(Error, Debug)]
pub enum BufReaderError {
    /// A read or seek would have gone past the end of the buffer.
    #[error("Read of {len} bytes at offset {offset} exceeds buffer of {buffer_len} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        buffer_len: usize,
    },

    /// Loading the font bytes from a reader failed.
    /// This variant transparently wraps `std::io::Error`.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A bounds-checked, big-endian cursor over a font's bytes.
///
/// Sequential reads (`read_u16`, ...) advance the cursor while the `_at`
/// variants read from an absolute offset and leave the position alone,
/// which is what table lookups want.
#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Returns a new cursor positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Seeks to a specifc place in the buffer
    /// from the start of the file
    ///
    /// # Examples
    ///
    /// ```
    /// use vero_cmap::buffer::ByteCursor;
    ///
    /// let data = [0, 0, 0, 10, 0, 0, 0, 20]; // two big-endian u32 values: 10 and 20
    /// let mut reader = ByteCursor::new(&data);
    ///
    /// // Seek to the beginning of the second u32 (at index 4)
    /// reader.seek(4).unwrap();
    /// assert_eq!(reader.read_u32().unwrap(), 20);
    ///
    /// // Seeking to the very end is allowed, one byte further is not
    /// assert!(reader.seek(8).is_ok());
    /// assert!(reader.seek(9).is_err());
    /// ```
    pub fn seek(&mut self, pos: usize) -> Result<(), BufReaderError> {
        if pos > self.data.len() {
            return Err(self.out_of_bounds(pos, 0));
        }
        self.pos = pos;

        Ok(())
    }

    /// Skips n bytes from the CURRENT cursor position
    pub fn skip(&mut self, n: usize) -> Result<(), BufReaderError> {
        let target = self
            .pos
            .checked_add(n)
            .ok_or_else(|| self.out_of_bounds(self.pos, n))?;

        self.seek(target)
    }

    /// The current cursor position, in bytes from the start of the buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the underlying buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrows `len` bytes starting at `offset`, failing if any of them lie
    /// outside the buffer.
    pub fn bytes_at(&self, offset: usize, len: usize) -> Result<&'a [u8], BufReaderError> {
        offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .map(|end| &self.data[offset..end])
            .ok_or_else(|| self.out_of_bounds(offset, len))
    }

    /// Reads a four byte table tag and advances past it
    pub fn read_tag(&mut self) -> Result<[u8; 4], BufReaderError> {
        let mut tag = [0u8; 4];
        tag.copy_from_slice(self.bytes_at(self.pos, 4)?);
        self.pos += 4;

        Ok(tag)
    }

    fn out_of_bounds(&self, offset: usize, len: usize) -> BufReaderError {
        BufReaderError::OutOfBounds {
            offset,
            len,
            buffer_len: self.data.len(),
        }
    }

    impl_read!(read_u32, read_u32_at, u32);
    impl_read!(read_i16, read_i16_at, i16);
    impl_read!(read_u16, read_u16_at, u16);
    impl_read!(read_u8, read_u8_at, u8);
}
