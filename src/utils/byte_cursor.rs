use crate::err::Truncated;
use crate::utils::bytes;

/// A lightweight cursor over an immutable byte slice.
///
/// This is the slice/offset equivalent of `Cursor<&[u8]>`: every read is bounds checked against
/// the packet buffer and reports what it was trying to read when it runs out of bytes.
///
/// All reads are big-endian and advance the cursor on success.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    #[inline]
    pub(crate) fn with_pos(buf: &'a [u8], pos: usize) -> Result<Self, Truncated> {
        // Allow pos == len (EOF), reject pos > len.
        let _ = bytes::slice_r(buf, pos, 0, "cursor.position")?;
        Ok(Self { buf, pos })
    }

    #[inline]
    pub(crate) fn buf(&self) -> &'a [u8] {
        self.buf
    }

    #[inline]
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    #[inline]
    pub(crate) fn take_bytes(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], Truncated> {
        let out = bytes::slice_r(self.buf, self.pos, len, what)?;
        self.pos += len;
        Ok(out)
    }

    #[inline]
    pub(crate) fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], Truncated> {
        let v = bytes::read_array_r::<N>(self.buf, self.pos, what)?;
        self.pos += N;
        Ok(v)
    }

    #[inline]
    pub(crate) fn u8_named(&mut self, what: &'static str) -> Result<u8, Truncated> {
        let b = bytes::read_u8(self.buf, self.pos)
            .ok_or_else(|| bytes::truncated(what, self.pos, 1, self.buf.len()))?;
        self.pos += 1;
        Ok(b)
    }

    #[inline]
    pub(crate) fn u32_named(&mut self, what: &'static str) -> Result<u32, Truncated> {
        let v = bytes::read_u32_be_r(self.buf, self.pos, what)?;
        self.pos += 4;
        Ok(v)
    }

    #[inline]
    pub(crate) fn i32_named(&mut self, what: &'static str) -> Result<i32, Truncated> {
        let v = bytes::read_i32_be_r(self.buf, self.pos, what)?;
        self.pos += 4;
        Ok(v)
    }

    /// Read `count` consecutive big-endian `u32` words with a single bounds check.
    pub(crate) fn u32_vec(&mut self, count: usize, what: &'static str) -> Result<Vec<u32>, Truncated> {
        let out = bytes::read_u32_vec_be_r(self.buf, self.pos, count, what)?;
        self.pos += count * 4;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_advances_only_on_success() {
        let buf = [0x41, 0x00, 0x00, 0x00, 0x07, 0x09];
        let mut cursor = ByteCursor::with_pos(&buf, 0).unwrap();

        assert_eq!(cursor.u8_named("first").unwrap(), 0x41);
        assert_eq!(cursor.u32_named("word").unwrap(), 7);
        assert_eq!(cursor.pos(), 5);

        let err = cursor.u32_named("second word").unwrap_err();
        assert_eq!(err.what, "second word");
        assert_eq!(err.have, 1);
        assert_eq!(cursor.pos(), 5);
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn test_cursor_rejects_start_past_end() {
        let buf = [0u8; 2];
        assert!(ByteCursor::with_pos(&buf, 2).is_ok());
        assert!(ByteCursor::with_pos(&buf, 3).is_err());
    }

    #[test]
    fn test_take_bytes_and_array() {
        let buf = *b"TASKA\0rest";
        let mut cursor = ByteCursor::with_pos(&buf, 0).unwrap();
        assert_eq!(&cursor.array::<6>("task name").unwrap(), b"TASKA\0");
        assert_eq!(cursor.take_bytes(4, "rest").unwrap(), b"rest");
        assert!(cursor.take_bytes(1, "more").is_err());
        assert_eq!(cursor.buf().len(), 10);
    }
}
