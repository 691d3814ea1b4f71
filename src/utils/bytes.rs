//! Bounds-checked big-endian reads over packet buffers.
//!
//! `read_*` return `Option`, and their `*_r` counterparts turn a short buffer into a
//! [`Truncated`] naming the field being read. Offsets are relative to the slice passed in.

use crate::err::Truncated;

use byteorder::{BigEndian, ByteOrder};

/// Read `N` raw bytes at `offset`.
///
/// Returns `None` if the range is out of bounds.
pub(crate) fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    let bytes: [u8; N] = buf.get(offset..end)?.try_into().ok()?;
    Some(bytes)
}

/// Read a single byte at `offset`.
pub(crate) fn read_u8(buf: &[u8], offset: usize) -> Option<u8> {
    buf.get(offset).copied()
}

/// Read a `u32` (big-endian) at `offset`.
pub(crate) fn read_u32_be(buf: &[u8], offset: usize) -> Option<u32> {
    Some(BigEndian::read_u32(&read_array::<4>(buf, offset)?))
}

/// Read an `i32` (big-endian) at `offset`.
pub(crate) fn read_i32_be(buf: &[u8], offset: usize) -> Option<i32> {
    Some(BigEndian::read_i32(&read_array::<4>(buf, offset)?))
}

#[inline]
pub(crate) fn truncated(what: &'static str, offset: usize, need: usize, len: usize) -> Truncated {
    Truncated {
        what,
        offset: offset as u64,
        need,
        have: len.saturating_sub(offset),
    }
}

pub(crate) fn slice_r<'a>(
    buf: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], Truncated> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))?;
    buf.get(offset..end)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))
}

/// Read `N` raw bytes at `offset`, or return `Truncated`.
pub(crate) fn read_array_r<const N: usize>(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<[u8; N], Truncated> {
    read_array::<N>(buf, offset).ok_or_else(|| truncated(what, offset, N, buf.len()))
}

/// Read a `u32` (big-endian) at `offset`, or return `Truncated`.
pub(crate) fn read_u32_be_r(buf: &[u8], offset: usize, what: &'static str) -> Result<u32, Truncated> {
    read_u32_be(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

/// Read an `i32` (big-endian) at `offset`, or return `Truncated`.
pub(crate) fn read_i32_be_r(buf: &[u8], offset: usize, what: &'static str) -> Result<i32, Truncated> {
    read_i32_be(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

/// Read a `count`-element `u32` (big-endian) table at `offset`.
///
/// This does a single bounds check for the whole table and then reads each element.
pub(crate) fn read_u32_vec_be_r(
    buf: &[u8],
    offset: usize,
    count: usize,
    what: &'static str,
) -> Result<Vec<u32>, Truncated> {
    let len = count
        .checked_mul(4)
        .ok_or_else(|| truncated(what, offset, usize::MAX, buf.len()))?;
    let table = slice_r(buf, offset, len, what)?;

    Ok(table.chunks_exact(4).map(BigEndian::read_u32).collect())
}

/// Fold up to eight big-endian bytes into an unsigned value.
///
/// Returns `None` for an empty slice or one longer than eight bytes.
pub(crate) fn fold_be(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() || bytes.len() > 8 {
        return None;
    }
    Some(BigEndian::read_uint(bytes, bytes.len()))
}
