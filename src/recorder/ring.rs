//! Ring buffer wraparound arithmetic.
use core::ops::Range;

/// Split a read of `len` bytes starting at `offset` into at most two contiguous spans.
///
/// # Args
/// * `capacity` - The ring size in bytes.
/// * `offset` - Start of the read. Must be less than `capacity`.
/// * `len` - Number of bytes to read. Must not exceed `capacity`.
///
/// # Returns
/// The span up to the end of the ring and the wrapped span from its start. The second span is
/// empty when the read does not wrap.
pub fn wrapped_spans(capacity: usize, offset: usize, len: usize) -> (Range<usize>, Range<usize>) {
    debug_assert!(offset < capacity || (capacity == 0 && len == 0));
    debug_assert!(len <= capacity);
    let end = capacity.min(offset + len);
    let first = offset..end;
    let second = 0..len - first.len();
    (first, second)
}

/// Copy `dst.len()` bytes out of `ring` starting at `offset`, wrapping at the end of the ring.
pub fn copy_wrapped(ring: &[u8], offset: usize, dst: &mut [u8]) {
    let (first, second) = wrapped_spans(ring.len(), offset, dst.len());
    let (head, tail) = dst.split_at_mut(first.len());
    head.copy_from_slice(&ring[first]);
    tail.copy_from_slice(&ring[second]);
}
