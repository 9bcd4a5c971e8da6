//! Bit window arithmetic for bitfields sharing a backing slot.
//!
//! Bits are numbered from the least significant bit of the backing element:
//! a bitfield occupies bits `stop..=start` and its value is stored shifted left by `stop`.

/// 1-filled mask covering bits `stop..=start` of a `width`-bit element.
pub fn window_mask(width: usize, start: usize, stop: usize) -> u64 {
    debug_assert!(stop <= start && start < width && width <= 64);

    let max_value = u64::MAX >> (64 - width);
    let max_bit = width - 1;

    let rmask = max_value >> (max_bit - start);
    let lmask = (max_value << stop) & max_value;

    rmask & lmask
}

/// Writes `value` into bits `stop..=start` of `backing`, leaving all other bits untouched.
/// Bits of `value` that do not fit the window are dropped.
pub fn insert_bits(backing: u64, value: u64, width: usize, start: usize, stop: usize) -> u64 {
    let mask = window_mask(width, start, stop);
    (backing & !mask) | ((value << stop) & mask)
}

/// Reads bits `stop..=start` of `backing` as an unsigned value.
pub fn extract_bits(backing: u64, width: usize, start: usize, stop: usize) -> u64 {
    (backing & window_mask(width, start, stop)) >> stop
}

/// Keeps the low `bits` of `value`.
pub fn truncate(value: u64, bits: usize) -> u64 {
    if bits >= 64 {
        value
    } else {
        value & ((1u64 << bits) - 1)
    }
}

/// Sign-extends the low `bits` of `value` to a full `i64`.
pub fn sign_extend(value: u64, bits: usize) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}
