//! Utility functions.

/// Aligns an offset or size up to the next multiple of `align`.
/// `align` must be a power of two.
pub fn align_up(value: u32, align: u32) -> u32 {
    assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}
