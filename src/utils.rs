use std::ops::Range;

/// Bit-level access to the packed fields of on-disk structures.
///
/// Ranges are half-open and count from the least significant bit.
pub trait BitField: Sized {
    const LEN: usize;

    /// All ones in the lowest `width` bits.
    fn mask(width: usize) -> Self;

    fn get_bit(&self, index: usize) -> bool;
    fn set_bit(&mut self, index: usize, value: bool);

    fn get_bits(&self, range: Range<usize>) -> Self;
    fn set_bits(&mut self, range: Range<usize>, value: Self);

    fn with_bits(mut self, range: Range<usize>, value: Self) -> Self {
        self.set_bits(range, value);
        self
    }
}

macro_rules! impl_bitfield {
    ($($t:ty),*) => {
        $(
            impl BitField for $t {
                const LEN: usize = std::mem::size_of::<$t>() * 8;

                #[inline]
                fn mask(width: usize) -> Self {
                    if width == Self::LEN {
                        Self::MAX
                    } else {
                        (1 << width) - 1
                    }
                }

                #[inline]
                fn get_bit(&self, index: usize) -> bool {
                    assert!(index < Self::LEN);
                    *self & (1 << index) != 0
                }

                #[inline]
                fn set_bit(&mut self, index: usize, value: bool) {
                    assert!(index < Self::LEN);
                    if value {
                        *self |= 1 << index;
                    } else {
                        *self &= !(1 << index);
                    }
                }

                #[inline]
                fn get_bits(&self, range: Range<usize>) -> Self {
                    assert!(range.start < range.end && range.end <= Self::LEN);
                    (*self >> range.start) & Self::mask(range.end - range.start)
                }

                #[inline]
                fn set_bits(&mut self, range: Range<usize>, value: Self) {
                    assert!(range.start < range.end && range.end <= Self::LEN);
                    let mask = Self::mask(range.end - range.start);
                    *self = (*self & !(mask << range.start)) | ((value & mask) << range.start);
                }
            }
        )*
    };
}

impl_bitfield!(u8, u16, u32);

#[cfg(test)]
mod tests {
    use super::BitField;

    #[test]
    fn get_and_set_single_bits() {
        let mut attributes = 0u8;
        attributes.set_bit(3, true);
        attributes.set_bit(5, true);
        assert_eq!(attributes, 0x28);
        assert!(attributes.get_bit(3));
        attributes.set_bit(3, false);
        assert_eq!(attributes, 0x20);
    }

    #[test]
    fn set_bits_keeps_neighbours() {
        let mut word = 0xABCDu16;
        word.set_bits(4..8, 0x0);
        assert_eq!(word, 0xAB0D);
        assert_eq!(word.get_bits(8..16), 0xAB);
    }

    #[test]
    fn set_bits_truncates_value_to_width() {
        let word = 0u32.with_bits(0..12, 0x1234);
        assert_eq!(word, 0x234);
        assert_eq!(0xFFFF_FFFFu32.get_bits(0..32), 0xFFFF_FFFF);
    }
}
