use super::{DATA_AU_CAPACITY, FAT_SIZE, FIRST_DATA_CLUSTER};
use crate::utils::BitField;

pub const END_OF_CHAIN: u16 = 0xFFF;
const BAD_CLUSTER: u16 = 0xFF7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationType {
    Free,
    Reserved,
    Next(u16),
    Bad,
    EndOfChain,
}

impl From<u16> for AllocationType {
    fn from(entry: u16) -> Self {
        match entry {
            0x000 => AllocationType::Free,
            0x001 => AllocationType::Reserved,
            BAD_CLUSTER => AllocationType::Bad,
            0xFF8..=0xFFF => AllocationType::EndOfChain,
            0xFF0..=0xFF6 => AllocationType::Reserved,
            next => AllocationType::Next(next),
        }
    }
}

/// Both FAT copies of an image, read and written as one table.
///
/// Entries are 12 bits wide and packed two to every three bytes. Every write
/// lands in both copies, so the mirrors can never drift apart.
pub struct AllocationTable<'img> {
    fats: &'img mut [u8],
}

impl<'img> AllocationTable<'img> {
    /// `fats` is FAT0 immediately followed by FAT1.
    pub fn new(fats: &'img mut [u8]) -> Self {
        assert_eq!(fats.len(), 2 * FAT_SIZE);
        Self { fats }
    }

    #[inline]
    fn in_range(au: u16) -> bool {
        (FIRST_DATA_CLUSTER..DATA_AU_CAPACITY).contains(&au)
    }

    #[inline]
    fn window_offset(au: u16) -> usize {
        (au as usize >> 1) * 3
    }

    #[inline]
    fn half(au: u16) -> std::ops::Range<usize> {
        if au & 1 == 0 {
            0..12
        } else {
            12..24
        }
    }

    fn read_window(table: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([table[offset], table[offset + 1], table[offset + 2], 0])
    }

    /// The 12-bit entry for `au`, or `None` if `au` is not an allocatable index.
    pub fn lookup(&self, au: u16) -> Option<u16> {
        if !Self::in_range(au) {
            return None;
        }
        let window = Self::read_window(self.fats, Self::window_offset(au));
        Some(window.get_bits(Self::half(au)) as u16)
    }

    pub fn allocation(&self, au: u16) -> Option<AllocationType> {
        self.lookup(au).map(AllocationType::from)
    }

    /// Stores the low 12 bits of `value` for `au` in both copies.
    ///
    /// Indices outside the allocatable range are ignored.
    pub fn set(&mut self, au: u16, value: u16) {
        if !Self::in_range(au) {
            return;
        }
        let offset = Self::window_offset(au);
        let (fat0, fat1) = self.fats.split_at_mut(FAT_SIZE);

        let window = Self::read_window(fat0, offset).with_bits(Self::half(au), value as u32);
        let bytes = window.to_le_bytes();
        fat0[offset..offset + 3].copy_from_slice(&bytes[..3]);
        fat1[offset..offset + 3].copy_from_slice(&bytes[..3]);
    }

    /// First free AU at or after the first data cluster.
    pub fn first_free(&self) -> Option<u16> {
        (FIRST_DATA_CLUSTER..DATA_AU_CAPACITY).find(|&au| self.lookup(au) == Some(0))
    }

    /// Links `count` AUs starting at `start` into one contiguous chain.
    pub fn link_contiguous(&mut self, start: u16, count: u16) {
        if count == 0 {
            return;
        }
        let last = start + count - 1;
        for au in start..last {
            self.set(au, au + 1);
        }
        self.set(last, END_OF_CHAIN);
    }

    /// Follows the chain starting at `start` until its end-of-chain marker.
    pub fn chain(&self, start: u16) -> Vec<u16> {
        let mut chain = Vec::new();
        let mut current = start;
        // a chain can never be longer than the table, so this also stops loops
        while chain.len() < DATA_AU_CAPACITY as usize {
            chain.push(current);
            match self.allocation(current) {
                Some(AllocationType::Next(next)) => current = next,
                _ => break,
            }
        }
        chain
    }
}
