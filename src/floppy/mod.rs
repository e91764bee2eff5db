//! In-memory 1.44 MB FAT12 floppy images.
//!
//! The byte offsets of every region live in this module and nowhere else;
//! everything outside goes through the region accessors on [`FloppyImage`].

mod allocation_table;
mod boot_sector;
mod builder;
mod dir_entry;
mod short_name;
mod timestamp;

pub use allocation_table::{AllocationTable, AllocationType};
pub use boot_sector::{has_floppy_header, BootSector};
pub use builder::{AddedFile, BuildError, BuildOptions, ImageBuilder};
pub use dir_entry::{DirEntry, DirEntryError, RootDir};
pub use short_name::{to_short_name, uniquify, ShortName};
pub use timestamp::FatTimestamp;

pub const BLOCK_SIZE: usize = 512;
pub const BLOCKS_PER_AU: usize = 1;
pub const AU_SIZE: usize = BLOCK_SIZE * BLOCKS_PER_AU;
pub const BLOCKS_PER_DISK: usize = 2880;
pub const IMAGE_SIZE: usize = BLOCKS_PER_DISK * BLOCK_SIZE;

pub const FAT_BLOCKS: usize = 9;
pub const FAT_SIZE: usize = FAT_BLOCKS * BLOCK_SIZE;
pub const FAT0_OFFSET: usize = BLOCK_SIZE;
pub const FAT1_OFFSET: usize = FAT0_OFFSET + FAT_SIZE;

pub const DIR_ENTRY_SIZE: usize = 32;
pub const ROOT_DIR_BLOCKS: usize = 14;
pub const ROOT_DIR_ENTRIES: usize = ROOT_DIR_BLOCKS * BLOCK_SIZE / DIR_ENTRY_SIZE;
pub const ROOT_DIR_OFFSET: usize = FAT1_OFFSET + FAT_SIZE;
pub const DATA_OFFSET: usize = ROOT_DIR_OFFSET + ROOT_DIR_BLOCKS * BLOCK_SIZE;

/// Clusters 0 and 1 are reserved by the FAT addressing scheme.
pub const FIRST_DATA_CLUSTER: u16 = 2;
/// Exclusive upper bound on allocatable AU indices.
pub const DATA_AU_CAPACITY: u16 = 2844;

/// Distance between the starts of consecutive images on a raw store.
pub const SLOT_INTERVAL: u64 = 0x18_0000;

const _: () = assert!(ROOT_DIR_ENTRIES == 224);
const _: () = assert!(DATA_OFFSET == 33 * BLOCK_SIZE);
const _: () = assert!(
    DATA_OFFSET + (DATA_AU_CAPACITY - FIRST_DATA_CLUSTER) as usize * AU_SIZE <= IMAGE_SIZE
);
const _: () = assert!(IMAGE_SIZE as u64 <= SLOT_INTERVAL);

#[derive(Debug)]
pub struct WrongImageSize(pub usize);

impl std::fmt::Display for WrongImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "image is {} bytes, expected {IMAGE_SIZE}", self.0)
    }
}

impl std::error::Error for WrongImageSize {}

/// An owned, always full-sized floppy image.
#[derive(Clone, PartialEq, Eq)]
pub struct FloppyImage {
    data: Box<[u8]>,
}

impl FloppyImage {
    pub fn zeroed() -> Self {
        Self {
            data: vec![0u8; IMAGE_SIZE].into_boxed_slice(),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, WrongImageSize> {
        if bytes.len() != IMAGE_SIZE {
            return Err(WrongImageSize(bytes.len()));
        }
        Ok(Self {
            data: bytes.into_boxed_slice(),
        })
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data.into_vec()
    }

    pub fn has_floppy_header(&self) -> bool {
        has_floppy_header(&self.data)
    }

    #[inline]
    pub fn boot_sector(&self) -> &[u8] {
        &self.data[..BLOCK_SIZE]
    }

    #[inline]
    pub fn boot_sector_mut(&mut self) -> &mut [u8] {
        &mut self.data[..BLOCK_SIZE]
    }

    /// Both FAT copies as one contiguous slice, FAT0 first.
    #[inline]
    pub fn fats(&self) -> &[u8] {
        &self.data[FAT0_OFFSET..FAT0_OFFSET + 2 * FAT_SIZE]
    }

    #[inline]
    pub fn allocation_table(&mut self) -> AllocationTable<'_> {
        AllocationTable::new(&mut self.data[FAT0_OFFSET..FAT0_OFFSET + 2 * FAT_SIZE])
    }

    #[inline]
    pub fn root_dir_bytes(&self) -> &[u8] {
        &self.data[ROOT_DIR_OFFSET..DATA_OFFSET]
    }

    #[inline]
    pub fn root_dir(&mut self) -> RootDir<'_> {
        RootDir::new(&mut self.data[ROOT_DIR_OFFSET..DATA_OFFSET])
    }

    /// Active (non-free) root directory entries, in slot order.
    pub fn entries(&self) -> Vec<DirEntry> {
        dir_entry::iter_entries(self.root_dir_bytes()).collect()
    }

    /// The data region from the start of `au` to the end of the image.
    ///
    /// Returns `None` for indices outside the allocatable range.
    pub fn data_from_au_mut(&mut self, au: u16) -> Option<&mut [u8]> {
        if !(FIRST_DATA_CLUSTER..DATA_AU_CAPACITY).contains(&au) {
            return None;
        }
        let offset = DATA_OFFSET + (au - FIRST_DATA_CLUSTER) as usize * AU_SIZE;
        Some(&mut self.data[offset..])
    }

    pub fn data_from_au(&self, au: u16) -> Option<&[u8]> {
        if !(FIRST_DATA_CLUSTER..DATA_AU_CAPACITY).contains(&au) {
            return None;
        }
        let offset = DATA_OFFSET + (au - FIRST_DATA_CLUSTER) as usize * AU_SIZE;
        Some(&self.data[offset..])
    }
}

impl std::fmt::Debug for FloppyImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FloppyImage")
            .field("valid_header", &self.has_floppy_header())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_matches_a_144mb_floppy() {
        assert_eq!(IMAGE_SIZE, 1_474_560);
        assert_eq!(FAT0_OFFSET, 512);
        assert_eq!(FAT1_OFFSET, 512 + 512 * 9);
        assert_eq!(ROOT_DIR_OFFSET, FAT1_OFFSET + FAT_SIZE);
        assert_eq!(DATA_OFFSET, 16_896);
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        assert!(FloppyImage::from_bytes(vec![0; IMAGE_SIZE - 1]).is_err());
        assert!(FloppyImage::from_bytes(vec![0; IMAGE_SIZE]).is_ok());
    }

    #[test]
    fn data_region_is_bounds_checked() {
        let mut image = FloppyImage::zeroed();
        assert!(image.data_from_au_mut(0).is_none());
        assert!(image.data_from_au_mut(1).is_none());
        assert!(image.data_from_au_mut(DATA_AU_CAPACITY).is_none());
        assert_eq!(image.data_from_au_mut(2).map(|d| d.len()), Some(IMAGE_SIZE - DATA_OFFSET));
        assert_eq!(
            image.data_from_au(3).map(|d| d.len()),
            Some(IMAGE_SIZE - DATA_OFFSET - AU_SIZE)
        );
    }
}
