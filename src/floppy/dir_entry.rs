use super::{FatTimestamp, ShortName, DIR_ENTRY_SIZE, ROOT_DIR_ENTRIES};
use crate::utils::BitField;

pub const ATTR_VOLUME_LABEL: usize = 3;
pub const ATTR_DIRECTORY: usize = 4;
pub const ATTR_ARCHIVE: usize = 5;

const UNUSED_MARKER: u8 = 0x00;
const DELETED_MARKER: u8 = 0xE5;

const NAME: std::ops::Range<usize> = 0x00..0x0B;
const ATTRIBUTES: usize = 0x0B;
const TIME: std::ops::Range<usize> = 0x16..0x18;
const DATE: std::ops::Range<usize> = 0x18..0x1A;
const FIRST_CLUSTER: std::ops::Range<usize> = 0x1A..0x1C;
const SIZE: std::ops::Range<usize> = 0x1C..0x20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: ShortName,
    pub attributes: u8,
    pub modified: FatTimestamp,
    pub first_cluster: u16,
    pub size: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DirEntryError {
    NoMoreEntries,
    FreeEntry,
}

impl DirEntry {
    pub fn volume_label(label: ShortName, created: FatTimestamp) -> Self {
        let mut attributes = 0u8;
        attributes.set_bit(ATTR_VOLUME_LABEL, true);
        Self {
            name: label,
            attributes,
            modified: created,
            first_cluster: 0,
            size: 0,
        }
    }

    pub fn file(name: ShortName, modified: FatTimestamp, first_cluster: u16, size: u32) -> Self {
        let mut attributes = 0u8;
        attributes.set_bit(ATTR_ARCHIVE, true);
        Self {
            name,
            attributes,
            modified,
            first_cluster,
            size,
        }
    }

    pub fn parse(raw: &[u8]) -> Result<Self, DirEntryError> {
        match raw[0] {
            UNUSED_MARKER => return Err(DirEntryError::NoMoreEntries),
            DELETED_MARKER => return Err(DirEntryError::FreeEntry),
            _ => {}
        }

        let mut name = [0u8; 11];
        name.copy_from_slice(&raw[NAME]);

        Ok(Self {
            name: ShortName(name),
            attributes: raw[ATTRIBUTES],
            modified: FatTimestamp {
                time: u16::from_le_bytes([raw[TIME.start], raw[TIME.start + 1]]),
                date: u16::from_le_bytes([raw[DATE.start], raw[DATE.start + 1]]),
            },
            first_cluster: u16::from_le_bytes([raw[FIRST_CLUSTER.start], raw[FIRST_CLUSTER.start + 1]]),
            size: u32::from_le_bytes([
                raw[SIZE.start],
                raw[SIZE.start + 1],
                raw[SIZE.start + 2],
                raw[SIZE.start + 3],
            ]),
        })
    }

    /// The 32-byte on-disk record; reserved bytes are zero.
    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        raw[NAME].copy_from_slice(&self.name.0);
        raw[ATTRIBUTES] = self.attributes;
        raw[TIME].copy_from_slice(&self.modified.time.to_le_bytes());
        raw[DATE].copy_from_slice(&self.modified.date.to_le_bytes());
        raw[FIRST_CLUSTER].copy_from_slice(&self.first_cluster.to_le_bytes());
        raw[SIZE].copy_from_slice(&self.size.to_le_bytes());
        raw
    }

    pub fn is_volume_label(&self) -> bool {
        self.attributes.get_bit(ATTR_VOLUME_LABEL)
    }

    pub fn is_dir(&self) -> bool {
        self.attributes.get_bit(ATTR_DIRECTORY)
    }
}

/// Active entries of a root directory region, stopping at the first
/// never-used slot.
pub fn iter_entries(region: &[u8]) -> impl Iterator<Item = DirEntry> + '_ {
    region
        .chunks_exact(DIR_ENTRY_SIZE)
        .map(DirEntry::parse)
        .take_while(|entry| *entry != Err(DirEntryError::NoMoreEntries))
        .filter_map(Result::ok)
}

/// The fixed-capacity root directory of an image.
pub struct RootDir<'img> {
    region: &'img mut [u8],
}

impl<'img> RootDir<'img> {
    pub fn new(region: &'img mut [u8]) -> Self {
        assert_eq!(region.len(), ROOT_DIR_ENTRIES * DIR_ENTRY_SIZE);
        Self { region }
    }

    #[inline]
    fn slot(&self, index: usize) -> &[u8] {
        &self.region[index * DIR_ENTRY_SIZE..(index + 1) * DIR_ENTRY_SIZE]
    }

    pub fn entry(&self, index: usize) -> Result<DirEntry, DirEntryError> {
        if index >= ROOT_DIR_ENTRIES {
            return Err(DirEntryError::NoMoreEntries);
        }
        DirEntry::parse(self.slot(index))
    }

    pub fn entries(&self) -> impl Iterator<Item = DirEntry> + '_ {
        iter_entries(&self.region[..])
    }

    /// Whether an active entry carries exactly `name`.
    pub fn contains(&self, name: &ShortName) -> bool {
        self.entries().any(|entry| entry.name == *name)
    }

    /// Index of the first never-used or deleted slot.
    pub fn first_free(&self) -> Option<usize> {
        (0..ROOT_DIR_ENTRIES).find(|&index| {
            matches!(self.slot(index)[0], UNUSED_MARKER | DELETED_MARKER)
        })
    }

    pub fn write(&mut self, index: usize, entry: &DirEntry) {
        self.region[index * DIR_ENTRY_SIZE..(index + 1) * DIR_ENTRY_SIZE]
            .copy_from_slice(&entry.to_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> Vec<u8> {
        vec![0u8; ROOT_DIR_ENTRIES * DIR_ENTRY_SIZE]
    }

    fn name(raw: &[u8; 11]) -> ShortName {
        ShortName(*raw)
    }

    #[test]
    fn record_layout_matches_fat() {
        let stamp = FatTimestamp::from_calendar(2020, 6, 1, 12, 0, 0);
        let entry = DirEntry::file(name(b"FANTASIEMID"), stamp, 0x0102, 0x0A0B0C0D);
        let raw = entry.to_bytes();
        assert_eq!(&raw[..11], b"FANTASIEMID");
        assert_eq!(raw[11], 0x20);
        assert!(raw[12..22].iter().all(|&b| b == 0));
        assert_eq!(&raw[22..24], &stamp.time.to_le_bytes());
        assert_eq!(&raw[24..26], &stamp.date.to_le_bytes());
        assert_eq!(&raw[26..28], &[0x02, 0x01]);
        assert_eq!(&raw[28..32], &[0x0D, 0x0C, 0x0B, 0x0A]);
        assert_eq!(DirEntry::parse(&raw), Ok(entry));
    }

    #[test]
    fn parse_recognises_markers() {
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        assert_eq!(DirEntry::parse(&raw), Err(DirEntryError::NoMoreEntries));
        raw[0] = 0xE5;
        assert_eq!(DirEntry::parse(&raw), Err(DirEntryError::FreeEntry));
    }

    #[test]
    fn iteration_skips_deleted_and_stops_at_terminator() {
        let mut bytes = region();
        let mut dir = RootDir::new(&mut bytes);
        let stamp = FatTimestamp::default();
        dir.write(0, &DirEntry::volume_label(name(b"Piano      "), stamp));
        dir.write(1, &DirEntry::file(name(b"A       MID"), stamp, 2, 10));
        dir.write(3, &DirEntry::file(name(b"B       MID"), stamp, 3, 10));

        let names: Vec<_> = dir.entries().map(|e| e.name).collect();
        assert_eq!(names, vec![name(b"Piano      "), name(b"A       MID")]);
        assert!(!dir.contains(&name(b"B       MID")));
        assert_eq!(dir.first_free(), Some(2));
        assert!(dir.entry(0).unwrap().is_volume_label());
    }

    #[test]
    fn deleted_slot_counts_as_free() {
        let mut bytes = region();
        let mut dir = RootDir::new(&mut bytes);
        let stamp = FatTimestamp::default();
        for index in 0..ROOT_DIR_ENTRIES {
            dir.write(index, &DirEntry::file(name(b"X       MID"), stamp, 2, 0));
        }
        assert_eq!(dir.first_free(), None);

        bytes[5 * DIR_ENTRY_SIZE] = 0xE5;
        let dir = RootDir::new(&mut bytes);
        assert_eq!(dir.first_free(), Some(5));
        assert_eq!(dir.entry(5), Err(DirEntryError::FreeEntry));
    }
}
