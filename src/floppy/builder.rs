use super::{
    boot_sector::{self, FAT_HEADER, LABEL_LEN},
    to_short_name, uniquify, DirEntry, FatTimestamp, FloppyImage, ShortName, AU_SIZE,
    DATA_AU_CAPACITY, FAT0_OFFSET, FAT1_OFFSET,
};
use std::{fmt, io};

pub const DEFAULT_LABEL: [u8; LABEL_LEN] = *b"Piano      ";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub label: [u8; LABEL_LEN],
    /// Volume serial number; random when unset.
    pub serial: Option<u32>,
    /// Stamp for the volume label entry; the current local time when unset.
    pub created: Option<FatTimestamp>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            label: DEFAULT_LABEL,
            serial: None,
            created: None,
        }
    }
}

#[derive(Debug)]
pub enum BuildError {
    DiskFull { file: String },
    DirectoryFull { file: String },
    InsufficientSpace { file: String, needed: u32, available: u32 },
    SourceReadFailure { file: String, source: io::Error },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::DiskFull { file } => write!(f, "disk full, no room for {file}"),
            BuildError::DirectoryFull { file } => {
                write!(f, "root directory full, no entry left for {file}")
            }
            BuildError::InsufficientSpace {
                file,
                needed,
                available,
            } => write!(
                f,
                "insufficient space for {file}: needs {needed} allocation units, {available} left"
            ),
            BuildError::SourceReadFailure { file, .. } => write!(f, "failed to read {file}"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::SourceReadFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Where a file ended up on the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedFile {
    pub name: ShortName,
    pub first_cluster: u16,
    pub clusters: u16,
}

/// Lays files out on a freshly formatted image, one after the other.
#[derive(Debug)]
pub struct ImageBuilder {
    image: FloppyImage,
}

impl ImageBuilder {
    /// A blank image carrying only the boot sector, the FAT headers and the
    /// volume label entry.
    pub fn format(options: &BuildOptions) -> Self {
        let mut image = FloppyImage::zeroed();

        let serial = options.serial.unwrap_or_else(rand::random);
        boot_sector::stamp(image.boot_sector_mut(), serial, &options.label);

        let bytes = image.as_bytes_mut();
        for base in [FAT0_OFFSET, FAT1_OFFSET] {
            bytes[base..base + FAT_HEADER.len()].copy_from_slice(&FAT_HEADER);
        }

        let created = options.created.unwrap_or_else(FatTimestamp::now);
        image
            .root_dir()
            .write(0, &DirEntry::volume_label(ShortName(options.label), created));

        Self { image }
    }

    pub fn image(&self) -> &FloppyImage {
        &self.image
    }

    pub fn finish(self) -> FloppyImage {
        self.image
    }

    /// Allocation units needed to hold `size` bytes.
    fn clusters_for(size: u64) -> u64 {
        size.div_ceil(AU_SIZE as u64)
    }

    /// Adds one file, reading exactly `size` bytes from `reader`.
    ///
    /// Nothing is written to the image unless the name, a directory slot and
    /// enough contiguous space are all available. A failed read after that
    /// leaves the image inconsistent and it should be discarded.
    pub fn add_file(
        &mut self,
        file: &str,
        reader: &mut impl io::Read,
        size: u64,
        modified: FatTimestamp,
    ) -> Result<AddedFile, BuildError> {
        let name = uniquify(to_short_name(file), &self.image.root_dir());

        let start = self
            .image
            .allocation_table()
            .first_free()
            .ok_or_else(|| BuildError::DiskFull {
                file: file.to_string(),
            })?;

        let slot = self
            .image
            .root_dir()
            .first_free()
            .ok_or_else(|| BuildError::DirectoryFull {
                file: file.to_string(),
            })?;

        let available = DATA_AU_CAPACITY - start;
        let needed = Self::clusters_for(size);
        if needed > available as u64 {
            return Err(BuildError::InsufficientSpace {
                file: file.to_string(),
                needed: u32::try_from(needed).unwrap_or(u32::MAX),
                available: available as u32,
            });
        }
        // fits in the data region, so also in a u16 and a u32
        let clusters = needed as u16;
        let first_cluster = if clusters == 0 { 0 } else { start };

        self.image.root_dir().write(
            slot,
            &DirEntry::file(name, modified, first_cluster, size as u32),
        );
        self.image
            .allocation_table()
            .link_contiguous(first_cluster, clusters);

        if size > 0 {
            let data = self
                .image
                .data_from_au_mut(start)
                .map(|data| &mut data[..size as usize]);
            if let Some(data) = data {
                reader
                    .read_exact(data)
                    .map_err(|source| BuildError::SourceReadFailure {
                        file: file.to_string(),
                        source,
                    })?;
            }
        }

        Ok(AddedFile {
            name,
            first_cluster,
            clusters,
        })
    }
}
