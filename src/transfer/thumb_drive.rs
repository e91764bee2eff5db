//! A raw store holding a sequence of floppy images at a fixed interval, as
//! used by floppy-disk emulators.
//!
//! Slot 0 is the image the emulator (and the host) may have mounted, so it is
//! only written while holding an exclusive lock on the device.

use super::TransferError;
use crate::floppy::{has_floppy_header, FloppyImage, BLOCK_SIZE, IMAGE_SIZE, SLOT_INTERVAL};
use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

pub struct ThumbDrive {
    file: File,
    path: PathBuf,
}

impl ThumbDrive {
    /// Opens `path` and checks that slot 0 holds a floppy image.
    pub fn open(path: &Path, writable: bool) -> Result<Self, TransferError> {
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .map_err(TransferError::io(format!(
                "failed to open drive {}",
                path.display()
            )))?;

        let mut drive = Self {
            file,
            path: path.to_path_buf(),
        };
        if !drive.probe(0)? {
            return Err(TransferError::InvalidImageHeader {
                location: format!("{} (not a set of floppy images)", path.display()),
            });
        }
        Ok(drive)
    }

    fn location(&self, index: u32) -> String {
        format!("{} image {index}", self.path.display())
    }

    fn seek_slot(&mut self, index: u32) -> Result<(), TransferError> {
        let offset = index as u64 * SLOT_INTERVAL;
        let context = format!("failed to seek to {}", self.location(index));
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(TransferError::io(context))?;
        Ok(())
    }

    /// Whether slot `index` starts with a floppy boot sector.
    pub fn probe(&mut self, index: u32) -> Result<bool, TransferError> {
        self.seek_slot(index)?;
        let mut block = [0u8; BLOCK_SIZE];
        let context = format!("failed to read first block of {}", self.location(index));
        self.file
            .read_exact(&mut block)
            .map_err(TransferError::io(context))?;
        Ok(has_floppy_header(&block))
    }

    pub fn read_slot(&mut self, index: u32) -> Result<FloppyImage, TransferError> {
        self.seek_slot(index)?;
        let mut bytes = vec![0u8; IMAGE_SIZE];
        let context = format!("failed to read full image from {}", self.location(index));
        self.file
            .read_exact(&mut bytes)
            .map_err(TransferError::io(context))?;

        let image = FloppyImage::from_bytes(bytes).map_err(|err| TransferError::WrongSize {
            path: self.path.clone(),
            size: err.0 as u64,
        })?;
        if !image.has_floppy_header() {
            return Err(TransferError::InvalidImageHeader {
                location: self.location(index),
            });
        }
        log::debug!("read {}", self.location(index));
        Ok(image)
    }

    pub fn write_slot(&mut self, index: u32, image: &FloppyImage) -> Result<(), TransferError> {
        if !image.has_floppy_header() {
            return Err(TransferError::InvalidImageHeader {
                location: String::from("source image"),
            });
        }

        // slot 0 was already checked when the drive was opened
        let _lock = if index == 0 {
            Some(VolumeLock::acquire(&self.file, &self.path)?)
        } else {
            if !self.probe(index)? {
                return Err(TransferError::InvalidImageHeader {
                    location: self.location(index),
                });
            }
            None
        };

        self.seek_slot(index)?;
        let context = format!("failed to write {}", self.location(index));
        self.file
            .write_all(image.as_bytes())
            .and_then(|()| self.file.sync_data())
            .map_err(TransferError::io(context))?;

        log::debug!("wrote {}", self.location(index));
        Ok(())
    }
}

/// Exclusive advisory lock on the whole device, released on drop.
///
/// Holds its own handle to the open file description, so the drive stays
/// free for seeks and writes while locked.
struct VolumeLock {
    #[cfg_attr(not(unix), allow(dead_code))]
    file: File,
}

impl VolumeLock {
    #[cfg(unix)]
    fn acquire(file: &File, path: &Path) -> Result<Self, TransferError> {
        use std::os::fd::AsRawFd;

        let file = file
            .try_clone()
            .map_err(TransferError::io(format!("failed to lock {}", path.display())))?;

        // safety: flock only operates on the descriptor, which `file` keeps open
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result != 0 {
            return Err(TransferError::Io {
                context: format!("failed to lock {}", path.display()),
                source: std::io::Error::last_os_error(),
            });
        }
        log::debug!("locked {}", path.display());
        Ok(Self { file })
    }

    #[cfg(not(unix))]
    fn acquire(file: &File, path: &Path) -> Result<Self, TransferError> {
        let file = file
            .try_clone()
            .map_err(TransferError::io(format!("failed to lock {}", path.display())))?;
        Ok(Self { file })
    }
}

impl Drop for VolumeLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::fd::AsRawFd;

            // safety: see `acquire`
            if unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) } != 0 {
                log::warn!("failed to unlock drive: {}", std::io::Error::last_os_error());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::floppy::{BuildOptions, FatTimestamp, ImageBuilder};
    use std::fs;

    fn image(serial: u32) -> FloppyImage {
        ImageBuilder::format(&BuildOptions {
            serial: Some(serial),
            created: Some(FatTimestamp::default()),
            ..BuildOptions::default()
        })
        .finish()
    }

    /// A fake store with valid images in the first `slots` slots.
    fn store(name: &str, slots: u32) -> PathBuf {
        let path = std::env::temp_dir().join(format!("pianodisc-drive-{name}-{}.bin", std::process::id()));
        let mut bytes = vec![0u8; slots as usize * SLOT_INTERVAL as usize];
        for index in 0..slots {
            let offset = index as usize * SLOT_INTERVAL as usize;
            bytes[offset..offset + IMAGE_SIZE].copy_from_slice(image(index).as_bytes());
        }
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn slots_are_addressed_at_fixed_interval() {
        let path = store("interval", 3);
        let mut drive = ThumbDrive::open(&path, true).unwrap();

        let new = image(0xCAFE);
        drive.write_slot(2, &new).unwrap();
        drive.write_slot(0, &new).unwrap();
        assert_eq!(drive.read_slot(2).unwrap(), new);
        assert_eq!(drive.read_slot(0).unwrap(), new);
        assert_eq!(drive.read_slot(1).unwrap(), image(1));

        let raw = fs::read(&path).unwrap();
        let offset = 2 * SLOT_INTERVAL as usize;
        assert_eq!(&raw[offset..offset + IMAGE_SIZE], new.as_bytes());

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn refuses_slot_without_image() {
        let path = store("invalid", 1);
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&vec![0u8; SLOT_INTERVAL as usize]).unwrap();
        drop(file);

        let mut drive = ThumbDrive::open(&path, true).unwrap();
        assert!(matches!(
            drive.write_slot(1, &image(5)),
            Err(TransferError::InvalidImageHeader { .. })
        ));
        assert!(matches!(
            drive.read_slot(1),
            Err(TransferError::InvalidImageHeader { .. })
        ));

        let blank = FloppyImage::zeroed();
        assert!(drive.write_slot(0, &blank).is_err());

        fs::remove_file(path).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn slot_zero_is_written_under_an_exclusive_lock() {
        let path = store("locked", 2);
        let mut drive = ThumbDrive::open(&path, true).unwrap();
        let new = image(0xBEEF);

        // another handle on the same device holds the lock
        let other = File::open(&path).unwrap();
        let held = VolumeLock::acquire(&other, &path).unwrap();
        assert!(matches!(
            drive.write_slot(0, &new),
            Err(TransferError::Io { .. })
        ));
        assert_eq!(drive.read_slot(0).unwrap(), image(0));

        // other slots are not locked
        drive.write_slot(1, &new).unwrap();

        drop(held);
        drive.write_slot(0, &new).unwrap();
        assert_eq!(drive.read_slot(0).unwrap(), new);

        // released again once the write is done
        let relock = VolumeLock::acquire(&other, &path).unwrap();
        drop(relock);

        fs::remove_file(path).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn lock_is_held_while_slot_zero_is_written() {
        let path = store("held", 1);
        let mut drive = ThumbDrive::open(&path, true).unwrap();

        let lock = VolumeLock::acquire(&drive.file, &path).unwrap();
        let other = File::open(&path).unwrap();
        assert!(matches!(
            VolumeLock::acquire(&other, &path),
            Err(TransferError::Io { .. })
        ));

        // the drive handle shares the lock's open file, so writing still works
        drive.seek_slot(0).unwrap();
        drive.file.write_all(image(7).as_bytes()).unwrap();
        drop(lock);
        assert_eq!(drive.read_slot(0).unwrap(), image(7));

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn open_requires_image_in_slot_zero() {
        let path = std::env::temp_dir().join(format!("pianodisc-drive-blank-{}.bin", std::process::id()));
        fs::write(&path, vec![0u8; SLOT_INTERVAL as usize]).unwrap();
        assert!(matches!(
            ThumbDrive::open(&path, false),
            Err(TransferError::InvalidImageHeader { .. })
        ));
        fs::remove_file(path).unwrap();
    }
}
