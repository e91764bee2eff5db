//! Moving whole images between memory, image files and the numbered slots of
//! a floppy emulator's raw store.

use crate::floppy::FloppyImage;
use std::{fmt, io, path::PathBuf, str::FromStr};

pub mod image_file;
pub mod thumb_drive;

pub use thumb_drive::ThumbDrive;

#[derive(Debug)]
pub enum TransferError {
    Io { context: String, source: io::Error },
    WrongSize { path: PathBuf, size: u64 },
    InvalidImageHeader { location: String },
    DestinationNotImage { path: PathBuf },
}

impl TransferError {
    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| TransferError::Io { context, source }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Io { context, .. } => write!(f, "{context}"),
            TransferError::WrongSize { path, size } => write!(
                f,
                "{} is not a floppy image: size is {size} bytes, not {}",
                path.display(),
                crate::floppy::IMAGE_SIZE
            ),
            TransferError::InvalidImageHeader { location } => {
                write!(f, "invalid floppy image header on {location}")
            }
            TransferError::DestinationNotImage { path } => write!(
                f,
                "{} exists and is not a floppy image (use --force to overwrite)",
                path.display()
            ),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Where an image lives: a plain image file or slot `index` of a raw store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageLocation {
    File(PathBuf),
    Slot { device: PathBuf, index: u32 },
}

impl FromStr for ImageLocation {
    type Err = String;

    /// `<device>:<n>` names a slot, anything else a file.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(String::from("empty image location"));
        }
        match s.rsplit_once(':') {
            Some((device, index))
                if !device.is_empty()
                    && !index.is_empty()
                    && index.bytes().all(|b| b.is_ascii_digit()) =>
            {
                let index = index
                    .parse()
                    .map_err(|_| format!("slot number out of range in '{s}'"))?;
                Ok(ImageLocation::Slot {
                    device: PathBuf::from(device),
                    index,
                })
            }
            _ => Ok(ImageLocation::File(PathBuf::from(s))),
        }
    }
}

impl fmt::Display for ImageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageLocation::File(path) => write!(f, "{}", path.display()),
            ImageLocation::Slot { device, index } => write!(f, "{}:{index}", device.display()),
        }
    }
}

impl ImageLocation {
    pub fn read(&self) -> Result<FloppyImage, TransferError> {
        match self {
            ImageLocation::File(path) => image_file::read(path),
            ImageLocation::Slot { device, index } => {
                ThumbDrive::open(device, false)?.read_slot(*index)
            }
        }
    }

    /// Writes `image` here. An existing file is only replaced if it already
    /// holds a floppy image, unless `force` is set.
    pub fn write(&self, image: &FloppyImage, force: bool) -> Result<(), TransferError> {
        if !image.has_floppy_header() {
            return Err(TransferError::InvalidImageHeader {
                location: String::from("source image"),
            });
        }
        match self {
            ImageLocation::File(path) => {
                let overwrite = match image_file::probe(path)? {
                    None => false,
                    Some(true) => true,
                    Some(false) if force => true,
                    Some(false) => {
                        return Err(TransferError::DestinationNotImage { path: path.clone() })
                    }
                };
                image_file::write(path, image, overwrite)
            }
            ImageLocation::Slot { device, index } => {
                ThumbDrive::open(device, true)?.write_slot(*index, image)
            }
        }
    }
}
