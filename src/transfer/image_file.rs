use super::TransferError;
use crate::floppy::{has_floppy_header, FloppyImage, BLOCK_SIZE, IMAGE_SIZE};
use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Read, Write},
    path::Path,
};

pub fn read(path: &Path) -> Result<FloppyImage, TransferError> {
    let size = fs::metadata(path)
        .map_err(TransferError::io(format!(
            "failed to open source file {}",
            path.display()
        )))?
        .len();
    if size != IMAGE_SIZE as u64 {
        return Err(TransferError::WrongSize {
            path: path.to_path_buf(),
            size,
        });
    }

    let bytes = fs::read(path).map_err(TransferError::io(format!(
        "failed to read source file {}",
        path.display()
    )))?;
    log::debug!("read {} bytes from {}", bytes.len(), path.display());

    FloppyImage::from_bytes(bytes).map_err(|err| TransferError::WrongSize {
        path: path.to_path_buf(),
        size: err.0 as u64,
    })
}

/// Writes the whole image. Without `overwrite` an existing file is an error.
pub fn write(path: &Path, image: &FloppyImage, overwrite: bool) -> Result<(), TransferError> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = options.open(path).map_err(TransferError::io(format!(
        "failed to open destination file {}",
        path.display()
    )))?;
    file.write_all(image.as_bytes())
        .and_then(|()| file.flush())
        .map_err(TransferError::io(format!(
            "failed to write destination file {}",
            path.display()
        )))?;

    log::debug!("wrote {IMAGE_SIZE} bytes to {}", path.display());
    Ok(())
}

/// `None` if nothing exists at `path`, otherwise whether it starts with a
/// floppy boot sector.
pub fn probe(path: &Path) -> Result<Option<bool>, TransferError> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(TransferError::Io {
                context: format!("failed to open {}", path.display()),
                source: err,
            })
        }
    };

    let mut block = Vec::with_capacity(BLOCK_SIZE);
    Read::by_ref(&mut file)
        .take(BLOCK_SIZE as u64)
        .read_to_end(&mut block)
        .map_err(TransferError::io(format!("failed to read {}", path.display())))?;
    Ok(Some(has_floppy_header(&block)))
}
