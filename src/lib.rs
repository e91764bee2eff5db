//! Builds 1.44 MB FAT12 floppy images of MIDI files for PianoDisc players and
//! moves them between image files and the slots of a floppy emulator's raw
//! store.

pub mod floppy;
pub mod logger;
pub mod sources;
pub mod transfer;
mod utils;

use floppy::{AddedFile, BuildError, BuildOptions, FatTimestamp, FloppyImage, ImageBuilder};
use sources::SourceFile;

/// Formats a new image and adds `sources` in order.
///
/// Stops at the first file that does not fit or cannot be read; no partial
/// image is returned.
pub fn build_image(
    sources: &[SourceFile],
    options: &BuildOptions,
) -> Result<(FloppyImage, Vec<AddedFile>), BuildError> {
    let mut builder = ImageBuilder::format(options);
    let mut added = Vec::with_capacity(sources.len());

    for source in sources {
        let name = source.display_name();
        let mut file = source
            .open()
            .map_err(|err| BuildError::SourceReadFailure {
                file: name.clone(),
                source: err,
            })?;
        let modified = source
            .modified
            .map(FatTimestamp::from_system_time)
            .unwrap_or_default();

        added.push(builder.add_file(&name, &mut file, source.len, modified)?);
    }

    Ok((builder.finish(), added))
}
