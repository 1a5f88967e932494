//! Loading image files into memory

use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use log::{debug, warn};
use memmap2::Mmap;

use crate::errors::AppResult;

/// Bytes of an image file, memory-mapped when possible.
pub enum ImageBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl ImageBytes {
    pub fn is_mapped(&self) -> bool {
        matches!(self, ImageBytes::Mapped(_))
    }
}

impl Deref for ImageBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            ImageBytes::Mapped(m) => m,
            ImageBytes::Owned(v) => v,
        }
    }
}

/// Open `path` and map it read-only. Empty files and files that cannot be
/// mapped are read into memory instead.
pub fn load_image(path: &Path) -> AppResult<ImageBytes> {
    let file = File::open(path)?;
    let metadata = file.metadata()?;

    // mmap doesn't work on empty files
    if metadata.len() == 0 {
        debug!("'{}' is empty", path.display());
        return Ok(ImageBytes::Owned(Vec::new()));
    }

    // SAFETY: the map is read-only and is only viewed as a byte slice
    match unsafe { Mmap::map(&file) } {
        Ok(m) => {
            debug!("Mapped '{}' ({} bytes)", path.display(), m.len());
            Ok(ImageBytes::Mapped(m))
        }
        Err(e) => {
            warn!("Cannot map '{}' ({}), reading it instead", path.display(), e);
            Ok(ImageBytes::Owned(std::fs::read(path)?))
        }
    }
}
