/*!
Binary program images.

An image file is a flat sequence of 16-bit little-endian words. Files with an
odd byte length are rejected, as are images larger than the destination
window they are being read for. Word 0 of an image is reserved; execution
starts at virtual word 1.
*/

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}: odd byte length {len}, not a word image")]
    OddLength { path: PathBuf, len: usize },

    #[error("{path}: image of {words} words exceeds window of {capacity} words")]
    TooLarge {
        path: PathBuf,
        words: usize,
        capacity: usize,
    },
}

/// Read a whole image file into words.
pub fn read_image(path: &Path) -> Result<Vec<u16>, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.len() % 2 != 0 {
        return Err(LoadError::OddLength {
            path: path.to_path_buf(),
            len: bytes.len(),
        });
    }
    let words: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    log::debug!("read image {}: {} words", path.display(), words.len());
    Ok(words)
}

/// Read an image that must fit in a window of `capacity` words.
pub fn read_image_bounded(path: &Path, capacity: usize) -> Result<Vec<u16>, LoadError> {
    let words = read_image(path)?;
    if words.len() > capacity {
        return Err(LoadError::TooLarge {
            path: path.to_path_buf(),
            words: words.len(),
            capacity,
        });
    }
    Ok(words)
}
