use std::path::{Path, PathBuf};

use base64::Engine;
use sha2::{Digest, Sha256};

use super::StorageError;
use crate::models::ReceiptImageRef;

/// Content-addressed store for receipt images.
///
/// Files are named after the SHA-256 of their bytes, so re-importing the
/// same photo yields the same reference and never duplicates the file.
pub struct ReceiptImageStore {
    dir: PathBuf,
}

impl ReceiptImageStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Persist image bytes and return their reference.
    pub fn save(&self, bytes: &[u8], extension: &str) -> Result<ReceiptImageRef, StorageError> {
        std::fs::create_dir_all(&self.dir)?;

        let name = format!("{}.{}", content_key(bytes), extension);
        let path = self.dir.join(&name);
        if !path.exists() {
            std::fs::write(&path, bytes)?;
            tracing::debug!(file = %name, size = bytes.len(), "Receipt image stored");
        }
        Ok(ReceiptImageRef(name))
    }

    /// Filesystem location of a stored image, if it exists.
    pub fn path_of(&self, image: &ReceiptImageRef) -> Option<PathBuf> {
        // References are bare file names; anything else is not ours.
        if image.as_str().contains(['/', '\\']) {
            return None;
        }
        let path = self.dir.join(image.as_str());
        path.exists().then_some(path)
    }
}

/// URL-safe SHA-256 of the content (usable as a file name).
fn content_key(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash)
}
