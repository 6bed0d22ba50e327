// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Ephemeral random-content payload files for size sweeps.

use std::io::Write;
use std::path::Path;

use rand::RngCore;
use tempfile::NamedTempFile;

use crate::error::{XferError, XferResult};
use crate::types::BYTES_PER_MB;

/// Write granularity when filling a payload.
const CHUNK_SIZE: usize = 1024 * 1024;

/// A temporary file of `size_mb` random bytes.
///
/// The file is deleted when the value is dropped, whether or not the
/// transfer that used it succeeded.
#[derive(Debug)]
pub struct SyntheticPayload {
    file: NamedTempFile,
    size_mb: u64,
}

impl SyntheticPayload {
    /// Create and fill a payload inside `dir`.
    ///
    /// # Errors
    /// `XferError::Io` if the file cannot be created or written.
    pub fn create(dir: &Path, size_mb: u64) -> XferResult<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("xferbench-payload-")
            .suffix(".bin")
            .tempfile_in(dir)
            .map_err(|e| XferError::io("creating sweep payload", e))?;

        let mut rng = rand::thread_rng();
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut remaining = size_mb * BYTES_PER_MB;

        while remaining > 0 {
            let len = remaining.min(CHUNK_SIZE as u64) as usize;
            rng.fill_bytes(&mut chunk[..len]);
            file.write_all(&chunk[..len])
                .map_err(|e| XferError::io("writing sweep payload", e))?;
            remaining -= len as u64;
        }
        file.flush()
            .map_err(|e| XferError::io("flushing sweep payload", e))?;

        tracing::debug!(
            path = %file.path().display(),
            size_mb,
            "Created sweep payload"
        );

        Ok(Self { file, size_mb })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn size_mb(&self) -> u64 {
        self.size_mb
    }

    /// Delete the file now, reporting failure instead of ignoring it.
    pub fn remove(self) -> XferResult<()> {
        self.file
            .close()
            .map_err(|e| XferError::io("removing sweep payload", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_payload_has_exact_size() {
        let dir = TempDir::new().unwrap();
        let payload = SyntheticPayload::create(dir.path(), 2).unwrap();

        let len = std::fs::metadata(payload.path()).unwrap().len();
        assert_eq!(len, 2 * BYTES_PER_MB);
        assert_eq!(payload.size_mb(), 2);
        assert!(payload.path().starts_with(dir.path()));
    }

    #[test]
    fn test_payload_deleted_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = {
            let payload = SyntheticPayload::create(dir.path(), 1).unwrap();
            payload.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_payload_remove() {
        let dir = TempDir::new().unwrap();
        let payload = SyntheticPayload::create(dir.path(), 1).unwrap();
        let path = payload.path().to_path_buf();
        payload.remove().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_payloads_differ() {
        let dir = TempDir::new().unwrap();
        let a = SyntheticPayload::create(dir.path(), 1).unwrap();
        let b = SyntheticPayload::create(dir.path(), 1).unwrap();
        assert!(!crate::checksum::equal(a.path(), b.path()).unwrap());
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let err = SyntheticPayload::create(Path::new("/no/such/dir"), 1).unwrap_err();
        assert!(matches!(err, XferError::Io { .. }));
    }
}
