// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! SHA-256 integrity verification for transferred files.
//!
//! Files are streamed in 8 KiB blocks; nothing is loaded whole.

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::{XferError, XferResult};

/// Read block size for hashing.
const BLOCK_SIZE: usize = 8 * 1024;

/// SHA-256 digest of a file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Outcome of comparing a payload with what the endpoint received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum IntegrityOutcome {
    Match { received: PathBuf },
    Mismatch { received: PathBuf },
    NotFound,
}

impl IntegrityOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Match { .. } => "MATCH",
            Self::Mismatch { .. } => "MISMATCH",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for IntegrityOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Compute the SHA-256 digest of a file.
///
/// # Errors
/// `XferError::Io` if the file cannot be opened or read.
pub fn digest(path: impl AsRef<Path>) -> XferResult<Digest> {
    let mut file =
        File::open(path.as_ref()).map_err(|e| XferError::io("opening file for checksum", e))?;

    let mut hasher = Sha256::new();
    let mut block = [0u8; BLOCK_SIZE];
    loop {
        let n = match file.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(XferError::io("reading file for checksum", e)),
        };
        hasher.update(&block[..n]);
    }

    Ok(Digest(hasher.finalize().into()))
}

/// Whether two files have identical content.
pub fn equal(path_a: impl AsRef<Path>, path_b: impl AsRef<Path>) -> XferResult<bool> {
    Ok(digest(path_a)? == digest(path_b)?)
}

/// Compare `source` against the first existing path in `candidates`.
///
/// A missing received file is a reportable outcome, not an error.
pub fn verify_received(source: &Path, candidates: &[PathBuf]) -> XferResult<IntegrityOutcome> {
    let Some(received) = candidates.iter().find(|p| p.is_file()) else {
        return Ok(IntegrityOutcome::NotFound);
    };

    let outcome = if equal(source, received)? {
        IntegrityOutcome::Match {
            received: received.clone(),
        }
    } else {
        IntegrityOutcome::Mismatch {
            received: received.clone(),
        }
    };

    tracing::debug!(
        source = %source.display(),
        received = %received.display(),
        outcome = outcome.label(),
        "Integrity check"
    );

    Ok(outcome)
}
