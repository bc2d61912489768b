//! Single-file tar packing for sandbox injection.
//!
//! The container runtime only accepts files as a tar stream, so every program
//! is wrapped in a one-entry archive that is fully built in memory before it
//! is handed over.

use thiserror::Error;

/// Owner read/write only
pub const PROGRAM_FILE_MODE: u32 = 0o600;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to write tar header for '{name}': {source}")]
    Header {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write tar payload for '{name}': {source}")]
    Payload {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to finish tar archive: {0}")]
    Finish(#[source] std::io::Error),
}

/// Pack `payload` as a single archive entry named `file_name`.
///
/// The header size always equals `payload.len()`.
pub fn pack(file_name: &str, payload: &[u8]) -> Result<Vec<u8>, ArchiveError> {
    let mut header = tar::Header::new_gnu();
    header
        .set_path(file_name)
        .map_err(|source| ArchiveError::Header {
            name: file_name.to_string(),
            source,
        })?;
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(payload.len() as u64);
    header.set_mode(PROGRAM_FILE_MODE);
    header.set_cksum();

    let mut builder = tar::Builder::new(Vec::new());
    builder
        .append(&header, payload)
        .map_err(|source| ArchiveError::Payload {
            name: file_name.to_string(),
            source,
        })?;

    builder.into_inner().map_err(ArchiveError::Finish)
}
