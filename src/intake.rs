//! File intake and the per-session scratch directory

use crate::PdfError;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name used when sanitizing leaves nothing usable
const FALLBACK_FILE_NAME: &str = "document.pdf";

/// Where the PDF comes from
#[derive(Debug, Clone)]
pub enum SourceInput {
    /// A file already on disk
    Path(PathBuf),
    /// An uploaded byte buffer and the name it was uploaded under
    Upload { name: String, bytes: Vec<u8> },
}

impl SourceInput {
    fn original_name(&self) -> String {
        match self {
            SourceInput::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            SourceInput::Upload { name, .. } => name.clone(),
        }
    }
}

/// Keep alphanumerics, spaces, hyphens, underscores and dots, then turn
/// spaces into underscores.
pub fn sanitize_filename(name: &str) -> String {
    let safe: String = name
        .chars()
        .filter(|&c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect();

    if safe.is_empty() || safe.chars().all(|c| c == '.') {
        FALLBACK_FILE_NAME.to_string()
    } else {
        safe
    }
}

/// A temporary directory owned by one session. Inputs are staged here and
/// it is wiped after every action.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn new() -> Result<Self, PdfError> {
        let dir = tempfile::Builder::new()
            .prefix("pdf-analyzer-")
            .tempdir()?;
        debug!("scratch directory at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write the input into the scratch directory under its sanitized name
    pub fn stage(&self, input: &SourceInput) -> Result<PathBuf, PdfError> {
        let target = self.path().join(sanitize_filename(&input.original_name()));
        match input {
            SourceInput::Path(source) => {
                if !source.is_file() {
                    return Err(PdfError::NotFound(source.clone()));
                }
                fs::copy(source, &target)?;
            }
            SourceInput::Upload { bytes, .. } => fs::write(&target, bytes)?,
        }
        debug!("staged input as {}", target.display());
        Ok(target)
    }

    /// Remove everything in the scratch directory. Failures are logged,
    /// never returned.
    pub fn reset(&mut self) {
        let entries = match fs::read_dir(self.path()) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("failed to read scratch directory: {}", e);
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(e) = removed {
                warn!("failed to remove {}: {}", path.display(), e);
            }
        }
    }
}
