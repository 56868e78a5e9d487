use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Persists rendered images and counts what it wrote.
#[derive(Debug, Default)]
pub struct OutputWriter {
    created: usize,
}

impl OutputWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `bytes` to `path`, creating parent directories and replacing any
    /// existing file.
    pub fn write(&mut self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| Error::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, bytes).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })?;
        self.created += 1;
        Ok(())
    }

    pub fn created(&self) -> usize {
        self.created
    }
}
