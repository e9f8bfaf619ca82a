//! Access to the files a compilation reads and writes.  Every failure is
//! reported as a [`CompileError::Io`] naming the file.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use super::CompileError;

/// A source file read fully into memory.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceFile {
    path: PathBuf,
    text: String,
}

impl SourceFile {
    pub fn read(path: &Path) -> Result<SourceFile, CompileError> {
        let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        info!("Read {} ({} bytes)", path.display(), text.len());
        Ok(SourceFile {
            path: path.to_path_buf(),
            text,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Writes `contents` to `path`, replacing anything already there.
pub fn write_output(path: &Path, contents: &str) -> Result<(), CompileError> {
    fs::write(path, contents).map_err(|e| io_error(path, e))?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn io_error(path: &Path, e: std::io::Error) -> CompileError {
    CompileError::Io(path.display().to_string(), e.to_string())
}
