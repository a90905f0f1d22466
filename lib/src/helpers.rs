use std::fs;
use std::path::Path;

use crate::error::SourceError;

pub fn read_data(path: &Path) -> Result<Vec<u8>, SourceError> {
    let path = fs::canonicalize(path)?;

    if path.is_dir() {
        return Err(SourceError::NotAFile(path.display().to_string()));
    }

    Ok(fs::read(path)?)
}

pub fn write_data(path: &Path, data: String) -> Result<(), SourceError> {
    fs::write(path, format!("{data}\n"))?;

    Ok(())
}
