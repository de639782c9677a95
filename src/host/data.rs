//! Container files on disk

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::bundle::marshal::{self, RawEntry};
use crate::bundle::ContainerReader;

use super::HostResult;

/// Read every raw entry of the container at `path`.
pub fn load_data(path: &Path) -> HostResult<Vec<RawEntry>> {
    let mut reader = BufReader::new(File::open(path)?);
    Ok(marshal::MarshalReader.read_entries(&mut reader)?)
}

/// Write `entries` as a container at `path`, replacing any existing file.
pub fn save_data(
    path: &Path,
    entries: &[RawEntry],
) -> HostResult<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    marshal::write_entries(&mut writer, entries)?;
    writer.flush()?;
    Ok(())
}
