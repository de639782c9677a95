//! Script directories
//!
//! A script directory holds one `.rb` file per script plus an `index.toml`
//! recording container order, ordinal fields and names, so a container can
//! be unpacked, edited and packed again.
//!
//! Only runnable scripts are written: entries with blank source are not
//! part of a [`Bundle`] and do not survive a round trip. Names are stored as
//! found in the container, so unnamed scripts stay unnamed.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bundle::marshal::RawEntry;
use crate::bundle::{deflate, Bundle};

use super::{HostError, HostResult};

/// Manifest file name inside a script directory.
pub const INDEX_FILE: &str = "index.toml";

/// Script directory manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptIndex {
    #[serde(default, rename = "script")]
    pub scripts: Vec<IndexEntry>,
}

/// One script of a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub index: i64,
    /// Name as stored in the container; blank for unnamed scripts.
    pub name: String,
    pub file: String,
}

/// File name for a script: position prefix plus a filesystem-safe name.
pub fn script_file_name(
    ordinal: usize,
    name: &str,
) -> String {
    let safe: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{:03}-{}.rb", ordinal, safe)
}

/// Write every unit of `bundle` into `dir`.
pub fn unpack(
    bundle: &Bundle,
    dir: &Path,
) -> HostResult<ScriptIndex> {
    fs::create_dir_all(dir)?;

    let mut index = ScriptIndex::default();
    for (ordinal, unit) in bundle.units().iter().enumerate() {
        let file = script_file_name(ordinal, &unit.name);
        fs::write(dir.join(&file), &unit.source)?;
        index.scripts.push(IndexEntry {
            index: unit.index,
            name: unit.raw_name.clone(),
            file,
        });
    }

    let manifest = toml::to_string_pretty(&index)
        .map_err(|e| HostError::Manifest(e.to_string()))?;
    fs::write(dir.join(INDEX_FILE), manifest)?;
    Ok(index)
}

/// Read a script directory back into container entries.
pub fn pack(dir: &Path) -> HostResult<Vec<RawEntry>> {
    let manifest = fs::read_to_string(dir.join(INDEX_FILE))?;
    let index: ScriptIndex =
        toml::from_str(&manifest).map_err(|e| HostError::Manifest(e.to_string()))?;

    index
        .scripts
        .iter()
        .map(|entry| -> HostResult<RawEntry> {
            let source = fs::read(dir.join(&entry.file))?;
            Ok(RawEntry::new(entry.index, entry.name.clone(), deflate(&source)?))
        })
        .collect()
}
