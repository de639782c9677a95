//! Script units and bundles

use tracing::{debug, info};

use super::marshal::RawEntry;

/// Prefix of names given to unnamed scripts.
pub const UNKNOWN_PREFIX: &str = "Unknown";

/// One executable script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptUnit {
    /// Position in the container, counting dropped entries.
    pub position: usize,
    /// Ordinal field as stored in the container.
    pub index: i64,
    /// Display name, never empty.
    pub name: String,
    /// Name as stored in the container; may be blank.
    pub raw_name: String,
    /// Compressed payload as stored.
    pub payload: Vec<u8>,
    /// Decompressed source text.
    pub source: String,
}

/// Statistics gathered while assembling a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Entries read from the container.
    pub raw_entries: usize,
    /// Entries dropped for having no source text.
    pub dropped: usize,
    /// Entries whose payload failed to inflate (also counted in `dropped`).
    pub decompress_failures: usize,
    /// Names synthesized for unnamed entries.
    pub synthesized_names: usize,
}

/// A container entry together with its inflated text.
#[derive(Debug, Clone)]
pub struct DecodedEntry {
    pub raw: RawEntry,
    pub text: String,
    pub decompress_failed: bool,
}

/// The ordered scripts of one load-and-run pass.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    units: Vec<ScriptUnit>,
    report: LoadReport,
}

impl Bundle {
    /// An empty bundle.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a bundle from decoded entries in container order.
    ///
    /// Entries without source text are dropped first; only the survivors
    /// with a blank name consume an `Unknown N` name.
    pub fn assemble(entries: Vec<DecodedEntry>) -> Self {
        let mut report = LoadReport {
            raw_entries: entries.len(),
            ..LoadReport::default()
        };
        let mut units = Vec::with_capacity(entries.len());

        for (position, entry) in entries.into_iter().enumerate() {
            if entry.decompress_failed {
                report.decompress_failures += 1;
            }
            if is_blank(&entry.text) {
                report.dropped += 1;
                debug!(position, index = entry.raw.index, "dropping empty script");
                continue;
            }

            let name = if is_blank(&entry.raw.name) {
                let name = format!("{} {}", UNKNOWN_PREFIX, report.synthesized_names);
                report.synthesized_names += 1;
                name
            } else {
                entry.raw.name.clone()
            };

            info!("Loaded script: {}", name);
            units.push(ScriptUnit {
                position,
                index: entry.raw.index,
                name,
                raw_name: entry.raw.name,
                payload: entry.raw.payload,
                source: entry.text,
            });
        }

        Self { units, report }
    }

    /// Scripts in execution order.
    pub fn units(&self) -> &[ScriptUnit] {
        &self.units
    }

    /// Statistics from assembly.
    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    /// Display names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Split into units and report.
    pub fn into_parts(self) -> (Vec<ScriptUnit>, LoadReport) {
        (self.units, self.report)
    }
}

/// Whitespace-only test, using the same set Ruby's `strip` removes:
/// ASCII whitespace and NUL. Other Unicode spaces are content.
pub fn is_blank(text: &str) -> bool {
    text.chars()
        .all(|c| matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r' | '\0'))
}
