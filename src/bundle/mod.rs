//! Script bundle loading
//!
//! Reads a script container, inflates every entry and runs the resulting
//! scripts in container order. The three collaborators are traits so the
//! engine can swap them:
//!
//! - [`ContainerReader`]: bytes to raw `[index, name, payload]` entries
//! - [`Decompressor`]: payload bytes to source bytes
//! - [`Evaluator`]: runs source text in the shared namespace
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use rgss_host::bundle::{ScriptFailure, ScriptLoader};
//!
//! let loader = ScriptLoader::new();
//! let mut eval = |_source: &str, _label: &str| -> Result<(), ScriptFailure> { Ok(()) };
//! loader.load_and_run(Path::new("Data/Scripts.rvdata2"), &mut eval).unwrap();
//! ```

pub mod exec;
pub mod inflate;
pub mod loader;
pub mod marshal;
pub mod unit;

pub use exec::{
    AggregateExecutionError, Diagnostics, Evaluator, FailureKind, FailureSection, ScriptFailure,
};
pub use inflate::{deflate, DecompressError, ZlibInflater};
pub use loader::{LoadError, LoadResult, LoaderConfig, OpenFailurePolicy, RunSummary, ScriptLoader};
pub use marshal::{MarshalError, MarshalReader, MarshalValue, RawEntry};
pub use unit::{Bundle, LoadReport, ScriptUnit};

use std::io::Read;

/// Deserializes a script container.
pub trait ContainerReader {
    /// Read every entry, in container order.
    fn read_entries(
        &self,
        reader: &mut dyn Read,
    ) -> Result<Vec<RawEntry>, MarshalError>;
}

/// Inflates one payload.
pub trait Decompressor {
    fn decompress(
        &self,
        data: &[u8],
    ) -> Result<Vec<u8>, DecompressError>;
}

#[cfg(test)]
mod tests;
