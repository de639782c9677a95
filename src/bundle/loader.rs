//! Load-and-run pipeline
//!
//! ```text
//! open -> deserialize -> inflate -> name -> drop blanks -> execute -> report
//! ```
//!
//! Deserialization failures abort the pass; everything after that is
//! recovered per entry and reported in aggregate.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::exec::{
    AggregateExecutionError, Diagnostics, Evaluator, ScriptFailure, DEFAULT_FRAME_MARKER,
};
use super::inflate::ZlibInflater;
use super::marshal::{MarshalError, MarshalReader, RawEntry};
use super::unit::{Bundle, DecodedEntry, LoadReport};
use super::{ContainerReader, Decompressor};

/// What to do when the container file cannot be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenFailurePolicy {
    /// Warn and run an empty bundle.
    #[default]
    Continue,
    /// Return [`LoadError::Open`].
    Fail,
}

/// Loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Open failure handling
    #[serde(default)]
    pub on_open_failure: OpenFailurePolicy,
    /// Backtrace text after which reports are cut; empty disables cutting
    #[serde(default = "default_marker")]
    pub frame_marker: String,
}

fn default_marker() -> String {
    DEFAULT_FRAME_MARKER.to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            on_open_failure: OpenFailurePolicy::Continue,
            frame_marker: default_marker(),
        }
    }
}

/// Loader errors
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO failed: {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed script container: {0}")]
    Deserialize(#[from] MarshalError),

    #[error("{0}")]
    Aggregate(#[from] AggregateExecutionError),
}

/// Loader result
pub type LoadResult<T> = Result<T, LoadError>;

/// Outcome of a clean pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Scripts executed, in order.
    pub executed: Vec<String>,
    /// Assembly statistics.
    pub report: LoadReport,
}

/// Loads a script container and runs its scripts in order.
#[derive(Debug, Clone, Default)]
pub struct ScriptLoader<R = MarshalReader, D = ZlibInflater> {
    config: LoaderConfig,
    reader: R,
    decompressor: D,
}

impl ScriptLoader {
    /// Create a loader with default configuration and collaborators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader with default collaborators.
    pub fn with_config(config: LoaderConfig) -> Self {
        Self {
            config,
            reader: MarshalReader,
            decompressor: ZlibInflater,
        }
    }
}

impl<R: ContainerReader, D: Decompressor> ScriptLoader<R, D> {
    /// Create a loader with custom collaborators.
    pub fn with_collaborators(
        config: LoaderConfig,
        reader: R,
        decompressor: D,
    ) -> Self {
        Self {
            config,
            reader,
            decompressor,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load the container at `path` and run every script.
    pub fn load_and_run<E: Evaluator + ?Sized>(
        &self,
        path: &Path,
        evaluator: &mut E,
    ) -> LoadResult<RunSummary> {
        let bundle = self.load(path)?;
        self.run(bundle, evaluator)
    }

    /// Open, deserialize and assemble the container at `path`.
    pub fn load(
        &self,
        path: &Path,
    ) -> LoadResult<Bundle> {
        debug!(path = %path.display(), "opening script container");
        let file = match File::open(path) {
            Ok(file) => file,
            Err(source) => match self.config.on_open_failure {
                OpenFailurePolicy::Continue => {
                    warn!("IO failed: {}: {}", path.display(), source);
                    return Ok(Bundle::empty());
                }
                OpenFailurePolicy::Fail => {
                    return Err(LoadError::Open {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            },
        };
        self.load_from(&mut BufReader::new(file))
    }

    /// Deserialize and assemble a container from `reader`.
    pub fn load_from(
        &self,
        reader: &mut dyn Read,
    ) -> LoadResult<Bundle> {
        let entries = self.reader.read_entries(reader)?;
        debug!(entries = entries.len(), "script container deserialized");
        Ok(self.decode(entries))
    }

    /// Inflate raw entries and assemble them into a bundle.
    ///
    /// A payload that fails to inflate counts as empty text.
    pub fn decode(
        &self,
        entries: Vec<RawEntry>,
    ) -> Bundle {
        let decoded = entries
            .into_iter()
            .map(|raw| match self.decompressor.decompress(&raw.payload) {
                Ok(bytes) => DecodedEntry {
                    text: String::from_utf8_lossy(&bytes).into_owned(),
                    raw,
                    decompress_failed: false,
                },
                Err(err) => {
                    debug!(index = raw.index, name = %raw.name, "{}", err);
                    DecodedEntry {
                        text: String::new(),
                        raw,
                        decompress_failed: true,
                    }
                }
            })
            .collect();
        Bundle::assemble(decoded)
    }

    /// Run every script of `bundle` in order.
    ///
    /// Failures never stop the pass; if any occurred they are returned
    /// together as [`LoadError::Aggregate`] once every script has run.
    pub fn run<E: Evaluator + ?Sized>(
        &self,
        bundle: Bundle,
        evaluator: &mut E,
    ) -> LoadResult<RunSummary> {
        let (units, report) = bundle.into_parts();
        let mut diagnostics = Diagnostics::new();
        let mut executed = Vec::with_capacity(units.len());

        for unit in units {
            debug!(script = %unit.name, position = unit.position, "executing script");
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                evaluator.evaluate(&unit.source, &unit.name)
            }))
            .unwrap_or_else(|payload| {
                Err(ScriptFailure::unknown(crate::util::panic_message(
                    payload.as_ref(),
                )))
            });

            if let Err(failure) = outcome {
                warn!(script = %unit.name, "{}", failure);
                diagnostics.record(&unit.name, failure);
            }
            executed.push(unit.name);
        }

        match diagnostics.into_error(&self.config.frame_marker) {
            Some(err) => {
                info!(failed = err.sections().len(), "script pass finished with errors");
                Err(LoadError::Aggregate(err))
            }
            None => {
                info!(scripts = executed.len(), "script pass finished");
                Ok(RunSummary { executed, report })
            }
        }
    }
}
