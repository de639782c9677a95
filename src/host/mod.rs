//! Host bootstrap surface
//!
//! What the engine's startup layer needs around the script loader: locating
//! the container for an engine generation, reading and writing containers,
//! script directories, and the outer restart loop.

pub mod archive;
pub mod data;
pub mod version;

pub use data::{load_data, save_data};
pub use version::RgssVersion;

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::bundle::{Evaluator, LoadError, MarshalError, RunSummary, ScriptLoader};
use crate::util::config::HostConfig;

/// Host errors
#[derive(Debug, Error)]
pub enum HostError {
    /// Raised by scripts to start over from a fresh load.
    #[error("restart requested")]
    Restart,

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("bad script index: {0}")]
    Manifest(String),
}

/// Host result
pub type HostResult<T> = Result<T, HostError>;

/// Run `body` until it finishes with anything but a restart request.
pub fn run_main<T, F>(mut body: F) -> HostResult<T>
where
    F: FnMut() -> HostResult<T>,
{
    let mut restarts = 0usize;
    loop {
        match body() {
            Err(HostError::Restart) => {
                restarts += 1;
                info!(restarts, "restart requested, starting over");
            }
            other => return other,
        }
    }
}

/// Script host for one game.
#[derive(Debug, Clone)]
pub struct Host {
    config: HostConfig,
    loader: ScriptLoader,
}

impl Host {
    pub fn new(config: HostConfig) -> Self {
        let loader = ScriptLoader::with_config(config.loader.clone());
        Self { config, loader }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn loader(&self) -> &ScriptLoader {
        &self.loader
    }

    /// Container path for the configured engine generation.
    pub fn container_path(&self) -> PathBuf {
        self.config
            .host
            .rgss_version
            .container_path(&self.config.host.game_dir)
    }

    /// Load and run the game's scripts once.
    pub fn start<E: Evaluator + ?Sized>(
        &self,
        evaluator: &mut E,
    ) -> HostResult<RunSummary> {
        let path = self.container_path();
        info!(version = %self.config.host.rgss_version, path = %path.display(), "starting scripts");
        Ok(self.loader.load_and_run(&path, evaluator)?)
    }
}

#[cfg(test)]
mod tests;
