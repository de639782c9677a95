//! RGSS script host bootstrap
//!
//! Two building blocks of an RGSS-style game engine's startup layer:
//!
//! - [`runtime::coroutine`]: resumable computations backed by worker threads,
//!   for use where the host language has no native coroutines.
//! - [`bundle`]: loads a script container (`Data/Scripts.rvdata2` and
//!   friends), inflates every script and runs them in order through an
//!   engine-provided [`bundle::Evaluator`], reporting every failure at once.
//!
//! # Example
//!
//! ```no_run
//! use rgss_host::bundle::{ScriptFailure, ScriptLoader};
//! use rgss_host::Result;
//!
//! fn main() -> Result<()> {
//!     let loader = ScriptLoader::new();
//!     let mut eval = |source: &str, label: &str| -> Result<(), ScriptFailure> {
//!         println!("{}: {} bytes", label, source.len());
//!         Ok(())
//!     };
//!     loader.load_and_run("Data/Scripts.rvdata2".as_ref(), &mut eval)?;
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms)]

// Public modules
pub mod bundle;
pub mod host;
pub mod runtime;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

pub use bundle::{Evaluator, ScriptLoader};
pub use host::{Host, HostError, RgssVersion};
pub use runtime::coroutine::{Coroutine, CoroutineBuilder, Handoff, Yielder};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "rgss-host";
