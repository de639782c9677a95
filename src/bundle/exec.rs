//! Script execution and failure aggregation
//!
//! Every unit runs even when an earlier one failed. Failures are collected
//! into [`Diagnostics`] and surface once, as an [`AggregateExecutionError`],
//! after the whole pass.

use std::fmt;

use thiserror::Error;

/// Host frame that ends every script backtrace; cut from reports.
pub const DEFAULT_FRAME_MARKER: &str = ":in `rgss_exec'";

/// Runs script source in the engine's shared top-level namespace.
///
/// Implementations are driven strictly sequentially by the loader and own
/// the namespace for the whole pass.
pub trait Evaluator {
    /// Evaluate `source`, reporting `label` as the current script name.
    fn evaluate(
        &mut self,
        source: &str,
        label: &str,
    ) -> Result<(), ScriptFailure>;
}

impl<F> Evaluator for F
where
    F: FnMut(&str, &str) -> Result<(), ScriptFailure>,
{
    fn evaluate(
        &mut self,
        source: &str,
        label: &str,
    ) -> Result<(), ScriptFailure> {
        self(source, label)
    }
}

/// Failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Syntax or name-resolution failure.
    Compile,
    /// Any other failure raised by the script.
    Runtime,
    /// Failure of unknown shape (including evaluator panics).
    Unknown,
}

impl FailureKind {
    /// Report heading.
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Compile => "Script compiler error",
            FailureKind::Runtime => "Script runtime error",
            FailureKind::Unknown => "Unknown error happened",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A failure raised while evaluating one script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ScriptFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Innermost frame first.
    pub backtrace: Vec<String>,
}

impl ScriptFailure {
    pub fn new(
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            backtrace: Vec::new(),
        }
    }

    pub fn compile(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Compile, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Runtime, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unknown, message)
    }

    /// Attach a captured backtrace.
    pub fn with_backtrace<I, S>(
        mut self,
        frames: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.backtrace = frames.into_iter().map(Into::into).collect();
        self
    }
}

/// One failing script in a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureSection {
    /// Display name of the failing script.
    pub script: String,
    pub failure: ScriptFailure,
}

impl FailureSection {
    /// Render the section, cutting everything from `marker` on.
    ///
    /// An empty marker disables cutting.
    pub fn render(
        &self,
        marker: &str,
    ) -> String {
        let mut out = match self.failure.kind {
            FailureKind::Unknown => format!("{} in '{}'\n", self.failure.kind, self.script),
            kind => {
                let mut text = format!("{} in '{}':\n {}\n", kind, self.script, self.failure.message);
                for frame in &self.failure.backtrace {
                    text.push_str(frame);
                    text.push('\n');
                }
                text
            }
        };

        if !marker.is_empty() {
            if let Some(cut) = out.find(marker) {
                out.truncate(cut);
                out.push('\n');
            }
        }
        out
    }
}

/// Accumulates failures during one pass.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    sections: Vec<FailureSection>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a failure; order of calls is report order.
    pub fn record(
        &mut self,
        script: &str,
        failure: ScriptFailure,
    ) {
        self.sections.push(FailureSection {
            script: script.to_string(),
            failure,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn sections(&self) -> &[FailureSection] {
        &self.sections
    }

    /// Turn the buffer into the aggregate error, if anything failed.
    pub fn into_error(
        self,
        marker: &str,
    ) -> Option<AggregateExecutionError> {
        if self.sections.is_empty() {
            return None;
        }
        let report = self
            .sections
            .iter()
            .map(|section| section.render(marker))
            .collect::<String>();
        Some(AggregateExecutionError {
            sections: self.sections,
            report: report.trim_end().to_string(),
        })
    }
}

/// Every script failure of one pass, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{report}")]
pub struct AggregateExecutionError {
    sections: Vec<FailureSection>,
    report: String,
}

impl AggregateExecutionError {
    pub fn sections(&self) -> &[FailureSection] {
        &self.sections
    }

    /// The rendered, trimmed report.
    pub fn report(&self) -> &str {
        &self.report
    }

    /// Names of the failing scripts, in execution order.
    pub fn failed_scripts(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.script.as_str()).collect()
    }
}
