//! Bundle 单元测试
//!
//! 测试容器解码、解压、命名规则以及错误聚合


use std::collections::HashSet;

use crate::bundle::{deflate, RawEntry, ScriptFailure};

/// Compressed entry helper.
pub(super) fn entry(
    index: i64,
    name: &str,
    source: &str,
) -> RawEntry {
    RawEntry::new(index, name, deflate(source.as_bytes()).unwrap())
}

/// A toy evaluator with a shared namespace.
///
/// One statement per line:
/// - `def NAME` defines NAME
/// - `call NAME` fails with a name error unless NAME is defined
/// - `raise 'MSG'` fails at runtime
/// - `panic` panics
/// - `syntax(` fails to compile
/// - anything else is printed
#[derive(Debug, Default)]
pub(super) struct MiniEval {
    pub defined: HashSet<String>,
    pub output: Vec<String>,
    pub labels: Vec<String>,
}

impl MiniEval {
    fn frames(
        label: &str,
        line: usize,
    ) -> Vec<String> {
        vec![
            format!("{}:{}:in `<main>'", label, line),
            "System.rb:151:in `rgss_exec'".to_string(),
            "System.rb:118:in `rgss_start'".to_string(),
        ]
    }
}

impl crate::bundle::Evaluator for MiniEval {
    fn evaluate(
        &mut self,
        source: &str,
        label: &str,
    ) -> Result<(), ScriptFailure> {
        self.labels.push(label.to_string());
        for (i, line) in source.lines().enumerate() {
            let line = line.trim();
            let lineno = i + 1;
            if let Some(name) = line.strip_prefix("def ") {
                self.defined.insert(name.to_string());
            } else if let Some(name) = line.strip_prefix("call ") {
                if !self.defined.contains(name) {
                    return Err(ScriptFailure::compile(format!(
                        "undefined local variable or method `{}'",
                        name
                    ))
                    .with_backtrace(Self::frames(label, lineno)));
                }
            } else if let Some(msg) = line.strip_prefix("raise ") {
                return Err(ScriptFailure::runtime(msg.trim_matches('\''))
                    .with_backtrace(Self::frames(label, lineno)));
            } else if line == "panic" {
                panic!("evaluator exploded");
            } else if line.ends_with('(') {
                return Err(ScriptFailure::compile("syntax error, unexpected end-of-input")
                    .with_backtrace(Self::frames(label, lineno)));
            } else if !line.is_empty() {
                self.output.push(line.to_string());
            }
        }
        Ok(())
    }
}
