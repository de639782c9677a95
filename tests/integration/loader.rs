//! 脚本加载集成测试

use std::collections::HashMap;

use rgss_host::bundle::{
    deflate, FailureKind, LoadError, RawEntry, ScriptFailure, ScriptLoader,
};
use rgss_host::host::{load_data, save_data};

/// Assignment-only toy language: `name = value` or `print name`.
#[derive(Default)]
struct Vars {
    vars: HashMap<String, String>,
    printed: Vec<String>,
}

impl rgss_host::Evaluator for Vars {
    fn evaluate(
        &mut self,
        source: &str,
        label: &str,
    ) -> Result<(), ScriptFailure> {
        for (n, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(var) = line.strip_prefix("print ") {
                match self.vars.get(var) {
                    Some(value) => self.printed.push(value.clone()),
                    None => {
                        return Err(ScriptFailure::compile(format!(
                            "undefined local variable or method `{}'",
                            var
                        ))
                        .with_backtrace([
                            format!("{}:{}:in `<main>'", label, n + 1),
                            "Main:1:in `rgss_exec'".to_string(),
                        ]))
                    }
                }
            } else if let Some((k, v)) = line.split_once('=') {
                self.vars.insert(k.trim().to_string(), v.trim().to_string());
            } else {
                return Err(ScriptFailure::runtime(format!("cannot run `{}'", line)));
            }
        }
        Ok(())
    }
}

fn entry(
    index: i64,
    name: &str,
    source: &str,
) -> RawEntry {
    RawEntry::new(index, name, deflate(source.as_bytes()).unwrap())
}

#[test]
fn test_full_pipeline_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Data").join("Scripts.rvdata2");
    save_data(
        &path,
        &[
            entry(1001, "Vocab", "greeting = hello"),
            entry(1002, "", "\n\n"),
            entry(1003, "", "print greeting"),
            entry(1004, "Main", "print missing"),
            entry(1005, "After", "late = yes\nprint late"),
        ],
    )
    .unwrap();

    let mut vars = Vars::default();
    let err = ScriptLoader::new()
        .load_and_run(&path, &mut vars)
        .unwrap_err();

    assert_eq!(vars.printed, vec!["hello", "yes"]);
    match err {
        LoadError::Aggregate(agg) => {
            assert_eq!(agg.failed_scripts(), vec!["Main"]);
            assert_eq!(agg.sections()[0].failure.kind, FailureKind::Compile);
            assert_eq!(
                agg.report(),
                "Script compiler error in 'Main':\n undefined local variable or method `missing'\nMain:1:in `<main>'\nMain:1"
            );
        }
        other => panic!("expected aggregate error, got {}", other),
    }
}

#[test]
fn test_saved_container_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Scripts.rxdata");
    let entries = vec![entry(7, "Ä Script", "x = 1"), entry(-3, "", "")];

    save_data(&path, &entries).unwrap();
    assert_eq!(load_data(&path).unwrap(), entries);
}

#[test]
fn test_loaded_bundle_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Scripts.rvdata");
    save_data(
        &path,
        &[
            entry(0, "", "a = 1"),
            entry(1, "", " "),
            entry(2, "Named", "b = 2"),
            entry(3, "", "c = 3"),
        ],
    )
    .unwrap();

    let bundle = ScriptLoader::new().load(&path).unwrap();
    assert_eq!(bundle.names(), vec!["Unknown 0", "Named", "Unknown 1"]);
    assert_eq!(bundle.report().dropped, 1);
}
