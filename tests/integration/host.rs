use std::cell::Cell;

use rgss_host::bundle::{deflate, LoadError, RawEntry, ScriptFailure};
use rgss_host::host::{run_main, save_data, Host, HostError, RgssVersion};
use rgss_host::util::config::{parse_config, HostConfig};

#[test]
fn test_host_start_with_config() {
    let dir = tempfile::tempdir().unwrap();
    let toml = format!(
        "[host]\nrgss_version = 2\ngame_dir = {:?}\n",
        dir.path().display().to_string()
    );
    let config = parse_config(&toml).unwrap();
    assert_eq!(config.host.rgss_version, RgssVersion::Vx);

    let host = Host::new(config);
    assert!(host.container_path().ends_with("Data/Scripts.rvdata"));
    save_data(
        &host.container_path(),
        &[RawEntry::new(0, "Main", deflate(b"run").unwrap())],
    )
    .unwrap();

    let mut ran = Vec::new();
    let mut eval = |_source: &str, label: &str| -> Result<(), ScriptFailure> {
        ran.push(label.to_string());
        Ok(())
    };
    let summary = host.start(&mut eval).unwrap();
    assert_eq!(summary.executed, vec!["Main"]);
    assert_eq!(ran, vec!["Main"]);
}

#[test]
fn test_restart_reloads_scripts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = HostConfig::default();
    config.host.game_dir = dir.path().to_path_buf();
    let host = Host::new(config);
    save_data(
        &host.container_path(),
        &[RawEntry::new(0, "Main", deflate(b"main").unwrap())],
    )
    .unwrap();

    let passes = Cell::new(0);
    let result = run_main(|| {
        passes.set(passes.get() + 1);
        let mut eval = |_: &str, _: &str| -> Result<(), ScriptFailure> { Ok(()) };
        host.start(&mut eval)?;
        if passes.get() < 3 {
            return Err(HostError::Restart);
        }
        Ok(passes.get())
    });

    assert_eq!(result.unwrap(), 3);
}

#[test]
fn test_host_missing_container_runs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = HostConfig::default();
    config.host.game_dir = dir.path().to_path_buf();

    let mut eval = |_: &str, _: &str| -> Result<(), ScriptFailure> {
        panic!("nothing should run");
    };
    let summary = Host::new(config).start(&mut eval).unwrap();
    assert!(summary.executed.is_empty());
}

#[test]
fn test_host_failure_surfaces_as_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = HostConfig::default();
    config.host.game_dir = dir.path().to_path_buf();
    let host = Host::new(config);
    save_data(
        &host.container_path(),
        &[RawEntry::new(0, "Main", deflate(b"boom").unwrap())],
    )
    .unwrap();

    let mut eval = |_: &str, _: &str| -> Result<(), ScriptFailure> {
        Err(ScriptFailure::runtime("boom"))
    };
    let err = host.start(&mut eval).unwrap_err();
    assert!(matches!(err, HostError::Load(LoadError::Aggregate(_))));
}
