//! Host 单元测试

use std::cell::Cell;
use std::path::{Path, PathBuf};

use crate::bundle::{deflate, RawEntry, ScriptFailure, ScriptLoader};
use crate::host::archive::{pack, script_file_name, unpack, INDEX_FILE};
use crate::host::{load_data, run_main, save_data, Host, HostError, RgssVersion};
use crate::util::config::HostConfig;

fn entry(
    index: i64,
    name: &str,
    source: &str,
) -> RawEntry {
    RawEntry::new(index, name, deflate(source.as_bytes()).unwrap())
}

#[test]
fn test_container_paths_per_version() {
    let root = Path::new("/game");
    assert_eq!(
        RgssVersion::Xp.container_path(root),
        PathBuf::from("/game/Data/Scripts.rxdata")
    );
    assert_eq!(
        RgssVersion::Vx.container_path(root),
        PathBuf::from("/game/Data/Scripts.rvdata")
    );
    assert_eq!(
        RgssVersion::VxAce.container_path(root),
        PathBuf::from("/game/Data/Scripts.rvdata2")
    );
}

#[test]
fn test_version_conversions() {
    assert_eq!(RgssVersion::try_from(2u8).unwrap(), RgssVersion::Vx);
    assert!(RgssVersion::try_from(0u8).is_err());
    assert_eq!(u8::from(RgssVersion::VxAce), 3);
    assert_eq!(RgssVersion::Xp.to_string(), "RGSS1");
}

#[test]
fn test_save_then_load_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Data").join("Scripts.rxdata");
    let entries = vec![entry(11, "Main", "puts 1"), entry(12, "", "")];

    save_data(&path, &entries).unwrap();
    assert_eq!(load_data(&path).unwrap(), entries);
}

#[test]
fn test_load_data_missing_file() {
    let result = load_data(Path::new("/no/such/Scripts.rxdata"));
    assert!(matches!(result, Err(HostError::Io(_))));
}

#[test]
fn test_run_main_retries_on_restart() {
    let attempts = Cell::new(0);
    let result = run_main(|| {
        attempts.set(attempts.get() + 1);
        if attempts.get() < 3 {
            Err(HostError::Restart)
        } else {
            Ok(attempts.get())
        }
    });

    assert_eq!(result.unwrap(), 3);
}

#[test]
fn test_run_main_returns_other_errors() {
    let result: Result<(), _> = run_main(|| Err(HostError::Manifest("broken".into())));
    assert!(matches!(result, Err(HostError::Manifest(_))));
}

#[test]
fn test_host_start_runs_configured_container() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = HostConfig::default();
    config.host.rgss_version = RgssVersion::Vx;
    config.host.game_dir = dir.path().to_path_buf();

    let host = Host::new(config);
    save_data(
        &host.container_path(),
        &[entry(1, "A", "a = 1"), entry(2, "B", "b = 2")],
    )
    .unwrap();

    let mut seen = Vec::new();
    let mut eval = |_source: &str, label: &str| -> Result<(), ScriptFailure> {
        seen.push(label.to_string());
        Ok(())
    };
    let summary = host.start(&mut eval).unwrap();

    assert_eq!(summary.executed, vec!["A", "B"]);
    assert_eq!(seen, vec!["A", "B"]);
}

#[test]
fn test_script_file_name_is_safe() {
    assert_eq!(script_file_name(0, "Main"), "000-Main.rb");
    assert_eq!(script_file_name(12, "Scene/Map ▼"), "012-Scene_Map__.rb");
}

#[test]
fn test_unpack_then_pack_preserves_order_and_names() {
    let dir = tempfile::tempdir().unwrap();
    let loader = ScriptLoader::new();
    let bundle = loader.decode(vec![
        entry(5, "Main", "puts 1"),
        entry(6, "", "   "),
        entry(7, "", "x = 2"),
    ]);

    let index = unpack(&bundle, dir.path()).unwrap();
    assert_eq!(index.scripts.len(), 2);
    assert!(dir.path().join(INDEX_FILE).exists());
    assert!(dir.path().join("001-Unknown_0.rb").exists());
    assert_eq!(index.scripts[1].name, "");

    let packed = pack(dir.path()).unwrap();
    assert_eq!(packed[1].name, "");
    let repacked = loader.decode(packed);
    assert_eq!(repacked.names(), vec!["Main", "Unknown 0"]);
    assert_eq!(repacked.units()[0].index, 5);
    assert_eq!(repacked.units()[1].index, 7);
    assert_eq!(repacked.units()[1].source, "x = 2");
}

#[test]
fn test_pack_without_index_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(pack(dir.path()), Err(HostError::Io(_))));
}
