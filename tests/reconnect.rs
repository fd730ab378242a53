use std::path::{Path, PathBuf};

use danspad_lib::config::{self, PadSettings, ThresholdProfile};
use danspad_lib::serial::mock::ScriptedLink;
use danspad_lib::{ConnectionState, ReconnectController, TickOutcome};

fn temp_profile(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("danspad-reconnect-{}-{}.bin", name, std::process::id()))
}

fn write_profile(path: &Path, thresholds: Vec<u32>) {
    std::fs::write(path, ThresholdProfile { thresholds }.to_bytes()).unwrap();
}

fn settings_with_profile(path: &Path) -> PadSettings {
    PadSettings {
        profile_path: Some(path.to_path_buf()),
        ..PadSettings::default()
    }
}

#[test]
fn test_profile_is_applied_on_connect() {
    let path = temp_profile("connect");
    write_profile(&path, vec![100, 5000, 7]);

    let link = ScriptedLink::with_lines(&["v 1 2 3", "t 10 20 30"]);
    let controller = ReconnectController::connect(link, &settings_with_profile(&path)).unwrap();

    assert_eq!(
        controller.session().link().written_lines(),
        vec!["v", "t", "0 100", "1 1023", "2 7"]
    );
    assert_eq!(controller.store().thresholds(), &[100, 1023, 7]);

    controller.shutdown().unwrap();
    assert_eq!(config::load_profile_file(&path, 3).unwrap(), vec![100, 1023, 7]);
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_mismatched_profile_leaves_thresholds_alone() {
    let path = temp_profile("mismatch");
    write_profile(&path, vec![1, 2, 3, 4]);

    let link = ScriptedLink::with_lines(&["v 1 2 3", "t 10 20 30"]);
    let controller = ReconnectController::connect(link, &settings_with_profile(&path)).unwrap();

    assert_eq!(controller.session().link().written_lines(), vec!["v", "t"]);
    assert_eq!(controller.store().thresholds(), &[10, 20, 30]);

    controller.shutdown().unwrap();
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_profile_is_reapplied_after_reconnect() {
    let path = temp_profile("reapply");
    write_profile(&path, vec![300, 400]);

    let mut link = ScriptedLink::with_lines(&["v 1 2", "t 10 20"]);
    link.push_fault().push_reopen(true).push_line("t 50 50");
    let mut controller = ReconnectController::connect(link, &settings_with_profile(&path)).unwrap();
    controller.session_mut().link_mut().clear_written();

    assert_eq!(controller.tick(), TickOutcome::Disconnected);
    assert_eq!(controller.tick(), TickOutcome::Reconnected);
    assert_eq!(controller.state(), ConnectionState::Connected);
    assert_eq!(
        controller.session().link().written_lines(),
        vec!["v", "t", "0 300", "1 400"]
    );
    assert_eq!(controller.store().thresholds(), &[300, 400]);

    controller.shutdown().unwrap();
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_values_report_updates_prefix_only() {
    let mut link = ScriptedLink::with_lines(&["v 1 2 3", "t 10 20 30"]);
    link.push_line("v 9");
    let mut controller = ReconnectController::connect(link, &PadSettings::default()).unwrap();

    assert_eq!(controller.tick(), TickOutcome::Updated { count: 1 });
    assert_eq!(controller.store().values(), &[9, 2, 3]);
}

#[test]
fn test_failed_reopens_do_not_block() {
    let mut link = ScriptedLink::with_lines(&["v 1", "t 1"]);
    link.push_fault();
    let mut controller = ReconnectController::connect(link, &PadSettings::default()).unwrap();

    assert_eq!(controller.tick(), TickOutcome::Disconnected);
    for _ in 0..3 {
        assert_eq!(controller.tick(), TickOutcome::StillDisconnected);
    }
    assert_eq!(controller.session().link().reopen_attempts(), 3);
    assert!(!controller.tick().is_connected());
}

#[test]
fn test_edit_then_save() {
    let path = temp_profile("edit");
    std::fs::remove_file(&path).ok();

    let link = ScriptedLink::with_lines(&["v 1 2", "t 10 20"]);
    let mut controller = ReconnectController::connect(link, &settings_with_profile(&path)).unwrap();
    assert_eq!(controller.set_threshold(1, -40).unwrap(), 0);
    controller.save_profile().unwrap();

    assert_eq!(config::load_profile_file(&path, 2).unwrap(), vec![10, 0]);
    drop(controller);
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_pad_reset_mid_line_keeps_thresholds() {
    let mut link = ScriptedLink::with_lines(&["v 1 2 3", "t 10 20 30"]);
    link.push_bytes(b"t 99 9").push_silence().push_line("v 5 6 7");
    let mut controller = ReconnectController::connect(link, &PadSettings::default()).unwrap();

    assert_eq!(controller.tick(), TickOutcome::Silent);
    assert_eq!(controller.tick(), TickOutcome::Updated { count: 3 });
    assert_eq!(controller.store().values(), &[5, 6, 7]);
    assert_eq!(controller.store().thresholds(), &[10, 20, 30]);
}
