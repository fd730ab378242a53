use std::time::Duration;

use danspad_lib::serial::mock::ScriptedLink;
use danspad_lib::serial::protocol::{format_query, format_set_threshold, parse_report};
use danspad_lib::serial::{DeviceSession, QueryKind, ReadError, ReportTag};

fn session(link: ScriptedLink) -> DeviceSession<ScriptedLink> {
    DeviceSession::with_limits(link, Duration::from_millis(5), 4)
}

#[test]
fn test_command_bytes() {
    assert_eq!(format_query(QueryKind::Values), b"v\n");
    assert_eq!(format_query(QueryKind::Thresholds), b"t\n");
    assert_eq!(format_set_threshold(12, 0), b"12 0\n");
    assert_eq!(format_set_threshold(0, 1023), b"0 1023\n");
}

#[test]
fn test_reports_by_tag_byte() {
    let values = parse_report(b"v 10 20 30\n", 64);
    assert_eq!(values.tag, ReportTag::Values);
    assert_eq!(values.numbers, vec![10, 20, 30]);

    let thresholds = parse_report(b"t 5\n", 64);
    assert_eq!(thresholds.tag, ReportTag::Thresholds);
    assert_eq!(thresholds.numbers, vec![5]);

    let junk = parse_report(b"x1 2\n", 64);
    assert_eq!(junk.tag, ReportTag::Unrecognized);
    assert!(junk.numbers.is_empty());

    let overflow = parse_report(b"v 1 99999999999\n", 64);
    assert_eq!(overflow.tag, ReportTag::Unrecognized);
    assert!(overflow.is_empty());
}

#[test]
fn test_crlf_and_mixed_separators() {
    let report = parse_report(b"t:1,2;;3\r\n", 64);
    assert_eq!(report.numbers, vec![1, 2, 3]);
}

#[test]
fn test_capacity_limits_storage_not_count() {
    let report = parse_report(b"v 1 2 3 4 5\n", 2);
    assert_eq!(report.numbers, vec![1, 2]);
    assert_eq!(report.count, 5);
    assert!(report.is_truncated());
}

#[test]
fn test_tag_comes_from_line_not_request() {
    let link = ScriptedLink::with_lines(&["t 7 8", "v 1 2"]);
    let mut session = session(link);

    let report = session.query_values().unwrap();
    assert_eq!(report.tag, ReportTag::Values);

    let strays = session.take_stray_reports();
    assert_eq!(strays.len(), 1);
    assert_eq!(strays[0].tag, ReportTag::Thresholds);
}

#[test]
fn test_session_reassembles_split_lines() {
    let mut link = ScriptedLink::new();
    link.push_bytes(b"v 100 2").push_bytes(b"00 300\nt 1").push_bytes(b"\n");
    let mut session = session(link);

    assert_eq!(
        session.read_report(Duration::ZERO).unwrap().numbers,
        vec![100, 200, 300]
    );
    assert_eq!(session.read_report(Duration::ZERO).unwrap().numbers, vec![1]);
    assert!(matches!(session.read_report(Duration::ZERO), Err(ReadError::Timeout)));
}

#[test]
fn test_malformed_line_does_not_poison_query() {
    let mut link = ScriptedLink::new();
    link.push_bytes(&[b'9'; 400]).push_line("").push_line("v 4");
    let mut session = session(link);

    let report = session.query_values().unwrap();
    assert_eq!(report.numbers, vec![4]);
}
