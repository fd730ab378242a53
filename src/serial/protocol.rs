//! Text protocol spoken by the pad.
//!
//! Commands are single lines: `v` (query values), `t` (query thresholds) and
//! `<index> <value>` (set one threshold). The pad answers with one line whose
//! first byte tags the payload (`v` or `t`), followed by decimal integers
//! separated by any non-digit bytes.
use serde::{Deserialize, Serialize};

pub const CMD_VALUES: &[u8] = b"v\n";
pub const CMD_THRESHOLDS: &[u8] = b"t\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryKind {
    Values,
    Thresholds,
}

impl QueryKind {
    /// Tag carried by the pad's answer to this query.
    pub fn tag(self) -> ReportTag {
        match self {
            QueryKind::Values => ReportTag::Values,
            QueryKind::Thresholds => ReportTag::Thresholds,
        }
    }
}

/// Destination of a report, taken from the report line's own first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportTag {
    Values,
    Thresholds,
    Unrecognized,
}

/// One parsed line of pad output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub tag: ReportTag,
    /// Parsed numbers, at most `capacity` of them.
    pub numbers: Vec<i32>,
    /// Every number seen on the line, stored or not.
    pub count: usize,
}

impl Report {
    pub fn unrecognized() -> Self {
        Self::empty(ReportTag::Unrecognized)
    }

    pub fn empty(tag: ReportTag) -> Self {
        Self {
            tag,
            numbers: Vec::new(),
            count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True when the line carried more numbers than could be stored.
    pub fn is_truncated(&self) -> bool {
        self.count > self.numbers.len()
    }
}

pub fn format_query(kind: QueryKind) -> &'static [u8] {
    match kind {
        QueryKind::Values => CMD_VALUES,
        QueryKind::Thresholds => CMD_THRESHOLDS,
    }
}

/// `value` must already be clamped by the caller.
pub fn format_set_threshold(index: usize, value: i32) -> Vec<u8> {
    format!("{} {}\n", index, value).into_bytes()
}

/// Parse one report line, storing at most `capacity` numbers.
///
/// A line that does not start with `v` or `t`, or that contains a number
/// larger than `i32::MAX`, yields an empty [`ReportTag::Unrecognized`] report.
pub fn parse_report(line: &[u8], capacity: usize) -> Report {
    let tag = match line.first() {
        Some(b'v') => ReportTag::Values,
        Some(b't') => ReportTag::Thresholds,
        _ => return Report::unrecognized(),
    };

    let mut report = Report::empty(tag);
    let mut current: Option<i32> = None;

    for &byte in &line[1..] {
        if byte == b'\n' {
            break;
        }

        if byte.is_ascii_digit() {
            let digit = i32::from(byte - b'0');
            match current
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|v| v.checked_add(digit))
            {
                Some(value) => current = Some(value),
                None => {
                    log::debug!("Number overflow in report, discarding line");
                    return Report::unrecognized();
                }
            }
        } else if let Some(value) = current.take() {
            push_number(&mut report, value, capacity);
        }
    }

    if let Some(value) = current {
        push_number(&mut report, value, capacity);
    }

    report
}

fn push_number(report: &mut Report, value: i32, capacity: usize) {
    if report.numbers.len() < capacity {
        report.numbers.push(value);
    }
    report.count += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values_report() {
        let report = parse_report(b"v 10 20 30\n", 64);
        assert_eq!(report.tag, ReportTag::Values);
        assert_eq!(report.numbers, vec![10, 20, 30]);
        assert_eq!(report.count, 3);
    }

    #[test]
    fn test_parse_thresholds_report() {
        let report = parse_report(b"t 5\n", 64);
        assert_eq!(report.tag, ReportTag::Thresholds);
        assert_eq!(report.numbers, vec![5]);
    }

    #[test]
    fn test_unknown_tag_is_unrecognized() {
        let report = parse_report(b"x1 2\n", 64);
        assert_eq!(report, Report::unrecognized());
        assert_eq!(parse_report(b"", 64), Report::unrecognized());
        assert_eq!(parse_report(b"\n", 64), Report::unrecognized());
    }

    #[test]
    fn test_any_non_digit_separates() {
        let report = parse_report(b"v1,2;;3\r\n", 64);
        assert_eq!(report.numbers, vec![1, 2, 3]);

        let report = parse_report(b"t-7 x8", 64);
        assert_eq!(report.numbers, vec![7, 8]);
    }

    #[test]
    fn test_stops_at_terminator() {
        let report = parse_report(b"v 1 2\n3 4", 64);
        assert_eq!(report.numbers, vec![1, 2]);
        assert_eq!(report.count, 2);
    }

    #[test]
    fn test_overflow_aborts_whole_line() {
        let report = parse_report(b"v 1 2 99999999999 4\n", 64);
        assert_eq!(report, Report::unrecognized());

        let report = parse_report(b"v 2147483647\n", 64);
        assert_eq!(report.numbers, vec![i32::MAX]);
        assert_eq!(parse_report(b"v 2147483648\n", 64), Report::unrecognized());
    }

    #[test]
    fn test_capacity_bounds_storage_but_not_count() {
        let report = parse_report(b"v 1 2 3 4 5\n", 3);
        assert_eq!(report.numbers, vec![1, 2, 3]);
        assert_eq!(report.count, 5);
        assert!(report.is_truncated());
    }

    #[test]
    fn test_tag_only_line_is_empty() {
        let report = parse_report(b"v\n", 64);
        assert_eq!(report.tag, ReportTag::Values);
        assert!(report.is_empty());
    }

    #[test]
    fn test_format_commands() {
        assert_eq!(format_query(QueryKind::Values), b"v\n");
        assert_eq!(format_query(QueryKind::Thresholds), b"t\n");
        assert_eq!(format_set_threshold(3, 512), b"3 512\n".to_vec());
        assert_eq!(format_set_threshold(0, 0), b"0 0\n".to_vec());
    }
}
