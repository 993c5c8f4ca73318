//! SPE documents produced from a known spectrum.

use chrono::{TimeZone, Utc};
use radangel_daq::{
    data::{Channel, Histogram},
    export::{export, export_at},
};

fn spectrum_with_peak() -> Histogram {
    let mut hist = Histogram::new();
    hist.set(Channel::new(100).unwrap(), 42);
    hist
}

#[test]
fn test_single_peak_document() {
    let ts = Utc.with_ymd_and_hms(2015, 3, 14, 9, 26, 53).unwrap();
    let doc = export_at(&spectrum_with_peak(), 10.0, 9.95, "0", ts);
    let lines: Vec<&str> = doc.lines().collect();

    assert_eq!(lines[2], "2015-03-14T09:26:53Z,0,10.000,9.950");
    assert_eq!(lines[4], "10 9");

    let data_start = lines.iter().position(|l| *l == "0 4095").unwrap() + 1;
    let data = &lines[data_start..data_start + 4096];
    assert_eq!(data.len(), 4096);
    assert_eq!(data[100], "42");
    assert!(data
        .iter()
        .enumerate()
        .all(|(i, line)| i == 100 || *line == "0"));
    assert_eq!(lines[data_start + 4096], "$ENER_FIT:");
}

#[test]
fn test_export_stamps_current_time() {
    let before = Utc::now().format("%Y-%m-%d").to_string();
    let doc = export(&spectrum_with_peak(), 1.5, 1.25, "ra-7");
    let remark = doc.lines().nth(2).unwrap();
    assert!(remark.ends_with(",ra-7,1.500,1.250"));
    let after = Utc::now().format("%Y-%m-%d").to_string();
    assert!(remark.starts_with(&before) || remark.starts_with(&after));
}

#[test]
fn test_empty_spectrum_exports_zeros() {
    let doc = export(&Histogram::new(), 0.0, 0.0, "0");
    let zeros = doc.lines().skip(7).take(4096).filter(|l| *l == "0").count();
    assert_eq!(zeros, 4096);
    assert_eq!(doc.lines().nth(4), Some("0 0"));
}
