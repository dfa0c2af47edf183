use std::fs;
use std::time::Duration;

use dualsub::parser::load_track;
use dualsub::window::{next_entry, select_window, WindowSpan};

fn srt_with_starts(starts: &[u64]) -> String {
    starts
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "{}\n00:00:{:02},000 --> 00:00:{:02},000\nline {}\n\n",
                i + 1,
                s,
                s + 4,
                s
            )
        })
        .collect()
}

#[test]
fn file_to_window() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("five.srt");
    fs::write(&path, srt_with_starts(&[0, 5, 10, 15, 20])).unwrap();

    let track = load_track(&path).unwrap();
    assert_eq!(track.len(), 5);
    assert!(track.entries().iter().all(|e| e.start <= e.end));

    let w = select_window(&track, Duration::from_secs(12), WindowSpan::default()).unwrap();
    assert_eq!(w.index, 2);
    assert_eq!(w.current.text, "line 10");
    let before: Vec<&str> = w.before.iter().map(|e| e.text.as_str()).collect();
    let after: Vec<&str> = w.after.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(before, ["line 0", "line 5"]);
    assert_eq!(after, ["line 15", "line 20"]);

    assert!(select_window(&track, Duration::from_secs(1000), WindowSpan::default()).is_none());
    assert_eq!(
        next_entry(&track, Duration::from_secs(6)).map(|e| e.start),
        Some(Duration::from_secs(10))
    );
}

#[test]
fn undecodable_bytes_do_not_stop_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("latin1.srt");
    let mut data = b"1\n00:00:01,000 --> 00:00:02,000\nCaf".to_vec();
    data.push(0xE9);
    data.extend_from_slice(b"\n\n2\n00:00:03,000 --> 00:00:04,000\nOk\n");
    fs::write(&path, data).unwrap();

    let track = load_track(&path).unwrap();
    assert_eq!(track.len(), 2);
    assert_eq!(track.entries()[0].text, "Caf\u{FFFD}");
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_track(dir.path().join("absent.srt")).unwrap_err();
    assert!(err.to_string().contains("absent.srt"), "{}", err);
}
