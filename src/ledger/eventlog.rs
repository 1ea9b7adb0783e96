//! Append-only JSONL log of progress events, one file per user.

use crate::core::error::StateError;
use crate::core::state::user_dir;
use crate::core::types::{ProgressEvent, TimestampedEvent};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Current UTC time as ISO 8601, second precision.
pub fn now_iso8601() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_utc(secs)
}

fn format_utc(epoch_secs: u64) -> String {
    let (mut days, rem) = (epoch_secs / 86_400, epoch_secs % 86_400);
    let (hours, minutes, seconds) = (rem / 3600, (rem % 3600) / 60, rem % 60);

    let mut year = 1970u64;
    loop {
        let len = if is_leap(year) { 366 } else { 365 };
        if days < len {
            break;
        }
        days -= len;
        year += 1;
    }

    let february = if is_leap(year) { 29 } else { 28 };
    let month_lengths = [31, february, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    let mut month = 1;
    for len in month_lengths {
        if days < len {
            break;
        }
        days -= len;
        month += 1;
    }

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        month,
        days + 1,
        hours,
        minutes,
        seconds
    )
}

fn is_leap(y: u64) -> bool {
    (y % 4 == 0 && y % 100 != 0) || y % 400 == 0
}

/// Derive the event log path for a user.
pub fn event_log_path(progress_dir: &Path, user: &str) -> Result<PathBuf, StateError> {
    Ok(user_dir(progress_dir, user)?.join("events.jsonl"))
}

/// Append events to the user's log, stamping each with the current time.
pub fn append_events(
    progress_dir: &Path,
    user: &str,
    events: impl IntoIterator<Item = ProgressEvent>,
) -> Result<usize, StateError> {
    let path = event_log_path(progress_dir, user)?;
    let io_err = |source| StateError::Io {
        path: path.display().to_string(),
        source,
    };

    let ts = now_iso8601();
    let mut lines = String::new();
    for event in events {
        let te = TimestampedEvent {
            ts: ts.clone(),
            event,
        };
        let json = serde_json::to_string(&te)
            .map_err(|e| StateError::EventLog(format!("JSON serialize error: {}", e)))?;
        lines.push_str(&json);
        lines.push('\n');
    }
    if lines.is_empty() {
        return Ok(0);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_err)?;
    file.write_all(lines.as_bytes()).map_err(io_err)?;

    Ok(lines.lines().count())
}

/// Read a user's log. A missing log is empty.
pub fn read_events(progress_dir: &Path, user: &str) -> Result<Vec<TimestampedEvent>, StateError> {
    let path = event_log_path(progress_dir, user)?;
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path).map_err(|source| StateError::Io {
        path: path.display().to_string(),
        source,
    })?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| {
                StateError::EventLog(format!("{} line {}: {}", path.display(), n + 1, e))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selected(category: &str) -> ProgressEvent {
        ProgressEvent::ProgramSelected {
            user: "ana".to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn test_now_iso8601() {
        let ts = now_iso8601();
        assert!(ts.starts_with("20"));
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), 20);
    }

    #[test]
    fn test_format_utc_known_instants() {
        assert_eq!(format_utc(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_utc(951_782_400), "2000-02-29T00:00:00Z");
        assert_eq!(format_utc(1_771_252_200), "2026-02-16T14:30:00Z");
        assert_eq!(format_utc(1_798_761_599), "2026-12-31T23:59:59Z");
    }

    #[test]
    fn test_is_leap() {
        assert!(is_leap(2000));
        assert!(!is_leap(1900));
        assert!(is_leap(2024));
        assert!(!is_leap(2026));
    }

    #[test]
    fn test_event_log_path() {
        let p = event_log_path(Path::new("/progress"), "ana").unwrap();
        assert_eq!(p, PathBuf::from("/progress/ana/events.jsonl"));
        assert!(matches!(
            event_log_path(Path::new("/progress"), "../ana"),
            Err(StateError::InvalidUser(_))
        ));
    }

    #[test]
    fn test_append_rejects_traversing_user() {
        let root = tempfile::tempdir().unwrap();
        let progress_dir = root.path().join("progress");
        let err = append_events(&progress_dir, "../escaped", vec![selected("street")]).unwrap_err();
        assert!(matches!(err, StateError::InvalidUser(_)));
        assert!(!root.path().join("escaped").exists());
    }

    #[test]
    fn test_append_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let n = append_events(dir.path(), "ana", vec![selected("street")]).unwrap();
        assert_eq!(n, 1);
        append_events(
            dir.path(),
            "ana",
            vec![
                selected("flow"),
                ProgressEvent::LevelCompleted {
                    user: "ana".to_string(),
                    category: "street".to_string(),
                    skill: "pull-up".to_string(),
                    level: 1,
                    xp: 50,
                },
            ],
        )
        .unwrap();

        let content = std::fs::read_to_string(dir.path().join("ana/events.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert!(content.contains("\"event\":\"level_completed\""));

        let events = read_events(dir.path(), "ana").unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event, selected("street"));
        assert!(events[2].ts.ends_with('Z'));
    }

    #[test]
    fn test_append_nothing_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(append_events(dir.path(), "ana", Vec::new()).unwrap(), 0);
        assert!(!event_log_path(dir.path(), "ana").unwrap().exists());
    }

    #[test]
    fn test_read_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_events(dir.path(), "ghost").unwrap().is_empty());
    }

    #[test]
    fn test_read_corrupt_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = event_log_path(dir.path(), "ana").unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{\"ts\":\"x\",\"event\":\"nope\"}\n").unwrap();
        let err = read_events(dir.path(), "ana").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
