use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::prelude::*;
use serde::{Deserialize, Serialize};

use crate::event::RotationEvent;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RotationLog {
    pub timestamp: i64,
    pub event: RotationEvent,
}

// Append a decoded rotation to the journal of the current hour
pub fn write_log<P: AsRef<Path>>(dir: P, event: RotationEvent) -> Result<()> {
    write_log_at(dir, Utc::now(), event)
}

pub fn write_log_at<P: AsRef<Path>>(dir: P, at: DateTime<Utc>, event: RotationEvent) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)
        .with_context(|| format!("could not create log directory {}", dir.display()))?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(filename(dir, at))?;
    writeln!(file, "{},{}", at.timestamp(), serde_json::to_string(&event)?)?;
    Ok(())
}

// Read the journal for a given day and hour
pub fn read_logs<P: AsRef<Path>>(dir: P, date: &str, hour: &str) -> Result<Vec<RotationLog>> {
    let path = dir.as_ref().join(format!("{}-{}", date, hour));
    let file = File::open(&path).with_context(|| format!("no journal at {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut logs: Vec<RotationLog> = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let (timestamp, event) = line.split_once(",").context("invalid log format")?;
        logs.push(RotationLog {
            timestamp: timestamp.parse()?,
            event: serde_json::from_str(event)?,
        });
    }
    Ok(logs)
}

// Journal file for a day and an hour
fn filename(dir: &Path, at: DateTime<Utc>) -> PathBuf {
    dir.join(at.format("%Y-%m-%d-%H").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RotationDirection;

    #[test]
    fn journal_is_grouped_by_hour() {
        let dir = tempfile::tempdir().expect("temp dir");
        let at = Utc.with_ymd_and_hms(2021, 5, 1, 13, 5, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2021, 5, 1, 14, 0, 1).unwrap();

        write_log_at(dir.path(), at, RotationEvent::new(RotationDirection::Clockwise)).unwrap();
        write_log_at(
            dir.path(),
            at,
            RotationEvent::new(RotationDirection::CounterClockwise),
        )
        .unwrap();
        write_log_at(dir.path(), later, RotationEvent::new(RotationDirection::Clockwise)).unwrap();

        let logs = read_logs(dir.path(), "2021-05-01", "13").unwrap();
        assert_eq!(
            logs,
            vec![
                RotationLog {
                    timestamp: at.timestamp(),
                    event: RotationEvent::new(RotationDirection::Clockwise),
                },
                RotationLog {
                    timestamp: at.timestamp(),
                    event: RotationEvent::new(RotationDirection::CounterClockwise),
                },
            ]
        );
        assert_eq!(read_logs(dir.path(), "2021-05-01", "14").unwrap().len(), 1);
    }

    #[test]
    fn rejects_malformed_lines() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("2021-05-01-13"), "not a log line\n").unwrap();
        assert!(read_logs(dir.path(), "2021-05-01", "13").is_err());
    }

    #[test]
    fn missing_hour_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(read_logs(dir.path(), "2021-05-01", "00").is_err());
    }
}
