//! Append-only CSV logs of resolved results and alerts
//!
//! `results_log.csv`: `ts,text,sentiment,urgency,aspects`
//! `alerts_log.csv`:  `ts,text,sentiment,urgency,reason,aspects`
//!
//! A header row is written when a file is created. Sentiment and urgency are
//! lowercased and trimmed on the way in.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sentiflow_common::time::iso_utc;
use sentiflow_common::Result;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub const RESULTS_FILE: &str = "results_log.csv";
pub const ALERTS_FILE: &str = "alerts_log.csv";

/// Reason recorded on rows raised by the negative/high rule
pub const AUTO_THRESHOLD_REASON: &str = "auto threshold";

#[derive(Debug, Serialize)]
struct ResultRecord<'a> {
    ts: String,
    text: &'a str,
    sentiment: String,
    urgency: String,
    aspects: &'a str,
}

#[derive(Debug, Serialize)]
struct AlertRecord<'a> {
    ts: String,
    text: &'a str,
    sentiment: String,
    urgency: String,
    reason: &'a str,
    aspects: &'a str,
}

/// One analysed review, ready to be logged
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub ts: DateTime<Utc>,
    pub text: String,
    pub sentiment: String,
    pub urgency: String,
    pub aspects: String,
}

/// Writer for both log files
pub struct ReportLog {
    results_path: PathBuf,
    alerts_path: PathBuf,
    write_lock: Mutex<()>,
}

impl ReportLog {
    /// Use `dir` for both files, creating it if missing
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            results_path: dir.join(RESULTS_FILE),
            alerts_path: dir.join(ALERTS_FILE),
            write_lock: Mutex::new(()),
        })
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    pub fn alerts_path(&self) -> &Path {
        &self.alerts_path
    }

    pub fn append_result(&self, entry: &LogEntry) -> Result<()> {
        let record = ResultRecord {
            ts: iso_utc(entry.ts),
            text: &entry.text,
            sentiment: normalize(&entry.sentiment),
            urgency: normalize(&entry.urgency),
            aspects: &entry.aspects,
        };
        self.append(&self.results_path, &record)
    }

    pub fn append_alert(&self, entry: &LogEntry, reason: &str) -> Result<()> {
        let record = AlertRecord {
            ts: iso_utc(entry.ts),
            text: &entry.text,
            sentiment: normalize(&entry.sentiment),
            urgency: normalize(&entry.urgency),
            reason,
            aspects: &entry.aspects,
        };
        self.append(&self.alerts_path, &record)
    }

    fn append<R: Serialize>(&self, path: &Path, record: &R) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let write_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(record).map_err(std::io::Error::from)?;
        writer.flush()?;
        Ok(())
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str) -> LogEntry {
        LogEntry {
            ts: Utc::now(),
            text: text.to_string(),
            sentiment: " Negative".to_string(),
            urgency: "HIGH".to_string(),
            aspects: "quality".to_string(),
        }
    }

    fn read_rows(path: &Path) -> Vec<csv::StringRecord> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader.records().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = ReportLog::new(dir.path()).unwrap();

        log.append_result(&entry("first, with comma")).unwrap();
        log.append_result(&entry("second \"quoted\"")).unwrap();

        let mut reader = csv::Reader::from_path(log.results_path()).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["ts", "text", "sentiment", "urgency", "aspects"]
        );

        let rows = read_rows(log.results_path());
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][1], "first, with comma");
        assert_eq!(&rows[1][1], "second \"quoted\"");
        assert_eq!(&rows[0][2], "negative");
        assert_eq!(&rows[0][3], "high");
        assert!(rows[0][0].ends_with('Z'));
    }

    #[test]
    fn test_alert_row_has_reason() {
        let dir = tempfile::tempdir().unwrap();
        let log = ReportLog::new(&dir.path().join("nested")).unwrap();

        log.append_alert(&entry("broken"), AUTO_THRESHOLD_REASON).unwrap();

        let rows = read_rows(log.alerts_path());
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][4], "auto threshold");
        assert_eq!(&rows[0][5], "quality");
    }
}
