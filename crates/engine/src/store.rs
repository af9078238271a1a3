//! Append-only JSON-lines log of assignment changes.
//!
//! Each line is one record:
//!
//! ```text
//! {"op":"put","jobId":"j1","staffId":"s1","startEpochMinutes":28488780,"endEpochMinutes":28488900}
//! {"op":"remove","jobId":"j1"}
//! ```
//!
//! Replaying the log in order rebuilds the assignment set keyed by job id.
//! `compact` rewrites the file with one `put` per live assignment.
//! Overlaps in the replayed set are left for the caller to audit.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::Assignment;
use crate::time::TimePoint;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to access assignment log '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Corrupt assignment log '{path}' at line {line}: {source}")]
    Decode {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Persisted form of an `Assignment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAssignment {
    pub job_id: String,
    pub staff_id: String,
    pub start_epoch_minutes: i64,
    pub end_epoch_minutes: i64,
}

impl From<&Assignment> for StoredAssignment {
    fn from(a: &Assignment) -> Self {
        StoredAssignment {
            job_id: a.job_id.clone(),
            staff_id: a.staff_id.clone(),
            start_epoch_minutes: a.start.epoch_minutes(),
            end_epoch_minutes: a.end.epoch_minutes(),
        }
    }
}

impl StoredAssignment {
    /// `None` when either endpoint is outside the supported range.
    pub fn into_assignment(self) -> Option<Assignment> {
        Some(Assignment {
            start: TimePoint::checked_from_epoch_minutes(self.start_epoch_minutes)?,
            end: TimePoint::checked_from_epoch_minutes(self.end_epoch_minutes)?,
            job_id: self.job_id,
            staff_id: self.staff_id,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum LogRecord {
    Put(StoredAssignment),
    #[serde(rename_all = "camelCase")]
    Remove { job_id: String },
}

/// Result of replaying a log.
#[derive(Debug, Clone, Default)]
pub struct LoadedLog {
    /// Live assignments, ordered by job id.
    pub assignments: Vec<Assignment>,
    /// Records that were skipped while replaying.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AssignmentLog {
    path: PathBuf,
}

impl AssignmentLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        AssignmentLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    /// Replay the log. A missing file is an empty log.
    pub fn load(&self) -> Result<LoadedLog, StoreError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LoadedLog::default()),
            Err(e) => return Err(self.io_err(e)),
        };

        let mut live: BTreeMap<String, Assignment> = BTreeMap::new();
        let mut warnings = Vec::new();

        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.io_err(e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: LogRecord =
                serde_json::from_str(&line).map_err(|source| StoreError::Decode {
                    path: self.path.display().to_string(),
                    line: i + 1,
                    source,
                })?;
            match record {
                LogRecord::Put(stored) => {
                    let job_id = stored.job_id.clone();
                    let Some(a) = stored.into_assignment() else {
                        warnings.push(format!(
                            "Line {}: assignment for job '{}' is out of the supported date range -- skipped",
                            i + 1,
                            job_id
                        ));
                        continue;
                    };
                    if a.end <= a.start {
                        warnings.push(format!(
                            "Line {}: assignment for job '{}' has no duration -- skipped",
                            i + 1,
                            a.job_id
                        ));
                        continue;
                    }
                    live.insert(a.job_id.clone(), a);
                }
                LogRecord::Remove { job_id } => {
                    live.remove(&job_id);
                }
            }
        }

        Ok(LoadedLog {
            assignments: live.into_values().collect(),
            warnings,
        })
    }

    /// Encode every record first, then append them in a single write.
    fn append(&self, records: &[LogRecord]) -> Result<(), StoreError> {
        let mut buf = String::new();
        for record in records {
            let line = serde_json::to_string(record).map_err(|e| self.io_err(e.into()))?;
            buf.push_str(&line);
            buf.push('\n');
        }
        if buf.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        file.write_all(buf.as_bytes()).map_err(|e| self.io_err(e))
    }

    pub fn append_put(&self, assignment: &Assignment) -> Result<(), StoreError> {
        self.append_puts(std::slice::from_ref(assignment))
    }

    /// Record a batch of placements with one write, so a failure does not
    /// leave part of the batch behind.
    pub fn append_puts(&self, assignments: &[Assignment]) -> Result<(), StoreError> {
        let records: Vec<LogRecord> = assignments
            .iter()
            .map(|a| LogRecord::Put(StoredAssignment::from(a)))
            .collect();
        self.append(&records)
    }

    pub fn append_remove(&self, job_id: &str) -> Result<(), StoreError> {
        self.append(&[LogRecord::Remove {
            job_id: job_id.to_string(),
        }])
    }

    /// Rewrite the log as one `put` per assignment. The new content is
    /// written to a sibling file first and renamed over the log.
    pub fn compact(&self, assignments: &[Assignment]) -> Result<(), StoreError> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".compact");
        let tmp = PathBuf::from(tmp);

        {
            let mut file = File::create(&tmp).map_err(|e| self.io_err(e))?;
            for a in assignments {
                let line = serde_json::to_string(&LogRecord::Put(StoredAssignment::from(a)))
                    .map_err(|e| self.io_err(e.into()))?;
                writeln!(file, "{}", line).map_err(|e| self.io_err(e))?;
            }
            file.sync_all().map_err(|e| self.io_err(e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log(name: &str) -> AssignmentLog {
        let path = std::env::temp_dir().join(format!(
            "pressroom-store-{}-{}.jsonl",
            name,
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        AssignmentLog::new(path)
    }

    fn assignment(job: &str, staff: &str, start: i64, end: i64) -> Assignment {
        Assignment {
            job_id: job.to_string(),
            staff_id: staff.to_string(),
            start: TimePoint::from_epoch_minutes(start),
            end: TimePoint::from_epoch_minutes(end),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let log = temp_log("missing");
        let loaded = log.load().unwrap();
        assert!(loaded.assignments.is_empty());
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_replay_put_and_remove() {
        let log = temp_log("replay");
        log.append_put(&assignment("a", "s1", 600, 660)).unwrap();
        log.append_put(&assignment("b", "s1", 660, 720)).unwrap();
        log.append_put(&assignment("a", "s1", 720, 780)).unwrap();
        log.append_remove("b").unwrap();
        log.append_remove("never-there").unwrap();

        let loaded = log.load().unwrap();
        assert_eq!(loaded.assignments, vec![assignment("a", "s1", 720, 780)]);
        let _ = fs::remove_file(log.path());
    }

    #[test]
    fn test_overlaps_replayed_as_is() {
        let log = temp_log("conflicts");
        log.append_put(&assignment("a", "s1", 600, 720)).unwrap();
        log.append_put(&assignment("b", "s1", 660, 780)).unwrap();

        let loaded = log.load().unwrap();
        assert_eq!(loaded.assignments.len(), 2);
        assert!(loaded.warnings.is_empty());
        assert_eq!(crate::conflict::audit_all(&loaded.assignments).len(), 1);
        let _ = fs::remove_file(log.path());
    }

    #[test]
    fn test_compact_keeps_live_set() {
        let log = temp_log("compact");
        log.append_put(&assignment("a", "s1", 600, 660)).unwrap();
        log.append_remove("a").unwrap();
        log.append_put(&assignment("b", "s2", 600, 660)).unwrap();

        let before = log.load().unwrap();
        log.compact(&before.assignments).unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains(r#""op":"put""#));
        assert!(text.contains(r#""startEpochMinutes":600"#));
        assert_eq!(log.load().unwrap().assignments, before.assignments);
        let _ = fs::remove_file(log.path());
    }

    #[test]
    fn test_corrupt_line_reports_position() {
        let log = temp_log("corrupt");
        log.append_put(&assignment("a", "s1", 600, 660)).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(log.path())
            .and_then(|mut f| writeln!(f, "not json"))
            .unwrap();

        let err = log.load().unwrap_err();
        assert!(matches!(err, StoreError::Decode { line: 2, .. }));
        let _ = fs::remove_file(log.path());
    }

    #[test]
    fn test_out_of_range_record_is_skipped() {
        let log = temp_log("range");
        log.append_put(&assignment("a", "s1", 600, 660)).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(log.path())
            .and_then(|mut f| {
                writeln!(
                    f,
                    r#"{{"op":"put","jobId":"b","staffId":"s1","startEpochMinutes":9000000000000000,"endEpochMinutes":9000000000000060}}"#
                )
            })
            .unwrap();

        let loaded = log.load().unwrap();
        assert_eq!(loaded.assignments, vec![assignment("a", "s1", 600, 660)]);
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("job 'b'"));
        let _ = fs::remove_file(log.path());
    }

    #[test]
    fn test_batch_append_and_failure() {
        let log = temp_log("batch");
        log.append_puts(&[
            assignment("a", "s1", 600, 660),
            assignment("b", "s2", 600, 660),
        ])
        .unwrap();
        log.append_puts(&[]).unwrap();
        assert_eq!(fs::read_to_string(log.path()).unwrap().lines().count(), 2);
        let _ = fs::remove_file(log.path());

        let missing_dir = std::env::temp_dir()
            .join(format!("pressroom-no-such-dir-{}", std::process::id()))
            .join("log.jsonl");
        let err = AssignmentLog::new(missing_dir)
            .append_puts(&[assignment("a", "s1", 600, 660)])
            .unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
