//! Offline integrity check over recorded session databases.
//!
//! For every database and every configured stream the checker counts the
//! stored messages.  An empty stream table is an *empty table* finding; a
//! database that cannot be opened, or that lacks one of the streams, is a
//! *failure* finding.  Either kind makes the overall check fail, and the
//! checker moves on to the next database in both cases.
//!
//! Progress is logged as `PROGRESS: <pct>%` each time it advances by at
//! least one percentage point.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::DatasetError;
use crate::session::SessionDatabase;

/// Streams every recorded session is expected to contain.
pub const DEFAULT_STREAMS: &[&str] = &[
    "ground_truth_cones",
    "ground_truth_state",
    "simulated_perception",
];

/// One problem found during a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// The stream table exists but holds no messages.
    EmptyTable { database: PathBuf, stream: String },
    /// The database could not be checked.
    Failed { database: PathBuf, reason: String },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::EmptyTable { database, stream } => {
                write!(f, "{}:{stream} EMPTY TABLE!", database.display())
            }
            Finding::Failed { database, reason } => {
                write!(f, "{}: {reason}", database.display())
            }
        }
    }
}

/// Outcome of [`IntegrityChecker::check`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    /// Number of databases visited.
    pub databases: usize,
    pub findings: Vec<Finding>,
}

impl IntegrityReport {
    /// `true` iff at least one database was checked and nothing was found.
    pub fn is_success(&self) -> bool {
        self.databases > 0 && self.findings.is_empty()
    }

    pub fn empty_tables(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| matches!(f, Finding::EmptyTable { .. }))
    }

    pub fn failures(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| matches!(f, Finding::Failed { .. }))
    }

    /// Process exit code: 0 on success, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }

    /// One-line summary for the end of a run.
    pub fn summary(&self) -> String {
        if self.is_success() {
            return "Integrity check succeeded.".to_string();
        }
        if self.databases == 0 {
            return "Integrity check failed. Reason: no databases given".to_string();
        }
        let mut reasons = Vec::new();
        if self.empty_tables().next().is_some() {
            reasons.push("empty tables");
        }
        if self.failures().next().is_some() {
            reasons.push("unreadable databases");
        }
        format!("Integrity check failed. Reason: {}", reasons.join(", "))
    }
}

/// Tracks whole-percent progress and reports when it has moved by at least
/// one point since the last report.  Progress starts at 0%, which is never
/// reported itself.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last_reported: u32,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `done` of `total` units are finished.
    ///
    /// Returns the new percentage when it should be reported.
    pub fn advance(&mut self, done: usize, total: usize) -> Option<u32> {
        if total == 0 {
            return None;
        }
        let pct = (done.min(total) * 100 / total) as u32;
        if pct > self.last_reported {
            self.last_reported = pct;
            Some(pct)
        } else {
            None
        }
    }
}

/// Checks session databases for missing or empty streams.
#[derive(Debug, Clone)]
pub struct IntegrityChecker {
    streams: Vec<String>,
}

impl Default for IntegrityChecker {
    fn default() -> Self {
        Self::new(DEFAULT_STREAMS.iter().map(|s| s.to_string()))
    }
}

impl IntegrityChecker {
    pub fn new(streams: impl IntoIterator<Item = String>) -> Self {
        Self {
            streams: streams.into_iter().collect(),
        }
    }

    pub fn streams(&self) -> &[String] {
        &self.streams
    }

    /// Check every database in `paths`, in order.
    pub fn check<P: AsRef<Path>>(&self, paths: &[P]) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        if paths.is_empty() {
            error!("no databases given");
            return report;
        }

        info!(
            databases = paths.len(),
            "Integrity check starting. Checking {} databases.",
            paths.len()
        );

        let total = paths.len() * self.streams.len().max(1);
        let mut progress = ProgressTracker::new();
        let mut done = 0usize;

        for path in paths {
            let path = path.as_ref();
            report.databases += 1;
            match self.check_database(path) {
                Ok(empty) => {
                    for stream in empty {
                        let finding = Finding::EmptyTable {
                            database: path.to_path_buf(),
                            stream,
                        };
                        error!("{finding}");
                        report.findings.push(finding);
                    }
                }
                Err(e) => {
                    error!(database = %path.display(), error = %e, "An error has occurred");
                    report.findings.push(Finding::Failed {
                        database: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                }
            }

            done += self.streams.len().max(1);
            if let Some(pct) = progress.advance(done, total) {
                info!("PROGRESS: {pct}%");
            }
        }

        report
    }

    /// Names of the configured streams that are empty in `path`.
    pub fn check_database(&self, path: &Path) -> Result<Vec<String>, DatasetError> {
        let db = SessionDatabase::open(path)?;
        let mut empty = Vec::new();
        for stream in &self.streams {
            if db.message_count(stream)? == 0 {
                empty.push(stream.clone());
            }
        }
        Ok(empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session(dir: &TempDir, name: &str, fill: &[(&str, usize)]) -> PathBuf {
        let path = dir.path().join(name);
        let db = SessionDatabase::create(&path).unwrap();
        for (stream, n) in fill {
            db.ensure_stream(stream).unwrap();
            for i in 0..*n {
                db.record(stream, i as i64, b"{}").unwrap();
            }
        }
        path
    }

    fn full(dir: &TempDir, name: &str) -> PathBuf {
        session(
            dir,
            name,
            &[
                ("ground_truth_cones", 2),
                ("ground_truth_state", 3),
                ("simulated_perception", 1),
            ],
        )
    }

    #[test]
    fn complete_sessions_pass() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![full(&dir, "a.db3"), full(&dir, "b.db3")];
        let report = IntegrityChecker::default().check(&paths);
        assert!(report.is_success());
        assert_eq!(report.databases, 2);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.summary(), "Integrity check succeeded.");
    }

    #[test]
    fn empty_stream_fails_the_check() {
        let dir = tempfile::tempdir().unwrap();
        let bad = session(
            &dir,
            "bad.db3",
            &[
                ("ground_truth_cones", 1),
                ("ground_truth_state", 0),
                ("simulated_perception", 4),
            ],
        );
        let report = IntegrityChecker::default().check(&[bad.clone()]);
        assert!(!report.is_success());
        assert_eq!(report.exit_code(), 1);
        assert_eq!(
            report.findings,
            vec![Finding::EmptyTable {
                database: bad.clone(),
                stream: "ground_truth_state".to_string(),
            }]
        );
        assert_eq!(
            report.findings[0].to_string(),
            format!("{}:ground_truth_state EMPTY TABLE!", bad.display())
        );
        assert_eq!(report.summary(), "Integrity check failed. Reason: empty tables");
    }

    #[test]
    fn unreadable_database_does_not_stop_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.db3");
        let empty = session(
            &dir,
            "empty.db3",
            &[
                ("ground_truth_cones", 0),
                ("ground_truth_state", 1),
                ("simulated_perception", 1),
            ],
        );
        let report = IntegrityChecker::default().check(&[missing.clone(), empty]);
        assert_eq!(report.databases, 2);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.empty_tables().count(), 1);
        assert!(matches!(&report.findings[0], Finding::Failed { database, .. } if *database == missing));
    }

    #[test]
    fn missing_stream_table_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let partial = session(&dir, "partial.db3", &[("ground_truth_cones", 1)]);
        let report = IntegrityChecker::default().check(&[partial]);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn custom_stream_list_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let path = session(&dir, "x.db3", &[("lidar", 5)]);
        let checker = IntegrityChecker::new(vec!["lidar".to_string()]);
        assert!(checker.check(&[path]).is_success());
    }

    #[test]
    fn no_databases_is_not_success() {
        let report = IntegrityChecker::default().check::<PathBuf>(&[]);
        assert!(!report.is_success());
        assert_eq!(report.exit_code(), 1);
        assert!(report.summary().starts_with("Integrity check failed."));
    }

    #[test]
    fn progress_reports_whole_percent_steps() {
        let mut p = ProgressTracker::new();
        assert_eq!(p.advance(0, 300), None);
        assert_eq!(p.advance(1, 300), None);
        assert_eq!(p.advance(2, 300), None);
        assert_eq!(p.advance(3, 300), Some(1));
        assert_eq!(p.advance(150, 300), Some(50));
        assert_eq!(p.advance(300, 300), Some(100));
        assert_eq!(p.advance(300, 300), None);
    }

    #[test]
    fn many_databases_never_report_zero_percent() {
        let mut p = ProgressTracker::new();
        let reported: Vec<u32> = (1..=250).filter_map(|done| p.advance(done, 250)).collect();
        assert!(!reported.contains(&0));
        assert_eq!(reported.first(), Some(&1));
        assert_eq!(reported.last(), Some(&100));
        assert_eq!(reported.len(), 100);
    }

    #[test]
    fn progress_with_nothing_to_do_is_silent() {
        assert_eq!(ProgressTracker::new().advance(0, 0), None);
    }
}
