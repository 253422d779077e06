use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::errors::BatchResult;
use crate::results::{BatchReport, Outcome};

/// Human-readable record of one run, one timestamped line per entry.
///
/// The file is named `log_<YYYYMMDDTHHMMSS>.txt` inside the configured log folder.
pub struct RunLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl RunLog {
    pub fn create(dir: &Path) -> BatchResult<Self> {
        fs::create_dir_all(dir)?;
        let stamp: String = humantime::format_rfc3339_seconds(SystemTime::now())
            .to_string()
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == 'T')
            .collect();
        let path = dir.join(format!("log_{}.txt", stamp));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&mut self, message: &str) -> BatchResult<()> {
        let now = humantime::format_rfc3339_seconds(SystemTime::now());
        writeln!(self.writer, "{}: {}", now, message)?;
        Ok(())
    }

    /// Records a run that stopped before producing a report
    pub fn write_abort(mut self, reason: &str, queries: usize) -> BatchResult<PathBuf> {
        self.line(&format!("Batch aborted: {}", reason))?;
        self.line(&format!("Queries processed: {}", queries))?;
        self.line("Files found: 0, actions taken: 0")?;
        self.writer.flush()?;
        Ok(self.path)
    }

    /// Writes queries, failures, matches, action outcomes and the summary
    pub fn write_report(mut self, report: &BatchReport) -> BatchResult<PathBuf> {
        self.line(&format!("Processing {} queries", report.queries.len()))?;
        for query in &report.queries {
            self.line(&format!("- {}", query))?;
        }
        for failure in &report.query_failures {
            self.line(&format!(
                "Search failed for {}: {}",
                failure.query, failure.reason
            ))?;
        }

        if report.matches.is_empty() {
            self.line("No matching files found")?;
        } else {
            self.line(&format!("Found {} files", report.matches.len()))?;
            for m in &report.matches {
                self.line(&m.path.display().to_string())?;
            }
        }

        for result in &report.results {
            let target = result
                .plan
                .destination
                .as_ref()
                .map(|d| format!(" -> {}", d.display()))
                .unwrap_or_default();
            let status = match &result.outcome {
                Outcome::Success => "ok".to_string(),
                Outcome::Failed(reason) => format!("FAILED ({})", reason),
                Outcome::Cancelled => "skipped".to_string(),
            };
            self.line(&format!(
                "{} {}{}: {}",
                result.plan.action,
                result.plan.source.path.display(),
                target,
                status
            ))?;
        }

        let s = &report.summary;
        self.line(&format!("Summary ({:?}, action: {})", report.status, report.action))?;
        self.line(&format!("Total queries processed: {}", s.queries_processed))?;
        self.line(&format!("Total files found: {}", s.total_found))?;
        self.line(&format!("Successfully processed: {}", s.success_processed))?;
        self.line(&format!(
            "Failed operations: {} (search {}, actions {})",
            s.failed_operations, s.search_failures, s.action_failures
        ))?;
        if s.skipped > 0 {
            self.line(&format!("Skipped after cancellation: {}", s.skipped))?;
        }
        self.writer.flush()?;
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Action;
    use crate::results::{BatchStatus, BatchSummary, Match, Query};
    use tempfile::tempdir;

    #[test]
    fn test_write_report() {
        let dir = tempdir().unwrap();
        let log = RunLog::create(&dir.path().join("logs")).unwrap();
        let expected_path = log.path().to_path_buf();

        let report = BatchReport {
            status: BatchStatus::Completed,
            action: Action::None,
            queries: vec![Query {
                text: "report.pdf".to_string(),
                has_explicit_extension: true,
            }],
            query_failures: vec![],
            raw_match_count: 1,
            matches: vec![Match {
                query_index: 0,
                path: PathBuf::from("/data/report.pdf"),
            }],
            results: vec![],
            summary: BatchSummary {
                queries_processed: 1,
                total_found: 1,
                ..BatchSummary::default()
            },
            log_file: None,
        };

        let written = log.write_report(&report).unwrap();
        assert_eq!(written, expected_path);

        let name = written.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("log_") && name.ends_with(".txt"));

        let content = fs::read_to_string(&written).unwrap();
        assert!(content.contains("- report.pdf"));
        assert!(content.contains("/data/report.pdf"));
        assert!(content.contains("Total files found: 1"));
        assert_eq!(content.matches("Summary (").count(), 1);
        // every line carries a timestamp
        assert!(content.lines().all(|l| l.contains("Z: ")));
    }

    #[test]
    fn test_write_abort() {
        let dir = tempdir().unwrap();
        let log = RunLog::create(dir.path()).unwrap();
        let path = log.write_abort("Invalid pattern: (", 0).unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("Batch aborted: Invalid pattern: ("));
        assert!(content.contains("actions taken: 0"));
    }
}
