//! Delivery sinks for assembled reports.

use std::path::PathBuf;

use chrono::Utc;
use tracing::info;

use feedpulse_shared::{FeedPulseError, Report, Result, RunId};

/// Destination for a finished report. Delivery failure is fatal to the run.
pub trait NotificationSink {
    fn deliver(&self, report: &Report, recipient: &str, run_id: &RunId) -> Result<()>;
}

/// Writes the rich body as a markdown file under the reports directory.
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn report_path(&self, run_id: &RunId) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        self.dir.join(format!("digest-{stamp}-{run_id}.md"))
    }
}

impl NotificationSink for FileSink {
    fn deliver(&self, report: &Report, recipient: &str, run_id: &RunId) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| FeedPulseError::Delivery(format!("creating reports dir: {e}")))?;

        let path = self.report_path(run_id);
        let contents = format!(
            "# {}\n\nto: {}\n\n{}",
            report.subject, recipient, report.rich_body
        );
        std::fs::write(&path, contents)
            .map_err(|e| FeedPulseError::Delivery(format!("writing report: {e}")))?;

        info!(path = %path.display(), "report written");
        Ok(())
    }
}

/// Prints the plain-text body to stdout. Used by `run --dry-run`.
pub struct StdoutSink;

impl NotificationSink for StdoutSink {
    fn deliver(&self, report: &Report, recipient: &str, _run_id: &RunId) -> Result<()> {
        println!("Subject: {}", report.subject);
        println!("To: {recipient}\n");
        println!("{}", report.text_body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sink_writes_rich_body() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        let report = Report {
            subject: "digest".into(),
            text_body: "plain".into(),
            rich_body: "**rich**".into(),
        };

        sink.deliver(&report, "team@example.com", &RunId::default())
            .unwrap();

        let mut entries = std::fs::read_dir(dir.path()).unwrap();
        let path = entries.next().unwrap().unwrap().path();
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("# digest"));
        assert!(contents.contains("to: team@example.com"));
        assert!(contents.contains("**rich**"));
    }

    #[test]
    fn file_sink_creates_nested_reports_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let sink = FileSink::new(&nested);
        let report = Report {
            subject: "s".into(),
            text_body: "t".into(),
            rich_body: "r".into(),
        };

        sink.deliver(&report, "x@example.com", &RunId::default())
            .unwrap();
        assert!(nested.exists());
    }
}
