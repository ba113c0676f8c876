//! Extraction of print events from the Windows print-service log.
//!
//! Event 307 of `Microsoft-Windows-PrintService/Operational` is written for
//! every completed job. PowerShell exports the events of a date range as CSV;
//! the command then touches a signal file, which is what the loader waits for
//! since the piped export outlives the process that launched it.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{Datelike, NaiveDate};
use tracing::{info, warn};

pub const DEFAULT_SIGNAL_FILE: &str = "completed.txt";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("Unable to launch log export: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Log export exited with {0}")]
    Failed(std::process::ExitStatus),
    #[error("Log export did not signal completion within {0:?}")]
    Timeout(Duration),
    #[error("Unable to access completion signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// `d/m/yyyy`, without zero padding, as the event-log filter expects.
fn filter_date(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.day(), date.month(), date.year())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    start: NaiveDate,
    end: NaiveDate,
    log_dir: PathBuf,
}

impl ExportRequest {
    /// Builds an export of `start..=end`. An end date in the future is pulled
    /// back to `today`.
    pub fn new(
        start: NaiveDate,
        end: NaiveDate,
        log_dir: impl Into<PathBuf>,
        today: NaiveDate,
    ) -> Result<Self, ExportError> {
        if start > end {
            return Err(ExportError::InvalidRange { start, end });
        }
        let end = if end > today {
            warn!("End date {end} is after today, exporting up to {today}");
            today
        } else {
            end
        };
        Ok(Self {
            start,
            end,
            log_dir: log_dir.into(),
        })
    }

    /// Range given on the command line. A reversed range is refused with a
    /// warning and nothing is exported.
    pub fn requested(
        start: NaiveDate,
        end: NaiveDate,
        log_dir: impl Into<PathBuf>,
        today: NaiveDate,
    ) -> Option<Self> {
        Self::new(start, end, log_dir, today)
            .inspect_err(|e| warn!("{e}, nothing exported"))
            .ok()
    }

    /// Export of the previous day only, for the daily run.
    pub fn yesterday(log_dir: impl Into<PathBuf>, today: NaiveDate) -> Self {
        let yesterday = today.pred_opt().unwrap_or(today);
        Self {
            start: yesterday,
            end: yesterday,
            log_dir: log_dir.into(),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// `<d-m-yyyy>_to_<d-m-yyyy>.csv` inside the log directory.
    pub fn output_file(&self) -> PathBuf {
        let name = format!(
            "{}_to_{}.csv",
            filter_date(self.start).replace('/', "-"),
            filter_date(self.end).replace('/', "-")
        );
        self.log_dir.join(name)
    }

    /// PowerShell pipeline exporting the range and then creating `signal`.
    pub fn command(&self, signal: &Path) -> String {
        format!(
            "get-winevent -FilterHashTable @{{ logname = 'Microsoft-Windows-PrintService/Operational';\
             StartTime = '{} 12:00:01 AM'; EndTime = '{} 23:59:59 ';  ID = 307 ;}} \
             | ConvertTo-csv| Out-file {};new-item {}  -type file;",
            filter_date(self.start),
            filter_date(self.end),
            self.output_file().display(),
            signal.display()
        )
    }
}

/// File whose appearance marks the end of an export, polled with a bound.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    path: PathBuf,
    poll_interval: Duration,
    timeout: Duration,
}

impl CompletionSignal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            poll_interval: Duration::from_millis(250),
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes a signal left over from an earlier run.
    pub fn clear(&self) -> Result<(), ExportError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ExportError::Signal(e)),
        }
    }

    /// Blocks until the signal file exists, then consumes it.
    pub fn wait(&self) -> Result<(), ExportError> {
        let started = Instant::now();
        while !self.path.exists() {
            if started.elapsed() >= self.timeout {
                return Err(ExportError::Timeout(self.timeout));
            }
            thread::sleep(self.poll_interval);
        }
        self.clear()
    }
}

/// Runs the export and waits for it. Returns the path of the produced CSV.
pub fn run_export(
    request: &ExportRequest,
    signal: &CompletionSignal,
) -> Result<PathBuf, ExportError> {
    info!(
        "Exporting print log from {} to {}",
        request.start(),
        request.end()
    );
    signal.clear()?;
    let mut child = Command::new("powershell")
        .arg("-NonInteractive")
        .arg("-Command")
        .arg(request.command(signal.path()))
        .spawn()
        .map_err(ExportError::Spawn)?;

    if let Err(e) = signal.wait() {
        if let Err(kill_error) = child.kill() {
            warn!("Unable to stop log export: {kill_error}");
        }
        return Err(e);
    }
    let status = child.wait().map_err(ExportError::Spawn)?;
    if !status.success() {
        return Err(ExportError::Failed(status));
    }
    Ok(request.output_file())
}
