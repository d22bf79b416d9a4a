use std::fmt;
use itertools::Itertools;
use strum::Display;
use time::macros::format_description;
use time::OffsetDateTime;
use crate::consts::IST_OFFSET;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Action {
    #[strum(serialize = "Send Request")]
    SendRequest,
    #[strum(serialize = "Send Manual Data")]
    SendManualData,
    #[strum(serialize = "Extract Data")]
    ExtractData,
    #[strum(serialize = "Continuous Sending")]
    ContinuousSending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Status {
    Success,
    Failed,
    /// End of a continuous job that ran for its full duration.
    Completed,
    /// End of a continuous job stopped by the operator.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ActivityEntry {
    pub at: OffsetDateTime,
    pub action: Action,
    pub status: Status,
    pub details: String,
}

#[derive(Debug, Clone)]
pub struct ErrorEntry {
    pub at: OffsetDateTime,
    pub action: Action,
    pub error: String,
}

fn write_timestamp(f: &mut fmt::Formatter<'_>, at: OffsetDateTime) -> fmt::Result {
    let rendered = at
        .to_offset(IST_OFFSET)
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .map_err(|_| fmt::Error)?;
    f.write_str(&rendered)
}

impl fmt::Display for ActivityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_timestamp(f, self.at)?;
        write!(f, " [{}] {}: {}", self.action, self.status, self.details)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_timestamp(f, self.at)?;
        write!(f, " [{}] {}", self.action, self.error)
    }
}

/// Append-only record of what one invocation did.
#[derive(Debug, Default)]
pub struct Session {
    activity: Vec<ActivityEntry>,
    errors: Vec<ErrorEntry>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    pub fn log_activity(&mut self, action: Action, status: Status, details: impl Into<String>) {
        let entry = ActivityEntry {
            at: OffsetDateTime::now_utc(),
            action,
            status,
            details: details.into(),
        };
        match status {
            Status::Success => info!("{action}: {}", entry.details),
            Status::Failed => warn!("{action} failed: {}", entry.details),
            Status::Completed | Status::Cancelled => info!("{action} {status}: {}", entry.details),
        }
        self.activity.push(entry);
    }

    pub fn log_error(&mut self, action: Action, error: impl Into<String>) {
        let entry = ErrorEntry {
            at: OffsetDateTime::now_utc(),
            action,
            error: error.into(),
        };
        error!("{action}: {}", entry.error);
        self.errors.push(entry);
    }

    pub fn activity(&self) -> &[ActivityEntry] {
        &self.activity
    }

    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    pub fn count(&self, status: Status) -> usize {
        self.activity.iter().filter(|e| e.status == status).count()
    }

    pub fn summary(&self) -> String {
        let by_action = self
            .activity
            .iter()
            .counts_by(|e| e.action)
            .into_iter()
            .sorted_by_key(|(action, _)| action.to_string())
            .map(|(action, n)| format!("{action}={n}"))
            .join(", ");
        format!(
            "{} succeeded, {} failed, {} errors ({by_action})",
            self.count(Status::Success),
            self.count(Status::Failed),
            self.errors.len()
        )
    }
}
