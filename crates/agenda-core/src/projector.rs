use anyhow::anyhow;
use chrono::{
    DateTime,
    Duration,
    Utc,
};
use tracing::debug;

/// `start` plus exactly `duration_minutes`.
#[must_use]
pub fn project_end(start: DateTime<Utc>, duration_minutes: u32) -> DateTime<Utc> {
    start + Duration::minutes(i64::from(duration_minutes))
}

/// Date/time step of the appointment creation wizard.
///
/// The end follows the start by the configured session length until the
/// user edits the end directly. From then on start changes leave the end
/// alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    session_minutes: u32,
    end_pinned: bool,
}

impl SessionWindow {
    pub fn new(start: DateTime<Utc>, session_minutes: u32) -> Self {
        Self {
            start,
            end: project_end(start, session_minutes),
            session_minutes,
            end_pinned: false,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn is_end_pinned(&self) -> bool {
        self.end_pinned
    }

    pub fn set_start(&mut self, start: DateTime<Utc>) {
        self.start = start;
        if self.end_pinned {
            debug!(start = %start, end = %self.end, "end pinned by user; not re-projecting");
            return;
        }
        self.end = project_end(start, self.session_minutes);
        debug!(start = %start, end = %self.end, "re-projected session end");
    }

    pub fn set_end(&mut self, end: DateTime<Utc>) {
        self.end = end;
        self.end_pinned = true;
    }

    /// Drops a user-chosen end and goes back to following the start.
    pub fn unpin_end(&mut self) {
        self.end_pinned = false;
        self.end = project_end(self.start, self.session_minutes);
    }

    /// Settings changed elsewhere. Only an unpinned end moves.
    pub fn set_session_minutes(&mut self, session_minutes: u32) {
        self.session_minutes = session_minutes;
        if !self.end_pinned {
            self.end = project_end(self.start, session_minutes);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.end <= self.start {
            return Err(anyhow!(
                "appointment must end after it starts (start {}, end {})",
                self.start.to_rfc3339(),
                self.end.to_rfc3339()
            ));
        }
        Ok(())
    }
}
