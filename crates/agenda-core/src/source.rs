use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::appointment::AppointmentRecord;
use crate::settings::RawAgendaSettings;

/// Read side of the appointment persistence layer. Implementations return
/// the owner-scoped records that may fall inside `[from, to)`.
pub trait AppointmentSource {
    fn appointments_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AppointmentRecord>>;
}

/// Read side of the agenda settings store. `None` means nothing is stored.
pub trait SettingsSource {
    fn agenda_settings(&self) -> anyhow::Result<Option<RawAgendaSettings>>;
}

/// File-backed collaborator: `appointments.data` (one JSON record per line)
/// and `agenda.toml` under a data directory.
#[derive(Debug)]
pub struct JsonStore {
    pub data_dir: PathBuf,
    pub appointments_path: PathBuf,
    pub settings_path: PathBuf,
    timezone: Tz,
}

impl JsonStore {
    #[tracing::instrument(skip(data_dir, timezone))]
    pub fn open(data_dir: &Path, timezone: Tz) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        if !data_dir.is_dir() {
            warn!(data_dir = %data_dir.display(), "data directory does not exist; agenda will be empty");
        }

        let appointments_path = data_dir.join("appointments.data");
        let settings_path = data_dir.join("agenda.toml");

        info!(
            data_dir = %data_dir.display(),
            appointments = %appointments_path.display(),
            settings = %settings_path.display(),
            "opened agenda store"
        );

        Ok(Self {
            data_dir,
            appointments_path,
            settings_path,
            timezone,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_records(&self) -> anyhow::Result<Vec<AppointmentRecord>> {
        if !self.appointments_path.exists() {
            debug!(file = %self.appointments_path.display(), "no appointments file");
            return Ok(vec![]);
        }
        load_jsonl(&self.appointments_path).context("failed to load appointments.data")
    }
}

impl AppointmentSource for JsonStore {
    #[tracing::instrument(skip(self))]
    fn appointments_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<AppointmentRecord>> {
        let records = self.load_records()?;
        let total = records.len();
        // Unreadable records are passed through so the caller can log and
        // drop them in one place.
        let kept = records
            .into_iter()
            .filter(|record| match record.resolve(&self.timezone) {
                Ok(appt) => appt.start < to && appt.end.max(appt.start) >= from,
                Err(_) => true,
            })
            .collect::<Vec<_>>();
        debug!(total, kept = kept.len(), "filtered appointments to window");
        Ok(kept)
    }
}

impl SettingsSource for JsonStore {
    #[tracing::instrument(skip(self))]
    fn agenda_settings(&self) -> anyhow::Result<Option<RawAgendaSettings>> {
        if !self.settings_path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("failed reading {}", self.settings_path.display()))?;
        match toml::from_str::<RawAgendaSettings>(&raw) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(err) => {
                warn!(
                    file = %self.settings_path.display(),
                    error = %err,
                    "unreadable agenda settings; using defaults"
                );
                Ok(None)
            }
        }
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<AppointmentRecord>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<AppointmentRecord>(trimmed) {
            Ok(record) => out.push(record),
            Err(err) => warn!(
                file = %path.display(),
                line = idx + 1,
                error = %err,
                "skipping malformed appointment line"
            ),
        }
    }

    debug!(count = out.len(), "loaded appointments from jsonl");
    Ok(out)
}
