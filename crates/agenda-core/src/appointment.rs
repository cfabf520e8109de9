use anyhow::{
    Context,
    anyhow,
};
use chrono::{
    DateTime,
    NaiveDate,
    Utc,
};
use chrono_tz::Tz;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::warn;

use crate::datetime::parse_timestamp;
use crate::layout::duration_minutes_between;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
    NoShow,
    Cancelled,
}

/// An appointment as handed over by the persistence layer, timestamps
/// still in their stored text form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub id: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "patientName")]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appointment {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub title: String,
    pub patient_name: Option<String>,
    pub status: AppointmentStatus,
}

impl Appointment {
    pub fn new(id: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            start,
            end,
            title: String::new(),
            patient_name: None,
            status: AppointmentStatus::Scheduled,
        }
    }

    /// Length used for layout. Inverted ranges count as zero minutes.
    pub fn duration_minutes(&self) -> u32 {
        duration_minutes_between(self.start, self.end)
    }

    pub fn is_inverted(&self) -> bool {
        self.start >= self.end
    }

    pub fn local_date(&self, tz: &Tz) -> NaiveDate {
        self.start.with_timezone(tz).date_naive()
    }

    pub fn display_label(&self) -> String {
        match self.patient_name.as_deref() {
            Some(name) if !name.trim().is_empty() && !self.title.is_empty() => {
                format!("{} ({name})", self.title)
            }
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => self.title.clone(),
        }
    }
}

impl AppointmentRecord {
    pub fn resolve(&self, tz: &Tz) -> anyhow::Result<Appointment> {
        if self.id.trim().is_empty() {
            return Err(anyhow!("appointment record has an empty id"));
        }
        let start = parse_timestamp(&self.start, tz)
            .with_context(|| format!("appointment {}: invalid start", self.id))?;
        let end = parse_timestamp(&self.end, tz)
            .with_context(|| format!("appointment {}: invalid end", self.id))?;

        Ok(Appointment {
            id: self.id.clone(),
            start,
            end,
            title: self.title.clone(),
            patient_name: self.patient_name.clone(),
            status: self.status,
        })
    }
}

/// Resolves every record, dropping the ones whose timestamps cannot be
/// read. One bad record never hides the rest.
#[tracing::instrument(skip(records, tz), fields(count = records.len()))]
pub fn resolve_records(records: &[AppointmentRecord], tz: &Tz) -> Vec<Appointment> {
    records
        .iter()
        .filter_map(|record| match record.resolve(tz) {
            Ok(appt) => {
                if appt.is_inverted() {
                    warn!(
                        id = %appt.id,
                        start = %appt.start,
                        end = %appt.end,
                        "appointment does not end after it starts"
                    );
                }
                Some(appt)
            }
            Err(err) => {
                warn!(id = %record.id, error = %format!("{err:#}"), "skipping unreadable appointment");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, start: &str, end: &str) -> AppointmentRecord {
        AppointmentRecord {
            id: id.to_string(),
            start: start.to_string(),
            end: end.to_string(),
            title: "Consulta".to_string(),
            patient_name: None,
            status: AppointmentStatus::Scheduled,
        }
    }

    #[test]
    fn bad_record_is_skipped_not_fatal() {
        let tz = chrono_tz::America::Sao_Paulo;
        let records = vec![
            record("a", "2024-03-04T12:10:00Z", "2024-03-04T13:00:00Z"),
            record("b", "yesterday-ish", "2024-03-04T13:00:00Z"),
            record("c", "2024-03-04T14:00:00Z", "garbage"),
            record("d", "2024-03-05T12:00:00Z", "2024-03-05T12:30:00Z"),
        ];

        let resolved = resolve_records(&records, &tz);
        let ids = resolved.iter().map(|a| a.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "d"]);
        assert_eq!(resolved[0].duration_minutes(), 50);
    }

    #[test]
    fn inverted_record_still_resolves() {
        let tz = chrono_tz::UTC;
        let appt = record("x", "2024-03-04T12:00:00Z", "2024-03-04T11:00:00Z")
            .resolve(&tz)
            .expect("inverted range is not a parse failure");
        assert!(appt.is_inverted());
        assert_eq!(appt.duration_minutes(), 0);

        let resolved = resolve_records(
            &[
                record("x", "2024-03-04T12:00:00Z", "2024-03-04T11:00:00Z"),
                record("y", "2024-03-04T12:00:00Z", "2024-03-04T12:50:00Z"),
            ],
            &tz,
        );
        assert_eq!(resolved.len(), 2);
        assert!(resolved[0].is_inverted());
        assert!(!resolved[1].is_inverted());
    }

    #[test]
    fn deserializes_backend_shape() {
        let raw = r#"{
            "id": "apt-1",
            "start": "2024-03-04T12:10:00Z",
            "end": "2024-03-04T13:00:00Z",
            "title": "Retorno",
            "patientName": "Ana",
            "status": "no_show"
        }"#;
        let parsed: AppointmentRecord = serde_json::from_str(raw).expect("parse record");
        assert_eq!(parsed.status, AppointmentStatus::NoShow);
        assert_eq!(parsed.patient_name.as_deref(), Some("Ana"));

        let appt = parsed.resolve(&chrono_tz::UTC).expect("resolve");
        assert_eq!(appt.display_label(), "Retorno (Ana)");
    }
}
