use chrono::Weekday;
use serde::{
  Deserialize,
  Serialize
};

use crate::clock::{
  ClockTime,
  generate_hour_slots
};
use crate::config::Config;
use crate::datetime::parse_week_start;
use crate::layout::{
  DEFAULT_ROW_HEIGHT_PX,
  DEFAULT_STACK_OFFSET_PX,
  RowMetrics
};

pub const DEFAULT_START_HOUR: u32 = 7;
pub const DEFAULT_END_HOUR: u32 = 19;
pub const DEFAULT_SESSION_MINUTES: u32 =
  50;
pub const DEFAULT_FLOOR_STEP: u32 = 10;

/// Business-hours window and default
/// session length, always valid once
/// constructed through
/// [`AgendaSettings::sanitize`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize
)]
pub struct AgendaSettings {
  pub start_hour: u32,
  pub end_hour: u32,
  pub session_duration_minutes: u32
}

impl Default for AgendaSettings {
  fn default() -> Self {
    Self {
      start_hour: DEFAULT_START_HOUR,
      end_hour: DEFAULT_END_HOUR,
      session_duration_minutes:
        DEFAULT_SESSION_MINUTES
    }
  }
}

/// Settings exactly as a collaborator
/// stored them; any field may be absent
/// or out of range.
#[derive(
  Debug, Clone, Default, Deserialize,
)]
pub struct RawAgendaSettings {
  #[serde(default, alias = "startHour")]
  pub start_hour: Option<i64>,
  #[serde(default, alias = "endHour")]
  pub end_hour: Option<i64>,
  #[serde(
    default,
    alias = "sessionDurationMinutes",
    alias = "session_duration"
  )]
  pub session_duration_minutes:
    Option<i64>
}

impl AgendaSettings {
  /// Replaces anything unusable with
  /// the defaults. Never fails.
  pub fn sanitize(
    raw: &RawAgendaSettings
  ) -> Self {
    let defaults = Self::default();

    let start_hour = hour_or(
      raw.start_hour,
      defaults.start_hour,
      "start_hour"
    );
    let end_hour = hour_or(
      raw.end_hour,
      defaults.end_hour,
      "end_hour"
    );
    let (start_hour, end_hour) =
      if start_hour < end_hour {
        (start_hour, end_hour)
      } else {
        tracing::warn!(
          start_hour,
          end_hour,
          "business hours window is \
           empty or inverted; using \
           defaults"
        );
        (
          defaults.start_hour,
          defaults.end_hour
        )
      };

    let session_duration_minutes =
      match raw.session_duration_minutes
      {
        | None => {
          defaults
            .session_duration_minutes
        }
        | Some(value) if value > 0 => {
          u32::try_from(value)
            .unwrap_or(
              defaults
                .session_duration_minutes
            )
        }
        | Some(value) => {
          tracing::warn!(
            value,
            "session duration must be \
             positive; using default"
          );
          defaults
            .session_duration_minutes
        }
      };

    Self {
      start_hour,
      end_hour,
      session_duration_minutes
    }
  }

  /// `None` means the collaborator had
  /// no settings at all.
  pub fn or_default(
    raw: Option<&RawAgendaSettings>
  ) -> Self {
    raw
      .map(Self::sanitize)
      .unwrap_or_default()
  }

  pub fn from_config(
    cfg: &Config
  ) -> Self {
    Self::sanitize(&RawAgendaSettings {
      start_hour: config_int(
        cfg,
        "agenda.start_hour"
      ),
      end_hour: config_int(
        cfg,
        "agenda.end_hour"
      ),
      session_duration_minutes:
        config_int(
          cfg,
          "agenda.session_duration"
        )
    })
  }

  pub fn hour_slots(
    &self
  ) -> Vec<ClockTime> {
    generate_hour_slots(
      self.start_hour,
      self.end_hour
    )
  }
}

fn hour_or(
  value: Option<i64>,
  fallback: u32,
  field: &str
) -> u32 {
  match value {
    | None => fallback,
    | Some(hour) if (0..=23)
      .contains(&hour) =>
    {
      hour as u32
    }
    | Some(hour) => {
      tracing::warn!(
        field,
        hour,
        "hour outside 0..=23; using \
         default"
      );
      fallback
    }
  }
}

fn config_int(
  cfg: &Config,
  key: &str
) -> Option<i64> {
  let raw = cfg.get(key)?;
  match raw.trim().parse::<i64>() {
    | Ok(value) => Some(value),
    | Err(err) => {
      tracing::warn!(
        key,
        value = %raw,
        error = %err,
        "ignoring non-numeric setting"
      );
      None
    }
  }
}

fn config_f64(
  cfg: &Config,
  key: &str,
  fallback: f64
) -> f64 {
  let Some(raw) = cfg.get(key) else {
    return fallback;
  };
  match raw.trim().parse::<f64>() {
    | Ok(value)
      if value.is_finite()
        && value >= 0.0 =>
    {
      value
    }
    | _ => {
      tracing::warn!(
        key,
        value = %raw,
        "ignoring invalid layout \
         setting"
      );
      fallback
    }
  }
}

/// Presentation knobs for the grid that
/// are not part of the stored agenda
/// settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridOptions {
  pub week_start: Weekday,
  pub floor_step: u32,
  pub metrics:    RowMetrics
}

impl Default for GridOptions {
  fn default() -> Self {
    Self {
      week_start: Weekday::Mon,
      floor_step: DEFAULT_FLOOR_STEP,
      metrics:    RowMetrics::default()
    }
  }
}

impl GridOptions {
  pub fn from_config(
    cfg: &Config
  ) -> Self {
    let week_start = cfg
      .get("agenda.week_start")
      .and_then(|raw| {
        let parsed =
          parse_week_start(&raw);
        if parsed.is_none() {
          tracing::warn!(
            value = %raw,
            "week start must be monday \
             or sunday; using monday"
          );
        }
        parsed
      })
      .unwrap_or(Weekday::Mon);

    let floor_step =
      match config_int(
        cfg,
        "agenda.floor_step"
      ) {
        | Some(step)
          if (1..=60).contains(&step) =>
        {
          step as u32
        }
        | Some(step) => {
          tracing::warn!(
            step,
            "floor step outside 1..=60; \
             using default"
          );
          DEFAULT_FLOOR_STEP
        }
        | None => DEFAULT_FLOOR_STEP
      };

    Self {
      week_start,
      floor_step,
      metrics: RowMetrics {
        row_height_px:   config_f64(
          cfg,
          "layout.row_height",
          DEFAULT_ROW_HEIGHT_PX
        ),
        stack_offset_px: config_f64(
          cfg,
          "layout.stack_offset",
          DEFAULT_STACK_OFFSET_PX
        )
      }
    }
  }
}
