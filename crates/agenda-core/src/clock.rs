//! Wall-clock helpers used to place
//! appointments on the hour grid.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Timelike,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;

/// A local `HH:MM` time of day.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash
)]
pub struct ClockTime {
  hour:   u32,
  minute: u32
}

impl ClockTime {
  pub fn new(
    hour: u32,
    minute: u32
  ) -> Option<Self> {
    (hour < 24 && minute < 60)
      .then_some(Self { hour, minute })
  }

  pub fn on_the_hour(
    hour: u32
  ) -> Option<Self> {
    Self::new(hour, 0)
  }

  pub fn hour(&self) -> u32 {
    self.hour
  }

  pub fn minute(&self) -> u32 {
    self.minute
  }
}

impl fmt::Display for ClockTime {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{:02}:{:02}",
      self.hour, self.minute
    )
  }
}

impl FromStr for ClockTime {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let caps = clock_regex()?
      .captures(s.trim())
      .ok_or_else(|| {
        anyhow!(
          "expected HH:MM, got: {s}"
        )
      })?;

    let hour: u32 =
      caps["hour"].parse()?;
    let minute: u32 =
      caps["minute"].parse()?;
    Self::new(hour, minute).ok_or_else(
      || {
        anyhow!(
          "clock time out of range: {s}"
        )
      }
    )
  }
}

fn clock_regex()
-> anyhow::Result<&'static Regex> {
  static CLOCK_RE: OnceLock<
    Result<Regex, regex::Error>
  > = OnceLock::new();
  CLOCK_RE
    .get_or_init(|| {
      Regex::new(
        r"^(?P<hour>\d{1,2}):(?P<minute>\d{2})$"
      )
    })
    .as_ref()
    .map_err(|e| {
      anyhow!(
        "internal regex compile \
         failure: {e}"
      )
    })
}

/// Wall-clock time of `timestamp` as
/// seen in `tz`.
#[must_use]
pub fn to_local_hhmm(
  timestamp: DateTime<Utc>,
  tz: &Tz
) -> ClockTime {
  let local = timestamp.with_timezone(tz);
  ClockTime {
    hour:   local.hour(),
    minute: local.minute()
  }
}

/// Rounds the minute down to a multiple
/// of `step_minutes`. The hour never
/// changes.
#[must_use]
pub fn floor_to_step(
  time: ClockTime,
  step_minutes: u32
) -> ClockTime {
  let step = step_minutes.max(1);
  ClockTime {
    hour:   time.hour,
    minute: time.minute
      - time.minute % step
  }
}

/// One label per hour in
/// `[start_hour, end_hour)`.
#[must_use]
pub fn generate_hour_slots(
  start_hour: u32,
  end_hour: u32
) -> Vec<ClockTime> {
  (start_hour..end_hour.min(24))
    .filter_map(ClockTime::on_the_hour)
    .collect()
}
