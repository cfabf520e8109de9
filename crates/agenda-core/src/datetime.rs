use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Days,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "agenda-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "AGENDA_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "AGENDA_TIME_CONFIG";
pub const DEFAULT_DISPLAY_TIMEZONE:
  &str = "America/Sao_Paulo";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Resolves the zone every wall-clock
/// projection is made in.
///
/// Precedence: explicit override, the
/// `AGENDA_TIMEZONE` variable, the
/// `agenda-time.toml` file, then the
/// built-in default. An explicit
/// override that does not name a zone
/// is an error. The result is handed to
/// the engine explicitly; nothing below
/// the CLI reads ambient zone state.
pub fn resolve_display_timezone(
  override_id: Option<&str>
) -> anyhow::Result<Tz> {
  if let Some(raw) = override_id {
    return parse_timezone(
      raw,
      "--timezone"
    )
    .ok_or_else(|| {
      anyhow!(
        "invalid --timezone: {raw} \
         (expected an IANA zone id \
         such as America/Sao_Paulo)"
      )
    });
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return Ok(tz);
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return Ok(tz);
  }

  Ok(
    parse_timezone(
      DEFAULT_DISPLAY_TIMEZONE,
      "DEFAULT_DISPLAY_TIMEZONE"
    )
    .unwrap_or_else(|| {
      tracing::error!(
        "failed to parse fallback \
         timezone; using UTC"
      );
      chrono_tz::UTC
    })
  )
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

pub(crate) fn load_timezone_from_file(
  path: &Path
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured display timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Maps a wall-clock value in `tz` to
/// an instant. Gaps are rejected and
/// folds resolve to the earlier
/// instant.
pub fn to_utc_from_local(
  local_naive: NaiveDateTime,
  tz: &Tz,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  match tz
    .from_local_datetime(&local_naive)
  {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      Ok(chosen.with_timezone(&Utc))
    }
    | LocalResult::None => {
      Err(anyhow!(
        "local datetime does not \
         exist in timezone {tz}: \
         {context}"
      ))
    }
  }
}

/// Parses a stored appointment
/// timestamp.
///
/// Zone-qualified forms are absolute;
/// naive forms are read as wall-clock
/// time in `tz`.
pub fn parse_timestamp(
  input: &str,
  tz: &Tz
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  if token.is_empty() {
    return Err(anyhow!(
      "timestamp is empty"
    ));
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  if let Ok(ndt) =
    NaiveDateTime::parse_from_str(
      token,
      "%Y%m%dT%H%M%SZ"
    )
  {
    return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
  }

  for fmt in [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M"
  ] {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return to_utc_from_local(
        ndt, tz, fmt
      );
    }
  }

  Err(anyhow!(
    "unrecognized timestamp: {input}"
  ))
  .with_context(|| {
    "supported formats: RFC3339, \
     YYYYMMDDTHHMMSSZ, \
     YYYY-MM-DDTHH:MM[:SS], \
     YYYY-MM-DD HH:MM[:SS]"
  })
}

#[must_use]
pub fn today_in(
  tz: &Tz,
  now: DateTime<Utc>
) -> NaiveDate {
  now.with_timezone(tz).date_naive()
}

/// Parses the date argument of the
/// `week`/`day` commands relative to
/// today in `tz`.
pub fn parse_date_arg(
  input: &str,
  tz: &Tz,
  now: DateTime<Utc>
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let today = today_in(tz, now);

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return add_days(today, 1);
    }
    | "yesterday" => {
      return add_days(today, -1);
    }
    | _ => {}
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    return next_weekday_date(
      today, target
    );
  }

  if let Some(caps) =
    relative_date_regex()?
      .captures(&lower)
  {
    let num: i64 = caps["num"]
      .parse()
      .context(
        "invalid relative number"
      )?;
    let days = match &caps["unit"] {
      | "w" => num.checked_mul(7),
      | _ => Some(num)
    }
    .ok_or_else(|| {
      anyhow!(
        "relative date out of range: \
         {input}"
      )
    })?;
    let days = if &caps["sign"] == "-"
    {
      -days
    } else {
      days
    };
    return add_days(today, days)
      .with_context(|| {
        format!(
          "relative date out of \
           range: {input}"
        )
      });
  }

  NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized date: {input} \
       (expected today, tomorrow, \
       yesterday, a weekday name, \
       +Nd/-Nd/+Nw/-Nw or \
       YYYY-MM-DD)"
    )
  })
}

fn relative_date_regex()
-> anyhow::Result<&'static Regex> {
  static RELATIVE_RE: OnceLock<
    Result<Regex, regex::Error>
  > = OnceLock::new();
  RELATIVE_RE
    .get_or_init(|| {
      Regex::new(
        r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$"
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

pub fn add_days(
  date: NaiveDate,
  days: i64
) -> anyhow::Result<NaiveDate> {
  Duration::try_days(days)
    .and_then(|delta| {
      date.checked_add_signed(delta)
    })
    .ok_or_else(|| {
      anyhow!(
        "date out of range: {date} \
         {days:+} days"
      )
    })
}

/// First day of the week holding `day`.
/// Clamps to `NaiveDate::MIN` at the
/// lower edge of the calendar.
pub fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_monday();
  let start_idx = week_start
    .num_days_from_monday();
  let diff =
    (7 + day_idx - start_idx) % 7;
  day
    .checked_sub_days(Days::new(
      u64::from(diff)
    ))
    .unwrap_or(NaiveDate::MIN)
}

pub fn parse_week_start(
  raw: &str
) -> Option<Weekday> {
  match raw.trim().to_ascii_lowercase()
    .as_str()
  {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> anyhow::Result<NaiveDate> {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  add_days(from, delta)
}
