//! `agendarc`: flat `key = value` lines
//! with `#` comments, layered over
//! built-in defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace
};

const DEFAULTS: &[(&str, &str)] = &[
  ("data.location", "~/.agenda"),
  ("default.command", "week"),
  ("color", "on"),
  ("agenda.start_hour", "7"),
  ("agenda.end_hour", "19"),
  ("agenda.session_duration", "50"),
  ("agenda.week_start", "monday"),
  ("agenda.floor_step", "10"),
  ("layout.row_height", "60"),
  ("layout.stack_offset", "6")
];

#[derive(Debug, Clone)]
pub struct Config {
  map:              BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      map:          DEFAULTS
        .iter()
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        })
        .collect(),
      loaded_files: vec![]
    }
  }
}

impl Config {
  /// Defaults, then the agendarc named
  /// by `agendarc_override`, `AGENDARC`
  /// or `~/.agendarc`, whichever is found
  /// first.
  #[tracing::instrument(skip(
    agendarc_override
  ))]
  pub fn load(
    agendarc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let Some(path) = locate_agendarc(
      agendarc_override
    ) else {
      debug!(
        "no agendarc found; using \
         defaults"
      );
      return Ok(cfg);
    };

    let path = expand_tilde(&path);
    info!(agendarc = %path.display(), "loading agendarc");
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;
    for (key, value) in
      parse_agendarc(&text, &path)?
    {
      trace!(key = %key, value = %value, "loaded config key");
      cfg.map.insert(key, value);
    }
    cfg.loaded_files.push(path);

    Ok(cfg)
  }

  /// Applies `key=value` overrides in
  /// order; a leading `rc.` is ignored.
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) {
    self.map.insert(
      key.to_string(),
      value.to_string()
    );
  }
}

fn parse_agendarc(
  text: &str,
  path: &Path
) -> anyhow::Result<Vec<(String, String)>>
{
  let mut entries = Vec::new();
  for (line_num, raw_line) in
    text.lines().enumerate()
  {
    let line = raw_line
      .split_once('#')
      .map_or(raw_line, |(before, _)| {
        before
      })
      .trim();
    if line.is_empty() {
      continue;
    }

    let (k, v) = line
      .split_once('=')
      .ok_or_else(|| {
        anyhow!(
          "invalid config line \
           {}:{}: {}",
          path.display(),
          line_num + 1,
          raw_line
        )
      })?;
    entries.push((
      k.trim().to_string(),
      v.trim().to_string()
    ));
  }
  Ok(entries)
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  if let Some(path) = override_dir {
    return Ok(path.to_path_buf());
  }
  if let Some(cfg_value) =
    cfg.get("data.location")
  {
    return Ok(expand_tilde(Path::new(
      &cfg_value
    )));
  }
  dirs::home_dir()
    .map(|home| home.join(".agenda"))
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })
}

fn locate_agendarc(
  override_path: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = override_path {
    return Some(path.to_path_buf());
  }

  if let Ok(agendarc_env) =
    std::env::var("AGENDARC")
  {
    return (agendarc_env != "/dev/null")
      .then(|| {
        PathBuf::from(agendarc_env)
      });
  }

  dirs::home_dir()
    .map(|home| home.join(".agendarc"))
    .filter(|candidate| {
      candidate.exists()
    })
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
