pub mod appointment;
pub mod bucket;
pub mod cli;
pub mod clock;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod grid;
pub mod layout;
pub mod projector;
pub mod render;
pub mod settings;
pub mod source;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args);
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting agenda CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.agendarc.as_deref()
  )?;
  cfg.apply_overrides(
    pre
      .rc_overrides
      .into_iter()
      .chain(cli.rc_overrides)
  );

  let tz = datetime::resolve_display_timezone(
    cli.timezone.as_deref()
  )?;
  info!(timezone = %tz, "resolved display timezone");

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store = source::JsonStore::open(
    &data_dir, tz
  )
  .with_context(|| {
    format!(
      "failed to open agenda store at \
       {}",
      data_dir.display()
    )
  })?;

  let renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  let ctx = commands::CommandContext {
    store: &store,
    cfg: &cfg,
    renderer: &renderer,
    tz,
    now: Utc::now()
  };
  commands::dispatch(&ctx, inv)?;

  info!("done");
  Ok(())
}
