use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument};

use crate::appointment::resolve_records;
use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::{add_days, parse_date_arg, parse_timestamp, to_utc_from_local, today_in};
use crate::grid::{VisibleRange, assemble_grid};
use crate::projector::SessionWindow;
use crate::render::Renderer;
use crate::settings::{AgendaSettings, GridOptions};
use crate::source::{AppointmentSource, SettingsSource};

pub fn known_command_names() -> Vec<&'static str> {
    vec!["week", "day", "slots", "project", "show", "help", "version"]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Everything a command needs besides its arguments.
pub struct CommandContext<'a, S> {
    pub store: &'a S,
    pub cfg: &'a Config,
    pub renderer: &'a Renderer,
    pub tz: Tz,
    pub now: DateTime<Utc>,
}

#[instrument(skip(ctx, inv), fields(command = %inv.command))]
pub fn dispatch<S>(ctx: &CommandContext<'_, S>, inv: Invocation) -> anyhow::Result<()>
where
    S: AppointmentSource + SettingsSource,
{
    debug!(args = ?inv.command_args, "dispatching command");

    match inv.command.as_str() {
        "week" => cmd_grid(ctx, &inv.command_args, false),
        "day" => cmd_grid(ctx, &inv.command_args, true),
        "slots" => cmd_slots(ctx),
        "project" => cmd_project(ctx, &inv.command_args),
        "show" => cmd_show(ctx),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Stored settings win; the agendarc values (themselves defaulted) fill
/// in when the store has none.
pub fn effective_settings<S: SettingsSource>(
    store: &S,
    cfg: &Config,
) -> anyhow::Result<AgendaSettings> {
    let stored = store.agenda_settings()?;
    Ok(match stored {
        Some(raw) => AgendaSettings::sanitize(&raw),
        None => AgendaSettings::from_config(cfg),
    })
}

/// UTC bounds of the visible days: local midnight of the first day up to
/// local midnight after the last.
pub fn range_bounds(
    days: &[NaiveDate],
    tz: &Tz,
) -> anyhow::Result<(DateTime<Utc>, DateTime<Utc>)> {
    let (Some(first), Some(last)) = (days.first(), days.last()) else {
        return Err(anyhow!("visible range has no days"));
    };
    let from = local_midnight(*first, tz)?;
    let to = local_midnight(add_days(*last, 1)?, tz)?;
    Ok((from, to))
}

fn local_midnight(day: NaiveDate, tz: &Tz) -> anyhow::Result<DateTime<Utc>> {
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("failed to construct midnight for {day}"))?;
    match to_utc_from_local(midnight, tz, "range-bound") {
        Ok(instant) => Ok(instant),
        // Zones that shift at midnight have no 00:00; 01:00 is the first
        // wall-clock minute of that day.
        Err(_) => {
            let one_am = day
                .and_hms_opt(1, 0, 0)
                .ok_or_else(|| anyhow!("failed to construct 01:00 for {day}"))?;
            to_utc_from_local(one_am, tz, "range-bound")
        }
    }
}

#[instrument(skip(ctx, args))]
fn cmd_grid<S>(ctx: &CommandContext<'_, S>, args: &[String], single_day: bool) -> anyhow::Result<()>
where
    S: AppointmentSource + SettingsSource,
{
    let anchor = match args.first() {
        Some(raw) => parse_date_arg(raw, &ctx.tz, ctx.now)?,
        None => today_in(&ctx.tz, ctx.now),
    };
    let range = if single_day {
        VisibleRange::day(anchor)
    } else {
        VisibleRange::week(anchor)
    };

    let options = GridOptions::from_config(ctx.cfg);
    let settings = effective_settings(ctx.store, ctx.cfg)?;
    let (from, to) = range_bounds(&range.days(options.week_start), &ctx.tz)?;

    let records = ctx
        .store
        .appointments_between(from, to)
        .context("failed to read appointments")?;
    let appointments = resolve_records(&records, &ctx.tz);

    let grid = assemble_grid(&appointments, &settings, &range, &ctx.tz, &options);
    info!(
        placed = grid.placement_count(),
        omitted = grid.omitted.len(),
        "rendering grid"
    );
    ctx.renderer.print_grid(&grid, &options.metrics)
}

fn cmd_slots<S: SettingsSource>(ctx: &CommandContext<'_, S>) -> anyhow::Result<()> {
    let settings = effective_settings(ctx.store, ctx.cfg)?;
    for slot in settings.hour_slots() {
        println!("{slot}");
    }
    Ok(())
}

#[instrument(skip(ctx, args))]
fn cmd_project<S: SettingsSource>(ctx: &CommandContext<'_, S>, args: &[String]) -> anyhow::Result<()> {
    let raw_start = args
        .first()
        .ok_or_else(|| anyhow!("usage: project START [MINUTES]"))?;
    let start = parse_timestamp(raw_start, &ctx.tz)?;

    let minutes = match args.get(1) {
        Some(raw) => {
            let value: u32 = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid session length: {raw}"))?;
            if value == 0 {
                return Err(anyhow!("session length must be positive"));
            }
            value
        }
        None => effective_settings(ctx.store, ctx.cfg)?.session_duration_minutes,
    };

    let window = SessionWindow::new(start, minutes);
    window.validate()?;

    println!(
        "{} -> {} ({minutes} min)",
        window.start().with_timezone(&ctx.tz).format("%Y-%m-%d %H:%M"),
        window.end().with_timezone(&ctx.tz).format("%Y-%m-%d %H:%M"),
    );
    println!("{}", window.end().to_rfc3339());
    Ok(())
}

fn cmd_show<S: SettingsSource>(ctx: &CommandContext<'_, S>) -> anyhow::Result<()> {
    let settings = effective_settings(ctx.store, ctx.cfg)?;
    let options = GridOptions::from_config(ctx.cfg);
    ctx.renderer
        .print_settings(&settings, &options, &ctx.tz, ctx.cfg)
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "usage: agenda [OPTIONS] [COMMAND] [ARGS]\n\n\
         commands:\n  \
         week [DATE]              week grid containing DATE (default today)\n  \
         day [DATE]               single-day grid\n  \
         slots                    hour-row labels\n  \
         project START [MINUTES]  end of a session starting at START\n  \
         show                     effective settings\n  \
         version                  print version\n\n\
         DATE: today, tomorrow, yesterday, weekday name, +Nd/-Nd/+Nw/-Nw, YYYY-MM-DD\n\
         overrides: rc.KEY=VALUE or --rc KEY=VALUE"
    );
    Ok(())
}
