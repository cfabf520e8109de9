use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::appointment::AppointmentStatus;
use crate::config::Config;
use crate::grid::{PlacedAppointment, WeekGrid};
use crate::layout::RowMetrics;
use crate::settings::{AgendaSettings, GridOptions};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, out, grid, metrics))]
    pub fn write_grid<W: Write>(
        &self,
        mut out: W,
        grid: &WeekGrid<'_>,
        metrics: &RowMetrics,
    ) -> anyhow::Result<()> {
        let mut headers = vec!["Time".to_string()];
        headers.extend(grid.days.iter().map(|day| day.format("%a %d/%m").to_string()));

        let mut rows = Vec::with_capacity(grid.hour_slots.len());
        for slot in &grid.hour_slots {
            let mut row = vec![self.paint(&slot.to_string(), "33")];
            for day in &grid.days {
                let cell = grid
                    .cell(*day, *slot)
                    .iter()
                    .map(|entry| self.format_entry(entry))
                    .collect::<Vec<_>>()
                    .join(" | ");
                row.push(cell);
            }
            rows.push(row);
        }

        write_table(&mut out, headers, rows)?;

        if grid.placement_count() > 0 {
            writeln!(out)?;
            for (day, slot, entry) in grid.placements() {
                let px = metrics.rect_px(&entry.rect);
                writeln!(
                    out,
                    "{} {} {:<24} top={:.1}px height={:.1}px inset={:.0}px",
                    day.format("%Y-%m-%d"),
                    slot,
                    entry.appointment.id,
                    px.top,
                    px.height,
                    px.left_inset,
                )?;
            }
        }

        if !grid.omitted.is_empty() {
            writeln!(out)?;
            writeln!(
                out,
                "{} outside business hours: {}",
                grid.omitted.len(),
                grid.omitted.join(", ")
            )?;
        }

        Ok(())
    }

    pub fn print_grid(&self, grid: &WeekGrid<'_>, metrics: &RowMetrics) -> anyhow::Result<()> {
        self.write_grid(io::stdout().lock(), grid, metrics)
    }

    pub fn print_settings(
        &self,
        settings: &AgendaSettings,
        options: &GridOptions,
        tz: &Tz,
        cfg: &Config,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "timezone          {tz}")?;
        writeln!(out, "start_hour        {}", settings.start_hour)?;
        writeln!(out, "end_hour          {}", settings.end_hour)?;
        writeln!(out, "session_duration  {}", settings.session_duration_minutes)?;
        writeln!(out, "week_start        {:?}", options.week_start)?;
        writeln!(out, "floor_step        {}", options.floor_step)?;
        writeln!(out, "row_height        {}", options.metrics.row_height_px)?;
        writeln!(out, "stack_offset      {}", options.metrics.stack_offset_px)?;
        for file in &cfg.loaded_files {
            writeln!(out, "loaded            {}", file.display())?;
        }
        Ok(())
    }

    fn format_entry(&self, entry: &PlacedAppointment<'_>) -> String {
        let label = entry.appointment.display_label();
        let text = if label.is_empty() {
            format!("{} {}", entry.local_start, entry.appointment.id)
        } else {
            format!("{} {}", entry.local_start, label)
        };
        match entry.appointment.status {
            AppointmentStatus::Scheduled => text,
            AppointmentStatus::Completed => self.paint(&text, "32"),
            AppointmentStatus::NoShow => self.paint(&text, "31"),
            AppointmentStatus::Cancelled => self.paint(&text, "90"),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
