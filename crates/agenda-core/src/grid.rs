//! Week/day grid assembly.
//!
//! Every appointment is projected into the display zone, floored to the
//! configured step and dropped into the `(day, hour)` cell it belongs to.
//! Cells keep source order; the position of an entry within its cell is
//! its horizontal stacking slot.

use std::collections::{
    BTreeMap,
    BTreeSet,
};

use chrono::{
    NaiveDate,
    Weekday,
};
use chrono_tz::Tz;
use tracing::{
    debug,
    trace,
};

use crate::appointment::Appointment;
use crate::bucket::find_hour_slot;
use crate::clock::{
    ClockTime,
    floor_to_step,
    to_local_hhmm,
};
use crate::datetime::start_of_week;
use crate::layout::{
    LayoutRect,
    position_within_hour,
};
use crate::settings::{
    AgendaSettings,
    GridOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Week,
    Day,
}

impl ViewMode {
    pub fn as_key(&self) -> &'static str {
        match self {
            ViewMode::Week => "week",
            ViewMode::Day => "day",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRange {
    pub anchor: NaiveDate,
    pub view_mode: ViewMode,
}

impl VisibleRange {
    pub fn week(anchor: NaiveDate) -> Self {
        Self {
            anchor,
            view_mode: ViewMode::Week,
        }
    }

    pub fn day(anchor: NaiveDate) -> Self {
        Self {
            anchor,
            view_mode: ViewMode::Day,
        }
    }

    /// The consecutive days shown, oldest first. A week at the upper edge
    /// of the calendar is cut short.
    pub fn days(&self, week_start: Weekday) -> Vec<NaiveDate> {
        match self.view_mode {
            ViewMode::Week => start_of_week(self.anchor, week_start)
                .iter_days()
                .take(7)
                .collect(),
            ViewMode::Day => vec![self.anchor],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedAppointment<'a> {
    pub appointment: &'a Appointment,
    pub local_start: ClockTime,
    pub rect: LayoutRect,
}

#[derive(Debug, Clone)]
pub struct WeekGrid<'a> {
    pub days: Vec<NaiveDate>,
    pub hour_slots: Vec<ClockTime>,
    /// Ids of appointments on a visible day that fell outside business
    /// hours. They are not rendered.
    pub omitted: Vec<&'a str>,
    cells: BTreeMap<(NaiveDate, ClockTime), Vec<PlacedAppointment<'a>>>,
}

impl<'a> WeekGrid<'a> {
    pub fn cell(&self, day: NaiveDate, hour_slot: ClockTime) -> &[PlacedAppointment<'a>] {
        self.cells
            .get(&(day, hour_slot))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every placement with its cell key, day-major then by hour.
    pub fn placements(
        &self,
    ) -> impl Iterator<Item = (NaiveDate, ClockTime, &PlacedAppointment<'a>)> {
        self.cells.iter().flat_map(|((day, slot), entries)| {
            entries.iter().map(move |entry| (*day, *slot, entry))
        })
    }

    pub fn placement_count(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }
}

/// Builds the grid for `range` from a snapshot of appointments.
///
/// Pure with respect to its inputs; callers rebuild on every change to the
/// appointment list, the range or the settings.
#[tracing::instrument(
    skip(appointments, settings, tz, options),
    fields(count = appointments.len(), anchor = %range.anchor, view = range.view_mode.as_key())
)]
pub fn assemble_grid<'a>(
    appointments: &'a [Appointment],
    settings: &AgendaSettings,
    range: &VisibleRange,
    tz: &Tz,
    options: &GridOptions,
) -> WeekGrid<'a> {
    let days = range.days(options.week_start);
    let hour_slots = settings.hour_slots();
    let visible_days = days.iter().copied().collect::<BTreeSet<_>>();

    let mut cells = BTreeMap::new();
    for day in &days {
        for slot in &hour_slots {
            cells.insert((*day, *slot), Vec::new());
        }
    }

    let mut omitted = Vec::new();

    for appt in appointments {
        let day = appt.local_date(tz);
        if !visible_days.contains(&day) {
            trace!(id = %appt.id, %day, "appointment outside visible range");
            continue;
        }

        let local_start = to_local_hhmm(appt.start, tz);
        let floored = floor_to_step(local_start, options.floor_step);
        let Some(bucket) = find_hour_slot(floored, &hour_slots) else {
            debug!(
                id = %appt.id,
                %day,
                local_start = %local_start,
                "appointment outside business hours; not rendered"
            );
            omitted.push(appt.id.as_str());
            continue;
        };

        let entries: &mut Vec<PlacedAppointment<'a>> = cells.entry((day, bucket)).or_default();
        let rect = LayoutRect::new(
            position_within_hour(local_start, appt.duration_minutes()),
            entries.len(),
        );
        trace!(
            id = %appt.id,
            %day,
            bucket = %bucket,
            slot = rect.horizontal_slot,
            "placed appointment"
        );
        entries.push(PlacedAppointment {
            appointment: appt,
            local_start,
            rect,
        });
    }

    let grid = WeekGrid {
        days,
        hour_slots,
        omitted,
        cells,
    };
    debug!(
        placed = grid.placement_count(),
        omitted = grid.omitted.len(),
        "assembled grid"
    );
    grid
}

#[cfg(test)]
mod tests {
    use chrono::{
        DateTime,
        Duration,
        TimeZone,
        Utc,
    };

    use super::*;
    use crate::appointment::AppointmentStatus;
    use crate::layout::RowMetrics;

    fn sao_paulo() -> Tz {
        chrono_tz::America::Sao_Paulo
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .expect("valid instant")
    }

    fn appt(id: &str, start: DateTime<Utc>, minutes: i64) -> Appointment {
        Appointment::new(id, start, start + Duration::minutes(minutes))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn hhmm(raw: &str) -> ClockTime {
        raw.parse().expect("valid HH:MM")
    }

    #[test]
    fn week_range_covers_seven_days_from_week_start() {
        let range = VisibleRange::week(date(2024, 3, 6));
        let days = range.days(Weekday::Mon);
        assert_eq!(days.len(), 7);
        assert_eq!(days[0], date(2024, 3, 4));
        assert_eq!(days[6], date(2024, 3, 10));

        assert_eq!(
            VisibleRange::day(date(2024, 3, 6)).days(Weekday::Mon),
            vec![date(2024, 3, 6)]
        );
    }

    #[test]
    fn places_utc_minus_three_appointment_in_nine_oclock_row() {
        let appointments = vec![appt("a", utc(2024, 3, 4, 12, 10), 50)];
        let grid = assemble_grid(
            &appointments,
            &AgendaSettings::default(),
            &VisibleRange::week(date(2024, 3, 4)),
            &sao_paulo(),
            &GridOptions::default(),
        );

        let cell = grid.cell(date(2024, 3, 4), hhmm("09:00"));
        assert_eq!(cell.len(), 1);
        assert_eq!(cell[0].local_start, hhmm("09:10"));
        assert!((cell[0].rect.top_offset - 10.0 / 60.0).abs() < 1e-9);
        assert!((cell[0].rect.height - 50.0 / 60.0).abs() < 1e-9);
        assert_eq!(cell[0].rect.horizontal_slot, 0);
        assert_eq!(grid.placement_count(), 1);
    }

    #[test]
    fn concurrent_appointments_fan_out_in_source_order() {
        // 17:00Z is 14:00 in Sao Paulo.
        let appointments = vec![
            appt("first", utc(2024, 3, 5, 17, 0), 30),
            appt("second", utc(2024, 3, 5, 17, 0), 30),
        ];
        let grid = assemble_grid(
            &appointments,
            &AgendaSettings::default(),
            &VisibleRange::week(date(2024, 3, 5)),
            &sao_paulo(),
            &GridOptions::default(),
        );

        let cell = grid.cell(date(2024, 3, 5), hhmm("14:00"));
        let ids = cell
            .iter()
            .map(|entry| entry.appointment.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(cell[0].rect.horizontal_slot, 0);
        assert_eq!(cell[1].rect.horizontal_slot, 1);

        let metrics = RowMetrics::default();
        let a = metrics.rect_px(&cell[0].rect);
        let b = metrics.rect_px(&cell[1].rect);
        assert_ne!(
            (a.left_inset, a.right_inset),
            (b.left_inset, b.right_inset)
        );
    }

    #[test]
    fn stacking_keeps_insertion_order_not_time_order() {
        let appointments = vec![
            appt("late", utc(2024, 3, 5, 17, 40), 20),
            appt("early", utc(2024, 3, 5, 17, 5), 20),
        ];
        let grid = assemble_grid(
            &appointments,
            &AgendaSettings::default(),
            &VisibleRange::day(date(2024, 3, 5)),
            &sao_paulo(),
            &GridOptions::default(),
        );
        let cell = grid.cell(date(2024, 3, 5), hhmm("14:00"));
        assert_eq!(cell[0].appointment.id, "late");
        assert_eq!(cell[1].appointment.id, "early");
        assert!(cell[0].rect.top_offset > cell[1].rect.top_offset);
    }

    #[test]
    fn early_morning_appointment_is_omitted_without_error() {
        // 09:30Z is 06:30 local, before the 07:00 opening.
        let appointments = vec![appt("dawn", utc(2024, 3, 6, 9, 30), 50)];
        let grid = assemble_grid(
            &appointments,
            &AgendaSettings::default(),
            &VisibleRange::week(date(2024, 3, 6)),
            &sao_paulo(),
            &GridOptions::default(),
        );
        assert_eq!(grid.placement_count(), 0);
        assert_eq!(grid.omitted, vec!["dawn"]);
    }

    #[test]
    fn end_of_hour_start_stays_in_its_literal_hour() {
        let appointments = vec![appt("edge", utc(2024, 3, 6, 11, 59), 50)];
        let grid = assemble_grid(
            &appointments,
            &AgendaSettings::default(),
            &VisibleRange::week(date(2024, 3, 6)),
            &sao_paulo(),
            &GridOptions::default(),
        );
        let cell = grid.cell(date(2024, 3, 6), hhmm("08:00"));
        assert_eq!(cell.len(), 1);
        assert_eq!(cell[0].local_start, hhmm("08:59"));
        assert!((cell[0].rect.top_offset - 59.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn inverted_range_renders_at_minimum_height() {
        let start = utc(2024, 3, 6, 13, 0);
        let mut broken = Appointment::new("broken", start, start - Duration::minutes(30));
        broken.status = AppointmentStatus::Cancelled;
        let appointments = vec![broken];
        let grid = assemble_grid(
            &appointments,
            &AgendaSettings::default(),
            &VisibleRange::week(date(2024, 3, 6)),
            &sao_paulo(),
            &GridOptions::default(),
        );
        let cell = grid.cell(date(2024, 3, 6), hhmm("10:00"));
        assert_eq!(cell.len(), 1);
        assert!((cell[0].rect.height - 10.0 / 60.0).abs() < 1e-9);
        assert!(appointments[0].end < appointments[0].start);
    }

    #[test]
    fn local_date_decides_the_day_column() {
        // 01:30Z on the 7th is 22:30 on the 6th locally.
        let appointments = vec![appt("night", utc(2024, 3, 7, 1, 30), 30)];
        let settings = AgendaSettings {
            start_hour: 7,
            end_hour: 23,
            session_duration_minutes: 50,
        };
        let grid = assemble_grid(
            &appointments,
            &settings,
            &VisibleRange::week(date(2024, 3, 6)),
            &sao_paulo(),
            &GridOptions::default(),
        );
        assert_eq!(grid.cell(date(2024, 3, 6), hhmm("22:00")).len(), 1);
        assert!(grid.cell(date(2024, 3, 7), hhmm("22:00")).is_empty());
    }

    #[test]
    fn appointments_outside_the_week_are_ignored() {
        let appointments = vec![
            appt("before", utc(2024, 3, 3, 13, 0), 30),
            appt("inside", utc(2024, 3, 4, 13, 0), 30),
            appt("after", utc(2024, 3, 11, 13, 0), 30),
        ];
        let grid = assemble_grid(
            &appointments,
            &AgendaSettings::default(),
            &VisibleRange::week(date(2024, 3, 7)),
            &sao_paulo(),
            &GridOptions::default(),
        );
        let placed = grid
            .placements()
            .map(|(_, _, entry)| entry.appointment.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(placed, vec!["inside"]);
        assert!(grid.omitted.is_empty());
    }

    #[test]
    fn every_in_hours_start_lands_in_exactly_one_cell() {
        let settings = AgendaSettings::default();
        let tz = sao_paulo();
        let day = date(2024, 3, 6);
        let mut appointments = Vec::new();
        for hour in 0..24_u32 {
            for minute in [0_u32, 9, 10, 29, 50, 59] {
                let local = day.and_hms_opt(hour, minute, 0).expect("valid local time");
                let start = tz
                    .from_local_datetime(&local)
                    .single()
                    .expect("unambiguous local time")
                    .with_timezone(&Utc);
                appointments.push(appt(&format!("{hour:02}{minute:02}"), start, 25));
            }
        }

        let grid = assemble_grid(
            &appointments,
            &settings,
            &VisibleRange::day(day),
            &tz,
            &GridOptions::default(),
        );

        for entry in &appointments {
            let hour = to_local_hhmm(entry.start, &tz).hour();
            let hits = grid
                .placements()
                .filter(|(_, _, placed)| placed.appointment.id == entry.id)
                .count();
            if (settings.start_hour..settings.end_hour).contains(&hour) {
                assert_eq!(hits, 1, "appointment {} should be placed once", entry.id);
            } else {
                assert_eq!(hits, 0, "appointment {} should be omitted", entry.id);
            }
        }
        assert_eq!(grid.placement_count() + grid.omitted.len(), appointments.len());
    }

    #[test]
    fn reassembly_is_idempotent() {
        let appointments = vec![
            appt("a", utc(2024, 3, 4, 12, 10), 50),
            appt("b", utc(2024, 3, 4, 12, 40), 10),
        ];
        let build = || {
            assemble_grid(
                &appointments,
                &AgendaSettings::default(),
                &VisibleRange::week(date(2024, 3, 4)),
                &sao_paulo(),
                &GridOptions::default(),
            )
            .placements()
            .map(|(day, slot, entry)| (day, slot, entry.appointment.id.clone(), entry.rect))
            .collect::<Vec<_>>()
        };
        assert_eq!(build(), build());
    }
}
