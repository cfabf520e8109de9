use std::fs;

use agenda_core::appointment::resolve_records;
use agenda_core::clock::ClockTime;
use agenda_core::commands::{effective_settings, range_bounds};
use agenda_core::config::Config;
use agenda_core::grid::{VisibleRange, assemble_grid};
use agenda_core::projector::project_end;
use agenda_core::settings::GridOptions;
use agenda_core::source::{AppointmentSource, JsonStore};
use chrono::{NaiveDate, TimeZone, Utc};
use tempfile::tempdir;

fn hhmm(raw: &str) -> ClockTime {
    raw.parse().expect("valid HH:MM")
}

#[test]
fn store_to_grid_end_to_end() {
    let temp = tempdir().expect("tempdir");
    fs::write(
        temp.path().join("appointments.data"),
        concat!(
            r#"{"id":"consult","start":"2024-03-04T12:10:00Z","end":"2024-03-04T13:00:00Z","title":"Consulta","patientName":"Ana"}"#,
            "\n",
            r#"{"id":"pair-a","start":"2024-03-05T17:00:00Z","end":"2024-03-05T17:30:00Z","title":"Retorno"}"#,
            "\n",
            r#"{"id":"pair-b","start":"2024-03-05T17:00:00Z","end":"2024-03-05T17:30:00Z","title":"Avaliação"}"#,
            "\n",
            r#"{"id":"dawn","start":"2024-03-06T09:30:00Z","end":"2024-03-06T10:20:00Z"}"#,
            "\n",
            r#"{"id":"corrupt","start":"2024-13-45T99:00:00Z","end":"2024-03-06T10:20:00Z"}"#,
            "\n",
        ),
    )
    .expect("write appointments");
    fs::write(temp.path().join("agenda.toml"), "startHour = 7\nendHour = 19\n")
        .expect("write settings");

    let tz = chrono_tz::America::Sao_Paulo;
    let store = JsonStore::open(temp.path(), tz).expect("open store");
    let cfg = Config::default();
    let options = GridOptions::default();
    let settings = effective_settings(&store, &cfg).expect("settings");
    assert_eq!(settings.session_duration_minutes, 50);

    let monday = NaiveDate::from_ymd_opt(2024, 3, 4).expect("valid date");
    let range = VisibleRange::week(monday);
    let (from, to) = range_bounds(&range.days(options.week_start), &tz).expect("bounds");
    let records = store.appointments_between(from, to).expect("read appointments");
    assert_eq!(records.len(), 5);

    let appointments = resolve_records(&records, &tz);
    assert_eq!(appointments.len(), 4);

    let grid = assemble_grid(&appointments, &settings, &range, &tz, &options);
    assert_eq!(grid.hour_slots.len(), 12);
    assert_eq!(grid.days.len(), 7);

    let consult = grid.cell(monday, hhmm("09:00"));
    assert_eq!(consult.len(), 1);
    assert_eq!(consult[0].local_start.to_string(), "09:10");
    assert!((consult[0].rect.height - 50.0 / 60.0).abs() < 1e-9);
    assert!((consult[0].rect.top_offset - 10.0 / 60.0).abs() < 1e-9);

    let tuesday = NaiveDate::from_ymd_opt(2024, 3, 5).expect("valid date");
    let pair = grid.cell(tuesday, hhmm("14:00"));
    assert_eq!(pair.len(), 2);
    assert_eq!(pair[0].rect.horizontal_slot, 0);
    assert_eq!(pair[1].rect.horizontal_slot, 1);
    let left = options.metrics.rect_px(&pair[0].rect);
    let right = options.metrics.rect_px(&pair[1].rect);
    assert_ne!(left.left_inset, right.left_inset);

    assert_eq!(grid.omitted, vec!["dawn"]);
    assert_eq!(grid.placement_count(), 3);
}

#[test]
fn narrowing_business_hours_only_hides_from_grid() {
    let tz = chrono_tz::America::Sao_Paulo;
    let start = Utc
        .with_ymd_and_hms(2024, 3, 4, 12, 10, 0)
        .single()
        .expect("valid instant");
    let records = vec![agenda_core::appointment::AppointmentRecord {
        id: "consult".to_string(),
        start: start.to_rfc3339(),
        end: project_end(start, 50).to_rfc3339(),
        title: "Consulta".to_string(),
        patient_name: None,
        status: Default::default(),
    }];
    let appointments = resolve_records(&records, &tz);

    let mut cfg = Config::default();
    cfg.set("agenda.start_hour", "10");
    let settings = agenda_core::settings::AgendaSettings::from_config(&cfg);
    let range = VisibleRange::day(NaiveDate::from_ymd_opt(2024, 3, 4).expect("valid date"));
    let grid = assemble_grid(&appointments, &settings, &range, &tz, &GridOptions::default());

    assert_eq!(grid.placement_count(), 0);
    assert_eq!(grid.omitted, vec!["consult"]);
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].duration_minutes(), 50);
}
