use crate::clock::ClockTime;

/// Finds the row whose hour matches
/// `floored`. `None` means the time is
/// outside the visible business hours.
#[must_use]
pub fn find_hour_slot(
  floored: ClockTime,
  hour_slots: &[ClockTime]
) -> Option<ClockTime> {
  hour_slots
    .iter()
    .copied()
    .find(|slot| {
      slot.hour() == floored.hour()
    })
}

#[cfg(test)]
mod tests {
  use super::find_hour_slot;
  use crate::clock::{
    ClockTime,
    generate_hour_slots
  };

  fn hhmm(raw: &str) -> ClockTime {
    raw.parse().expect("valid HH:MM")
  }

  #[test]
  fn matches_on_hour_component() {
    let slots = generate_hour_slots(7, 19);
    assert_eq!(
      find_hour_slot(hhmm("09:10"), &slots),
      Some(hhmm("09:00"))
    );
    assert_eq!(
      find_hour_slot(hhmm("08:50"), &slots),
      Some(hhmm("08:00"))
    );
    assert_eq!(
      find_hour_slot(hhmm("18:50"), &slots),
      Some(hhmm("18:00"))
    );
  }

  #[test]
  fn misses_outside_window() {
    let slots = generate_hour_slots(7, 19);
    assert_eq!(
      find_hour_slot(hhmm("06:30"), &slots),
      None
    );
    assert_eq!(
      find_hour_slot(hhmm("19:00"), &slots),
      None
    );
    assert_eq!(
      find_hour_slot(hhmm("09:00"), &[]),
      None
    );
  }
}
