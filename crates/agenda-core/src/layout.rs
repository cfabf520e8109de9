//! Vertical placement of an appointment
//! inside its hour row, plus the
//! horizontal fan-out used when several
//! entries share a cell.
//!
//! Offsets are fractions of one row:
//! `0.0` is the top edge, `1.0` the
//! next row's top edge. A height above
//! `1.0` spills into the rows below.

use chrono::{
  DateTime,
  Utc
};
use serde::Serialize;

use crate::clock::ClockTime;

pub const MIN_RENDERABLE_MINUTES: u32 =
  10;
pub const DEFAULT_ROW_HEIGHT_PX: f64 =
  60.0;
pub const DEFAULT_STACK_OFFSET_PX: f64 =
  6.0;

const MINUTES_PER_HOUR: f64 = 60.0;

#[derive(
  Debug, Clone, Copy, PartialEq, Serialize,
)]
pub struct HourPosition {
  pub top_offset: f64,
  pub height:     f64
}

#[derive(
  Debug, Clone, Copy, PartialEq, Serialize,
)]
pub struct LayoutRect {
  pub top_offset:      f64,
  pub height:          f64,
  pub horizontal_slot: usize
}

impl LayoutRect {
  pub fn new(
    position: HourPosition,
    horizontal_slot: usize
  ) -> Self {
    Self {
      top_offset: position.top_offset,
      height: position.height,
      horizontal_slot
    }
  }
}

/// Places a block starting at
/// `local_start` lasting
/// `duration_minutes` within its row.
/// Durations shorter than
/// [`MIN_RENDERABLE_MINUTES`] render at
/// that minimum.
#[must_use]
pub fn position_within_hour(
  local_start: ClockTime,
  duration_minutes: u32
) -> HourPosition {
  let visible_minutes = duration_minutes
    .max(MIN_RENDERABLE_MINUTES);
  HourPosition {
    top_offset: f64::from(
      local_start.minute()
    ) / MINUTES_PER_HOUR,
    height:     f64::from(
      visible_minutes
    ) / MINUTES_PER_HOUR
  }
}

/// Whole minutes between `start` and
/// `end`, rounded to nearest. An
/// inverted range counts as zero.
#[must_use]
pub fn duration_minutes_between(
  start: DateTime<Utc>,
  end: DateTime<Utc>
) -> u32 {
  let secs = (end - start).num_seconds();
  if secs <= 0 {
    return 0;
  }
  u32::try_from((secs + 30) / 60)
    .unwrap_or(u32::MAX)
}

/// Pixel geometry for one rendered
/// block.
#[derive(
  Debug, Clone, Copy, PartialEq, Serialize,
)]
pub struct PixelRect {
  pub top:         f64,
  pub height:      f64,
  pub left_inset:  f64,
  pub right_inset: f64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowMetrics {
  pub row_height_px:   f64,
  pub stack_offset_px: f64
}

impl Default for RowMetrics {
  fn default() -> Self {
    Self {
      row_height_px:   DEFAULT_ROW_HEIGHT_PX,
      stack_offset_px:
        DEFAULT_STACK_OFFSET_PX
    }
  }
}

impl RowMetrics {
  /// Both insets grow with the slot
  /// index; the cell width is never
  /// divided, so large stacks overflow.
  pub fn rect_px(
    &self,
    rect: &LayoutRect
  ) -> PixelRect {
    let inset = rect.horizontal_slot
      as f64
      * self.stack_offset_px;
    PixelRect {
      top:         rect.top_offset
        * self.row_height_px,
      height:      rect.height
        * self.row_height_px,
      left_inset:  inset,
      right_inset: inset
    }
  }
}
